// src/digest/mod.rs
//! Summarization: prompt templates, LLM clients, the backend wrapper and report writing.

pub mod backend;
pub mod llm;
pub mod prompt;
pub mod report;

pub use backend::{DigestBackend, DigestMode, DRY_RUN_SENTINEL};
pub use llm::{FixedClient, LlmClient, OpenAiClient};
pub use prompt::PromptTemplate;
pub use report::{Report, ReportGenerator};
