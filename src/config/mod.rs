pub mod app;
pub mod llm;

pub use app::{AppConfig, DigestSettings, EmailConfig, NotifyConfig, SourcesConfig};
pub use llm::{LlmConfig, LlmProvider};
