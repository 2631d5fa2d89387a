// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::ingest::types::SourceKind;
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::pipeline::{DigestJob, DigestPipeline, RunSummary};
pub use crate::registry::SubscriptionRegistry;
