// src/digest/backend.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::histogram;
use serde::{Deserialize, Serialize};

use crate::digest::llm::LlmClient;
use crate::digest::prompt::PromptTemplate;
use crate::error::BackendError;
use crate::ingest::store::write_atomic;

/// Returned instead of generated text when no backend call is made.
pub const DRY_RUN_SENTINEL: &str = "DRY RUN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    #[default]
    Live,
    /// Write the would-be prompt to the inspection file instead of calling the backend.
    Inspect,
}

/// One backend is bound to one report style (its template) for its lifetime.
pub struct DigestBackend {
    client: Arc<dyn LlmClient>,
    template: PromptTemplate,
    mode: DigestMode,
    inspect_path: PathBuf,
}

impl DigestBackend {
    pub fn new(
        client: Arc<dyn LlmClient>,
        template: PromptTemplate,
        mode: DigestMode,
        inspect_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            template,
            mode,
            inspect_path: inspect_path.into(),
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn mode(&self) -> DigestMode {
        self.mode
    }

    pub fn inspect_path(&self) -> &Path {
        &self.inspect_path
    }

    /// Generated prose for `content`. With `dry_run` (or inspect mode) the exact
    /// instruction + content payload is written to the inspection file and
    /// [`DRY_RUN_SENTINEL`] is returned.
    pub async fn summarize(&self, content: &str, dry_run: bool) -> Result<String, BackendError> {
        if dry_run || self.mode == DigestMode::Inspect {
            let payload = format!("{}\n\n{}", self.template.as_str(), content);
            write_atomic(&self.inspect_path, payload.as_bytes()).map_err(|err| {
                BackendError::Inspect {
                    path: self.inspect_path.clone(),
                    err,
                }
            })?;
            tracing::info!(
                path = %self.inspect_path.display(),
                "dry run: prompt written for inspection"
            );
            return Ok(DRY_RUN_SENTINEL.to_string());
        }

        let provider = self.client.provider_name();
        tracing::debug!(provider, input_chars = content.len(), "calling digest backend");
        let t0 = std::time::Instant::now();
        let out = self.client.complete(self.template.as_str(), content).await;
        histogram!("digest_backend_ms", "provider" => provider)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &out {
            Ok(text) => {
                tracing::debug!(provider, output_chars = text.len(), "digest backend returned")
            }
            Err(e) => tracing::warn!(provider, error = %e, "digest backend failed"),
        }
        out
    }
}
