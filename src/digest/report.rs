// src/digest/report.rs
use std::path::{Path, PathBuf};

use metrics::counter;

use crate::digest::backend::DigestBackend;
use crate::error::ReportError;
use crate::ingest::store::{report_path_for, write_atomic};

/// Generated digest and where it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub content: String,
    pub path: PathBuf,
}

/// Loads a raw artifact, summarizes it and stores the report next to it.
/// No caching: every call goes to the backend.
pub struct ReportGenerator {
    backend: DigestBackend,
}

impl ReportGenerator {
    pub fn new(backend: DigestBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &DigestBackend {
        &self.backend
    }

    pub async fn generate(&self, raw_artifact: &Path) -> Result<Report, ReportError> {
        self.generate_with(raw_artifact, false).await
    }

    /// Same as [`generate`](Self::generate) with an explicit dry-run override.
    pub async fn generate_with(
        &self,
        raw_artifact: &Path,
        dry_run: bool,
    ) -> Result<Report, ReportError> {
        let raw = tokio::fs::read_to_string(raw_artifact)
            .await
            .map_err(|err| ReportError::ReadArtifact {
                path: raw_artifact.to_path_buf(),
                err,
            })?;

        // Backend errors return before anything is written.
        let content = self.backend.summarize(&raw, dry_run).await?;

        let path = report_path_for(raw_artifact);
        write_atomic(&path, content.as_bytes()).map_err(|err| ReportError::WriteReport {
            path: path.clone(),
            err,
        })?;
        counter!("digest_reports_written_total").increment(1);
        tracing::info!(target: "digest", path = %path.display(), "report written");

        Ok(Report { content, path })
    }
}
