// src/error.rs
//! Error taxonomy shared by adapters, the digest backend, delivery and the registry.
//! Orchestration code decides per-job fate from these kinds; binaries wrap them in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Fetch/parse/persist failure against an external source.
/// Recoverable by skipping that source for the current run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name}: http request failed: {message}")]
    Http {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: upstream returned status {status}")]
    Status {
        source_name: &'static str,
        status: u16,
    },

    #[error("{source_name}: could not parse response: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: no results for {what}")]
    Empty {
        source_name: &'static str,
        what: String,
    },

    #[error("{source_name}: invalid request: {message}")]
    InvalidRequest {
        source_name: &'static str,
        message: String,
    },

    #[error("writing artifact {}: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

impl SourceError {
    /// Empty result sets are logged as warnings rather than errors.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, SourceError::Empty { .. })
    }
}

/// Text-generation call failure. Never retried internally.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("llm request failed: {0}")]
    Http(String),

    #[error("llm request timed out")]
    Timeout,

    #[error("llm api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("llm response could not be decoded: {0}")]
    Decode(String),

    #[error("llm returned an empty completion")]
    EmptyCompletion,

    #[error("writing inspection prompt to {}: {err}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

/// Notification transport failure. Logged only; never invalidates a stored report.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{channel}: could not build message: {message}")]
    Build {
        channel: &'static str,
        message: String,
    },

    #[error("{channel}: transport failed: {message}")]
    Transport {
        channel: &'static str,
        message: String,
    },
}

/// Missing or malformed setting. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("reading config {}: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("parsing config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Backing-store failure on the subscription list.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscription store {}: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("subscription store {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("invalid subscription identifier {0:?}")]
    InvalidIdentifier(String),
}

/// Report generation failure: either the backend failed or the report could not be stored.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("reading artifact {}: {err}", path.display())]
    ReadArtifact {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("writing report {}: {err}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

/// Outcome of one pipeline job that did not produce a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("no adapter registered for source kind {0}")]
    UnknownKind(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_display_names_the_source() {
        let e = SourceError::Status {
            source_name: "github",
            status: 404,
        };
        assert_eq!(e.to_string(), "github: upstream returned status 404");
    }

    #[test]
    fn empty_result_is_flagged() {
        let e = SourceError::Empty {
            source_name: "reddit",
            what: "r/all".into(),
        };
        assert!(e.is_empty_result());
        assert_eq!(e.to_string(), "reddit: no results for r/all");
    }

    #[test]
    fn pipeline_error_is_transparent_over_backend() {
        let e: PipelineError = ReportError::from(BackendError::Api {
            status: 429,
            message: "rate limited".into(),
        })
        .into();
        assert_eq!(e.to_string(), "llm api error 429: rate limited");
    }

    #[test]
    fn config_error_names_missing_credential() {
        let e = ConfigError::MissingCredential("OPENAI_API_KEY");
        assert_eq!(e.to_string(), "missing required credential OPENAI_API_KEY");
    }
}
