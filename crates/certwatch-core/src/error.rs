//! Error taxonomy for catalog checks, artifacts, configuration and mail.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading or writing a JSON artifact.
///
/// The aggregator treats every variant as "no data" for the affected
/// environment; only the per-run summary writer surfaces them to callers.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to access artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ArtifactError {
    /// True when the artifact simply does not exist (the run never wrote it).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Errors that end a single environment's check run.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The catalog container stayed empty until the poll deadline.
    #[error("catalog container '{container}' did not load within {elapsed:?} ({attempts} samples)")]
    LoadTimeout {
        container: String,
        elapsed: Duration,
        attempts: u32,
    },

    /// One or more expected entries were not rendered.
    #[error("{environment}: expected catalog entries missing: {missing:?}")]
    AssertionMismatch {
        environment: String,
        missing: Vec<String>,
    },

    /// Entry subtitles that were declared but never became visible.
    #[error("{environment}: expected subtitles not visible: {subtitles:?}")]
    SubtitleMissing {
        environment: String,
        subtitles: Vec<String>,
    },

    /// The page driver failed while performing `step`.
    #[error("driver failed during {step}: {detail}")]
    Driver { step: String, detail: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl CheckError {
    pub fn driver(step: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        CheckError::Driver {
            step: step.into(),
            detail: detail.to_string(),
        }
    }
}

/// Result type for check runs.
pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// Errors produced while assembling harness configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable not set: {0}")]
    MissingVar(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read config file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors produced by the mail boundary.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
