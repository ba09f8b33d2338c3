//! JSON artifact persistence shared by the summary writer, the check runner
//! and the aggregator.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// Read and parse a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` as pretty JSON, creating parent directories and replacing
/// any previous file.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, json).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Pass/fail counters of a primary test-result artifact.
///
/// `expected` counts passing tests; `unexpected` and `flaky` both count as
/// failures. Absent fields read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    #[serde(default)]
    pub expected: u64,
    #[serde(default)]
    pub unexpected: u64,
    #[serde(default)]
    pub flaky: u64,
    #[serde(default)]
    pub skipped: u64,
}

impl TestStats {
    pub fn passed(&self) -> u64 {
        self.expected
    }

    pub fn failed(&self) -> u64 {
        self.unexpected + self.flaky
    }

    pub fn total(&self) -> u64 {
        self.passed() + self.failed()
    }
}

/// Primary test-result artifact. Only `stats` is consumed; other keys a test
/// runner writes (suites, config, errors) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResultsArtifact {
    #[serde(default)]
    pub stats: TestStats,
}

impl TestResultsArtifact {
    /// Artifact for a single check that either passed or failed.
    pub fn single(passed: bool) -> Self {
        Self {
            stats: TestStats {
                expected: u64::from(passed),
                unexpected: u64::from(!passed),
                ..TestStats::default()
            },
        }
    }
}
