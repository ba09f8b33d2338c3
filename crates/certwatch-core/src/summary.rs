//! Per-run summary records and the scope that guarantees they are persisted.
//!
//! A [`RunSummary`] starts `pending`, is filled in as the check proceeds and
//! is written to `<report_dir>/<env>-certification-summary.json` exactly
//! once by [`SummaryScope`], whichever way the run ends.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::write_json_pretty;
use crate::differ::DiffResult;
use crate::error::{ArtifactError, CheckError, CheckResult};
use crate::obs::{emit_summary_write_error, emit_summary_written};
use crate::poller::LoadedSample;
use crate::registry::{EnvironmentSpec, ExpectedEntry};

/// Lifecycle state of a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Outcome record for one (environment, run) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[serde(default)]
    pub run_id: Uuid,
    pub environment: String,
    #[serde(default)]
    pub url: String,
    pub status: RunStatus,
    #[serde(rename = "expectedCertifications", with = "entry_titles", default)]
    pub expected: Vec<ExpectedEntry>,
    #[serde(rename = "actualCertifications", default)]
    pub actual: Vec<String>,
    #[serde(rename = "missingCertifications", default)]
    pub missing: Vec<String>,
    #[serde(rename = "extraCertifications", default)]
    pub extra: Vec<String>,
    #[serde(default)]
    pub missing_subtitles: Vec<String>,
    /// Poll samples taken before the catalog rendered.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn pending(env: &EnvironmentSpec) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            environment: env.name.clone(),
            url: env.base_url.clone(),
            status: RunStatus::Pending,
            expected: env.expected.clone(),
            actual: Vec::new(),
            missing: Vec::new(),
            extra: Vec::new(),
            missing_subtitles: Vec::new(),
            attempts: 0,
            started_at: Some(Utc::now()),
            finished_at: None,
            error: None,
        }
    }

    pub fn record_sample(&mut self, sample: &LoadedSample) {
        self.actual = sample.observed.as_slice().to_vec();
        self.attempts = sample.attempts;
    }

    pub fn record_diff(&mut self, diff: &DiffResult) {
        self.actual = diff.actual.clone();
        self.missing = diff.missing.clone();
        self.extra = diff.extra.clone();
    }

    /// Settle the status from the run's outcome and stamp the finish time.
    pub fn finalize(&mut self, error: Option<&CheckError>) {
        match error {
            None => {
                self.status = RunStatus::Passed;
                self.error = None;
            }
            Some(err) => {
                self.status = RunStatus::Failed;
                self.error = Some(err.to_string());
            }
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn is_passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

/// Serialize expected entries as a plain title list, the artifact's wire shape.
mod entry_titles {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::registry::ExpectedEntry;

    pub fn serialize<S: Serializer>(entries: &[ExpectedEntry], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(entries.iter().map(|e| e.title.as_str()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ExpectedEntry>, D::Error> {
        let titles = Vec::<String>::deserialize(d)?;
        Ok(titles.into_iter().map(ExpectedEntry::new).collect())
    }
}

/// Scoped owner of a [`RunSummary`] that persists it exactly once.
///
/// Call [`SummaryScope::conclude`] with the run's outcome. If the scope is
/// dropped first (a panic, or the owning task being cancelled) the summary
/// is written as `failed` from `Drop`.
pub struct SummaryScope {
    summary: RunSummary,
    path: PathBuf,
    persisted: bool,
}

impl SummaryScope {
    pub fn begin(summary: RunSummary, path: impl Into<PathBuf>) -> Self {
        Self {
            summary,
            path: path.into(),
            persisted: false,
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut RunSummary {
        &mut self.summary
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalize, persist, then hand back the summary or re-raise the run error.
    ///
    /// A run error takes precedence over a failed write; the write failure is
    /// logged in that case.
    pub fn conclude(mut self, outcome: CheckResult<()>) -> CheckResult<RunSummary> {
        self.summary.finalize(outcome.as_ref().err());
        let written = self.persist();
        let summary = self.summary.clone();

        match (outcome, written) {
            (Err(err), _) => Err(err),
            (Ok(()), Err(write_err)) => Err(write_err.into()),
            (Ok(()), Ok(())) => Ok(summary),
        }
    }

    fn persist(&mut self) -> Result<(), ArtifactError> {
        if self.persisted {
            return Ok(());
        }
        self.persisted = true;

        let result = write_json_pretty(&self.path, &self.summary);
        match &result {
            Ok(()) => emit_summary_written(
                &self.summary.environment,
                &self.path,
                self.summary.status.as_str(),
            ),
            Err(err) => emit_summary_write_error(&self.summary.environment, err),
        }
        result
    }
}

impl Drop for SummaryScope {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        self.summary.status = RunStatus::Failed;
        self.summary.error = Some("run aborted before completion".to_string());
        self.summary.finished_at = Some(Utc::now());
        // Errors are already logged by persist; nothing more can be done here.
        let _ = self.persist();
    }
}
