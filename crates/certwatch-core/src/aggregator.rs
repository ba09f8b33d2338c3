//! Cross-environment aggregation.
//!
//! [`aggregate`] reads every configured environment's primary test-result
//! artifact and summary artifact and folds them into one [`AggregateReport`].
//! An absent or unreadable artifact never aborts the fold: the environment is
//! classified [`OutcomeStatus::Error`] and whatever detail could be parsed is
//! still surfaced.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::artifact::{read_json, TestResultsArtifact, TestStats};
use crate::metrics::METRICS;
use crate::obs::{emit_aggregate_built, emit_artifact_absent, emit_artifact_unavailable};
use crate::registry::EnvironmentSpec;
use crate::summary::RunSummary;

/// Where one environment's artifacts are expected to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentTarget {
    pub name: String,
    pub url: String,
    pub results_path: PathBuf,
    pub summary_path: PathBuf,
}

impl EnvironmentTarget {
    pub fn from_spec(spec: &EnvironmentSpec, report_dir: &Path) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.base_url.clone(),
            results_path: spec.results_path(report_dir),
            summary_path: spec.summary_path(report_dir),
        }
    }
}

/// Health classification of one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// Results present, no failures.
    Passed,
    /// Results present, at least one failure.
    Failed,
    /// No readable results: the check never ran or never reported.
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "PASSED",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Aggregated view of a single environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOutcome {
    /// Carried as the map key in JSON.
    #[serde(skip)]
    pub name: String,
    pub status: OutcomeStatus,
    pub passed: u64,
    pub failed: u64,
    pub total: u64,
    pub url: String,
    /// Parsed summary artifact; `None` when it was absent or malformed.
    pub detail: Option<RunSummary>,
}

impl EnvironmentOutcome {
    /// Classify from whichever artifacts could be read.
    pub fn classify(
        target: &EnvironmentTarget,
        stats: Option<TestStats>,
        detail: Option<RunSummary>,
    ) -> Self {
        let (status, passed, failed, total) = match stats {
            Some(s) if s.failed() == 0 => (OutcomeStatus::Passed, s.passed(), 0, s.total()),
            Some(s) => (OutcomeStatus::Failed, s.passed(), s.failed(), s.total()),
            None => (OutcomeStatus::Error, 0, 0, 0),
        };
        Self {
            name: target.name.clone(),
            status,
            passed,
            failed,
            total,
            url: target.url.clone(),
            detail,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == OutcomeStatus::Passed
    }
}

/// Environment outcomes in configuration order, serialized as a JSON object
/// keyed by environment name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentOutcomes(Vec<EnvironmentOutcome>);

impl EnvironmentOutcomes {
    pub fn iter(&self) -> std::slice::Iter<'_, EnvironmentOutcome> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&EnvironmentOutcome> {
        self.0.iter().find(|o| o.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|o| o.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a EnvironmentOutcomes {
    type Item = &'a EnvironmentOutcome;
    type IntoIter = std::slice::Iter<'a, EnvironmentOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for EnvironmentOutcomes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for outcome in &self.0 {
            map.serialize_entry(&outcome.name, outcome)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvironmentOutcomes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutcomesVisitor;

        impl<'de> Visitor<'de> for OutcomesVisitor {
            type Value = EnvironmentOutcomes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of environment name to outcome")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut outcomes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, mut outcome)) =
                    access.next_entry::<String, EnvironmentOutcome>()?
                {
                    outcome.name = name;
                    outcomes.push(outcome);
                }
                Ok(EnvironmentOutcomes(outcomes))
            }
        }

        deserializer.deserialize_map(OutcomesVisitor)
    }
}

/// Totals across all configured environments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub total_tests: u64,
    pub total_passed: u64,
    pub total_failed: u64,
    /// Environments with no readable primary artifact.
    #[serde(default)]
    pub total_errored: u64,
}

/// Consolidated report over every configured environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub timestamp: DateTime<Utc>,
    pub environments: EnvironmentOutcomes,
    pub summary: AggregateSummary,
}

impl AggregateReport {
    /// Zero-valued starting point for the fold.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            environments: EnvironmentOutcomes::default(),
            summary: AggregateSummary::default(),
        }
    }

    /// One fold step: account for `outcome` and append it.
    pub fn with_outcome(mut self, outcome: EnvironmentOutcome) -> Self {
        match outcome.status {
            OutcomeStatus::Error => self.summary.total_errored += 1,
            OutcomeStatus::Passed | OutcomeStatus::Failed => {
                self.summary.total_tests += outcome.total;
                self.summary.total_passed += outcome.passed;
                self.summary.total_failed += outcome.failed;
            }
        }
        self.environments.0.push(outcome);
        self
    }

    /// Healthy only when at least one environment is configured and every
    /// one of them reported without failures.
    pub fn is_healthy(&self) -> bool {
        !self.environments.is_empty() && self.environments.iter().all(|o| o.is_healthy())
    }

    pub fn overall_label(&self) -> &'static str {
        if self.is_healthy() {
            "ALL SYSTEMS HEALTHY"
        } else {
            "ISSUES DETECTED"
        }
    }

    /// Names of environments that are `FAILED` or `ERROR`, in configuration order.
    pub fn unhealthy_environments(&self) -> Vec<&str> {
        self.environments
            .iter()
            .filter(|o| !o.is_healthy())
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Aggregate all `targets`, stamping the report with the current time.
pub fn aggregate(targets: &[EnvironmentTarget]) -> AggregateReport {
    aggregate_at(targets, Utc::now())
}

/// Aggregate all `targets` in order as a sequential fold.
pub fn aggregate_at(targets: &[EnvironmentTarget], timestamp: DateTime<Utc>) -> AggregateReport {
    let report = targets
        .iter()
        .map(collect_outcome)
        .fold(AggregateReport::empty(timestamp), AggregateReport::with_outcome);

    emit_aggregate_built(
        report.environments.len(),
        report.summary.total_tests,
        report.summary.total_failed,
        report.summary.total_errored,
        report.is_healthy(),
    );
    report
}

fn collect_outcome(target: &EnvironmentTarget) -> EnvironmentOutcome {
    let stats = load_optional::<TestResultsArtifact>(target, &target.results_path, "results")
        .map(|r| r.stats);
    let detail = load_optional::<RunSummary>(target, &target.summary_path, "summary");
    EnvironmentOutcome::classify(target, stats, detail)
}

fn load_optional<T: serde::de::DeserializeOwned>(
    target: &EnvironmentTarget,
    path: &Path,
    kind: &str,
) -> Option<T> {
    match read_json(path) {
        Ok(value) => Some(value),
        Err(err) => {
            METRICS.inc_artifacts_unavailable();
            if err.is_not_found() {
                emit_artifact_absent(&target.name, kind, path);
            } else {
                emit_artifact_unavailable(&target.name, kind, &err);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> EnvironmentTarget {
        EnvironmentTarget {
            name: name.to_string(),
            url: format!("https://{}.certified.io", name.to_lowercase()),
            results_path: PathBuf::from(format!("{}-results.json", name.to_lowercase())),
            summary_path: PathBuf::from(format!("{}-summary.json", name.to_lowercase())),
        }
    }

    fn stats(expected: u64, unexpected: u64, flaky: u64) -> Option<TestStats> {
        Some(TestStats {
            expected,
            unexpected,
            flaky,
            skipped: 0,
        })
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn line_with(&self, needle: &str) -> String {
            let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            raw.lines()
                .find(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("no log line with {needle} in:\n{raw}"))
                .to_string()
        }
    }

    #[test]
    fn test_absent_artifact_logs_below_warn_but_malformed_warns() {
        let dir = tempfile::tempdir().unwrap();
        let spec = EnvironmentSpec::new("DEMO", "https://demo.certified.io", &["A"]);
        let target = EnvironmentTarget::from_spec(&spec, dir.path());
        std::fs::write(&target.summary_path, "{ not json").unwrap();

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let outcome = tracing::subscriber::with_default(subscriber, || {
            collect_outcome(&target)
        });

        assert_eq!(outcome.status, OutcomeStatus::Error);
        let absent = capture.line_with("artifact.absent");
        assert!(absent.contains("DEBUG"), "{absent}");
        assert!(absent.contains("demo-results.json"), "{absent}");
        let malformed = capture.line_with("artifact.unavailable");
        assert!(malformed.contains("WARN"), "{malformed}");
        assert!(malformed.contains("summary"), "{malformed}");
    }

    #[test]
    fn test_classify_passed_failed_error() {
        let passed = EnvironmentOutcome::classify(&target("DEMO"), stats(1, 0, 0), None);
        assert_eq!(passed.status, OutcomeStatus::Passed);
        assert_eq!(passed.total, 1);

        let failed = EnvironmentOutcome::classify(&target("EBC"), stats(2, 0, 1), None);
        assert_eq!(failed.status, OutcomeStatus::Failed);
        assert_eq!((failed.passed, failed.failed, failed.total), (2, 1, 3));

        let error = EnvironmentOutcome::classify(&target("ETRAINING"), None, None);
        assert_eq!(error.status, OutcomeStatus::Error);
        assert_eq!((error.passed, error.failed, error.total), (0, 0, 0));
    }

    #[test]
    fn test_fold_accumulates_and_counts_errors() {
        let ts = Utc::now();
        let report = [
            EnvironmentOutcome::classify(&target("A"), stats(3, 1, 0), None),
            EnvironmentOutcome::classify(&target("B"), None, None),
            EnvironmentOutcome::classify(&target("C"), stats(2, 0, 0), None),
        ]
        .into_iter()
        .fold(AggregateReport::empty(ts), AggregateReport::with_outcome);

        assert_eq!(report.summary.total_tests, 6);
        assert_eq!(report.summary.total_passed, 5);
        assert_eq!(report.summary.total_failed, 1);
        assert_eq!(report.summary.total_errored, 1);
        assert_eq!(report.environments.names(), ["A", "B", "C"]);
        assert_eq!(report.unhealthy_environments(), ["A", "B"]);
    }

    #[test]
    fn test_empty_report_is_not_healthy() {
        let report = AggregateReport::empty(Utc::now());
        assert!(!report.is_healthy());
        assert_eq!(report.overall_label(), "ISSUES DETECTED");
    }

    #[test]
    fn test_environments_serialize_as_ordered_map() {
        let report = [
            EnvironmentOutcome::classify(&target("ZETA"), stats(1, 0, 0), None),
            EnvironmentOutcome::classify(&target("ALPHA"), None, None),
        ]
        .into_iter()
        .fold(AggregateReport::empty(Utc::now()), AggregateReport::with_outcome);

        let json = serde_json::to_string(&report).expect("serialize");
        let zeta = json.find("\"ZETA\"").expect("ZETA key");
        let alpha = json.find("\"ALPHA\"").expect("ALPHA key");
        assert!(zeta < alpha, "configuration order must be preserved");

        let back: AggregateReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.environments.names(), ["ZETA", "ALPHA"]);
        assert_eq!(back.environments.get("ALPHA").unwrap().status, OutcomeStatus::Error);
    }
}
