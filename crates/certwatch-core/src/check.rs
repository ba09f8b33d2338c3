//! Per-environment check runs.
//!
//! [`run_environment_check`] drives one environment's page through the
//! open, poll, verify and select sequence inside a [`SummaryScope`], so the
//! summary artifact is written however the run ends. [`run_checks`] runs
//! several environments side by side; one run failing or timing out never
//! affects another.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};

use crate::artifact::{write_json_pretty, TestResultsArtifact};
use crate::config::HarnessConfig;
use crate::differ::{diff_entries, FuzzyMatcher};
use crate::error::{ArtifactError, CheckError, CheckResult};
use crate::metrics::METRICS;
use crate::obs::{
    check_span, duration_ms, emit_check_finished, emit_check_started, emit_diff_computed,
};
use crate::page::CatalogPage;
use crate::poller::{poll_until_loaded, PollConfig};
use crate::registry::EnvironmentSpec;
use crate::summary::{RunSummary, SummaryScope};

/// Settings shared by every run in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    pub poll: PollConfig,
    pub matcher: FuzzyMatcher,
    pub report_dir: PathBuf,
    /// Capture `<env>-certification-dropdown-validated.png` after selection.
    pub capture_screenshot: bool,
}

impl CheckOptions {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            poll: PollConfig::default(),
            matcher: FuzzyMatcher::default(),
            report_dir: report_dir.into(),
            capture_screenshot: true,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            poll: config.poll_config(),
            ..Self::new(&config.report_dir)
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn without_screenshot(mut self) -> Self {
        self.capture_screenshot = false;
        self
    }
}

/// One environment paired with the page that renders it.
#[derive(Clone, Copy)]
pub struct CheckRun<'a> {
    pub env: &'a EnvironmentSpec,
    pub page: &'a dyn CatalogPage,
}

/// Check one environment and persist its summary.
///
/// Returns the finished summary on success. On failure the summary is still
/// written (status `failed`) before the error is returned.
pub async fn run_environment_check<P>(
    env: &EnvironmentSpec,
    page: &P,
    options: &CheckOptions,
) -> CheckResult<RunSummary>
where
    P: CatalogPage + ?Sized,
{
    async move {
        let started = Instant::now();
        emit_check_started(&env.name, &env.base_url);

        let mut scope = SummaryScope::begin(
            RunSummary::pending(env),
            env.summary_path(&options.report_dir),
        );
        let outcome = execute(env, page, options, scope.summary_mut()).await;
        let result = scope.conclude(outcome);

        match &result {
            Ok(_) => METRICS.inc_checks_passed(),
            Err(err) => {
                METRICS.inc_checks_failed();
                warn!(error = %err, "check failed");
            }
        }
        emit_check_finished(
            &env.name,
            duration_ms(started.elapsed()),
            result.is_ok(),
        );
        result
    }
    .instrument(check_span(&env.name))
    .await
}

async fn execute<P>(
    env: &EnvironmentSpec,
    page: &P,
    options: &CheckOptions,
    summary: &mut RunSummary,
) -> CheckResult<()>
where
    P: CatalogPage + ?Sized,
{
    page.open_catalog().await?;

    let sample = poll_until_loaded(page, options.poll).await?;
    summary.record_sample(&sample);

    let mut missing_subtitles = Vec::new();
    for entry in &env.expected {
        if let Some(subtitle) = &entry.subtitle {
            if !page.is_text_visible(subtitle).await? {
                missing_subtitles.push(subtitle.clone());
            }
        }
    }
    summary.missing_subtitles = missing_subtitles.clone();

    let diff = diff_entries(&sample.observed, &env.expected, options.matcher);
    summary.record_diff(&diff);
    emit_diff_computed(
        &env.name,
        diff.matched().count(),
        diff.missing.len(),
        diff.extra.len(),
    );
    for check in &diff.checks {
        match check {
            Ok(m) => debug!(expected = %m.expected, observed = %m.observed, rule = ?m.rule, "entry matched"),
            Err(m) => warn!(expected = %m.expected, "entry missing"),
        }
    }
    if !diff.extra.is_empty() {
        warn!(extra = ?diff.extra, "unexpected entries rendered");
    }

    if !diff.missing.is_empty() {
        return Err(CheckError::AssertionMismatch {
            environment: env.name.clone(),
            missing: diff.missing,
        });
    }
    if !missing_subtitles.is_empty() {
        return Err(CheckError::SubtitleMissing {
            environment: env.name.clone(),
            subtitles: missing_subtitles,
        });
    }

    if env.select_first {
        if let Some(first) = diff.matched().next() {
            page.select_entry(&first.observed).await?;
        }
    }

    if options.capture_screenshot {
        tokio::fs::create_dir_all(&options.report_dir)
            .await
            .map_err(|source| ArtifactError::Io {
                path: options.report_dir.clone(),
                source,
            })?;
        page.screenshot(&env.screenshot_path(&options.report_dir)).await?;
    }

    Ok(())
}

/// Run every check concurrently; results come back in input order.
pub async fn run_checks(
    runs: &[CheckRun<'_>],
    options: &CheckOptions,
) -> Vec<CheckResult<RunSummary>> {
    join_all(
        runs.iter()
            .map(|run| run_environment_check(run.env, run.page, options)),
    )
    .await
}

/// Write the primary test-result artifact for a single check outcome.
pub fn write_results_artifact(
    env: &EnvironmentSpec,
    report_dir: &Path,
    passed: bool,
) -> Result<PathBuf, ArtifactError> {
    let path = env.results_path(report_dir);
    write_json_pretty(&path, &TestResultsArtifact::single(passed))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::read_json;
    use std::time::Duration;

    #[test]
    fn test_options_follow_config() {
        let mut config = HarnessConfig::default();
        config.poll.deadline_secs = 5;
        config.report_dir = PathBuf::from("out");

        let options = CheckOptions::from_config(&config).without_screenshot();
        assert_eq!(options.poll.deadline, Duration::from_secs(5));
        assert_eq!(options.report_dir, PathBuf::from("out"));
        assert_eq!(options.matcher, FuzzyMatcher::normalized());
        assert!(!options.capture_screenshot);
    }

    #[test]
    fn test_results_artifact_counts_one_test() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = EnvironmentSpec::new("EBC", "https://ebc.certified.io", &["A"]);

        let path = write_results_artifact(&env, dir.path(), false).expect("write");
        assert!(path.ends_with("ebc-results.json"));
        let artifact: TestResultsArtifact = read_json(&path).expect("read back");
        assert_eq!(artifact.stats.failed(), 1);
        assert_eq!(artifact.stats.total(), 1);
    }
}
