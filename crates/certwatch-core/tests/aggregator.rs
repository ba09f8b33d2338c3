//! Integration tests for cross-environment aggregation over real artifact files.

use std::path::Path;

use certwatch_core::{
    aggregate, write_json_pretty, EnvironmentSpec, EnvironmentTarget, HarnessConfig,
    OutcomeStatus, RunSummary, SummaryScope, TestResultsArtifact, TestStats,
};

fn environments() -> Vec<EnvironmentSpec> {
    vec![
        EnvironmentSpec::new("DEMO", "https://demo.certified.io", &["A", "B"]),
        EnvironmentSpec::new("EBC", "https://ebc.certified.io", &["C"]),
        EnvironmentSpec::new("ETRAINING", "https://etraining.certified.io", &["D", "E"]),
    ]
}

fn config(report_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        report_dir: report_dir.to_path_buf(),
        environments: environments(),
        ..HarnessConfig::default()
    }
}

fn write_stats(env: &EnvironmentSpec, dir: &Path, expected: u64, unexpected: u64, flaky: u64) {
    let artifact = TestResultsArtifact {
        stats: TestStats {
            expected,
            unexpected,
            flaky,
            skipped: 0,
        },
    };
    write_json_pretty(&env.results_path(dir), &artifact).expect("write results");
}

fn write_summary(env: &EnvironmentSpec, dir: &Path, missing: &[&str]) {
    let mut scope = SummaryScope::begin(RunSummary::pending(env), env.summary_path(dir));
    scope.summary_mut().missing = missing.iter().map(|m| m.to_string()).collect();
    let outcome = if missing.is_empty() {
        Ok(())
    } else {
        Err(certwatch_core::CheckError::AssertionMismatch {
            environment: env.name.clone(),
            missing: scope.summary().missing.clone(),
        })
    };
    let _ = scope.conclude(outcome);
}

#[test]
fn test_absent_environment_is_error_and_excluded_from_totals() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    let envs = &cfg.environments;
    write_stats(&envs[0], dir.path(), 1, 0, 0);
    write_stats(&envs[2], dir.path(), 0, 1, 1);

    let report = aggregate(&cfg.targets());

    assert_eq!(report.environments.len(), 3);
    assert_eq!(report.environments.names(), ["DEMO", "EBC", "ETRAINING"]);

    let ebc = report.environments.get("EBC").expect("EBC");
    assert_eq!(ebc.status, OutcomeStatus::Error);
    assert_eq!((ebc.passed, ebc.failed, ebc.total), (0, 0, 0));
    assert_eq!(ebc.url, "https://ebc.certified.io");

    let etraining = report.environments.get("ETRAINING").expect("ETRAINING");
    assert_eq!(etraining.status, OutcomeStatus::Failed);
    assert_eq!(etraining.failed, 2);

    assert_eq!(report.summary.total_tests, 3);
    assert_eq!(report.summary.total_passed, 1);
    assert_eq!(report.summary.total_failed, 2);
    assert_eq!(report.summary.total_errored, 1);
    assert!(!report.is_healthy());
    assert_eq!(report.unhealthy_environments(), ["EBC", "ETRAINING"]);
}

#[test]
fn test_malformed_artifacts_are_treated_as_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    let envs = &cfg.environments;
    std::fs::write(envs[0].results_path(dir.path()), "{ not json").expect("write");
    std::fs::write(envs[0].summary_path(dir.path()), "[]").expect("write");
    write_stats(&envs[1], dir.path(), 1, 0, 0);
    write_stats(&envs[2], dir.path(), 1, 0, 0);

    let report = aggregate(&cfg.targets());

    let demo = report.environments.get("DEMO").expect("DEMO");
    assert_eq!(demo.status, OutcomeStatus::Error);
    assert!(demo.detail.is_none());
    assert_eq!(report.summary.total_tests, 2);
    assert_eq!(report.summary.total_errored, 1);
}

#[test]
fn test_summary_detail_is_kept_when_primary_artifact_is_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    write_summary(&cfg.environments[2], dir.path(), &["E"]);

    let report = aggregate(&cfg.targets());

    let etraining = report.environments.get("ETRAINING").expect("ETRAINING");
    assert_eq!(etraining.status, OutcomeStatus::Error);
    let detail = etraining.detail.as_ref().expect("summary detail");
    assert_eq!(detail.missing, vec!["E"]);
    assert_eq!(detail.expected.len(), 2);
}

#[test]
fn test_all_passing_is_healthy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    for env in &cfg.environments {
        write_stats(env, dir.path(), 1, 0, 0);
        write_summary(env, dir.path(), &[]);
    }

    let report = aggregate(&cfg.targets());

    assert!(report.is_healthy());
    assert_eq!(report.overall_label(), "ALL SYSTEMS HEALTHY");
    assert_eq!(report.summary.total_tests, 3);
    assert_eq!(report.summary.total_errored, 0);
    assert!(report.environments.iter().all(|o| o.detail.is_some()));
}

#[test]
fn test_output_follows_target_order_not_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let targets: Vec<EnvironmentTarget> = ["ZULU", "ALPHA", "MIKE"]
        .iter()
        .map(|name| EnvironmentTarget::from_spec(&EnvironmentSpec::new(*name, "", &[]), dir.path()))
        .collect();

    let report = aggregate(&targets);

    assert_eq!(report.environments.names(), ["ZULU", "ALPHA", "MIKE"]);
    assert!(!report.is_healthy());
}

#[test]
fn test_empty_configuration_is_not_healthy() {
    let report = aggregate(&[]);
    assert!(report.environments.is_empty());
    assert_eq!(report.summary.total_tests, 0);
    assert!(!report.is_healthy());
}
