//! certwatch - certification catalog health checks
//!
//! ## Commands
//!
//! - `environments`: List the configured environments
//! - `check`: Verify each environment's catalog and write its artifacts
//! - `aggregate`: Fold per-environment artifacts into the combined report
//! - `notify`: Email the combined report
//! - `diff`: Compare a list of titles with an environment's expected catalog

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use certwatch_core::obs::CheckSpan;
use certwatch_core::report::AGGREGATE_JSON_FILE;
use certwatch_core::{
    aggregate, diff_entries, emit_reports, read_json, render_health_email, run_checks,
    send_health_report, write_results_artifact, AggregateReport, CatalogPage, CheckOptions,
    CheckRun, FuzzyMatcher, HarnessConfig, HttpRelayTransport, MailConfig, ObservedEntrySet,
    SnapshotPage, METRICS,
};

#[derive(Parser)]
#[command(name = "certwatch")]
#[command(author = "Stevedores Org")]
#[command(version = certwatch_core::VERSION)]
#[command(about = "Certification catalog health checks across deployed environments", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Harness config file (JSON); built-in environments when omitted
    #[arg(long, global = true, env = "CERTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact directory (overrides config and CERTWATCH_REPORT_DIR)
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured environments
    Environments,

    /// Check environments' catalogs and write summary and result artifacts
    Check {
        /// Environment to check (repeatable; default: all)
        #[arg(short, long = "env")]
        envs: Vec<String>,

        /// Directory of recorded catalogs, one `<env>.json` per environment
        #[arg(long)]
        snapshot_dir: PathBuf,

        /// Poll deadline in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Disable the punctuation-insensitive match tier
        #[arg(long)]
        strict: bool,
    },

    /// Build combined-results.json and health-check-report.html
    Aggregate {
        /// Exit successfully even when an environment is unhealthy
        #[arg(long)]
        allow_unhealthy: bool,
    },

    /// Email the combined report (SMTP_* and MAIL_* variables)
    Notify {
        /// Print the message instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Diff a list of rendered titles against an environment's catalog
    Diff {
        /// Environment whose expected catalog to use
        #[arg(short, long)]
        env: String,

        /// Rendered title (repeatable)
        #[arg(short, long = "actual")]
        actual: Vec<String>,

        /// Disable the punctuation-insensitive match tier
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    certwatch_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref(), cli.report_dir)?;

    let result = match cli.command {
        Commands::Environments => cmd_environments(&config),
        Commands::Check {
            envs,
            snapshot_dir,
            deadline_secs,
            strict,
        } => cmd_check(&config, &envs, &snapshot_dir, deadline_secs, strict).await,
        Commands::Aggregate { allow_unhealthy } => {
            cmd_aggregate(&config, allow_unhealthy).map(|_| ())
        }
        Commands::Notify { dry_run } => cmd_notify(&config, dry_run).await,
        Commands::Diff {
            env,
            actual,
            strict,
        } => cmd_diff(&config, &env, &actual, strict),
    };

    METRICS.flush();
    result
}

fn load_config(path: Option<&Path>, report_dir: Option<PathBuf>) -> Result<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => HarnessConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid environment override")?;
    if let Some(dir) = report_dir {
        config.report_dir = dir;
    }
    Ok(config)
}

fn matcher(strict: bool) -> FuzzyMatcher {
    if strict {
        FuzzyMatcher::strict()
    } else {
        FuzzyMatcher::normalized()
    }
}

fn cmd_environments(config: &HarnessConfig) -> Result<()> {
    for env in &config.environments {
        println!(
            "{:<10} {} ({} certifications)",
            env.name,
            env.base_url,
            env.expected.len()
        );
    }
    Ok(())
}

async fn cmd_check(
    config: &HarnessConfig,
    envs: &[String],
    snapshot_dir: &Path,
    deadline_secs: Option<u64>,
    strict: bool,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(secs) = deadline_secs {
        config.poll.deadline_secs = secs;
    }
    let selected = config.select(envs).context("Unknown environment")?;

    // Recorded catalogs cannot be rendered, so no screenshots here.
    let options = CheckOptions::from_config(&config)
        .with_matcher(matcher(strict))
        .without_screenshot();

    let pages: Vec<SnapshotPage> = selected
        .iter()
        .map(|env| SnapshotPage::new(snapshot_dir.join(format!("{}.json", env.slug()))))
        .collect();
    let runs: Vec<CheckRun<'_>> = selected
        .iter()
        .zip(&pages)
        .map(|(env, page)| CheckRun {
            env,
            page: page as &dyn CatalogPage,
        })
        .collect();

    let results = run_checks(&runs, &options).await;

    let mut failed = Vec::new();
    let mut unwritten = Vec::new();
    for (env, result) in selected.iter().zip(&results) {
        let _span = CheckSpan::enter(&env.name);
        let passed = result.is_ok();
        if let Err(err) = write_results_artifact(env, &config.report_dir, passed) {
            warn!(environment = %env.name, error = %err, "failed to write results artifact");
            unwritten.push(env.name.clone());
        }

        match result {
            Ok(summary) => println!(
                "✓ {} ({} certifications, {} unexpected)",
                env.name,
                summary.expected.len(),
                summary.extra.len()
            ),
            Err(err) => {
                println!("✗ {}: {}", env.name, err);
                failed.push(env.name.clone());
            }
        }
    }

    println!();
    println!(
        "Summary: {}/{} environments passed",
        results.len() - failed.len(),
        results.len()
    );

    if !unwritten.is_empty() {
        anyhow::bail!("Failed to write results for: {}", unwritten.join(", "));
    }
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Certification check failed for: {}", failed.join(", "))
    }
}

fn cmd_aggregate(config: &HarnessConfig, allow_unhealthy: bool) -> Result<AggregateReport> {
    let report = aggregate(&config.targets());
    let paths = emit_reports(&config.report_dir, &report).context("Failed to write reports")?;
    info!(json = %paths.json.display(), html = %paths.html.display(), "reports written");

    for outcome in &report.environments {
        println!(
            "{:<10} {:<6} {}/{} passed",
            outcome.name, outcome.status, outcome.passed, outcome.total
        );
    }
    println!();
    println!(
        "Overall: {} ({} tests, {} failed, {} without results)",
        report.overall_label(),
        report.summary.total_tests,
        report.summary.total_failed,
        report.summary.total_errored
    );

    if report.is_healthy() || allow_unhealthy {
        Ok(report)
    } else {
        anyhow::bail!(
            "Unhealthy environments: {}",
            report.unhealthy_environments().join(", ")
        )
    }
}

async fn cmd_notify(config: &HarnessConfig, dry_run: bool) -> Result<()> {
    let path = config.report_dir.join(AGGREGATE_JSON_FILE);
    let report: AggregateReport = read_json(&path)
        .with_context(|| format!("Failed to read {:?}; run `certwatch aggregate` first", path))?;

    if dry_run {
        let email = render_health_email(&report);
        println!("Subject: {}", email.subject);
        println!();
        println!("{}", email.html);
        return Ok(());
    }

    let mail_config = MailConfig::from_env().context("Mail is not configured")?;
    let transport = HttpRelayTransport::new(&mail_config).context("Failed to build mail client")?;
    let message = send_health_report(&transport, &mail_config, &report)
        .await
        .context("Failed to send health report")?;
    println!("Sent \"{}\" to {}", message.subject, message.to.join(", "));
    Ok(())
}

fn cmd_diff(config: &HarnessConfig, env: &str, actual: &[String], strict: bool) -> Result<()> {
    let env = config.environment(env).context("Unknown environment")?;
    let observed = ObservedEntrySet::from_raw(actual.iter().map(String::as_str));
    let diff = diff_entries(&observed, &env.expected, matcher(strict));

    for check in &diff.checks {
        match check {
            Ok(m) => println!("  ✓ {} (as \"{}\", {:?})", m.expected, m.observed, m.rule),
            Err(m) => println!("  ✗ {}", m.expected),
        }
    }
    for extra in &diff.extra {
        println!("  + {}", extra);
    }
    println!();
    println!(
        "{} matched, {} missing, {} unexpected",
        diff.matched().count(),
        diff.missing.len(),
        diff.extra.len()
    );

    if diff.missing.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} expected certifications missing", diff.missing.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certwatch_core::page::CatalogSnapshot;
    use certwatch_core::{write_json_pretty, EnvironmentSpec, OutcomeStatus, RunStatus, RunSummary};
    use clap::CommandFactory;

    fn test_config(report_dir: &Path) -> HarnessConfig {
        HarnessConfig {
            report_dir: report_dir.to_path_buf(),
            environments: vec![
                EnvironmentSpec::new("DEMO", "https://demo.certified.io", &["Cert A", "Cert B"]),
                EnvironmentSpec::new("EBC", "https://ebc.certified.io", &["Cert C"]),
            ],
            ..HarnessConfig::default()
        }
    }

    fn write_snapshot(dir: &Path, slug: &str, titles: &[&str]) {
        write_json_pretty(
            &dir.join(format!("{slug}.json")),
            &CatalogSnapshot {
                container: "#certification-dropdown".to_string(),
                titles: titles.iter().map(|t| t.to_string()).collect(),
                visible: Vec::new(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_with_repeated_envs() {
        let cli = Cli::try_parse_from([
            "certwatch",
            "--report-dir",
            "out",
            "check",
            "--env",
            "demo",
            "--env",
            "ebc",
            "--snapshot-dir",
            "snaps",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.report_dir, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Check { envs, strict, .. } => {
                assert_eq!(envs, vec!["demo", "ebc"]);
                assert!(strict);
            }
            _ => panic!("expected check command"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_then_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = dir.path().join("snaps");
        let report_dir = dir.path().join("report");
        write_snapshot(&snaps, "demo", &["Cert A", "Cert B"]);
        write_snapshot(&snaps, "ebc", &["Cert D"]);

        let mut config = test_config(&report_dir);
        config.poll.deadline_secs = 2;

        let err = cmd_check(&config, &[], &snaps, None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("EBC"));

        let demo: RunSummary =
            read_json(&report_dir.join("demo-certification-summary.json")).unwrap();
        assert_eq!(demo.status, RunStatus::Passed);
        let ebc: RunSummary =
            read_json(&report_dir.join("ebc-certification-summary.json")).unwrap();
        assert_eq!(ebc.missing, vec!["Cert C".to_string()]);
        assert_eq!(ebc.extra, vec!["Cert D".to_string()]);

        let report = cmd_aggregate(&config, true).unwrap();
        assert_eq!(report.environments.names(), vec!["DEMO", "EBC"]);
        assert_eq!(
            report.environments.get("EBC").unwrap().status,
            OutcomeStatus::Failed
        );
        assert!(report_dir.join(AGGREGATE_JSON_FILE).exists());
        assert!(cmd_aggregate(&config, false).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwritable_results_do_not_skip_other_environments() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = dir.path().join("snaps");
        let report_dir = dir.path().join("report");
        write_snapshot(&snaps, "demo", &["Cert A", "Cert B"]);
        write_snapshot(&snaps, "ebc", &["Cert C"]);
        std::fs::create_dir_all(report_dir.join("demo-results.json")).unwrap();

        let config = test_config(&report_dir);
        let err = cmd_check(&config, &[], &snaps, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to write results for: DEMO");
        assert!(report_dir.join("ebc-results.json").is_file());

        let report = cmd_aggregate(&config, true).unwrap();
        assert_eq!(
            report.environments.get("EBC").unwrap().status,
            OutcomeStatus::Passed
        );
        assert_eq!(
            report.environments.get("DEMO").unwrap().status,
            OutcomeStatus::Error
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_still_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("report");
        let config = test_config(&report_dir);

        let result = cmd_check(&config, &["demo".to_string()], dir.path(), None, false).await;
        assert!(result.is_err());

        let demo: RunSummary =
            read_json(&report_dir.join("demo-certification-summary.json")).unwrap();
        assert_eq!(demo.status, RunStatus::Failed);
        assert!(demo.error.unwrap().contains("open_catalog"));
    }

    #[test]
    fn test_diff_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        assert!(cmd_diff(&config, "demo", &["cert a".to_string()], false).is_err());
        assert!(cmd_diff(
            &config,
            "demo",
            &["Cert A".to_string(), "Cert B".to_string()],
            true
        )
        .is_ok());
        assert!(cmd_diff(&config, "nope", &[], false).is_err());
    }
}
