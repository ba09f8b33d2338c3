//! certwatch core library
//!
//! Verifies that every deployed environment renders its expected
//! certification catalog, records one summary artifact per run, and folds
//! the per-environment artifacts into a combined health report.

pub mod aggregator;
pub mod artifact;
pub mod check;
pub mod config;
pub mod differ;
pub mod error;
pub mod fakes;
pub mod mail;
pub mod metrics;
pub mod obs;
pub mod observed;
pub mod page;
pub mod poller;
pub mod registry;
pub mod report;
pub mod summary;
pub mod telemetry;

pub use aggregator::{
    aggregate, aggregate_at, AggregateReport, AggregateSummary, EnvironmentOutcome,
    EnvironmentOutcomes, EnvironmentTarget, OutcomeStatus,
};
pub use artifact::{read_json, write_json_pretty, TestResultsArtifact, TestStats};
pub use check::{
    run_checks, run_environment_check, write_results_artifact, CheckOptions, CheckRun,
};
pub use config::{HarnessConfig, PollSettings};
pub use differ::{
    diff_entries, normalize, DiffResult, EntryCheck, FuzzyMatcher, MatchRule, Matched, Missing,
};
pub use error::{ArtifactError, CheckError, CheckResult, ConfigError, MailError};
pub use mail::{send_health_report, HttpRelayTransport, MailConfig, MailMessage, MailTransport};
pub use metrics::METRICS;
pub use observed::ObservedEntrySet;
pub use page::{CatalogPage, CatalogSnapshot, SnapshotPage};
pub use poller::{poll_until_loaded, EntrySource, LoadedSample, PollConfig};
pub use registry::{builtin_environments, find_environment, EnvironmentSpec, ExpectedEntry};
pub use report::{
    emit_reports, escape_html, render_health_email, render_html_report, HealthEmail, ReportPaths,
};
pub use summary::{RunStatus, RunSummary, SummaryScope};

/// Crate version, reported by `certwatch --version` and in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
