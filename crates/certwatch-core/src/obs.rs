//! Structured observability hooks for the check and report lifecycle.
//!
//! This module provides:
//! - Environment-scoped tracing spans (`check_span`, plus the `CheckSpan`
//!   RAII guard for synchronous sections)
//! - Emission functions for key lifecycle events: check start/finish, catalog
//!   load, diff, summary persistence and aggregation
//!
//! Events are emitted at `info!` level unless noted (filter with
//! `CERTWATCH_LOG` or `RUST_LOG`).

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn, Span};

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
pub fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Environment-scoped span for one check run.
///
/// Attach it with [`tracing::Instrument`] rather than entering it, since a
/// check run suspends while polling:
///
/// ```ignore
/// run(env).instrument(check_span("DEMO")).await;
/// // every event inside carries environment = "DEMO"
/// ```
pub fn check_span(environment: &str) -> Span {
    tracing::info_span!("certwatch.check", environment = %environment)
}

/// RAII guard that enters an environment-scoped span for synchronous work.
pub struct CheckSpan {
    _span: tracing::span::EnteredSpan,
}

impl CheckSpan {
    pub fn enter(environment: &str) -> Self {
        Self {
            _span: check_span(environment).entered(),
        }
    }
}

pub fn emit_check_started(environment: &str, url: &str) {
    info!(event = "check.started", environment = %environment, url = %url);
}

pub fn emit_check_finished(environment: &str, duration_ms: u64, passed: bool) {
    info!(
        event = "check.finished",
        environment = %environment,
        duration_ms = duration_ms,
        passed = passed,
    );
}

/// Emit event: the poller saw the first non-empty sample.
pub fn emit_catalog_loaded(container: &str, entries: usize, attempts: u32, elapsed_ms: u64) {
    info!(
        event = "catalog.loaded",
        container = %container,
        entries = entries,
        attempts = attempts,
        elapsed_ms = elapsed_ms,
    );
}

pub fn emit_diff_computed(environment: &str, matched: usize, missing: usize, extra: usize) {
    info!(
        event = "diff.computed",
        environment = %environment,
        matched = matched,
        missing = missing,
        extra = extra,
    );
}

pub fn emit_summary_written(environment: &str, path: &Path, status: &str) {
    info!(
        event = "summary.written",
        environment = %environment,
        path = %path.display(),
        status = %status,
    );
}

/// Emit event: the guaranteed summary write itself failed (warning level).
pub fn emit_summary_write_error(environment: &str, error: &dyn std::fmt::Display) {
    warn!(event = "summary.write_error", environment = %environment, error = %error);
}

/// Emit event: an artifact the aggregator looked for was never written.
pub fn emit_artifact_absent(environment: &str, kind: &str, path: &Path) {
    debug!(
        event = "artifact.absent",
        environment = %environment,
        kind = %kind,
        path = %path.display(),
    );
}

/// Emit event: an artifact exists but could not be read or parsed.
pub fn emit_artifact_unavailable(environment: &str, kind: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "artifact.unavailable",
        environment = %environment,
        kind = %kind,
        error = %error,
    );
}

pub fn emit_aggregate_built(
    environments: usize,
    total_tests: u64,
    total_failed: u64,
    total_errored: u64,
    healthy: bool,
) {
    info!(
        event = "aggregate.built",
        environments = environments,
        total_tests = total_tests,
        total_failed = total_failed,
        total_errored = total_errored,
        healthy = healthy,
    );
}
