//! Dynamic-load polling.
//!
//! [`poll_until_loaded`] samples a catalog container until at least one
//! non-noise title has rendered, or fails with [`CheckError::LoadTimeout`]
//! once the deadline elapses. Rendering having *started* is all it proves;
//! partial renders are caught later by the differ.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::error::{CheckError, CheckResult};
use crate::metrics::METRICS;
use crate::obs::{duration_ms, emit_catalog_loaded};
use crate::observed::ObservedEntrySet;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can report the titles currently rendered in a container.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Identity of the container, used in timeout errors and logs.
    fn container(&self) -> &str;

    /// Text of every title-bearing child element, in document order.
    async fn read_titles(&self) -> CheckResult<Vec<String>>;
}

/// Wall-clock budget and sampling cadence for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub deadline: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollConfig {
    /// A zero interval is bumped to one millisecond so the loop always yields.
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            deadline,
            interval: interval.max(Duration::from_millis(1)),
        }
    }
}

/// The first sample in which the catalog had rendered entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSample {
    pub observed: ObservedEntrySet,
    /// Samples taken, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Sample `source` until it renders at least one entry or `config.deadline` passes.
///
/// A read that errors or outlives the remaining budget counts as an empty
/// sample; only the deadline ends the loop.
pub async fn poll_until_loaded<S>(source: &S, config: PollConfig) -> CheckResult<LoadedSample>
where
    S: EntrySource + ?Sized,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        METRICS.inc_samples();

        let remaining = config.deadline.saturating_sub(started.elapsed());
        let observed = match timeout(remaining, source.read_titles()).await {
            Ok(Ok(raw)) => ObservedEntrySet::from_raw(raw),
            Ok(Err(err)) => {
                debug!(container = %source.container(), attempt = attempts, error = %err, "sample read failed");
                ObservedEntrySet::default()
            }
            Err(_) => {
                debug!(container = %source.container(), attempt = attempts, "sample read exceeded remaining budget");
                ObservedEntrySet::default()
            }
        };

        let elapsed = started.elapsed();
        if !observed.is_empty() {
            emit_catalog_loaded(
                source.container(),
                observed.len(),
                attempts,
                duration_ms(elapsed),
            );
            return Ok(LoadedSample {
                observed,
                attempts,
                elapsed,
            });
        }

        if elapsed >= config.deadline {
            return Err(CheckError::LoadTimeout {
                container: source.container().to_string(),
                elapsed,
                attempts,
            });
        }

        debug!(container = %source.container(), attempt = attempts, "catalog still empty");
        sleep(config.interval.min(config.deadline - elapsed)).await;
    }
}
