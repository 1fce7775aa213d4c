//! Per-paper enrichment with a bounded concurrent pool or a sequential fallback.
//!
//! Every paper needs its own request to learn whether code is attached to it.
//! Requests go through [`enrich`], which returns one flag per input index in
//! input order whichever [`Strategy`] ran them.

use crate::error::{PwcError, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// Below this many logical CPUs lookups run sequentially
pub const MIN_PARALLELISM_FOR_POOL: usize = 4;

/// Progress is logged every this many completed lookups
const PROGRESS_EVERY: usize = 100;

/// How lookups are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One request at a time, in index order
    Sequential,
    /// Bounded pool, results returned in submission order
    Concurrent { workers: usize },
}

impl Strategy {
    /// Pick a strategy from the number of logical execution units.
    ///
    /// Fewer than four units runs sequentially; otherwise the pool gets
    /// `parallelism - 2` workers, at least one.
    pub fn from_parallelism(parallelism: usize) -> Self {
        if parallelism < MIN_PARALLELISM_FOR_POOL {
            Strategy::Sequential
        } else {
            Strategy::Concurrent {
                workers: parallelism.saturating_sub(2).max(1),
            }
        }
    }

    /// Probe the host once; falls back to sequential if the probe fails.
    pub fn detect() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::from_parallelism(parallelism)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Concurrent { workers } => write!(f, "concurrent ({} workers)", workers),
        }
    }
}

/// What a failed lookup means for the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LookupFailurePolicy {
    /// Abort the run with the first failure (in input order)
    #[default]
    Abort,
    /// Log the failure and count the paper as having no code
    TreatAsAbsent,
}

/// Run `lookup` for every index and report whether each count is positive.
///
/// The returned vector is aligned with `indices`. All lookups are driven to
/// completion before failures are resolved, so one failure never cancels the
/// others.
///
/// # Errors
///
/// With [`LookupFailurePolicy::Abort`], returns [`PwcError::LookupFailed`] for
/// the first failing index.
pub async fn enrich<F, Fut>(
    indices: &[usize],
    strategy: Strategy,
    policy: LookupFailurePolicy,
    lookup: F,
) -> Result<Vec<bool>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let total = indices.len();
    debug!(total = total, strategy = %strategy, "Starting enrichment");

    let outcomes: Vec<Result<u64>> = match strategy {
        Strategy::Sequential => {
            let mut outcomes = Vec::with_capacity(total);
            for (done, &index) in indices.iter().enumerate() {
                outcomes.push(lookup(index).await);
                log_progress(done + 1, total);
            }
            outcomes
        }
        Strategy::Concurrent { workers } => {
            stream::iter(indices.iter().map(|&index| lookup(index)))
                .buffered(workers.max(1))
                .enumerate()
                .map(|(done, outcome)| {
                    log_progress(done + 1, total);
                    outcome
                })
                .collect()
                .await
        }
    };

    resolve(indices, outcomes, policy)
}

fn log_progress(done: usize, total: usize) {
    if done % PROGRESS_EVERY == 0 && done < total {
        info!("  Looked up {}/{} papers...", done, total);
    }
}

fn resolve(indices: &[usize], outcomes: Vec<Result<u64>>, policy: LookupFailurePolicy) -> Result<Vec<bool>> {
    let mut flags = Vec::with_capacity(outcomes.len());
    let mut first_failure = None;
    let mut failures = 0usize;

    for (&index, outcome) in indices.iter().zip(outcomes) {
        match outcome {
            Ok(count) => flags.push(count > 0),
            Err(e) => {
                failures += 1;
                warn!(index = index, error = %e, "Repository lookup failed");
                if first_failure.is_none() {
                    first_failure = Some((index, e));
                }
                flags.push(false);
            }
        }
    }

    match (policy, first_failure) {
        (LookupFailurePolicy::Abort, Some((index, source))) => Err(PwcError::LookupFailed {
            index,
            source: Box::new(source),
        }),
        (LookupFailurePolicy::TreatAsAbsent, Some(_)) => {
            warn!(failures = failures, "Treating failed lookups as papers without code");
            Ok(flags)
        }
        (_, None) => Ok(flags),
    }
}
