//! Bounded fan-out/fan-in executor for independent units of work.
//!
//! Bulk sink operations must respect third-party rate limits (bounded
//! parallelism, not unbounded dispatch) and must report partial success:
//! one unit's failure never aborts the batch, and failures keep the
//! originating input so callers can retry individually.
//!
//! Workers claim unit indices from a shared counter and feed one aggregation
//! channel; the collector owns the only mutable result state, so no update
//! can be lost to a data race. Cancellation stops the claiming of new units
//! while in-flight units run to completion and still record their outcome.

#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::debug;

// ---------------------------------------------------------------------------
// CancellationToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation signal shared between a bulk run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new units. In-flight units finish and are recorded.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// BulkOutcome
// ---------------------------------------------------------------------------

/// Partitioned result of a bulk run, in input order within each partition.
#[derive(Debug)]
pub struct BulkOutcome<I, T, E> {
    pub succeeded: Vec<(I, T)>,
    pub failed: Vec<(I, E)>,
    /// Units never dispatched because the run was cancelled first.
    pub cancelled: Vec<I>,
}

impl<I, T, E> BulkOutcome<I, T, E> {
    /// Total number of units the run accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.cancelled.len()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Execute `work` over every unit with at most `max_workers` running at
/// once. `work` reports its failures as `Err`; it must not panic.
#[must_use]
pub fn run<I, T, E, F>(
    units: Vec<I>,
    max_workers: usize,
    cancel: &CancellationToken,
    work: F,
) -> BulkOutcome<I, T, E>
where
    I: Send + Sync,
    T: Send,
    E: Send,
    F: Fn(&I) -> Result<T, E> + Sync,
{
    let total = units.len();
    let mut slots: Vec<Option<Result<T, E>>> = Vec::new();
    slots.resize_with(total, || None);

    if total > 0 {
        let workers = max_workers.clamp(1, total);
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, Result<T, E>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let units = &units;
                let work = &work;
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        if idx >= total {
                            break;
                        }
                        let result = work(&units[idx]);
                        if tx.send((idx, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Single aggregation point: the channel closes once every
            // worker is done, which ends the collection loop.
            while let Ok((idx, result)) = rx.recv() {
                slots[idx] = Some(result);
            }
        });
    }

    let mut outcome = BulkOutcome {
        succeeded: Vec::new(),
        failed: Vec::new(),
        cancelled: Vec::new(),
    };
    for (unit, slot) in units.into_iter().zip(slots) {
        match slot {
            Some(Ok(value)) => outcome.succeeded.push((unit, value)),
            Some(Err(error)) => outcome.failed.push((unit, error)),
            None => outcome.cancelled.push(unit),
        }
    }

    debug!(
        total,
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        cancelled = outcome.cancelled.len(),
        "bulk run finished"
    );
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
