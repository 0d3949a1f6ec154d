//! Fan one committed internal change out to every configured sink.
//!
//! Per-sink isolation is the load-bearing property: a [`SinkError`] from one
//! sink is caught, recorded in the [`ProjectionReport`], and never prevents
//! the remaining sinks from being invoked — and never propagates to the
//! caller, whose internal state change is already committed. A sink lacking
//! the relevant capability is silently skipped, not an error.
//!
//! Terminal symmetry: any transition *into* {completed, rejected} triggers
//! `close` on every capable sink; any transition *out of* that set triggers
//! `reopen`. Transitions that stay on one side of the boundary trigger no
//! open/closed call.

#![allow(clippy::module_name_repetitions)]

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use soundoff_core::model::{FeedbackId, FeedbackItem, RemoteRef, SinkKind, Status};

use crate::bulk::{self, CancellationToken};
use crate::config::ProjectSyncConfig;
use crate::sink::{
    Capability, IssueTrackerSink, NotificationSink, SinkAdapter, SinkError, TaskTrackerSink,
};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// The sink call a projection attempted (or skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
    Create,
    Close,
    Reopen,
    Comment,
    VoteMetric,
}

impl SinkAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Close => "close",
            Self::Reopen => "reopen",
            Self::Comment => "comment",
            Self::VoteMetric => "vote_metric",
        }
    }
}

impl fmt::Display for SinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sink was skipped for one projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The sink does not implement the needed capability.
    MissingCapability,
    /// The item has no remote ref for this sink yet (bulk create pending).
    NoRemoteRef,
    /// The sink supports metrics but no vote field is configured.
    NoMetricField,
}

/// Outcome of one sink call within a projection.
#[derive(Debug)]
pub enum SinkDisposition {
    Applied,
    Skipped(SkipReason),
    Failed(SinkError),
}

/// One row of a projection report.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: SinkKind,
    pub action: SinkAction,
    pub disposition: SinkDisposition,
}

/// Structured result of projecting one internal change.
///
/// Failures here are operator-facing audit data; they are never surfaced as
/// errors to the code path that made the internal change.
#[derive(Debug)]
pub struct ProjectionReport {
    pub item_id: FeedbackId,
    pub outcomes: Vec<SinkOutcome>,
}

impl ProjectionReport {
    /// Sinks that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, SinkDisposition::Failed(_)))
    }

    /// Sinks where the call was applied.
    pub fn applied(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, SinkDisposition::Applied))
    }

    /// `true` when no sink failed (skips are fine).
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Result of a bulk remote-creation run against one sink.
///
/// Partial success by construction: `created` and `failed` partition the
/// fresh items; `skipped_existing` lists items that already had a remote ref
/// for this sink (idempotent no-op); `cancelled` lists items never
/// dispatched because the caller aborted the run.
#[derive(Debug, Default)]
pub struct BulkCreateReport {
    pub created: Vec<(FeedbackId, RemoteRef)>,
    pub failed: Vec<FeedbackId>,
    pub skipped_existing: Vec<FeedbackId>,
    pub cancelled: Vec<FeedbackId>,
}

// ---------------------------------------------------------------------------
// SyncProjector
// ---------------------------------------------------------------------------

pub struct SyncProjector {
    sinks: Vec<Arc<dyn SinkAdapter>>,
    bulk_workers: usize,
}

impl SyncProjector {
    /// Build the projector for one project's explicit sync configuration.
    /// Disabled sinks are not constructed at all.
    #[must_use]
    pub fn from_config(cfg: &ProjectSyncConfig) -> Self {
        let timeout = cfg.timeout();
        let mut sinks: Vec<Arc<dyn SinkAdapter>> = Vec::new();

        if cfg.issue_tracker.enabled {
            sinks.push(Arc::new(IssueTrackerSink::new(&cfg.issue_tracker, timeout)));
        }
        if cfg.task_tracker.enabled {
            sinks.push(Arc::new(TaskTrackerSink::new(&cfg.task_tracker, timeout)));
        }
        if cfg.notifications.enabled {
            sinks.push(Arc::new(NotificationSink::new(&cfg.notifications, timeout)));
        }

        Self {
            sinks,
            bulk_workers: cfg.bulk_workers.max(1),
        }
    }

    /// Build a projector over injected adapters (tests, custom vendors).
    #[must_use]
    pub fn with_sinks(sinks: Vec<Arc<dyn SinkAdapter>>, bulk_workers: usize) -> Self {
        Self {
            sinks,
            bulk_workers: bulk_workers.max(1),
        }
    }

    /// The configured sink kinds, in invocation order.
    #[must_use]
    pub fn sink_kinds(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|s| s.kind()).collect()
    }

    // -----------------------------------------------------------------------
    // Event projections
    // -----------------------------------------------------------------------

    /// Project a committed status transition.
    #[must_use]
    pub fn on_status_changed(
        &self,
        item: &FeedbackItem,
        old: Status,
        new: Status,
    ) -> ProjectionReport {
        let action = match (old.is_terminal(), new.is_terminal()) {
            (false, true) => Some(SinkAction::Close),
            (true, false) => Some(SinkAction::Reopen),
            _ => None,
        };

        let Some(action) = action else {
            debug!(item = %item.id, %old, %new, "status change crosses no open/closed edge");
            return ProjectionReport {
                item_id: item.id.clone(),
                outcomes: Vec::new(),
            };
        };

        let capability = match action {
            SinkAction::Close => Capability::Close,
            _ => Capability::Reopen,
        };

        self.for_each_sink(item, action, capability, |sink, remote| match action {
            SinkAction::Close => sink.close(remote),
            _ => sink.reopen(remote),
        })
    }

    /// Project a committed comment.
    #[must_use]
    pub fn on_comment_added(&self, item: &FeedbackItem, body: &str) -> ProjectionReport {
        self.for_each_sink(item, SinkAction::Comment, Capability::Comment, |sink, remote| {
            sink.add_comment(remote, body)
        })
    }

    /// Project a committed vote-count change into every sink with a numeric
    /// vote field.
    #[must_use]
    pub fn on_vote_count_changed(&self, item: &FeedbackItem) -> ProjectionReport {
        let value = i64::try_from(item.vote_count).unwrap_or(i64::MAX);
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let disposition = if !sink.capabilities().supports(Capability::SetMetric) {
                SinkDisposition::Skipped(SkipReason::MissingCapability)
            } else if let Some(field_key) = sink.vote_field_key().map(ToOwned::to_owned) {
                match item.remote_refs.get(&sink.kind()) {
                    None => SinkDisposition::Skipped(SkipReason::NoRemoteRef),
                    Some(remote) => {
                        record_call(sink.kind(), SinkAction::VoteMetric, &item.id, || {
                            sink.set_metric(remote, &field_key, value)
                        })
                    }
                }
            } else {
                SinkDisposition::Skipped(SkipReason::NoMetricField)
            };

            outcomes.push(SinkOutcome {
                sink: sink.kind(),
                action: SinkAction::VoteMetric,
                disposition,
            });
        }

        ProjectionReport {
            item_id: item.id.clone(),
            outcomes,
        }
    }

    /// Create remote items for a batch of feedback ids against one sink.
    ///
    /// Items that already carry a remote ref for the sink are reported in
    /// `skipped_existing` without any call — refs are stable for the item's
    /// life. When the sink is not configured (or cannot create), nothing is
    /// dispatched and the report is empty apart from a warning log.
    #[must_use]
    pub fn bulk_create(
        &self,
        sink_kind: SinkKind,
        items: Vec<FeedbackItem>,
        cancel: &CancellationToken,
    ) -> BulkCreateReport {
        let Some(sink) = self.sinks.iter().find(|s| s.kind() == sink_kind) else {
            warn!(sink = %sink_kind, "bulk create requested for an unconfigured sink");
            return BulkCreateReport::default();
        };
        if !sink.capabilities().supports(Capability::Create) {
            warn!(sink = %sink_kind, "bulk create requested for a sink without create");
            return BulkCreateReport::default();
        }

        let mut report = BulkCreateReport::default();
        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            if item.remote_refs.contains_key(&sink_kind) {
                report.skipped_existing.push(item.id);
            } else {
                fresh.push(item);
            }
        }

        let outcome = bulk::run(fresh, self.bulk_workers, cancel, |item| sink.create(item));

        for (item, remote) in outcome.succeeded {
            report.created.push((item.id, remote));
        }
        for (item, error) in outcome.failed {
            warn!(sink = %sink_kind, item = %item.id, error = %error, "bulk create unit failed");
            report.failed.push(item.id);
        }
        for item in outcome.cancelled {
            report.cancelled.push(item.id);
        }

        debug!(
            sink = %sink_kind,
            created = report.created.len(),
            failed = report.failed.len(),
            skipped_existing = report.skipped_existing.len(),
            cancelled = report.cancelled.len(),
            "bulk create finished"
        );
        report
    }

    /// Run [`SyncProjector::bulk_create`] against every configured sink that
    /// can create, one report per sink kind in invocation order.
    #[must_use]
    pub fn bulk_create_all(
        &self,
        items: &[FeedbackItem],
        cancel: &CancellationToken,
    ) -> Vec<(SinkKind, BulkCreateReport)> {
        let kinds: Vec<SinkKind> = self
            .sinks
            .iter()
            .filter(|sink| sink.capabilities().supports(Capability::Create))
            .map(|sink| sink.kind())
            .collect();

        kinds
            .into_iter()
            .map(|kind| (kind, self.bulk_create(kind, items.to_vec(), cancel)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Shared fan-out
    // -----------------------------------------------------------------------

    /// Invoke one capability on every configured sink, isolating failures.
    fn for_each_sink<F>(
        &self,
        item: &FeedbackItem,
        action: SinkAction,
        capability: Capability,
        call: F,
    ) -> ProjectionReport
    where
        F: Fn(&dyn SinkAdapter, &RemoteRef) -> Result<(), SinkError>,
    {
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let disposition = if !sink.capabilities().supports(capability) {
                SinkDisposition::Skipped(SkipReason::MissingCapability)
            } else {
                match item.remote_refs.get(&sink.kind()) {
                    None => SinkDisposition::Skipped(SkipReason::NoRemoteRef),
                    Some(remote) => record_call(sink.kind(), action, &item.id, || {
                        call(sink.as_ref(), remote)
                    }),
                }
            };

            outcomes.push(SinkOutcome {
                sink: sink.kind(),
                action,
                disposition,
            });
        }

        ProjectionReport {
            item_id: item.id.clone(),
            outcomes,
        }
    }
}

/// Run one sink call, translating the result into a disposition and logging
/// failures with enough structure to audit later.
fn record_call<F>(
    sink: SinkKind,
    action: SinkAction,
    item_id: &FeedbackId,
    call: F,
) -> SinkDisposition
where
    F: FnOnce() -> Result<(), SinkError>,
{
    match call() {
        Ok(()) => SinkDisposition::Applied,
        Err(error) => {
            warn!(%sink, action = %action, item = %item_id, error = %error, "sink call failed");
            SinkDisposition::Failed(error)
        }
    }
}
