//! Integration tests: multi-sink projection with fake recording sinks.
//!
//! Covers the isolation and partial-success guarantees:
//!   - One sink's failure never blocks the others or the caller
//!   - Capability-less sinks are skipped silently
//!   - Terminal symmetry (close on entering, reopen on leaving)
//!   - Bulk create partitions created/failed and stays idempotent
//!   - Queue dispatch preserves per-item ordering across transitions

use soundoff_core::model::{FeedbackId, FeedbackItem, RemoteRef, SinkKind, Status};
use soundoff_sync::bulk::CancellationToken;
use soundoff_sync::projector::{SinkDisposition, SkipReason, SyncProjector};
use soundoff_sync::queue::{ProjectionQueue, ProjectionTask};
use soundoff_sync::sink::{SinkAdapter, SinkCapabilities, SinkError};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Fake sink
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSink {
    kind_override: Option<SinkKind>,
    caps: SinkCapabilities,
    fail_create_for: HashSet<String>,
    fail_everything: bool,
    calls: Arc<Mutex<Vec<String>>>,
    vote_field: Option<String>,
}

impl FakeSink {
    fn new(kind: SinkKind, caps: SinkCapabilities) -> Self {
        Self {
            kind_override: Some(kind),
            caps,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn fail(&self, what: &str) -> SinkError {
        SinkError::status(self.kind(), 502, format!("{what} rejected"))
    }
}

impl SinkAdapter for FakeSink {
    fn kind(&self) -> SinkKind {
        self.kind_override.unwrap_or(SinkKind::IssueTracker)
    }

    fn capabilities(&self) -> SinkCapabilities {
        self.caps
    }

    fn create(&self, item: &FeedbackItem) -> Result<RemoteRef, SinkError> {
        self.record(format!("create:{}", item.id));
        if self.fail_everything || self.fail_create_for.contains(item.id.as_str()) {
            return Err(self.fail("create"));
        }
        Ok(RemoteRef {
            external_id: format!("r-{}", item.id),
            url: format!("https://{}.example/{}", self.kind(), item.id),
        })
    }

    fn close(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.record(format!("close:{}", remote.external_id));
        if self.fail_everything {
            return Err(self.fail("close"));
        }
        Ok(())
    }

    fn reopen(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.record(format!("reopen:{}", remote.external_id));
        if self.fail_everything {
            return Err(self.fail("reopen"));
        }
        Ok(())
    }

    fn add_comment(&self, remote: &RemoteRef, body: &str) -> Result<(), SinkError> {
        self.record(format!("comment:{}:{body}", remote.external_id));
        if self.fail_everything {
            return Err(self.fail("comment"));
        }
        Ok(())
    }

    fn set_metric(&self, remote: &RemoteRef, field_key: &str, value: i64) -> Result<(), SinkError> {
        self.record(format!("metric:{}:{field_key}={value}", remote.external_id));
        if self.fail_everything {
            return Err(self.fail("metric"));
        }
        Ok(())
    }

    fn vote_field_key(&self) -> Option<&str> {
        self.vote_field.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn item(id: &str, refs: &[(SinkKind, &str)]) -> FeedbackItem {
    let id = FeedbackId::parse(id).expect("valid id");
    let remote_refs: BTreeMap<SinkKind, RemoteRef> = refs
        .iter()
        .map(|(kind, ext)| {
            (
                *kind,
                RemoteRef {
                    external_id: (*ext).to_string(),
                    url: format!("https://{kind}.example/{ext}"),
                },
            )
        })
        .collect();

    FeedbackItem {
        id,
        project_id: "proj1".into(),
        title: "Dark mode".into(),
        description: None,
        status: Status::Pending,
        category: None,
        vote_count: 7,
        merged_into_id: None,
        merged_at_us: None,
        merged_feedback_ids: BTreeSet::new(),
        remote_refs,
        version: 1,
        created_at_us: 0,
        updated_at_us: 0,
    }
}

fn open_closed_caps() -> SinkCapabilities {
    SinkCapabilities {
        create: true,
        close: true,
        reopen: true,
        comment: true,
        set_metric: false,
    }
}

// ---------------------------------------------------------------------------
// Terminal symmetry
// ---------------------------------------------------------------------------

#[test]
fn entering_terminal_closes_once_per_capable_sink() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let tasks = Arc::new(FakeSink::new(SinkKind::TaskTracker, SinkCapabilities::ALL));
    let projector = SyncProjector::with_sinks(vec![issues.clone(), tasks.clone()], 2);

    let item = item("fb-1", &[(SinkKind::IssueTracker, "i1"), (SinkKind::TaskTracker, "t1")]);

    let report = projector.on_status_changed(&item, Status::InProgress, Status::Completed);
    assert!(report.is_clean());
    assert_eq!(issues.calls(), vec!["close:i1"]);
    assert_eq!(tasks.calls(), vec!["close:t1"]);

    let report = projector.on_status_changed(&item, Status::Completed, Status::Pending);
    assert!(report.is_clean());
    assert_eq!(issues.calls(), vec!["close:i1", "reopen:i1"]);
    assert_eq!(tasks.calls(), vec!["close:t1", "reopen:t1"]);
}

#[test]
fn rejected_to_approved_also_reopens() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 1);
    let item = item("fb-1", &[(SinkKind::IssueTracker, "i1")]);

    // Symmetry holds for every terminal -> non-terminal edge, not just
    // completed -> pending.
    let report = projector.on_status_changed(&item, Status::Rejected, Status::Approved);
    assert!(report.is_clean());
    assert_eq!(issues.calls(), vec!["reopen:i1"]);
}

#[test]
fn non_edge_transitions_call_no_sink() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 1);
    let item = item("fb-1", &[(SinkKind::IssueTracker, "i1")]);

    let report = projector.on_status_changed(&item, Status::Pending, Status::InProgress);
    assert!(report.outcomes.is_empty());
    assert!(issues.calls().is_empty());

    // Terminal -> terminal stays closed; nothing to do.
    let report = projector.on_status_changed(&item, Status::Completed, Status::Rejected);
    assert!(report.outcomes.is_empty());
    assert!(issues.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

#[test]
fn one_failing_sink_never_blocks_the_others() {
    let broken = Arc::new(FakeSink {
        kind_override: Some(SinkKind::IssueTracker),
        caps: open_closed_caps(),
        fail_everything: true,
        ..FakeSink::default()
    });
    let healthy = Arc::new(FakeSink::new(SinkKind::TaskTracker, SinkCapabilities::ALL));
    let projector = SyncProjector::with_sinks(vec![broken.clone(), healthy.clone()], 2);

    let item = item("fb-1", &[(SinkKind::IssueTracker, "i1"), (SinkKind::TaskTracker, "t1")]);
    let report = projector.on_status_changed(&item, Status::Pending, Status::Completed);

    // The broken sink is recorded as failed; the healthy one was still
    // invoked; nothing escaped to the caller.
    assert!(!report.is_clean());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.applied().count(), 1);
    assert_eq!(healthy.calls(), vec!["close:t1"]);
}

#[test]
fn sinks_without_the_capability_are_skipped_silently() {
    let webhook = Arc::new(FakeSink::new(
        SinkKind::Notification,
        SinkCapabilities {
            create: true,
            comment: true,
            ..SinkCapabilities::default()
        },
    ));
    let projector = SyncProjector::with_sinks(vec![webhook.clone()], 1);
    let item = item("fb-1", &[(SinkKind::Notification, "n1")]);

    let report = projector.on_status_changed(&item, Status::Pending, Status::Completed);
    assert!(report.is_clean(), "skip is not a failure");
    assert!(
        matches!(
            report.outcomes[0].disposition,
            SinkDisposition::Skipped(SkipReason::MissingCapability)
        ),
        "got {:?}",
        report.outcomes[0].disposition
    );
    assert!(webhook.calls().is_empty());
}

#[test]
fn items_without_a_remote_ref_are_skipped() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 1);
    let item = item("fb-1", &[]);

    let report = projector.on_comment_added(&item, "hello");
    assert!(matches!(
        report.outcomes[0].disposition,
        SinkDisposition::Skipped(SkipReason::NoRemoteRef)
    ));
    assert!(issues.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Vote metric propagation
// ---------------------------------------------------------------------------

#[test]
fn vote_count_reaches_sinks_with_a_metric_field() {
    let tasks = Arc::new(FakeSink {
        kind_override: Some(SinkKind::TaskTracker),
        caps: SinkCapabilities::ALL,
        vote_field: Some("votes".into()),
        ..FakeSink::default()
    });
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![tasks.clone(), issues.clone()], 2);

    let item = item("fb-1", &[(SinkKind::TaskTracker, "t1"), (SinkKind::IssueTracker, "i1")]);
    let report = projector.on_vote_count_changed(&item);

    assert!(report.is_clean());
    assert_eq!(tasks.calls(), vec!["metric:t1:votes=7"]);
    assert!(issues.calls().is_empty(), "no metric capability, no call");
}

// ---------------------------------------------------------------------------
// Bulk create
// ---------------------------------------------------------------------------

#[test]
fn bulk_create_reports_partial_success() {
    let issues = Arc::new(FakeSink {
        kind_override: Some(SinkKind::IssueTracker),
        caps: open_closed_caps(),
        fail_create_for: std::iter::once("fb-2".to_string()).collect(),
        ..FakeSink::default()
    });
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 2);

    let items = vec![item("fb-1", &[]), item("fb-2", &[]), item("fb-3", &[])];
    let report = projector.bulk_create(SinkKind::IssueTracker, items, &CancellationToken::new());

    assert_eq!(report.created.len(), 2, "two units created");
    assert_eq!(report.failed.len(), 1, "one unit failed");
    assert_eq!(report.failed[0].as_str(), "fb-2");
    let created_ids: Vec<&str> = report.created.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(created_ids, vec!["fb-1", "fb-3"]);
}

#[test]
fn bulk_create_skips_items_with_existing_refs() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 2);

    let items = vec![
        item("fb-1", &[(SinkKind::IssueTracker, "i1")]),
        item("fb-2", &[]),
    ];
    let report = projector.bulk_create(SinkKind::IssueTracker, items, &CancellationToken::new());

    assert_eq!(report.skipped_existing.len(), 1);
    assert_eq!(report.skipped_existing[0].as_str(), "fb-1");
    assert_eq!(report.created.len(), 1);
    assert_eq!(issues.calls(), vec!["create:fb-2"], "no call for the linked item");
}

#[test]
fn bulk_create_all_fans_out_to_every_create_capable_sink() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let tasks = Arc::new(FakeSink::new(SinkKind::TaskTracker, SinkCapabilities::ALL));
    // Single worker keeps each sink's call log in input order.
    let projector = SyncProjector::with_sinks(vec![issues.clone(), tasks.clone()], 1);

    let items = vec![item("fb-1", &[]), item("fb-2", &[])];
    let reports = projector.bulk_create_all(&items, &CancellationToken::new());

    assert_eq!(reports.len(), 2, "one report per create-capable sink");
    for (kind, report) in &reports {
        assert_eq!(report.created.len(), 2, "both items created in {kind}");
        assert!(report.failed.is_empty());
    }
    assert_eq!(issues.calls(), vec!["create:fb-1", "create:fb-2"]);
    assert_eq!(tasks.calls(), vec!["create:fb-1", "create:fb-2"]);
}

#[test]
fn bulk_create_for_unconfigured_sink_is_a_no_op() {
    let projector = SyncProjector::with_sinks(vec![], 2);
    let report = projector.bulk_create(
        SinkKind::IssueTracker,
        vec![item("fb-1", &[])],
        &CancellationToken::new(),
    );
    assert!(report.created.is_empty());
    assert!(report.failed.is_empty());
}

// ---------------------------------------------------------------------------
// Queue ordering
// ---------------------------------------------------------------------------

#[test]
fn queue_preserves_per_item_transition_order() {
    let issues = Arc::new(FakeSink::new(SinkKind::IssueTracker, open_closed_caps()));
    let projector = SyncProjector::with_sinks(vec![issues.clone()], 1);
    let queue = ProjectionQueue::new(projector);

    let fb = item("fb-1", &[(SinkKind::IssueTracker, "i1")]);
    queue
        .dispatch(ProjectionTask::StatusChanged {
            item: fb.clone(),
            old: Status::Pending,
            new: Status::Completed,
        })
        .expect("dispatch close");
    queue
        .dispatch(ProjectionTask::StatusChanged {
            item: fb.clone(),
            old: Status::Completed,
            new: Status::Pending,
        })
        .expect("dispatch reopen");
    queue
        .dispatch(ProjectionTask::CommentAdded {
            item: fb,
            body: "back in progress".into(),
        })
        .expect("dispatch comment");

    let reports = queue.shutdown();
    assert_eq!(reports.len(), 3, "every task produced a report");
    assert_eq!(
        issues.calls(),
        vec!["close:i1", "reopen:i1", "comment:i1:back in progress"],
        "sequential transitions reach the sink in commit order"
    );
}

#[test]
fn shutdown_of_an_idle_queue_returns_no_reports() {
    let projector = SyncProjector::with_sinks(vec![], 1);
    let queue = ProjectionQueue::new(projector);
    let reports = queue.shutdown();
    assert!(reports.is_empty());
}
