//! Post-commit projection dispatch.
//!
//! The request path commits its store transaction, hands the projection
//! task to this queue, and returns — sink latency and sink failures never
//! block the caller. A single worker thread drains the queue in FIFO order,
//! which is what guarantees that sequential transitions of the same item
//! reach each sink in the order they occurred. Completion reports are
//! delivered back over a channel for auditing, never silently swallowed.

#![allow(clippy::module_name_repetitions)]

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{error, warn};

use soundoff_core::model::{FeedbackItem, Status};

use crate::projector::{ProjectionReport, SyncProjector};

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// One committed internal change awaiting projection.
#[derive(Debug)]
pub enum ProjectionTask {
    StatusChanged {
        item: FeedbackItem,
        old: Status,
        new: Status,
    },
    CommentAdded {
        item: FeedbackItem,
        body: String,
    },
    VoteCountChanged {
        item: FeedbackItem,
    },
}

/// The queue worker has shut down; the task was not accepted.
#[derive(Debug, thiserror::Error)]
#[error("projection queue is shut down")]
pub struct QueueClosed;

// ---------------------------------------------------------------------------
// ProjectionQueue
// ---------------------------------------------------------------------------

pub struct ProjectionQueue {
    tasks: Option<mpsc::Sender<ProjectionTask>>,
    reports: mpsc::Receiver<ProjectionReport>,
    worker: Option<JoinHandle<()>>,
}

impl ProjectionQueue {
    /// Spawn the worker thread around a configured projector.
    #[must_use]
    pub fn new(projector: SyncProjector) -> Self {
        let (task_tx, task_rx) = mpsc::channel::<ProjectionTask>();
        let (report_tx, report_rx) = mpsc::channel::<ProjectionReport>();

        let worker = thread::Builder::new()
            .name("soundoff-projection".into())
            .spawn(move || {
                for task in task_rx {
                    let report = match task {
                        ProjectionTask::StatusChanged { item, old, new } => {
                            projector.on_status_changed(&item, old, new)
                        }
                        ProjectionTask::CommentAdded { item, body } => {
                            projector.on_comment_added(&item, &body)
                        }
                        ProjectionTask::VoteCountChanged { item } => {
                            projector.on_vote_count_changed(&item)
                        }
                    };

                    if !report.is_clean() {
                        warn!(
                            item = %report.item_id,
                            failed_sinks = report.failures().count(),
                            "projection completed with sink failures"
                        );
                    }
                    // Receiver may be gone during shutdown; reports were
                    // already logged above.
                    let _ = report_tx.send(report);
                }
            });

        match worker {
            Ok(handle) => Self {
                tasks: Some(task_tx),
                reports: report_rx,
                worker: Some(handle),
            },
            Err(err) => {
                error!(error = %err, "failed to spawn projection worker");
                // No worker: the queue is born closed.
                drop(task_tx);
                Self {
                    tasks: None,
                    reports: report_rx,
                    worker: None,
                }
            }
        }
    }

    /// Enqueue a committed change for projection.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the worker is no longer running.
    pub fn dispatch(&self, task: ProjectionTask) -> Result<(), QueueClosed> {
        match &self.tasks {
            Some(tx) => tx.send(task).map_err(|_| QueueClosed),
            None => Err(QueueClosed),
        }
    }

    /// Collect the completion reports available right now, without blocking.
    #[must_use]
    pub fn drain_reports(&self) -> Vec<ProjectionReport> {
        self.reports.try_iter().collect()
    }

    /// Stop accepting tasks, let the worker drain what is queued, and return
    /// every outstanding completion report.
    #[must_use]
    pub fn shutdown(mut self) -> Vec<ProjectionReport> {
        self.tasks = None;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("projection worker panicked during shutdown");
            }
        }
        self.reports.try_iter().collect()
    }
}

impl Drop for ProjectionQueue {
    fn drop(&mut self) {
        self.tasks = None;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("projection worker panicked");
            }
        }
    }
}
