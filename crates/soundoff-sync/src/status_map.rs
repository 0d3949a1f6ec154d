//! Status vocabulary mapping between soundoff and each sink.
//!
//! Pure fixed tables, no state. Terminality (`Status::is_terminal`) decides
//! close-vs-reopen at the projector level; this module only translates the
//! words each vendor understands.

use soundoff_core::model::{SinkKind, Status};

/// Translate an internal status into the given sink's vocabulary token.
#[must_use]
pub const fn map(status: Status, sink: SinkKind) -> &'static str {
    match sink {
        SinkKind::IssueTracker => match status {
            Status::Pending => "open",
            Status::Approved => "triaged",
            Status::InProgress => "in_progress",
            Status::Testflight => "in_review",
            Status::Completed => "closed",
            Status::Rejected => "not_planned",
        },
        SinkKind::TaskTracker => match status {
            Status::Pending => "backlog",
            Status::Approved => "todo",
            Status::InProgress => "doing",
            Status::Testflight => "testing",
            Status::Completed => "complete",
            Status::Rejected => "canceled",
        },
        SinkKind::Notification => match status {
            Status::Pending => "Pending review",
            Status::Approved => "Approved",
            Status::InProgress => "In progress",
            Status::Testflight => "In TestFlight",
            Status::Completed => "Completed",
            Status::Rejected => "Rejected",
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
