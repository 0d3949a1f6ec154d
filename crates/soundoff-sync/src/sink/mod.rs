//! The sink adapter contract.
//!
//! A sink is one external tracking/notification service. Each adapter
//! implements the subset of the capability set it supports and reports that
//! subset via [`SinkCapabilities`]; the projector checks the flag before
//! invoking a method and silently skips sinks that lack a capability.
//! Adding a vendor means implementing [`SinkAdapter`], not touching the
//! projector.

#![allow(clippy::module_name_repetitions)]

pub mod http;
pub mod issue_tracker;
pub mod notify;
pub mod task_tracker;

pub use issue_tracker::IssueTrackerSink;
pub use notify::NotificationSink;
pub use task_tracker::TaskTrackerSink;

use soundoff_core::error::ErrorCode;
use soundoff_core::model::{FeedbackItem, RemoteRef, SinkKind};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// One operation in the sink capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Create,
    Close,
    Reopen,
    Comment,
    SetMetric,
}

/// The subset of the capability set one sink supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkCapabilities {
    pub create: bool,
    pub close: bool,
    pub reopen: bool,
    pub comment: bool,
    pub set_metric: bool,
}

impl SinkCapabilities {
    /// Full capability set.
    pub const ALL: Self = Self {
        create: true,
        close: true,
        reopen: true,
        comment: true,
        set_metric: true,
    };

    /// Whether a single capability is present.
    #[must_use]
    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Create => self.create,
            Capability::Close => self.close,
            Capability::Reopen => self.reopen,
            Capability::Comment => self.comment,
            Capability::SetMetric => self.set_metric,
        }
    }
}

// ---------------------------------------------------------------------------
// SinkError
// ---------------------------------------------------------------------------

/// A failed sink call.
///
/// Never fatal for the triggering state change: the projector records it in
/// the projection report and moves on to the next sink. Carries the vendor
/// HTTP status (when there was a response) and enough detail to log and
/// retry.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code} {kind}: {detail}", code = ErrorCode::SinkDeliveryFailed)]
pub struct SinkError {
    pub kind: SinkKind,
    pub status: Option<u16>,
    pub detail: String,
}

impl SinkError {
    /// Transport-level failure (no HTTP response).
    #[must_use]
    pub fn transport(kind: SinkKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            detail: detail.into(),
        }
    }

    /// Vendor rejected the call with an HTTP status.
    #[must_use]
    pub fn status(kind: SinkKind, status: u16, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: Some(status),
            detail: detail.into(),
        }
    }

    fn unsupported(kind: SinkKind, capability: &str) -> Self {
        Self {
            kind,
            status: None,
            detail: format!("sink does not support {capability}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SinkAdapter
// ---------------------------------------------------------------------------

/// Capability contract every sink implements.
///
/// Default method bodies reject the call as unsupported; an adapter only
/// overrides what its `capabilities()` advertise. Callers are expected to
/// check capabilities first — the error default is a backstop, not a
/// dispatch mechanism.
pub trait SinkAdapter: Send + Sync {
    /// Which external system this adapter talks to.
    fn kind(&self) -> SinkKind;

    /// The capability subset this sink supports.
    fn capabilities(&self) -> SinkCapabilities;

    /// Create the remote representation of a feedback item.
    fn create(&self, item: &FeedbackItem) -> Result<RemoteRef, SinkError> {
        let _ = item;
        Err(SinkError::unsupported(self.kind(), "create"))
    }

    /// Close the remote item. Closing an already-closed item is a no-op
    /// success wherever the vendor allows it.
    fn close(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        let _ = remote;
        Err(SinkError::unsupported(self.kind(), "close"))
    }

    /// Reopen the remote item. Symmetric with [`SinkAdapter::close`].
    fn reopen(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        let _ = remote;
        Err(SinkError::unsupported(self.kind(), "reopen"))
    }

    /// Mirror a comment onto the remote item.
    fn add_comment(&self, remote: &RemoteRef, body: &str) -> Result<(), SinkError> {
        let _ = (remote, body);
        Err(SinkError::unsupported(self.kind(), "add_comment"))
    }

    /// Write a numeric custom field (vote-count propagation).
    fn set_metric(&self, remote: &RemoteRef, field_key: &str, value: i64) -> Result<(), SinkError> {
        let _ = (remote, field_key, value);
        Err(SinkError::unsupported(self.kind(), "set_metric"))
    }

    /// Key of the numeric field that mirrors the vote count, when this sink
    /// has one configured.
    fn vote_field_key(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
