#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::{fmt, str::FromStr};

// ---------------------------------------------------------------------------
// FeedbackId
// ---------------------------------------------------------------------------

/// Validated feedback item identifier.
///
/// Ids are minted by the CRUD layer and always carry the `fb-` prefix with a
/// non-empty alphanumeric suffix. The store enforces the same shape via a
/// CHECK constraint, so a `FeedbackId` that passed validation can be written
/// without further checks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(String);

/// Error produced when parsing a malformed feedback id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feedback id '{raw}': expected fb-<alphanumeric>")]
pub struct InvalidFeedbackId {
    pub raw: String,
}

impl FeedbackId {
    /// Parse and validate a raw id string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFeedbackId`] when the prefix or suffix is malformed.
    pub fn parse(raw: &str) -> Result<Self, InvalidFeedbackId> {
        let Some(suffix) = raw.strip_prefix("fb-") else {
            return Err(InvalidFeedbackId { raw: raw.into() });
        };
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidFeedbackId { raw: raw.into() });
        }
        Ok(Self(raw.into()))
    }

    /// Construct from a string already known to be valid (e.g. read back
    /// from the store, where the CHECK constraint guarantees the shape).
    #[must_use]
    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedbackId {
    type Err = InvalidFeedbackId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for FeedbackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Feedback lifecycle status.
///
/// `Completed` and `Rejected` are *terminal*: they close the item in sinks
/// that model open/closed state. Every other status is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Pending,
    Approved,
    InProgress,
    Testflight,
    Completed,
    Rejected,
}

/// Error produced when parsing an unknown status token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feedback status '{raw}'")]
pub struct InvalidStatus {
    pub raw: String,
}

impl Status {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Approved,
        Self::InProgress,
        Self::Testflight,
        Self::Completed,
        Self::Rejected,
    ];

    /// Canonical token used in the store and in serialized payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::InProgress => "inProgress",
            Self::Testflight => "testflight",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status closes the item in open/closed sinks.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "inProgress" => Ok(Self::InProgress),
            "testflight" => Ok(Self::Testflight),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(InvalidStatus { raw: s.into() }),
        }
    }
}

// ---------------------------------------------------------------------------
// SinkKind and RemoteRef
// ---------------------------------------------------------------------------

/// The external systems a feedback item can be projected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    IssueTracker,
    TaskTracker,
    Notification,
}

/// Error produced when parsing an unknown sink token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sink kind '{raw}'")]
pub struct InvalidSinkKind {
    pub raw: String,
}

impl SinkKind {
    /// All sink kinds in stable order.
    pub const ALL: [Self; 3] = [Self::IssueTracker, Self::TaskTracker, Self::Notification];

    /// Canonical token used in the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IssueTracker => "issue_tracker",
            Self::TaskTracker => "task_tracker",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = InvalidSinkKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue_tracker" => Ok(Self::IssueTracker),
            "task_tracker" => Ok(Self::TaskTracker),
            "notification" => Ok(Self::Notification),
            _ => Err(InvalidSinkKind { raw: s.into() }),
        }
    }
}

/// Identity of a feedback item inside one external sink.
///
/// Stable for the life of the item once created: a repeated bulk create for
/// the same sink must reuse the existing ref, never mint a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub external_id: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// FeedbackItem
// ---------------------------------------------------------------------------

/// A fully-hydrated feedback item as read from the store.
///
/// `vote_count` is a derived cache of the distinct voter set and is never
/// mutated independently. `merged_feedback_ids` is materialized from
/// `merged_into_id` back-references and is only ever non-empty on a primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: FeedbackId,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub category: Option<String>,
    pub vote_count: u64,
    pub merged_into_id: Option<FeedbackId>,
    pub merged_at_us: Option<i64>,
    pub merged_feedback_ids: BTreeSet<FeedbackId>,
    pub remote_refs: BTreeMap<SinkKind, RemoteRef>,
    pub version: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl FeedbackItem {
    /// Whether this item has been merged into a primary and accepts no
    /// further votes, comments, or merges.
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged_into_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // FeedbackId
    // -----------------------------------------------------------------------

    #[test]
    fn id_parse_accepts_prefixed_alphanumeric() {
        let id = FeedbackId::parse("fb-a1b2c3").expect("valid id");
        assert_eq!(id.as_str(), "fb-a1b2c3");
    }

    #[test]
    fn id_parse_rejects_missing_prefix() {
        assert!(FeedbackId::parse("a1b2c3").is_err());
        assert!(FeedbackId::parse("bn-a1b2c3").is_err());
    }

    #[test]
    fn id_parse_rejects_empty_or_symbol_suffix() {
        assert!(FeedbackId::parse("fb-").is_err());
        assert!(FeedbackId::parse("fb-abc/def").is_err());
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    fn status_tokens_round_trip() {
        for status in Status::ALL {
            let parsed: Status = status.as_str().parse().expect("round trip");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_unknown_token_is_rejected() {
        assert!("shipped".parse::<Status>().is_err());
    }

    #[test]
    fn only_completed_and_rejected_are_terminal() {
        for status in Status::ALL {
            let expected = matches!(status, Status::Completed | Status::Rejected);
            assert_eq!(status.is_terminal(), expected, "status {status}");
        }
    }

    #[test]
    fn status_serde_uses_camel_case() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"inProgress\"");
    }

    // -----------------------------------------------------------------------
    // SinkKind
    // -----------------------------------------------------------------------

    #[test]
    fn sink_tokens_round_trip() {
        for kind in SinkKind::ALL {
            let parsed: SinkKind = kind.as_str().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
    }
}
