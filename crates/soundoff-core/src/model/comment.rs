use serde::{Deserialize, Serialize};

use super::feedback::FeedbackId;

/// A comment attached to a feedback item.
///
/// Comments are owned by exactly one item. When a merge reparents a comment
/// to the primary, its body gains an `[Originally on: <title>]` provenance
/// prefix and its original timestamp is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    pub feedback_id: FeedbackId,
    pub author_id: String,
    pub body: String,
    pub created_at_us: i64,
}
