//! Comment migrator: plans the reparenting of secondary comments onto the
//! merge primary.
//!
//! Pure planner — it reads nothing and writes nothing. The coordinator reads
//! each secondary's comments in chronological order inside the merge
//! transaction, asks for a plan, and applies it row by row. The plan's
//! order is the order comments will appear after the primary's own:
//! per-secondary chronological order preserved, secondaries concatenated in
//! the order they were supplied to the merge call.

#![allow(clippy::module_name_repetitions)]

use crate::model::{Comment, FeedbackId};

/// One comment to move onto the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedComment {
    /// Row id of the original comment, to be deleted after the copy.
    pub source_comment_id: i64,
    pub author_id: String,
    /// Body with the provenance prefix applied.
    pub body: String,
    /// Original timestamp, preserved across the move.
    pub created_at_us: i64,
}

/// A secondary item's title and chronologically ordered comments.
#[derive(Debug, Clone)]
pub struct SecondaryComments {
    pub feedback_id: FeedbackId,
    pub title: String,
    pub comments: Vec<Comment>,
}

/// Provenance prefix recorded on every migrated comment body.
#[must_use]
pub fn provenance_prefix(original_title: &str) -> String {
    format!("[Originally on: {original_title}] ")
}

/// Build the ordered reparent plan for a merge.
#[must_use]
pub fn plan(secondaries: &[SecondaryComments]) -> Vec<PlannedComment> {
    let mut planned = Vec::new();
    for secondary in secondaries {
        let prefix = provenance_prefix(&secondary.title);
        for comment in &secondary.comments {
            planned.push(PlannedComment {
                source_comment_id: comment.comment_id,
                author_id: comment.author_id.clone(),
                body: format!("{prefix}{}", comment.body),
                created_at_us: comment.created_at_us,
            });
        }
    }
    planned
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
