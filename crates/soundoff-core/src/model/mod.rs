//! Canonical feedback data model.
//!
//! Votes have no row struct: the store owns the `(feedback_id, voter_id)`
//! set and callers only ever see voter-id sets and the derived count.

pub mod comment;
pub mod feedback;

pub use comment::Comment;
pub use feedback::{FeedbackId, FeedbackItem, RemoteRef, SinkKind, Status};
