//! Merge coordinator: collapse N duplicate feedback items into one primary.
//!
//! The whole merge runs inside a single `BEGIN IMMEDIATE` transaction, so
//! SQLite's writer lock linearizes racing merges: every precondition is
//! re-read *inside* the transaction, which means the loser of a race
//! observes the winner's committed state and fails with `AlreadyMerged`
//! instead of corrupting the ownership graph. A writer that cannot acquire
//! the lock within the busy timeout surfaces as `Conflict`.
//!
//! # Postconditions
//!
//! On success, atomically:
//! - every secondary vote is owned by the primary, duplicate voters dropped
//! - the primary's `vote_count` equals the voter-set union cardinality
//! - every secondary comment is appended to the primary with provenance
//! - every secondary is terminal (`merged_into_id`, `merged_at_us` set)
//!
//! On any failure the transaction rolls back; no partial state survives.

#![allow(clippy::module_name_repetitions, clippy::doc_markdown)]

pub mod comments;
pub mod votes;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::info;

use crate::db::query::now_us;
use crate::error::MergeError;
use crate::model::{Comment, FeedbackId, Status};

use comments::SecondaryComments;

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// Result of a committed merge, mirrored onto the merge API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub primary_id: FeedbackId,
    pub merged_count: usize,
    pub new_vote_count: u64,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Merge every item in `secondary_ids` into `primary_id`.
///
/// Secondaries are processed in the order supplied; duplicates in the list
/// are collapsed to their first occurrence.
///
/// # Errors
///
/// - [`MergeError::Validation`] — self-merge, empty secondary set, primary
///   already merged (chaining) or in a terminal status, or cross-project
///   secondary; nothing mutated
/// - [`MergeError::NotFound`] — primary or a secondary does not exist
/// - [`MergeError::AlreadyMerged`] — a secondary is already terminal
/// - [`MergeError::Conflict`] — the store writer lock was held past the
///   busy timeout by a concurrent merge; retry with refreshed state
/// - [`MergeError::Persistence`] — storage failure; transaction rolled back
pub fn merge(
    conn: &mut Connection,
    primary_id: &FeedbackId,
    secondary_ids: &[FeedbackId],
) -> Result<MergeOutcome, MergeError> {
    let secondaries = validate_request(primary_id, secondary_ids)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(MergeError::from_sqlite)?;

    let primary = check_preconditions(&tx, primary_id, &secondaries)?;

    let new_vote_count = consolidate_votes(&tx, primary_id, &secondaries)?;
    migrate_comments(&tx, primary_id, &secondaries)?;
    retire_secondaries(&tx, primary_id, &secondaries)?;

    tx.execute(
        "UPDATE feedback_items
         SET vote_count = ?1, version = version + 1, updated_at_us = ?2
         WHERE feedback_id = ?3",
        params![new_vote_count, now_us(), primary_id.as_str()],
    )
    .map_err(MergeError::from_sqlite)?;

    tx.commit().map_err(MergeError::from_sqlite)?;

    info!(
        primary = %primary_id,
        project = %primary.project_id,
        merged_count = secondaries.len(),
        new_vote_count,
        "merge committed"
    );

    Ok(MergeOutcome {
        primary_id: primary_id.clone(),
        merged_count: secondaries.len(),
        new_vote_count,
    })
}

// ---------------------------------------------------------------------------
// Validation and preconditions
// ---------------------------------------------------------------------------

/// Shape checks that need no store access. Collapses duplicate secondaries
/// to their first occurrence, preserving order.
fn validate_request(
    primary_id: &FeedbackId,
    secondary_ids: &[FeedbackId],
) -> Result<Vec<FeedbackId>, MergeError> {
    if secondary_ids.is_empty() {
        return Err(MergeError::validation("no secondary ids supplied"));
    }

    let mut seen = BTreeSet::new();
    let mut ordered = Vec::with_capacity(secondary_ids.len());
    for id in secondary_ids {
        if id == primary_id {
            return Err(MergeError::validation(format!(
                "primary {primary_id} cannot be merged into itself"
            )));
        }
        if seen.insert(id.clone()) {
            ordered.push(id.clone());
        }
    }
    Ok(ordered)
}

/// Minimal per-item state read inside the merge transaction.
struct ItemState {
    project_id: String,
    title: String,
    status: String,
    merged_into: Option<String>,
}

fn load_state(tx: &Transaction<'_>, id: &FeedbackId) -> Result<Option<ItemState>, MergeError> {
    tx.query_row(
        "SELECT project_id, title, status, merged_into_id
         FROM feedback_items WHERE feedback_id = ?1",
        [id.as_str()],
        |row| {
            Ok(ItemState {
                project_id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
                merged_into: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(MergeError::from_sqlite)
}

/// Re-read every involved row under the writer lock and verify the merge is
/// still legal. No mutation happens before this returns.
fn check_preconditions(
    tx: &Transaction<'_>,
    primary_id: &FeedbackId,
    secondaries: &[FeedbackId],
) -> Result<ItemState, MergeError> {
    let primary = load_state(tx, primary_id)?.ok_or_else(|| MergeError::NotFound {
        id: primary_id.clone(),
    })?;

    if primary.merged_into.is_some() {
        // Chained merges are not well-defined: a primary must be a true,
        // never-merged item.
        return Err(MergeError::validation(format!(
            "primary {primary_id} is itself merged; merge chaining is not allowed"
        )));
    }
    let primary_status = Status::from_str(&primary.status)
        .map_err(|err| MergeError::validation(err.to_string()))?;
    if primary_status.is_terminal() {
        return Err(MergeError::validation(format!(
            "primary {primary_id} is {primary_status}; terminal items cannot absorb merges"
        )));
    }

    for id in secondaries {
        let state = load_state(tx, id)?.ok_or_else(|| MergeError::NotFound { id: id.clone() })?;

        if state.merged_into.is_some() {
            return Err(MergeError::AlreadyMerged { id: id.clone() });
        }
        if state.project_id != primary.project_id {
            return Err(MergeError::validation(format!(
                "secondary {id} belongs to project {}, primary {primary_id} to {}",
                state.project_id, primary.project_id
            )));
        }
    }

    Ok(primary)
}

// ---------------------------------------------------------------------------
// Vote consolidation
// ---------------------------------------------------------------------------

fn voters(tx: &Transaction<'_>, id: &FeedbackId) -> Result<BTreeSet<String>, MergeError> {
    let mut stmt = tx
        .prepare_cached("SELECT voter_id FROM votes WHERE feedback_id = ?1")
        .map_err(MergeError::from_sqlite)?;
    let set = stmt
        .query_map([id.as_str()], |row| row.get::<_, String>(0))
        .map_err(MergeError::from_sqlite)?
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .map_err(MergeError::from_sqlite)?;
    Ok(set)
}

/// Reparent secondary votes to the primary, dropping rows whose voter is
/// already present, and return the derived vote count of the union.
fn consolidate_votes(
    tx: &Transaction<'_>,
    primary_id: &FeedbackId,
    secondaries: &[FeedbackId],
) -> Result<u64, MergeError> {
    let primary_voters = voters(tx, primary_id)?;
    let mut secondary_sets = Vec::with_capacity(secondaries.len());
    for id in secondaries {
        secondary_sets.push(voters(tx, id)?);
    }
    let union = votes::union_voters(&primary_voters, &secondary_sets);

    for id in secondaries {
        // Drop rows that would collide with a voter already on the primary,
        // then move the remainder. Sequential processing keeps the primary's
        // set current for the next secondary's collision check.
        tx.execute(
            "DELETE FROM votes WHERE feedback_id = ?1 AND voter_id IN
                 (SELECT voter_id FROM votes WHERE feedback_id = ?2)",
            params![id.as_str(), primary_id.as_str()],
        )
        .map_err(MergeError::from_sqlite)?;
        tx.execute(
            "UPDATE votes SET feedback_id = ?1 WHERE feedback_id = ?2",
            params![primary_id.as_str(), id.as_str()],
        )
        .map_err(MergeError::from_sqlite)?;
    }

    Ok(votes::vote_count(&union))
}

// ---------------------------------------------------------------------------
// Comment migration
// ---------------------------------------------------------------------------

fn comments_of(tx: &Transaction<'_>, id: &FeedbackId) -> Result<Vec<Comment>, MergeError> {
    let mut stmt = tx
        .prepare_cached(
            "SELECT comment_id, author_id, body, created_at_us
             FROM comments WHERE feedback_id = ?1
             ORDER BY created_at_us, comment_id",
        )
        .map_err(MergeError::from_sqlite)?;
    let rows = stmt
        .query_map([id.as_str()], |row| {
            Ok(Comment {
                comment_id: row.get(0)?,
                feedback_id: id.clone(),
                author_id: row.get(1)?,
                body: row.get(2)?,
                created_at_us: row.get(3)?,
            })
        })
        .map_err(MergeError::from_sqlite)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(MergeError::from_sqlite)?;
    Ok(rows)
}

/// Apply the comment migrator's plan: append each secondary comment to the
/// primary (fresh row ids keep migration order stable under `ORDER BY
/// comment_id`) and delete the originals.
fn migrate_comments(
    tx: &Transaction<'_>,
    primary_id: &FeedbackId,
    secondaries: &[FeedbackId],
) -> Result<(), MergeError> {
    let mut sources = Vec::with_capacity(secondaries.len());
    for id in secondaries {
        let state = load_state(tx, id)?.ok_or_else(|| MergeError::NotFound { id: id.clone() })?;
        sources.push(SecondaryComments {
            feedback_id: id.clone(),
            title: state.title,
            comments: comments_of(tx, id)?,
        });
    }

    for planned in comments::plan(&sources) {
        tx.execute(
            "INSERT INTO comments (feedback_id, author_id, body, created_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                primary_id.as_str(),
                planned.author_id,
                planned.body,
                planned.created_at_us
            ],
        )
        .map_err(MergeError::from_sqlite)?;
        tx.execute(
            "DELETE FROM comments WHERE comment_id = ?1",
            [planned.source_comment_id],
        )
        .map_err(MergeError::from_sqlite)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Retirement
// ---------------------------------------------------------------------------

/// Mark every secondary terminal. Their vote counts drop to zero because the
/// rows no longer own any votes; the derived-cache invariant holds for
/// terminal rows too.
fn retire_secondaries(
    tx: &Transaction<'_>,
    primary_id: &FeedbackId,
    secondaries: &[FeedbackId],
) -> Result<(), MergeError> {
    let merged_at = now_us();
    for id in secondaries {
        tx.execute(
            "UPDATE feedback_items
             SET merged_into_id = ?1, merged_at_us = ?2, vote_count = 0,
                 version = version + 1, updated_at_us = ?2
             WHERE feedback_id = ?3",
            params![primary_id.as_str(), merged_at, id.as_str()],
        )
        .map_err(MergeError::from_sqlite)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
