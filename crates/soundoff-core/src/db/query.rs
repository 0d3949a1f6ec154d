//! Typed query helpers for the feedback store.
//!
//! Provides the CRUD surface the API layer consumes: insert/read feedback
//! items, attach votes and comments, and manage per-sink remote references.
//! All functions take a shared `&Connection` and return `anyhow::Result<T>`
//! with typed structs (never raw rows).
//!
//! Invariant enforcement lives here for the simple cases: merged (terminal)
//! items reject new votes and comments, and `vote_count` is recomputed from
//! the `votes` table on every change rather than incremented.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::model::{Comment, FeedbackId, FeedbackItem, RemoteRef, SinkKind, Status};

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// Feedback items
// ---------------------------------------------------------------------------

/// Fields supplied by the API layer when a feedback item is submitted.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub id: FeedbackId,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Insert a newly submitted feedback item in `pending` status.
///
/// # Errors
///
/// Returns an error if the insert fails (duplicate id, constraint violation,
/// or storage failure).
pub fn insert_feedback(conn: &Connection, new: &NewFeedback) -> Result<()> {
    let now = now_us();
    conn.execute(
        "INSERT INTO feedback_items
            (feedback_id, project_id, title, description, category, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            new.id.as_str(),
            new.project_id,
            new.title,
            new.description,
            new.category,
            now
        ],
    )
    .with_context(|| format!("insert feedback item {}", new.id))?;
    Ok(())
}

/// Load a fully-hydrated feedback item, or `None` if absent.
///
/// Hydration includes the materialized `merged_feedback_ids` set (items whose
/// `merged_into_id` points here) and the per-sink remote references.
///
/// # Errors
///
/// Returns an error if any of the queries fail or a stored enum token cannot
/// be parsed.
pub fn get_feedback(conn: &Connection, id: &FeedbackId) -> Result<Option<FeedbackItem>> {
    let row = conn
        .query_row(
            "SELECT feedback_id, project_id, title, description, status, category,
                    vote_count, merged_into_id, merged_at_us, version,
                    created_at_us, updated_at_us
             FROM feedback_items WHERE feedback_id = ?1",
            [id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, i64>(11)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("load feedback item {id}"))?;

    let Some((
        feedback_id,
        project_id,
        title,
        description,
        status_raw,
        category,
        vote_count,
        merged_into_raw,
        merged_at_us,
        version,
        created_at_us,
        updated_at_us,
    )) = row
    else {
        return Ok(None);
    };

    let status =
        Status::from_str(&status_raw).with_context(|| format!("parse status of {id}"))?;

    Ok(Some(FeedbackItem {
        id: FeedbackId::new_unchecked(&feedback_id),
        project_id,
        title,
        description,
        status,
        category,
        vote_count: u64::try_from(vote_count).unwrap_or_default(),
        merged_into_id: merged_into_raw.as_deref().map(FeedbackId::new_unchecked),
        merged_at_us,
        merged_feedback_ids: merged_feedback_ids(conn, id)?,
        remote_refs: remote_refs(conn, id)?,
        version,
        created_at_us,
        updated_at_us,
    }))
}

/// Load a feedback item, failing if it does not exist.
///
/// # Errors
///
/// Returns an error if the item is absent or a query fails.
pub fn require_feedback(conn: &Connection, id: &FeedbackId) -> Result<FeedbackItem> {
    match get_feedback(conn, id)? {
        Some(item) => Ok(item),
        None => bail!("feedback item {id} not found"),
    }
}

/// Update an item's status, bumping its version. Returns the previous status
/// so the caller can hand the transition edge to the projection layer.
///
/// # Errors
///
/// Returns an error if the item is absent or the update fails.
pub fn set_status(conn: &Connection, id: &FeedbackId, status: Status) -> Result<Status> {
    let old_raw: String = conn
        .query_row(
            "SELECT status FROM feedback_items WHERE feedback_id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("load status of {id}"))?
        .with_context(|| format!("feedback item {id} not found"))?;

    conn.execute(
        "UPDATE feedback_items
         SET status = ?1, version = version + 1, updated_at_us = ?2
         WHERE feedback_id = ?3",
        params![status.as_str(), now_us(), id.as_str()],
    )
    .with_context(|| format!("update status of {id}"))?;

    Status::from_str(&old_raw).with_context(|| format!("parse previous status of {id}"))
}

/// The set of ids merged into `id`, materialized from `merged_into_id`
/// back-references. Empty for secondaries and never-merged items.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn merged_feedback_ids(conn: &Connection, id: &FeedbackId) -> Result<BTreeSet<FeedbackId>> {
    let mut stmt = conn
        .prepare("SELECT feedback_id FROM feedback_items WHERE merged_into_id = ?1")
        .context("prepare merged-set query")?;
    let ids = stmt
        .query_map([id.as_str()], |row| row.get::<_, String>(0))
        .context("query merged set")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read merged set rows")?;
    Ok(ids.iter().map(|raw| FeedbackId::new_unchecked(raw)).collect())
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Record a vote. Returns `false` if the voter had already voted (no-op).
///
/// Merged items are terminal and reject new votes.
///
/// # Errors
///
/// Returns an error if the item is absent, merged, or the write fails.
pub fn add_vote(conn: &Connection, id: &FeedbackId, voter_id: &str) -> Result<bool> {
    ensure_open_for_writes(conn, id, "vote")?;

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO votes (feedback_id, voter_id, created_at_us)
             VALUES (?1, ?2, ?3)",
            params![id.as_str(), voter_id, now_us()],
        )
        .with_context(|| format!("insert vote on {id}"))?;

    if inserted > 0 {
        refresh_vote_count(conn, id)?;
    }
    Ok(inserted > 0)
}

/// Remove a vote. Returns `false` if the voter had not voted.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn remove_vote(conn: &Connection, id: &FeedbackId, voter_id: &str) -> Result<bool> {
    let removed = conn
        .execute(
            "DELETE FROM votes WHERE feedback_id = ?1 AND voter_id = ?2",
            params![id.as_str(), voter_id],
        )
        .with_context(|| format!("delete vote on {id}"))?;

    if removed > 0 {
        refresh_vote_count(conn, id)?;
    }
    Ok(removed > 0)
}

/// Distinct voter ids currently attached to an item.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn voters_of(conn: &Connection, id: &FeedbackId) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT voter_id FROM votes WHERE feedback_id = ?1")
        .context("prepare voters query")?;
    let voters = stmt
        .query_map([id.as_str()], |row| row.get::<_, String>(0))
        .context("query voters")?
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("read voter rows")?;
    Ok(voters)
}

/// Recompute the derived `vote_count` cache from the `votes` table.
fn refresh_vote_count(conn: &Connection, id: &FeedbackId) -> Result<()> {
    conn.execute(
        "UPDATE feedback_items
         SET vote_count = (SELECT COUNT(*) FROM votes WHERE feedback_id = ?1),
             version = version + 1,
             updated_at_us = ?2
         WHERE feedback_id = ?1",
        params![id.as_str(), now_us()],
    )
    .with_context(|| format!("refresh vote count of {id}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Attach a comment, returning its row id.
///
/// Merged items are terminal and reject new comments.
///
/// # Errors
///
/// Returns an error if the item is absent, merged, or the write fails.
pub fn add_comment(conn: &Connection, id: &FeedbackId, author_id: &str, body: &str) -> Result<i64> {
    ensure_open_for_writes(conn, id, "comment")?;

    conn.execute(
        "INSERT INTO comments (feedback_id, author_id, body, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![id.as_str(), author_id, body, now_us()],
    )
    .with_context(|| format!("insert comment on {id}"))?;
    Ok(conn.last_insert_rowid())
}

/// List an item's comments in display order: original comments first, then
/// merge-migrated comments in migration order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_comments(conn: &Connection, id: &FeedbackId) -> Result<Vec<Comment>> {
    let mut stmt = conn
        .prepare(
            "SELECT comment_id, feedback_id, author_id, body, created_at_us
             FROM comments WHERE feedback_id = ?1 ORDER BY comment_id",
        )
        .context("prepare comments query")?;
    let comments = stmt
        .query_map([id.as_str()], |row| {
            Ok(Comment {
                comment_id: row.get(0)?,
                feedback_id: FeedbackId::new_unchecked(&row.get::<_, String>(1)?),
                author_id: row.get(2)?,
                body: row.get(3)?,
                created_at_us: row.get(4)?,
            })
        })
        .context("query comments")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read comment rows")?;
    Ok(comments)
}

// ---------------------------------------------------------------------------
// Remote references
// ---------------------------------------------------------------------------

/// Record the remote reference created for `sink`. Returns `false` without
/// writing when a reference already exists: refs are stable for the life of
/// the item, so a repeated bulk create is a no-op rather than a duplicate.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn set_remote_ref(
    conn: &Connection,
    id: &FeedbackId,
    sink: SinkKind,
    remote: &RemoteRef,
) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO remote_refs (feedback_id, sink, external_id, url, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.as_str(),
                sink.as_str(),
                remote.external_id,
                remote.url,
                now_us()
            ],
        )
        .with_context(|| format!("record {sink} remote ref for {id}"))?;
    Ok(inserted > 0)
}

/// Look up the remote reference for one sink, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn remote_ref(conn: &Connection, id: &FeedbackId, sink: SinkKind) -> Result<Option<RemoteRef>> {
    conn.query_row(
        "SELECT external_id, url FROM remote_refs WHERE feedback_id = ?1 AND sink = ?2",
        params![id.as_str(), sink.as_str()],
        |row| {
            Ok(RemoteRef {
                external_id: row.get(0)?,
                url: row.get(1)?,
            })
        },
    )
    .optional()
    .with_context(|| format!("load {sink} remote ref for {id}"))
}

/// All remote references of an item, keyed by sink.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn remote_refs(conn: &Connection, id: &FeedbackId) -> Result<BTreeMap<SinkKind, RemoteRef>> {
    let mut stmt = conn
        .prepare("SELECT sink, external_id, url FROM remote_refs WHERE feedback_id = ?1")
        .context("prepare remote refs query")?;
    let rows = stmt
        .query_map([id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("query remote refs")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read remote ref rows")?;

    let mut refs = BTreeMap::new();
    for (sink_raw, external_id, url) in rows {
        let sink = SinkKind::from_str(&sink_raw)
            .with_context(|| format!("parse sink token '{sink_raw}'"))?;
        refs.insert(sink, RemoteRef { external_id, url });
    }
    Ok(refs)
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Fail when the target item is absent or already merged (terminal).
fn ensure_open_for_writes(conn: &Connection, id: &FeedbackId, action: &str) -> Result<()> {
    let merged_into: Option<Option<String>> = conn
        .query_row(
            "SELECT merged_into_id FROM feedback_items WHERE feedback_id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("load merge state of {id}"))?;

    match merged_into {
        None => bail!("feedback item {id} not found"),
        Some(Some(primary)) => {
            bail!("cannot {action} on {id}: item was merged into {primary}")
        }
        Some(None) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
