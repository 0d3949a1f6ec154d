//! Canonical `SQLite` schema for the soundoff store.
//!
//! The schema is normalized so every derived value has a single source of
//! truth:
//! - `feedback_items` keeps the latest aggregate fields per item, including
//!   the derived `vote_count` cache and an optimistic `version` counter
//! - `votes` holds the authoritative `(feedback_id, voter_id)` set
//! - `comments` are insertion-ordered; merge reparenting appends new rows
//! - `remote_refs` pins one stable external identity per sink per item
//! - `store_meta` tracks the schema version for migrations

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS feedback_items (
    feedback_id TEXT PRIMARY KEY CHECK (feedback_id LIKE 'fb-%'),
    project_id TEXT NOT NULL CHECK (length(trim(project_id)) > 0),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN
        ('pending', 'approved', 'inProgress', 'testflight', 'completed', 'rejected')),
    category TEXT,
    vote_count INTEGER NOT NULL DEFAULT 0 CHECK (vote_count >= 0),
    merged_into_id TEXT REFERENCES feedback_items(feedback_id) ON DELETE SET NULL,
    merged_at_us INTEGER,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (feedback_id <> merged_into_id),
    CHECK ((merged_into_id IS NULL) = (merged_at_us IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_feedback_items_merged_into
    ON feedback_items(merged_into_id) WHERE merged_into_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS votes (
    feedback_id TEXT NOT NULL REFERENCES feedback_items(feedback_id) ON DELETE CASCADE,
    voter_id TEXT NOT NULL CHECK (length(trim(voter_id)) > 0),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (feedback_id, voter_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    feedback_id TEXT NOT NULL REFERENCES feedback_items(feedback_id) ON DELETE CASCADE,
    author_id TEXT NOT NULL CHECK (length(trim(author_id)) > 0),
    body TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_feedback
    ON comments(feedback_id, comment_id);

CREATE TABLE IF NOT EXISTS remote_refs (
    feedback_id TEXT NOT NULL REFERENCES feedback_items(feedback_id) ON DELETE CASCADE,
    sink TEXT NOT NULL CHECK (sink IN ('issue_tracker', 'task_tracker', 'notification')),
    external_id TEXT NOT NULL CHECK (length(trim(external_id)) > 0),
    url TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (feedback_id, sink)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";
