#![allow(clippy::module_name_repetitions)]

use std::fmt;

use crate::model::FeedbackId;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable error codes surfaced to API callers and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ItemNotFound,
    MergeValidationFailed,
    AlreadyMerged,
    MergeConflict,
    StoreWriteFailed,
    SinkDeliveryFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ItemNotFound => "E2001",
            Self::MergeValidationFailed => "E2002",
            Self::AlreadyMerged => "E2003",
            Self::MergeConflict => "E5002",
            Self::StoreWriteFailed => "E5001",
            Self::SinkDeliveryFailed => "E4001",
        }
    }

    /// Short human-facing summary for logs and API error bodies.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ItemNotFound => "Feedback item not found",
            Self::MergeValidationFailed => "Merge request failed validation",
            Self::AlreadyMerged => "Feedback item is already merged",
            Self::MergeConflict => "Concurrent merge conflict",
            Self::StoreWriteFailed => "Store write failed",
            Self::SinkDeliveryFailed => "External sink delivery failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ItemNotFound => None,
            Self::MergeValidationFailed => {
                Some("Check that the primary is distinct from every secondary and unmerged.")
            }
            Self::AlreadyMerged => {
                Some("Refresh the item list; one of the secondaries was merged elsewhere.")
            }
            Self::MergeConflict => Some("Retry the merge with refreshed state."),
            Self::StoreWriteFailed => Some("Check disk space and store permissions."),
            Self::SinkDeliveryFailed => {
                Some("Inspect the projection report; the internal change is already committed.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Error taxonomy for the merge API surface.
///
/// `Validation`, `NotFound`, and `AlreadyMerged` are rejected before any
/// mutation. `Conflict` means a concurrent writer held the store lock past
/// the busy timeout; callers should retry with refreshed state.
/// `Persistence` aborts the whole transaction with no partial writes.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("{}: {reason}", ErrorCode::MergeValidationFailed)]
    Validation { reason: String },

    #[error("{}: feedback item {id} not found", ErrorCode::ItemNotFound)]
    NotFound { id: FeedbackId },

    #[error("{}: feedback item {id} is already merged", ErrorCode::AlreadyMerged)]
    AlreadyMerged { id: FeedbackId },

    #[error("{}: {detail}", ErrorCode::MergeConflict)]
    Conflict { detail: String },

    #[error("{}: {source}", ErrorCode::StoreWriteFailed)]
    Persistence {
        #[source]
        source: rusqlite::Error,
    },
}

impl MergeError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::MergeValidationFailed,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::AlreadyMerged { .. } => ErrorCode::AlreadyMerged,
            Self::Conflict { .. } => ErrorCode::MergeConflict,
            Self::Persistence { .. } => ErrorCode::StoreWriteFailed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Map a storage-layer error, distinguishing lock contention (retryable
    /// conflict) from hard persistence failures.
    pub(crate) fn from_sqlite(source: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &source {
            if matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Self::Conflict {
                    detail: source.to_string(),
                };
            }
        }
        Self::Persistence { source }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ItemNotFound,
            ErrorCode::MergeValidationFailed,
            ErrorCode::AlreadyMerged,
            ErrorCode::MergeConflict,
            ErrorCode::StoreWriteFailed,
            ErrorCode::SinkDeliveryFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::AlreadyMerged.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn busy_errors_map_to_conflict() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        let err = MergeError::from_sqlite(busy);
        assert!(matches!(err, MergeError::Conflict { .. }), "got {err:?}");
    }

    #[test]
    fn other_sqlite_errors_map_to_persistence() {
        let err = MergeError::from_sqlite(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, MergeError::Persistence { .. }), "got {err:?}");
    }
}
