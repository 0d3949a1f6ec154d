//! Vote ledger: pure voter-set algebra for merge consolidation.
//!
//! The ledger never touches storage. The coordinator feeds it the voter sets
//! read inside the merge transaction and writes back the derived count, so
//! the `vote_count` cache is always the cardinality of a real set union and
//! never the result of arithmetic on stale counters.

use std::collections::BTreeSet;

/// Deduplicated union of a primary's voters with every secondary's voters.
///
/// `BTreeSet` keeps iteration deterministic, which keeps reparenting order
/// and test assertions stable.
#[must_use]
pub fn union_voters(
    primary_voters: &BTreeSet<String>,
    secondary_voter_sets: &[BTreeSet<String>],
) -> BTreeSet<String> {
    let mut union = primary_voters.clone();
    for voters in secondary_voter_sets {
        union.extend(voters.iter().cloned());
    }
    union
}

/// The derived vote count for a voter set.
#[must_use]
pub fn vote_count(voters: &BTreeSet<String>) -> u64 {
    voters.len() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
