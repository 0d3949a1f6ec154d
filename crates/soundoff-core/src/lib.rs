#![forbid(unsafe_code)]
//! soundoff-core library.
//!
//! Canonical feedback item model, `SQLite` store, and the merge
//! consolidation engine. Projection to external trackers lives in
//! `soundoff-sync`.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::MergeError`] on the merge surface,
//!   `anyhow::Result` with context on the store helpers.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod db;
pub mod error;
pub mod merge;
pub mod model;

pub use error::{ErrorCode, MergeError};
pub use merge::{MergeOutcome, merge};
