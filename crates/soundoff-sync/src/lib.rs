#![forbid(unsafe_code)]
//! soundoff-sync library.
//!
//! Projects committed feedback changes to the configured external trackers.
//! The core guarantee: a sink outage degrades the projection report, never
//! the internal state change that triggered it.
//!
//! # Conventions
//!
//! - **Errors**: [`sink::SinkError`] is captured per sink and per item,
//!   never propagated to the caller of a projection.
//! - **Logging**: `tracing` macros with structured fields
//!   (`sink`, `item`, `error`).

pub mod bulk;
pub mod config;
pub mod projector;
pub mod queue;
pub mod sink;
pub mod status_map;

pub use config::ProjectSyncConfig;
pub use projector::{BulkCreateReport, ProjectionReport, SyncProjector};
pub use queue::{ProjectionQueue, ProjectionTask};
