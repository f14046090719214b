//! Incremental synchronization of procurement entities.
//!
//! The orchestrator pulls from the API client, archives raw responses,
//! transforms items and upserts them through the [`ProcurementStore`] seam,
//! advancing per-(entity, year) checkpoints.
//!
//! [`ProcurementStore`]: crate::db::ProcurementStore

mod orchestrator;
pub mod transform;

pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport};
pub use transform::TransformError;
