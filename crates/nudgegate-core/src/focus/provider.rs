//! The pollable frontmost-application source.
//!
//! OS integration is an external collaborator: hosts that can observe
//! the frontmost window implement [`SnapshotProvider`] and hand it to
//! the monitor. A monitor constructed without one permanently reports
//! itself disabled instead of erroring.

use thiserror::Error;

use crate::model::FocusSnapshot;

/// Errors a provider may return for an individual poll. The monitor
/// logs these and skips the tick.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// Source of "which application is frontmost" observations.
pub trait SnapshotProvider: Send + Sync {
    fn current(&self) -> Result<FocusSnapshot, SnapshotError>;
}
