//! Set persistence seam
//!
//! Completed sets are handed to a [`SetRecorder`] for upload to the
//! TapFit backend. The session core is write-only here: recording
//! failures are logged by the runtime and never affect session state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RecorderError;

// ----------------------------------------------------------------------------
// Completed Set Record
// ----------------------------------------------------------------------------

/// One finished set, as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSet {
    /// 1-based set index within the session
    pub set_index: u8,
    /// Reps counted for this set
    pub reps: u8,
    /// Completion time, milliseconds since the Unix epoch
    pub completed_at_ms: u64,
}

// ----------------------------------------------------------------------------
// Recorder Trait
// ----------------------------------------------------------------------------

/// Write-only persistence collaborator for completed sets
#[async_trait]
pub trait SetRecorder: Send + Sync {
    async fn record_set(&self, set: CompletedSet) -> Result<(), RecorderError>;
}

/// Recorder that drops every set, for sessions without persistence
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRecorder;

#[async_trait]
impl SetRecorder for NoOpRecorder {
    async fn record_set(&self, _set: CompletedSet) -> Result<(), RecorderError> {
        Ok(())
    }
}
