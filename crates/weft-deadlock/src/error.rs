//! Errors from the deadlock detector.

use thiserror::Error;

use crate::graph::WaitEdge;

/// Errors reported by the detector or its handles.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeadlockError {
    /// [`DetectorConfig`](crate::DetectorConfig) failed validation.
    #[error("invalid detector config: {reason}")]
    InvalidConfig {
        /// Which invariant was violated.
        reason: String,
    },
    /// A waiter reported a second wait while its first was outstanding.
    #[error("{} reported waiting on {} while already waiting on {}", .new.waiter, .new.awaited, .existing.awaited)]
    DuplicateWait {
        /// The outstanding wait.
        existing: WaitEdge,
        /// The new, conflicting wait.
        new: WaitEdge,
    },
    /// A wait-done did not match the waiter's outstanding wait.
    #[error("{} reported done waiting on {} for {}, which it was not waiting for", .edge.waiter, .edge.awaited, .edge.port)]
    UnmatchedWaitDone {
        /// The reported edge.
        edge: WaitEdge,
    },
    /// The detector thread is no longer running.
    #[error("deadlock detector is not running")]
    Stopped,
    /// The detector thread could not be started.
    #[error("could not spawn detector thread: {reason}")]
    ThreadSpawnFailed {
        /// The OS error.
        reason: String,
    },
    /// The detector thread panicked.
    #[error("deadlock detector thread panicked")]
    Panicked,
}
