//! Errors from checkpoint configuration.

use thiserror::Error;

/// Errors detected while loading checkpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// The TOML text could not be parsed.
    #[error("could not parse checkpoint config: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
    },
    /// A rule is malformed.
    #[error("invalid {axis} checkpoint rule: {reason}")]
    InvalidRule {
        /// `"simulation_time"` or `"wallclock_time"`.
        axis: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
