//! Errors from peer resolution and instance registration.

use thiserror::Error;

/// Errors raised while building or querying peer information.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Two conduits terminate at the same receiving port.
    #[error("receiving port '{port}' of '{kernel}' is fed by more than one conduit")]
    AmbiguousReceivingPort {
        /// The receiving component.
        kernel: String,
        /// The port fed twice.
        port: String,
    },
    /// A pass-through lookup named something that is not known.
    #[error("no {what} named '{name}'")]
    NotFound {
        /// `"port"`, `"component"` or `"instance"`.
        what: &'static str,
        /// The name looked up.
        name: String,
    },
    /// The local index plus slot has fewer entries than the peer's
    /// dimensionality, so the peer instance cannot be determined.
    #[error("index {got:?} is too short to address '{peer}', which has {needed} dimension(s)")]
    IndexTooShort {
        /// The peer component.
        peer: String,
        /// Dimensions of the peer.
        needed: usize,
        /// Local index concatenated with the slot.
        got: Vec<usize>,
    },
    /// An instance reference does not lie inside its component's
    /// multiplicity.
    #[error("'{instance}' is not an instance of a declared component")]
    InvalidInstance {
        /// The offending reference.
        instance: String,
    },
    /// An instance registered twice without deregistering.
    #[error("instance '{instance}' is already registered")]
    AlreadyRegistered {
        /// The instance.
        instance: String,
    },
}
