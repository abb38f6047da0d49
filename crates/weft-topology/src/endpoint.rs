//! A resolved peer: one `(instance, port, slot)` to exchange messages with.

use std::fmt;

use weft_core::{Identifier, Index, Reference};

/// A port on a specific instance, optionally addressing one slot of a
/// vector port.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Component name, without indices.
    pub kernel: Reference,
    /// Instance index within the component.
    pub index: Index,
    /// Port name on the component.
    pub port: Identifier,
    /// Slot within the port; empty for scalar use.
    pub slot: Index,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(kernel: Reference, index: Index, port: Identifier, slot: Index) -> Self {
        Self {
            kernel,
            index,
            port,
            slot,
        }
    }

    /// The instance this endpoint lives on, e.g. `micro[3]`.
    pub fn instance(&self) -> Reference {
        self.kernel.with_index(&self.index)
    }

    /// The full reference, e.g. `micro[3].out[2]`.
    pub fn reference(&self) -> Reference {
        self.instance().join(&self.port).with_index(&self.slot)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}
