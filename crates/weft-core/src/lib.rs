//! Core types for the Weft coupling framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the rest of the workspace: hierarchical
//! [`Reference`]s, the coupling [`Model`] (components, ports, conduits),
//! physical [`Resources`] and per-component [`ResourceRequirements`], and
//! the [`TimeoutHandler`] seam used by blocking receives.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod reference;
pub mod resources;
pub mod timeout;

pub use error::{ModelError, ReferenceError, WaitAborted};
pub use model::{Cardinality, Component, Conduit, Instances, Model, Operator, Port};
pub use reference::{Identifier, Index, Part, Reference};
pub use resources::{CoreId, CoreRequest, ResourceRequirements, Resources};
pub use timeout::TimeoutHandler;
