//! Peer resolution for coupled Weft instances.
//!
//! Given the coupling [`Model`](weft_core::Model) and the instances that
//! have registered so far, this crate answers, for one instance, which
//! remote `(instance, port, slot)` endpoints each of its ports talks to
//! and where those instances can be reached.
//!
//! - [`PeerInfo`]: the immutable per-instance answer.
//! - [`TopologyStore`]: the static component/conduit graph.
//! - [`InstanceRegistry`]: live `instance → locations` records.
//! - [`PeerDirectory`]: both of the above, as the coordinator serves them.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod directory;
pub mod endpoint;
pub mod error;
pub mod peer_info;
pub mod registry;
pub mod store;

pub use directory::{PeerDirectory, PeerLookup};
pub use endpoint::Endpoint;
pub use error::TopologyError;
pub use peer_info::{Locations, PeerInfo};
pub use registry::InstanceRegistry;
pub use store::TopologyStore;
