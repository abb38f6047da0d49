//! Weft: the coordination core of a coupled multiscale simulation.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Weft sub-crates. For most users, adding `weft` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use weft::prelude::*;
//!
//! let model = Model::from_toml_str(r#"
//!     name = "pair"
//!
//!     [[components]]
//!     name = "macro"
//!     ports = [{ name = "out", operator = "o_i" }]
//!
//!     [[components]]
//!     name = "micro"
//!     multiplicity = [2]
//!     ports = [{ name = "in", operator = "f_init" }]
//!
//!     [[conduits]]
//!     sender = "macro.out"
//!     receiver = "micro.in"
//! "#).unwrap();
//!
//! // Place every instance on a four-core node.
//! let mut cluster = Resources::new();
//! cluster.add_cores("node001", 0..4);
//! let allocation = Planner::new(cluster).allocate_all(&model, false).unwrap();
//! assert_eq!(allocation.len(), 3);
//!
//! // Once every instance has registered, peers can be resolved.
//! let mut directory = PeerDirectory::new(&model);
//! for instance in model.instances() {
//!     let location = format!("tcp:127.0.0.1:{}", 9000 + directory.registry().len());
//!     directory.register(instance, vec![location]).unwrap();
//! }
//! let macro_ref: Reference = "macro".parse().unwrap();
//! let PeerLookup::Ready(peers) = directory.request_peers(&macro_ref).unwrap() else {
//!     panic!("all instances are registered");
//! };
//! let out: Identifier = "out".parse().unwrap();
//! assert_eq!(peers.get_peer_endpoints(&out, &[1]).unwrap().len(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`] | `weft-core` | References, the coupling model, resources |
//! | [`planner`] | `weft-planner` | Core allocation |
//! | [`topology`] | `weft-topology` | Peer resolution and slot rebalancing |
//! | [`mcp`] | `weft-mcp` | Message transports and the post office |
//! | [`deadlock`] | `weft-deadlock` | Wait graph and deadlock detection |
//! | [`checkpoint`] | `weft-checkpoint` | Checkpoint trigger rules |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// References, the coupling model, and resources (`weft-core`).
///
/// Contains [`core::Reference`], [`core::Model`], [`core::Resources`] and
/// the [`core::TimeoutHandler`] trait shared by transports and the
/// deadlock detector.
pub use weft_core as core;

/// Core allocation (`weft-planner`).
///
/// [`planner::Planner::allocate_all`] maps every instance onto cores.
pub use weft_planner as planner;

/// Peer resolution (`weft-topology`).
///
/// [`topology::PeerDirectory`] collects registrations and hands out
/// [`topology::PeerInfo`] once an instance's peers are all known.
pub use weft_topology as topology;

/// Message transports (`weft-mcp`).
///
/// Servers publish a [`mcp::PostOffice`]; [`mcp::McpClient`] picks the
/// first transport that reaches a peer.
pub use weft_mcp as mcp;

/// Deadlock detection (`weft-deadlock`).
///
/// A [`deadlock::DeadlockDetector`] thread consumes wait reports from
/// [`deadlock::ReceiveTimeoutHandler`]s.
pub use weft_deadlock as deadlock;

/// Checkpoint triggers (`weft-checkpoint`).
///
/// [`checkpoint::TriggerManager`] decides when an instance saves a
/// snapshot.
pub use weft_checkpoint as checkpoint;

/// Common imports for typical Weft usage.
///
/// ```rust
/// use weft::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use weft_core::{
        Component, Conduit, Identifier, Model, Operator, Reference, ResourceRequirements,
        Resources, TimeoutHandler,
    };

    // Planning and topology
    pub use weft_planner::{Allocation, Planner};
    pub use weft_topology::{PeerDirectory, PeerInfo, PeerLookup};

    // Transports
    pub use weft_mcp::{
        default_factories, DirectRegistry, McpClient, PostOffice, RequestHandler, TcpServer,
        TransportServer,
    };

    // Deadlock detection and checkpoints
    pub use weft_checkpoint::{CheckpointConfig, TriggerManager};
    pub use weft_deadlock::{DeadlockDetector, DetectorConfig};

    // Errors
    pub use weft_checkpoint::CheckpointError;
    pub use weft_core::{ModelError, ReferenceError};
    pub use weft_deadlock::DeadlockError;
    pub use weft_mcp::McpError;
    pub use weft_planner::PlannerError;
    pub use weft_topology::TopologyError;
}
