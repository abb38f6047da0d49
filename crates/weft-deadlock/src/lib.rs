//! Run-wide deadlock detection for coupled Weft instances.
//!
//! Instances report receives that have been blocked for a while as
//! *waiting edges* (waiter → awaited). A single [`DeadlockDetector`]
//! thread keeps the graph of those edges and calls a shutdown callback
//! whenever a new edge closes a cycle, since no instance in a cycle can
//! ever make progress. Blocking receives plug in through
//! [`ReceiveTimeoutHandler`], which escalates its timeout, reports the
//! wait and aborts the receive once its instance is known to be stuck.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod detector;
pub mod error;
pub mod graph;
pub mod handler;

pub use config::DetectorConfig;
pub use detector::{DeadlockDetector, DeadlockHandle, Event, ShutdownCallback};
pub use error::DeadlockError;
pub use graph::WaitEdge;
pub use handler::ReceiveTimeoutHandler;
