//! Core allocation for Weft component instances.
//!
//! A [`Planner`] maps every instance of every component in a [`Model`]
//! onto disjoint sets of cores drawn from the cluster's [`Resources`],
//! honouring threaded and MPI requests and optional node pinning.
//!
//! [`Model`]: weft_core::Model
//! [`Resources`]: weft_core::Resources

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod planner;

pub use error::PlannerError;
pub use planner::{Allocation, Planner};
