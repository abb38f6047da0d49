//! Planner error types.

use thiserror::Error;
use weft_core::ModelError;

/// Errors from [`Planner::allocate_all`](crate::Planner::allocate_all).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// The model failed validation.
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    /// The planner was given no cores at all.
    #[error("no resources available to allocate from")]
    NoResources,
    /// A component is pinned to a node that is not among the available
    /// resources.
    #[error("component '{component}' is pinned to unknown node '{node}'")]
    UnknownNode {
        /// The pinned component.
        component: String,
        /// The unknown node name.
        node: String,
    },
    /// An instance could not be placed without oversubscription, or
    /// needs more cores than any single node has.
    #[error(
        "insufficient resources for '{instance}': needs {requested} cores on one node, \
         at most {largest_free} free"
    )]
    InsufficientResources {
        /// The instance that could not be placed.
        instance: String,
        /// Cores needed on a single node.
        requested: u32,
        /// Largest number of free cores on any candidate node.
        largest_free: usize,
    },
}
