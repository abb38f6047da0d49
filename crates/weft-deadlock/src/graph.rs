//! The live waiting graph.
//!
//! Every instance has at most one outstanding wait, so the graph has
//! out-degree at most one and a depth-first search from a new edge is a
//! walk along successors. A cycle through the new edge exists exactly when
//! that walk returns to the waiter.
//!
//! The new edge is the waiter's only one, so any cycle it closes did not
//! exist before the add. Every cycle found on add is therefore new and is
//! reported exactly once, until one of its waits is withdrawn.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use weft_core::{Identifier, Reference};

use crate::error::DeadlockError;

/// One blocked receive: `waiter` waits for a message from `awaited` on
/// `port` (and `slot`, for vector ports).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaitEdge {
    /// The blocked instance.
    pub waiter: Reference,
    /// The instance expected to send.
    pub awaited: Reference,
    /// The waiter's receiving port.
    pub port: Identifier,
    /// Slot on the port, if it is a vector port.
    pub slot: Option<usize>,
}

impl WaitEdge {
    /// Create an edge.
    pub fn new(waiter: Reference, awaited: Reference, port: Identifier, slot: Option<usize>) -> Self {
        Self {
            waiter,
            awaited,
            port,
            slot,
        }
    }
}

impl fmt::Display for WaitEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({}", self.waiter, self.awaited, self.port)?;
        if let Some(slot) = self.slot {
            write!(f, "[{slot}]")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Default)]
pub(crate) struct WaitGraph {
    /// waiter → its one outstanding wait.
    waits: IndexMap<Reference, WaitEdge>,
}

impl WaitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `edge`, returning the cycle it closes, starting with its waiter.
    pub fn add(&mut self, edge: WaitEdge) -> Result<Option<Vec<Reference>>, DeadlockError> {
        if let Some(existing) = self.waits.get(&edge.waiter) {
            return Err(DeadlockError::DuplicateWait {
                existing: existing.clone(),
                new: edge,
            });
        }
        let waiter = edge.waiter.clone();
        self.waits.insert(waiter.clone(), edge);

        Ok(self.cycle_through(&waiter))
    }

    pub fn remove(&mut self, edge: &WaitEdge) -> Result<(), DeadlockError> {
        match self.waits.get(&edge.waiter) {
            Some(current) if current == edge => {
                self.waits.shift_remove(&edge.waiter);
                Ok(())
            }
            _ => Err(DeadlockError::UnmatchedWaitDone { edge: edge.clone() }),
        }
    }

    /// Whether `instance` is currently part of a waiting cycle.
    pub fn is_deadlocked(&self, instance: &Reference) -> bool {
        self.cycle_through(instance).is_some()
    }

    /// The cycle containing `start`, beginning with `start`, if any.
    fn cycle_through(&self, start: &Reference) -> Option<Vec<Reference>> {
        let mut path = vec![start.clone()];
        let mut seen: HashSet<&Reference> = HashSet::from([start]);
        let mut current = start;
        while let Some(edge) = self.waits.get(current) {
            let next = &edge.awaited;
            if next == start {
                return Some(path);
            }
            // Reached a cycle that does not include `start`.
            if !seen.insert(next) {
                return None;
            }
            path.push(next.clone());
            current = next;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.waits.len()
    }
}
