//! Physical compute resources and per-component resource requests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Identifier of a core (hardware thread) on a node.
pub type CoreId = u32;

// ── Resources ───────────────────────────────────────────────────

/// A set of cores, grouped by node.
///
/// Nodes with no cores are never stored, so two values describing the same
/// cores compare equal. Nodes iterate in name order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources {
    cores: BTreeMap<String, BTreeSet<CoreId>>,
}

impl Resources {
    /// An empty set of resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one core on `node`.
    pub fn add_core(&mut self, node: &str, core: CoreId) {
        self.cores.entry(node.to_string()).or_default().insert(core);
    }

    /// Add several cores on `node`.
    pub fn add_cores(&mut self, node: &str, cores: impl IntoIterator<Item = CoreId>) {
        let mut cores = cores.into_iter().peekable();
        if cores.peek().is_some() {
            self.cores.entry(node.to_string()).or_default().extend(cores);
        }
    }

    /// Remove one core, returning whether it was present.
    pub fn remove_core(&mut self, node: &str, core: CoreId) -> bool {
        let Some(set) = self.cores.get_mut(node) else {
            return false;
        };
        let removed = set.remove(&core);
        if set.is_empty() {
            self.cores.remove(node);
        }
        removed
    }

    /// Add every core of `other` to `self`.
    pub fn merge(&mut self, other: &Resources) {
        for (node, cores) in &other.cores {
            self.add_cores(node, cores.iter().copied());
        }
    }

    /// Node names, in order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.cores.keys().map(String::as_str)
    }

    /// `(node, cores)` pairs, in node order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<CoreId>)> {
        self.cores.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// The cores on `node`, if any.
    pub fn cores_on(&self, node: &str) -> Option<&BTreeSet<CoreId>> {
        self.cores.get(node)
    }

    /// Number of nodes with at least one core.
    pub fn node_count(&self) -> usize {
        self.cores.len()
    }

    /// Total number of cores across all nodes.
    pub fn total_cores(&self) -> usize {
        self.cores.values().map(BTreeSet::len).sum()
    }

    /// Whether there are no cores at all.
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Whether `self` and `other` share no core on any node.
    pub fn is_disjoint(&self, other: &Resources) -> bool {
        self.cores.iter().all(|(node, cores)| {
            other
                .cores
                .get(node)
                .is_none_or(|theirs| cores.is_disjoint(theirs))
        })
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (node, cores) in &self.cores {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{node}: {cores:?}")?;
        }
        Ok(())
    }
}

// ── ResourceRequirements ────────────────────────────────────────

/// How many cores an instance needs and how they are grouped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreRequest {
    /// A single multithreaded process; all threads on one node.
    Threads(u32),
    /// An MPI program: each process needs `threads_per_process` cores on a
    /// single node, processes may be spread over nodes.
    Mpi {
        /// Number of MPI processes.
        processes: u32,
        /// Cores per process.
        threads_per_process: u32,
    },
}

/// Resources requested by every instance of one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequirements", into = "RawRequirements")]
pub struct ResourceRequirements {
    /// The core count and grouping.
    pub request: CoreRequest,
    /// If set, instances may only be placed on these nodes.
    pub nodes: Option<Vec<String>>,
}

impl ResourceRequirements {
    /// A threaded request without node pinning.
    pub fn threads(threads: u32) -> Self {
        Self {
            request: CoreRequest::Threads(threads),
            nodes: None,
        }
    }

    /// An MPI request without node pinning.
    pub fn mpi(processes: u32, threads_per_process: u32) -> Self {
        Self {
            request: CoreRequest::Mpi {
                processes,
                threads_per_process,
            },
            nodes: None,
        }
    }

    /// Restrict placement to the given nodes.
    pub fn pinned_to<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = Some(nodes.into_iter().map(Into::into).collect());
        self
    }

    /// Total number of cores requested.
    pub fn total_cores(&self) -> u64 {
        match self.request {
            CoreRequest::Threads(t) => u64::from(t),
            CoreRequest::Mpi {
                processes,
                threads_per_process,
            } => u64::from(processes) * u64::from(threads_per_process),
        }
    }

    /// Check that the request asks for at least one core and that a pin
    /// list, if present, is not empty.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self.request {
            CoreRequest::Threads(0) => {
                return Err(ModelError::InvalidRequirement {
                    reason: "threads must be at least 1".to_string(),
                })
            }
            CoreRequest::Mpi { processes: 0, .. } => {
                return Err(ModelError::InvalidRequirement {
                    reason: "mpi_processes must be at least 1".to_string(),
                })
            }
            CoreRequest::Mpi {
                threads_per_process: 0,
                ..
            } => {
                return Err(ModelError::InvalidRequirement {
                    reason: "threads_per_process must be at least 1".to_string(),
                })
            }
            _ => {}
        }
        if matches!(&self.nodes, Some(nodes) if nodes.is_empty()) {
            return Err(ModelError::InvalidRequirement {
                reason: "node pin list is empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self::threads(1)
    }
}

/// Flat on-disk form: `threads = 4` or `mpi_processes = 8` with optional
/// `threads_per_process`, plus optional `nodes`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mpi_processes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threads_per_process: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<String>>,
}

impl TryFrom<RawRequirements> for ResourceRequirements {
    type Error = ModelError;

    fn try_from(raw: RawRequirements) -> Result<Self, Self::Error> {
        let request = match (raw.threads, raw.mpi_processes, raw.threads_per_process) {
            (Some(threads), None, None) => CoreRequest::Threads(threads),
            (None, Some(processes), tpp) => CoreRequest::Mpi {
                processes,
                threads_per_process: tpp.unwrap_or(1),
            },
            (None, None, _) => {
                return Err(ModelError::InvalidRequirement {
                    reason: "one of threads or mpi_processes is required".to_string(),
                })
            }
            _ => {
                return Err(ModelError::InvalidRequirement {
                    reason: "threads cannot be combined with mpi_processes or threads_per_process"
                        .to_string(),
                })
            }
        };
        let req = Self {
            request,
            nodes: raw.nodes,
        };
        req.validate()?;
        Ok(req)
    }
}

impl From<ResourceRequirements> for RawRequirements {
    fn from(req: ResourceRequirements) -> Self {
        let (threads, mpi_processes, threads_per_process) = match req.request {
            CoreRequest::Threads(t) => (Some(t), None, None),
            CoreRequest::Mpi {
                processes,
                threads_per_process,
            } => (None, Some(processes), Some(threads_per_process)),
        };
        Self {
            threads,
            mpi_processes,
            threads_per_process,
            nodes: req.nodes,
        }
    }
}
