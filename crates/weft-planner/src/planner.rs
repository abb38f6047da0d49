//! Greedy, deterministic placement of instances onto cores.
//!
//! Instances are placed one at a time in model enumeration order
//! (components in declaration order, each component's instances
//! row-major). Each process goes to the candidate node with the most free
//! cores, ties going to the node with more cores in total and then to the
//! node that sorts first, and takes that node's lowest-numbered free
//! cores. Identical inputs therefore always produce identical allocations.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use tracing::{debug, info, info_span, warn};

use weft_core::{CoreId, CoreRequest, Model, Reference, ResourceRequirements, Resources};

use crate::error::PlannerError;

/// Instance → assigned cores, in enumeration order.
pub type Allocation = IndexMap<Reference, Resources>;

// ── Planner ─────────────────────────────────────────────────────

/// Maps component instances onto the cores of a cluster.
#[derive(Clone, Debug)]
pub struct Planner {
    available: Resources,
}

impl Planner {
    /// Create a planner over the given physical resources.
    pub fn new(available: Resources) -> Self {
        Self { available }
    }

    /// The resources this planner allocates from.
    pub fn available(&self) -> &Resources {
        &self.available
    }

    /// Assign cores to every instance of every component in `model`.
    ///
    /// Without `allow_oversubscription`, the returned resources are pairwise
    /// disjoint and the call fails with
    /// [`PlannerError::InsufficientResources`] as soon as one instance
    /// cannot be placed. With it, cores are shared when free cores run out.
    ///
    /// A [`Resources`] value is a set, so when the processes of one MPI
    /// instance end up sharing cores with each other, its entry lists each
    /// shared core once and holds fewer cores than were requested. This is
    /// logged as a warning.
    pub fn allocate_all(
        &self,
        model: &Model,
        allow_oversubscription: bool,
    ) -> Result<Allocation, PlannerError> {
        model.validate()?;
        if self.available.is_empty() {
            return Err(PlannerError::NoResources);
        }

        let span = info_span!("allocate_all", model = %model.name, oversubscribe = allow_oversubscription);
        let _guard = span.enter();

        let mut pool = CorePool::new(&self.available, allow_oversubscription);
        let mut allocation = Allocation::new();

        for component in &model.components {
            let requirements = model.requirements(&component.name);
            let candidates = pool.candidates(&component.name, &requirements)?;
            for instance in component.instances() {
                let resources = pool.allocate(&instance, &requirements, &candidates)?;
                debug!(%instance, %resources, "allocated");
                allocation.insert(instance, resources);
            }
        }

        info!(
            instances = allocation.len(),
            oversubscribed = pool.oversubscribed,
            "allocation complete"
        );
        Ok(allocation)
    }
}

// ── CorePool ────────────────────────────────────────────────────

/// The planner's private working copy of the cluster.
struct CorePool {
    nodes: Vec<NodeCores>,
    allow_oversubscription: bool,
    oversubscribed: bool,
}

struct NodeCores {
    name: String,
    total: usize,
    free: BTreeSet<CoreId>,
    /// Number of processes placed on each core.
    load: BTreeMap<CoreId, u32>,
}

impl CorePool {
    fn new(available: &Resources, allow_oversubscription: bool) -> Self {
        let nodes = available
            .iter()
            .map(|(name, cores)| NodeCores {
                name: name.to_string(),
                total: cores.len(),
                free: cores.clone(),
                load: cores.iter().map(|&c| (c, 0)).collect(),
            })
            .collect();
        Self {
            nodes,
            allow_oversubscription,
            oversubscribed: false,
        }
    }

    /// Indices of the nodes a component may use.
    fn candidates(
        &self,
        component: &Reference,
        requirements: &ResourceRequirements,
    ) -> Result<Vec<usize>, PlannerError> {
        let Some(pins) = &requirements.nodes else {
            return Ok((0..self.nodes.len()).collect());
        };
        let mut indices = Vec::with_capacity(pins.len());
        for pin in pins {
            let idx = self
                .nodes
                .iter()
                .position(|n| &n.name == pin)
                .ok_or_else(|| PlannerError::UnknownNode {
                    component: component.to_string(),
                    node: pin.clone(),
                })?;
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }
        // Keep node order as the tie-break, independent of pin order.
        indices.sort_unstable();
        Ok(indices)
    }

    fn allocate(
        &mut self,
        instance: &Reference,
        requirements: &ResourceRequirements,
        candidates: &[usize],
    ) -> Result<Resources, PlannerError> {
        let mut resources = Resources::new();
        match requirements.request {
            CoreRequest::Threads(threads) => {
                self.place_process(instance, threads, candidates, &mut resources)?;
            }
            CoreRequest::Mpi {
                processes,
                threads_per_process,
            } => {
                for _ in 0..processes {
                    self.place_process(instance, threads_per_process, candidates, &mut resources)?;
                }
            }
        }
        let requested = requirements.total_cores();
        let distinct = resources.total_cores() as u64;
        if distinct < requested {
            warn!(%instance, requested, distinct, "processes share cores within the instance");
        }
        Ok(resources)
    }

    /// Place one process needing `cores` cores on a single node.
    fn place_process(
        &mut self,
        instance: &Reference,
        cores: u32,
        candidates: &[usize],
        out: &mut Resources,
    ) -> Result<(), PlannerError> {
        let needed = cores as usize;

        if let Some(idx) = self.most_free(candidates, |n| n.free.len() >= needed) {
            let node = &mut self.nodes[idx];
            let taken: Vec<CoreId> = node.free.iter().copied().take(needed).collect();
            for core in &taken {
                node.free.remove(core);
                *node.load.entry(*core).or_default() += 1;
            }
            out.add_cores(&node.name, taken);
            return Ok(());
        }

        let largest_free = candidates
            .iter()
            .map(|&i| self.nodes[i].free.len())
            .max()
            .unwrap_or(0);
        let insufficient = || PlannerError::InsufficientResources {
            instance: instance.to_string(),
            requested: cores,
            largest_free,
        };

        if !self.allow_oversubscription {
            return Err(insufficient());
        }
        let idx = self
            .most_free(candidates, |n| n.total >= needed)
            .ok_or_else(insufficient)?;

        // Free cores first, then the least-loaded busy ones.
        let node = &mut self.nodes[idx];
        let mut taken: Vec<CoreId> = node.free.iter().copied().collect();
        let mut busy: Vec<(u32, CoreId)> = node
            .load
            .iter()
            .filter(|(core, _)| !node.free.contains(*core))
            .map(|(&core, &load)| (load, core))
            .collect();
        busy.sort_unstable();
        taken.extend(busy.into_iter().map(|(_, core)| core).take(needed - taken.len()));

        warn!(
            %instance,
            node = %node.name,
            shared = needed - node.free.len(),
            "oversubscribing cores"
        );
        for core in &taken {
            node.free.remove(core);
            *node.load.entry(*core).or_default() += 1;
        }
        out.add_cores(&node.name, taken);
        self.oversubscribed = true;
        Ok(())
    }

    /// The eligible candidate with the most free cores, then the most
    /// cores in total; the first such node wins ties.
    fn most_free(&self, candidates: &[usize], eligible: impl Fn(&NodeCores) -> bool) -> Option<usize> {
        let mut best: Option<usize> = None;
        for &idx in candidates {
            let node = &self.nodes[idx];
            if !eligible(node) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let current = &self.nodes[b];
                    (node.free.len(), node.total) > (current.free.len(), current.total)
                }
            };
            if better {
                best = Some(idx);
            }
        }
        best
    }
}
