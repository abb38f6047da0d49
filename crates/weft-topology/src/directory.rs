//! Registration and peer lookup, as served by the coordinator.

use indexmap::IndexMap;
use tracing::debug;

use weft_core::{Index, Model, Reference};

use crate::error::TopologyError;
use crate::peer_info::{Locations, PeerInfo};
use crate::registry::InstanceRegistry;
use crate::store::TopologyStore;

/// Outcome of [`PeerDirectory::request_peers`].
#[derive(Clone, Debug)]
pub enum PeerLookup {
    /// Every peer instance has registered.
    Ready(PeerInfo),
    /// Some peers are not up yet; ask again later.
    PeersPending {
        /// Peer instances that have not registered.
        missing: Vec<Reference>,
    },
}

/// Combines the static topology with live registrations.
#[derive(Clone, Debug)]
pub struct PeerDirectory {
    store: TopologyStore,
    registry: InstanceRegistry,
}

impl PeerDirectory {
    /// A directory for `model` with nothing registered.
    pub fn new(model: &Model) -> Self {
        Self {
            store: TopologyStore::new(model),
            registry: InstanceRegistry::new(),
        }
    }

    /// The static topology.
    pub fn store(&self) -> &TopologyStore {
        &self.store
    }

    /// The live registrations.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Register `instance` at `locations`.
    pub fn register(&mut self, instance: Reference, locations: Locations) -> Result<(), TopologyError> {
        self.check_instance(&instance)?;
        self.registry.add(instance, locations)
    }

    /// Deregister `instance`, returning whether it was registered.
    pub fn deregister(&mut self, instance: &Reference) -> bool {
        self.registry.remove(instance).is_some()
    }

    /// Resolve the peers of `instance`.
    ///
    /// Returns [`PeerLookup::PeersPending`] while any instance of any peer
    /// component is unregistered.
    pub fn request_peers(&self, instance: &Reference) -> Result<PeerLookup, TopologyError> {
        let (kernel, index) = self.check_instance(instance)?;

        let peer_kernels = self.store.get_peer_kernels(&kernel);
        let mut peer_dims = IndexMap::new();
        let mut peer_locations = IndexMap::new();
        let mut missing = Vec::new();

        for peer in &peer_kernels {
            let Some(component) = self.store.component(peer) else {
                return Err(TopologyError::NotFound {
                    what: "component",
                    name: peer.to_string(),
                });
            };
            peer_dims.insert(peer.clone(), component.multiplicity.clone());
            for peer_instance in component.instances() {
                match self.registry.get(&peer_instance) {
                    Some(locations) => {
                        peer_locations.insert(peer_instance, locations.to_vec());
                    }
                    None => missing.push(peer_instance),
                }
            }
        }

        if !missing.is_empty() {
            debug!(%instance, missing = missing.len(), "peers pending");
            return Ok(PeerLookup::PeersPending { missing });
        }

        let conduits: Vec<_> = self.store.get_conduits(&kernel).into_iter().cloned().collect();
        let info = PeerInfo::new(kernel, index, &conduits, peer_dims, peer_locations)?;
        debug!(%instance, peers = peer_kernels.len(), "peers resolved");
        Ok(PeerLookup::Ready(info))
    }

    /// Split `instance` into kernel and index and check both against the
    /// model.
    fn check_instance(&self, instance: &Reference) -> Result<(Reference, Index), TopologyError> {
        let kernel = instance.without_trailing_ints();
        let index = instance.trailing_ints();
        let invalid = || TopologyError::InvalidInstance {
            instance: instance.to_string(),
        };
        let dims = self.store.dims(&kernel).ok_or_else(invalid)?;
        if dims.len() != index.len() || index.iter().zip(dims).any(|(i, d)| i >= d) {
            return Err(invalid());
        }
        Ok((kernel, index))
    }
}
