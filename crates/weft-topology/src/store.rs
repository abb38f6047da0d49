//! Static coupling topology extracted from a model.

use indexmap::IndexMap;

use weft_core::{Component, Conduit, Model, Reference};

/// Components and conduits of a model, indexed for peer lookups.
#[derive(Clone, Debug)]
pub struct TopologyStore {
    components: IndexMap<Reference, Component>,
    conduits: Vec<Conduit>,
}

impl TopologyStore {
    /// Index the components and conduits of `model`.
    pub fn new(model: &Model) -> Self {
        Self {
            components: model
                .components
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            conduits: model.conduits.clone(),
        }
    }

    /// Whether `kernel` is a declared component.
    pub fn has_component(&self, kernel: &Reference) -> bool {
        self.components.contains_key(kernel)
    }

    /// The declared component named `kernel`.
    pub fn component(&self, kernel: &Reference) -> Option<&Component> {
        self.components.get(kernel)
    }

    /// Multiplicity of `kernel`.
    pub fn dims(&self, kernel: &Reference) -> Option<&[usize]> {
        self.components.get(kernel).map(|c| c.multiplicity.as_slice())
    }

    /// Conduits that start or end at `kernel`, in declaration order.
    pub fn get_conduits(&self, kernel: &Reference) -> Vec<&Conduit> {
        self.conduits
            .iter()
            .filter(|c| &c.sending_component() == kernel || &c.receiving_component() == kernel)
            .collect()
    }

    /// Components sharing a conduit with `kernel`, each listed once, in
    /// conduit order.
    pub fn get_peer_kernels(&self, kernel: &Reference) -> Vec<Reference> {
        let mut peers: Vec<Reference> = Vec::new();
        for conduit in &self.conduits {
            let sender = conduit.sending_component();
            let receiver = conduit.receiving_component();
            let peer = if &sender == kernel {
                receiver
            } else if &receiver == kernel {
                sender
            } else {
                continue;
            };
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        peers
    }
}
