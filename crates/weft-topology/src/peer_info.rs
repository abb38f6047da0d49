//! Per-instance view of who to talk to on each port.
//!
//! A [`PeerInfo`] is built once when an instance registers and is read-only
//! afterwards; it is `Send + Sync` and can be shared by every sending and
//! receiving call site in the instance.
//!
//! # Index rebalancing
//!
//! Instances of different dimensionality talk to each other by moving
//! index entries between the instance index and the port slot. The local
//! index concatenated with the local slot gives a single coordinate; the
//! first `dim(peer)` entries of it become the peer's instance index and the
//! rest become the peer's slot. A scalar `macro` sending on `out[3]`
//! therefore reaches `micro[3].in`, and `micro[3]` sending on `out` reaches
//! `macro.in[3]`.

use std::collections::HashSet;

use indexmap::IndexMap;

use weft_core::{Conduit, Identifier, Index, Reference};

use crate::endpoint::Endpoint;
use crate::error::TopologyError;

/// Network locations published by one instance.
pub type Locations = Vec<String>;

/// One peer port a local port is connected to.
#[derive(Clone, Debug)]
struct PeerPort {
    reference: Reference,
    kernel: Reference,
    port: Identifier,
}

/// Resolved peers of one instance.
#[derive(Clone, Debug)]
pub struct PeerInfo {
    kernel: Reference,
    index: Index,
    /// Local port → connected peer ports, in conduit order.
    peers: IndexMap<Identifier, Vec<PeerPort>>,
    peer_refs: IndexMap<Identifier, Vec<Reference>>,
    peer_dims: IndexMap<Reference, Vec<usize>>,
    peer_locations: IndexMap<Reference, Locations>,
}

impl PeerInfo {
    /// Build peer information for instance `kernel[index]`.
    ///
    /// `conduits` may contain conduits unrelated to `kernel`; they are
    /// ignored. Fails with [`TopologyError::AmbiguousReceivingPort`] when
    /// two conduits end at the same receiving port of `kernel`.
    pub fn new(
        kernel: Reference,
        index: Index,
        conduits: &[Conduit],
        peer_dims: IndexMap<Reference, Vec<usize>>,
        peer_locations: IndexMap<Reference, Locations>,
    ) -> Result<Self, TopologyError> {
        let mut peers: IndexMap<Identifier, Vec<PeerPort>> = IndexMap::new();
        let mut fed: HashSet<Identifier> = HashSet::new();

        for conduit in conduits {
            if conduit.sending_component() == kernel {
                peers
                    .entry(conduit.sending_port())
                    .or_default()
                    .push(PeerPort {
                        reference: conduit.receiver().clone(),
                        kernel: conduit.receiving_component(),
                        port: conduit.receiving_port(),
                    });
            }
            if conduit.receiving_component() == kernel {
                let port = conduit.receiving_port();
                if !fed.insert(port.clone()) {
                    return Err(TopologyError::AmbiguousReceivingPort {
                        kernel: kernel.to_string(),
                        port: port.to_string(),
                    });
                }
                peers.entry(port).or_default().push(PeerPort {
                    reference: conduit.sender().clone(),
                    kernel: conduit.sending_component(),
                    port: conduit.sending_port(),
                });
            }
        }

        let peer_refs = peers
            .iter()
            .map(|(port, list)| (port.clone(), list.iter().map(|p| p.reference.clone()).collect()))
            .collect();

        Ok(Self {
            kernel,
            index,
            peers,
            peer_refs,
            peer_dims,
            peer_locations,
        })
    }

    /// The local component name.
    pub fn kernel(&self) -> &Reference {
        &self.kernel
    }

    /// The local instance index.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// The local instance reference.
    pub fn instance(&self) -> Reference {
        self.kernel.with_index(&self.index)
    }

    /// Whether any conduit attaches to `port`.
    pub fn is_connected(&self, port: &Identifier) -> bool {
        self.peers.contains_key(port)
    }

    /// Peer port references (`component.port`) attached to `port`; empty
    /// when unconnected.
    pub fn get_peer_ports(&self, port: &Identifier) -> &[Reference] {
        self.peer_refs.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every remote endpoint that local `port`, at `slot`, exchanges
    /// messages with.
    pub fn get_peer_endpoints(
        &self,
        port: &Identifier,
        slot: &[usize],
    ) -> Result<Vec<Endpoint>, TopologyError> {
        let peers = self.peers.get(port).ok_or_else(|| TopologyError::NotFound {
            what: "port",
            name: port.to_string(),
        })?;

        let total: Index = self.index.iter().chain(slot).copied().collect();
        peers
            .iter()
            .map(|peer| {
                let dims = self.get_peer_dims(&peer.kernel)?.len();
                if total.len() < dims {
                    return Err(TopologyError::IndexTooShort {
                        peer: peer.kernel.to_string(),
                        needed: dims,
                        got: total.to_vec(),
                    });
                }
                Ok(Endpoint::new(
                    peer.kernel.clone(),
                    Index::from_slice(&total[..dims]),
                    peer.port.clone(),
                    Index::from_slice(&total[dims..]),
                ))
            })
            .collect()
    }

    /// Multiplicity of a peer component.
    pub fn get_peer_dims(&self, peer_kernel: &Reference) -> Result<&[usize], TopologyError> {
        self.peer_dims
            .get(peer_kernel)
            .map(Vec::as_slice)
            .ok_or_else(|| TopologyError::NotFound {
                what: "component",
                name: peer_kernel.to_string(),
            })
    }

    /// Published locations of a peer instance.
    pub fn get_peer_locations(&self, peer_instance: &Reference) -> Result<&[String], TopologyError> {
        self.peer_locations
            .get(peer_instance)
            .map(Vec::as_slice)
            .ok_or_else(|| TopologyError::NotFound {
                what: "instance",
                name: peer_instance.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn r(text: &str) -> Reference {
        text.parse().unwrap()
    }

    fn id(text: &str) -> Identifier {
        text.parse().unwrap()
    }

    fn conduits() -> Vec<Conduit> {
        vec![
            Conduit::parse("macro.out", "micro.in").unwrap(),
            Conduit::parse("micro.out", "macro.in").unwrap(),
            Conduit::parse("other.out", "third.in").unwrap(),
        ]
    }

    fn dims() -> IndexMap<Reference, Vec<usize>> {
        IndexMap::from([(r("macro"), vec![]), (r("micro"), vec![10])])
    }

    #[test]
    fn ignores_unrelated_conduits() {
        let info = PeerInfo::new(r("macro"), smallvec![], &conduits(), dims(), IndexMap::new())
            .unwrap();
        assert!(info.is_connected(&id("out")));
        assert!(info.is_connected(&id("in")));
        assert!(!info.is_connected(&id("state")));
        assert_eq!(info.get_peer_ports(&id("out")), &[r("micro.in")]);
        assert!(info.get_peer_ports(&id("state")).is_empty());
    }

    #[test]
    fn sending_port_fans_out() {
        let mut cs = conduits();
        cs.push(Conduit::parse("macro.out", "monitor.in").unwrap());
        let mut d = dims();
        d.insert(r("monitor"), vec![]);
        let info = PeerInfo::new(r("macro"), smallvec![], &cs, d, IndexMap::new()).unwrap();

        let eps = info.get_peer_endpoints(&id("out"), &[4]).unwrap();
        let rendered: Vec<String> = eps.iter().map(Endpoint::to_string).collect();
        assert_eq!(rendered, vec!["micro[4].in", "monitor.in[4]"]);
    }

    #[test]
    fn doubly_fed_receiving_port_is_rejected() {
        let mut cs = conduits();
        cs.push(Conduit::parse("monitor.out", "macro.in").unwrap());
        let err = PeerInfo::new(r("macro"), smallvec![], &cs, dims(), IndexMap::new()).unwrap_err();
        assert_eq!(
            err,
            TopologyError::AmbiguousReceivingPort {
                kernel: "macro".into(),
                port: "in".into(),
            }
        );
    }

    #[test]
    fn short_index_cannot_address_array_peer() {
        let info = PeerInfo::new(r("macro"), smallvec![], &conduits(), dims(), IndexMap::new())
            .unwrap();
        assert!(matches!(
            info.get_peer_endpoints(&id("out"), &[]),
            Err(TopologyError::IndexTooShort { needed: 1, .. })
        ));
    }

    #[test]
    fn lookups_report_not_found() {
        let locations = IndexMap::from([(r("micro[0]"), vec!["tcp:10.0.0.1:9000".to_string()])]);
        let info = PeerInfo::new(r("macro"), smallvec![], &conduits(), dims(), locations).unwrap();

        assert_eq!(info.get_peer_dims(&r("micro")).unwrap(), &[10]);
        assert_eq!(
            info.get_peer_locations(&r("micro[0]")).unwrap(),
            &["tcp:10.0.0.1:9000".to_string()]
        );
        assert!(matches!(
            info.get_peer_dims(&r("nowhere")),
            Err(TopologyError::NotFound { what: "component", .. })
        ));
        assert!(matches!(
            info.get_peer_locations(&r("micro[1]")),
            Err(TopologyError::NotFound { what: "instance", .. })
        ));
        assert!(matches!(
            info.get_peer_endpoints(&id("state"), &[]),
            Err(TopologyError::NotFound { what: "port", .. })
        ));
    }

    #[test]
    fn peer_info_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PeerInfo>();
    }
}
