//! Coordinator-side record of which instances are up and where.

use indexmap::IndexMap;
use tracing::debug;

use weft_core::Reference;

use crate::error::TopologyError;
use crate::peer_info::Locations;

/// Instances that have registered, with the locations they published.
#[derive(Clone, Debug, Default)]
pub struct InstanceRegistry {
    locations: IndexMap<Reference, Locations>,
}

impl InstanceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `instance` is reachable at `locations`.
    pub fn add(&mut self, instance: Reference, locations: Locations) -> Result<(), TopologyError> {
        if self.locations.contains_key(&instance) {
            return Err(TopologyError::AlreadyRegistered {
                instance: instance.to_string(),
            });
        }
        debug!(%instance, ?locations, "instance registered");
        self.locations.insert(instance, locations);
        Ok(())
    }

    /// Forget `instance`. Returns its locations if it was registered.
    pub fn remove(&mut self, instance: &Reference) -> Option<Locations> {
        let removed = self.locations.shift_remove(instance);
        if removed.is_some() {
            debug!(%instance, "instance deregistered");
        }
        removed
    }

    /// Locations of `instance`, if registered.
    pub fn get(&self, instance: &Reference) -> Option<&[String]> {
        self.locations.get(instance).map(Vec::as_slice)
    }

    /// Whether `instance` is registered.
    pub fn contains(&self, instance: &Reference) -> bool {
        self.locations.contains_key(instance)
    }

    /// Registered instances, in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &Reference> {
        self.locations.keys()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_fails_until_removed() {
        let mut reg = InstanceRegistry::new();
        let inst: Reference = "micro[2]".parse().unwrap();
        reg.add(inst.clone(), vec!["direct:1".into()]).unwrap();
        assert_eq!(
            reg.add(inst.clone(), vec![]),
            Err(TopologyError::AlreadyRegistered {
                instance: "micro[2]".into()
            })
        );
        assert_eq!(reg.get(&inst), Some(&["direct:1".to_string()][..]));

        assert_eq!(reg.remove(&inst), Some(vec!["direct:1".to_string()]));
        assert!(reg.remove(&inst).is_none());
        assert!(reg.is_empty());
        reg.add(inst, vec!["direct:2".into()]).unwrap();
        assert_eq!(reg.len(), 1);
    }
}
