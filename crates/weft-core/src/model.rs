//! The coupling model: components, their ports, and the conduits between them.
//!
//! A [`Model`] is loaded once at run start (typically from TOML via
//! [`Model::from_toml_str`]) and is read-only afterwards.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::reference::{Identifier, Index, Reference};
use crate::resources::ResourceRequirements;

// ── Ports ───────────────────────────────────────────────────────

/// The role of a port in the submodel execution loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Not tied to a loop phase; may send or receive.
    #[serde(rename = "none")]
    None,
    /// Receives initial state before the loop (`F_INIT`).
    #[serde(rename = "f_init")]
    FInit,
    /// Sends intermediate state each iteration (`O_I`).
    #[serde(rename = "o_i")]
    OI,
    /// Receives during each iteration (`S`).
    #[serde(rename = "s")]
    S,
    /// Sends the final state after the loop (`O_F`).
    #[serde(rename = "o_f")]
    OF,
}

impl Operator {
    /// Whether ports with this operator may send.
    pub fn allows_sending(self) -> bool {
        matches!(self, Self::None | Self::OI | Self::OF)
    }

    /// Whether ports with this operator may receive.
    pub fn allows_receiving(self) -> bool {
        matches!(self, Self::None | Self::FInit | Self::S)
    }
}

/// Whether a port carries a single stream or one stream per slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// A single, unindexed port.
    #[default]
    Scalar,
    /// A vector port with a fixed number of slots.
    Vector {
        /// Number of slots.
        length: usize,
    },
    /// A vector port whose length is set at run time.
    Resizable,
}

/// A named message endpoint on a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within its component.
    pub name: Identifier,
    /// Loop phase the port belongs to.
    pub operator: Operator,
    /// Scalar or vector.
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl Port {
    /// Whether this is a vector port (fixed or resizable).
    pub fn is_vector(&self) -> bool {
        !matches!(self.cardinality, Cardinality::Scalar)
    }
}

// ── Component ───────────────────────────────────────────────────

/// A named role in the coupling graph, instantiated once per element of
/// its multiplicity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Component name; a reference without index parts.
    pub name: Reference,
    /// Shape of the instance array. Empty means a single instance.
    #[serde(default)]
    pub multiplicity: Vec<usize>,
    /// Declared ports. When empty, conduits are not checked against ports.
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Component {
    /// A component with no ports declared.
    pub fn new(name: Reference, multiplicity: Vec<usize>) -> Self {
        Self {
            name,
            multiplicity,
            ports: Vec::new(),
        }
    }

    /// Number of instances: the product of the multiplicity.
    pub fn instance_count(&self) -> usize {
        self.multiplicity.iter().product()
    }

    /// Iterate over instance references in row-major order:
    /// `micro[0][0]`, `micro[0][1]`, …
    pub fn instances(&self) -> Instances<'_> {
        let next = if self.multiplicity.contains(&0) {
            None
        } else {
            Some(self.multiplicity.iter().map(|_| 0).collect())
        };
        Instances {
            name: &self.name,
            dims: &self.multiplicity,
            next,
        }
    }

    /// Look up a declared port by name.
    pub fn port(&self, name: &Identifier) -> Option<&Port> {
        self.ports.iter().find(|p| &p.name == name)
    }
}

/// Row-major iterator over a component's instances.
#[derive(Clone, Debug)]
pub struct Instances<'a> {
    name: &'a Reference,
    dims: &'a [usize],
    next: Option<Index>,
}

impl Iterator for Instances<'_> {
    type Item = Reference;

    fn next(&mut self) -> Option<Reference> {
        let current = self.next.take()?;
        let instance = self.name.with_index(&current);

        // Odometer increment; exhausting the most significant digit ends
        // the sequence. Scalars (no dims) yield exactly once.
        let mut following = current;
        let mut carry = true;
        for d in (0..self.dims.len()).rev() {
            following[d] += 1;
            if following[d] < self.dims[d] {
                carry = false;
                break;
            }
            following[d] = 0;
        }
        if !carry {
            self.next = Some(following);
        }
        Some(instance)
    }
}

// ── Conduit ─────────────────────────────────────────────────────

/// A declared connection from a sending port to a receiving port.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawConduit", into = "RawConduit")]
pub struct Conduit {
    sender: Reference,
    receiver: Reference,
    sending: (Reference, Identifier),
    receiving: (Reference, Identifier),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawConduit {
    sender: Reference,
    receiver: Reference,
}

impl TryFrom<RawConduit> for Conduit {
    type Error = ModelError;

    fn try_from(raw: RawConduit) -> Result<Self, Self::Error> {
        Self::new(raw.sender, raw.receiver)
    }
}

impl From<Conduit> for RawConduit {
    fn from(c: Conduit) -> Self {
        Self {
            sender: c.sender,
            receiver: c.receiver,
        }
    }
}

/// `component.port` with no index parts, split into its two halves.
fn split_endpoint(endpoint: &Reference) -> Result<(Reference, Identifier), ModelError> {
    match endpoint.split_last_id() {
        Some((component, port)) if !endpoint.has_index() => Ok((component, port.clone())),
        _ => Err(ModelError::MalformedConduit {
            endpoint: endpoint.to_string(),
        }),
    }
}

impl Conduit {
    /// Create a conduit. Both endpoints must be `component.port` with no
    /// index parts.
    pub fn new(sender: Reference, receiver: Reference) -> Result<Self, ModelError> {
        let sending = split_endpoint(&sender)?;
        let receiving = split_endpoint(&receiver)?;
        Ok(Self {
            sender,
            receiver,
            sending,
            receiving,
        })
    }

    /// Parse both endpoints and create a conduit.
    pub fn parse(sender: &str, receiver: &str) -> Result<Self, ModelError> {
        Self::new(sender.parse()?, receiver.parse()?)
    }

    /// The full sending endpoint, e.g. `macro.out`.
    pub fn sender(&self) -> &Reference {
        &self.sender
    }

    /// The full receiving endpoint, e.g. `micro.in`.
    pub fn receiver(&self) -> &Reference {
        &self.receiver
    }

    /// The sending component, e.g. `macro`.
    pub fn sending_component(&self) -> Reference {
        self.sending.0.clone()
    }

    /// The sending port name, e.g. `out`.
    pub fn sending_port(&self) -> Identifier {
        self.sending.1.clone()
    }

    /// The receiving component, e.g. `micro`.
    pub fn receiving_component(&self) -> Reference {
        self.receiving.0.clone()
    }

    /// The receiving port name, e.g. `in`.
    pub fn receiving_port(&self) -> Identifier {
        self.receiving.1.clone()
    }
}

// ── Model ───────────────────────────────────────────────────────

/// A complete coupling description: components, conduits and resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: Identifier,
    /// Components in declaration order.
    #[serde(default)]
    pub components: Vec<Component>,
    /// Conduits between component ports.
    #[serde(default)]
    pub conduits: Vec<Conduit>,
    /// Per-component resource requests; unlisted components get one core.
    #[serde(default)]
    pub resources: IndexMap<Reference, ResourceRequirements>,
}

impl Model {
    /// Parse a model from TOML and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, ModelError> {
        let model: Model = toml::from_str(text).map_err(|e| ModelError::Parse {
            reason: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        // 1. Component names unique, unindexed, with non-empty dimensions.
        let mut seen = HashSet::new();
        for component in &self.components {
            let name = component.name.to_string();
            if component.name.has_index() {
                return Err(ModelError::IndexedComponentName { name });
            }
            if component.multiplicity.contains(&0) {
                return Err(ModelError::EmptyDimension {
                    name,
                    multiplicity: component.multiplicity.clone(),
                });
            }
            if !seen.insert(component.name.clone()) {
                return Err(ModelError::DuplicateComponent { name });
            }
        }

        // 2. Conduits connect declared components (and ports, if declared).
        for conduit in &self.conduits {
            self.check_endpoint(
                &conduit.sending_component(),
                &conduit.sending_port(),
                "sending",
                Operator::allows_sending,
            )?;
            self.check_endpoint(
                &conduit.receiving_component(),
                &conduit.receiving_port(),
                "receiving",
                Operator::allows_receiving,
            )?;
        }

        // 3. Resource requests name declared components and are well formed.
        for (name, requirements) in &self.resources {
            if self.component(name).is_none() {
                return Err(ModelError::UnknownComponent {
                    name: name.to_string(),
                });
            }
            requirements.validate()?;
        }
        Ok(())
    }

    fn check_endpoint(
        &self,
        component: &Reference,
        port: &Identifier,
        direction: &'static str,
        allowed: fn(Operator) -> bool,
    ) -> Result<(), ModelError> {
        let comp = self
            .component(component)
            .ok_or_else(|| ModelError::UnknownComponent {
                name: component.to_string(),
            })?;
        if comp.ports.is_empty() {
            return Ok(());
        }
        match comp.port(port) {
            Some(p) if allowed(p.operator) => Ok(()),
            _ => Err(ModelError::UnknownPort {
                component: component.to_string(),
                port: port.to_string(),
                direction,
            }),
        }
    }

    /// Look up a component by name.
    pub fn component(&self, name: &Reference) -> Option<&Component> {
        self.components.iter().find(|c| &c.name == name)
    }

    /// Resource request for a component, defaulting to one thread.
    pub fn requirements(&self, component: &Reference) -> ResourceRequirements {
        self.resources.get(component).cloned().unwrap_or_default()
    }

    /// All instances of all components: components in declaration order,
    /// each component's instances in row-major order.
    pub fn instances(&self) -> impl Iterator<Item = Reference> + '_ {
        self.components.iter().flat_map(Component::instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Reference {
        text.parse().unwrap()
    }

    const MACRO_MICRO: &str = r#"
        name = "macro_micro"

        [[components]]
        name = "macro"
        ports = [
            { name = "state_out", operator = "o_i" },
            { name = "state_in", operator = "s" },
        ]

        [[components]]
        name = "micro"
        multiplicity = [10]
        ports = [
            { name = "init_in", operator = "f_init" },
            { name = "final_out", operator = "o_f", cardinality = "scalar" },
        ]

        [[conduits]]
        sender = "macro.state_out"
        receiver = "micro.init_in"

        [[conduits]]
        sender = "micro.final_out"
        receiver = "macro.state_in"

        [resources.micro]
        threads = 2

        [resources.macro]
        mpi_processes = 4
        nodes = ["node001"]
    "#;

    #[test]
    fn loads_macro_micro_from_toml() {
        let model = Model::from_toml_str(MACRO_MICRO).unwrap();
        assert_eq!(model.name.as_str(), "macro_micro");
        assert_eq!(model.components.len(), 2);
        assert_eq!(model.conduits[0].sending_component(), r("macro"));
        assert_eq!(model.conduits[0].receiving_port().as_str(), "init_in");
        assert_eq!(model.requirements(&r("micro")).total_cores(), 2);
        assert_eq!(model.requirements(&r("macro")).total_cores(), 4);
        assert_eq!(model.instances().count(), 11);
    }

    #[test]
    fn unknown_port_direction_is_rejected() {
        let text = MACRO_MICRO.replace(
            "sender = \"macro.state_out\"",
            "sender = \"macro.state_in\"",
        );
        match Model::from_toml_str(&text) {
            Err(ModelError::UnknownPort { direction, .. }) => assert_eq!(direction, "sending"),
            other => panic!("expected UnknownPort, got {other:?}"),
        }
    }

    #[test]
    fn requirement_for_unknown_component_is_rejected() {
        let text = MACRO_MICRO.replace("[resources.micro]", "[resources.meso]");
        match Model::from_toml_str(&text) {
            Err(ModelError::UnknownComponent { name }) => assert_eq!(name, "meso"),
            other => panic!("expected UnknownComponent, got {other:?}"),
        }
    }

    #[test]
    fn malformed_conduit_is_a_parse_error() {
        let text = MACRO_MICRO.replace("receiver = \"micro.init_in\"", "receiver = \"micro\"");
        assert!(matches!(
            Model::from_toml_str(&text),
            Err(ModelError::Parse { .. })
        ));
    }

    #[test]
    fn duplicate_and_empty_components_are_rejected() {
        let mut model = Model::from_toml_str(MACRO_MICRO).unwrap();
        model.components.push(Component::new(r("micro"), vec![]));
        assert!(matches!(
            model.validate(),
            Err(ModelError::DuplicateComponent { .. })
        ));

        let mut model = Model::from_toml_str(MACRO_MICRO).unwrap();
        model.components[1].multiplicity = vec![3, 0];
        assert!(matches!(
            model.validate(),
            Err(ModelError::EmptyDimension { .. })
        ));
    }

    #[test]
    fn instances_are_row_major() {
        let component = Component::new(r("grid"), vec![2, 3]);
        let names: Vec<String> = component.instances().map(|i| i.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "grid[0][0]",
                "grid[0][1]",
                "grid[0][2]",
                "grid[1][0]",
                "grid[1][1]",
                "grid[1][2]",
            ]
        );
        assert_eq!(component.instance_count(), 6);
    }

    #[test]
    fn scalar_component_has_one_unindexed_instance() {
        let component = Component::new(r("macro"), vec![]);
        let names: Vec<Reference> = component.instances().collect();
        assert_eq!(names, vec![r("macro")]);
        assert_eq!(component.instance_count(), 1);
    }

    #[test]
    fn conduit_requires_component_and_port() {
        assert!(Conduit::parse("macro", "micro.in").is_err());
        assert!(Conduit::parse("macro[1].out", "micro.in").is_err());
        let c = Conduit::parse("a.b.out", "micro.in").unwrap();
        assert_eq!(c.sending_component(), r("a.b"));
        assert_eq!(c.sending_port().as_str(), "out");
    }

    #[test]
    fn operator_directions() {
        assert!(Operator::OI.allows_sending());
        assert!(!Operator::OI.allows_receiving());
        assert!(Operator::FInit.allows_receiving());
        assert!(Operator::None.allows_sending() && Operator::None.allows_receiving());
    }
}
