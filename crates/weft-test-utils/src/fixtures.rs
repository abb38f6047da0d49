//! Reusable coupling models.
//!
//! - [`macro_micro_model`]: a scalar `macro` driving ten `micro` instances.
//! - [`ring_model`]: `n` scalar components passing a message around a ring.

use weft_core::{Component, Conduit, Model, Operator, Port};

use crate::r;

/// TOML text of the macro–micro model.
pub const MACRO_MICRO_TOML: &str = r#"
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
    { name = "final_out", operator = "o_f" },
]

[[conduits]]
sender = "macro.state_out"
receiver = "micro.init_in"

[[conduits]]
sender = "micro.final_out"
receiver = "macro.state_in"

[resources.macro]
threads = 2
"#;

/// Scalar `macro` coupled to `micro[10]` in both directions.
pub fn macro_micro_model() -> Model {
    Model::from_toml_str(MACRO_MICRO_TOML)
        .unwrap_or_else(|e| panic!("macro_micro fixture is invalid: {e}"))
}

/// Components `c0 .. c{n-1}`, each sending on `out` to the next one's `in`.
pub fn ring_model(n: usize) -> Model {
    assert!(n >= 2, "a ring needs at least two components");
    let components = (0..n)
        .map(|i| {
            let mut c = Component::new(r(&format!("c{i}")), vec![]);
            c.ports = vec![
                Port {
                    name: "out".parse().unwrap(),
                    operator: Operator::OF,
                    cardinality: Default::default(),
                },
                Port {
                    name: "in".parse().unwrap(),
                    operator: Operator::FInit,
                    cardinality: Default::default(),
                },
            ];
            c
        })
        .collect();
    let conduits = (0..n)
        .map(|i| {
            Conduit::parse(&format!("c{i}.out"), &format!("c{}.in", (i + 1) % n))
                .unwrap_or_else(|e| panic!("ring conduit: {e}"))
        })
        .collect();
    Model {
        name: "ring".parse().unwrap(),
        components,
        conduits,
        resources: Default::default(),
    }
}
