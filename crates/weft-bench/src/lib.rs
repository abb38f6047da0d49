//! Benchmark profiles for the Weft coupling core.
//!
//! - [`fan_out_profile`]: one `macro` driving `micro[n]` both ways
//! - [`cluster_profile`]: `nodes` nodes of `cores` cores each

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use weft_core::{Model, ModelError, Resources};

/// A scalar `macro` sending to and receiving from every instance of
/// `micro[n]`. Each micro instance requests `threads` cores.
pub fn fan_out_profile(n: usize, threads: u32) -> Result<Model, ModelError> {
    Model::from_toml_str(&format!(
        r#"
        name = "fan_out"

        [[components]]
        name = "macro"
        ports = [
            {{ name = "state_out", operator = "o_i" }},
            {{ name = "state_in", operator = "s" }},
        ]

        [[components]]
        name = "micro"
        multiplicity = [{n}]
        ports = [
            {{ name = "init_in", operator = "f_init" }},
            {{ name = "final_out", operator = "o_f" }},
        ]

        [[conduits]]
        sender = "macro.state_out"
        receiver = "micro.init_in"

        [[conduits]]
        sender = "micro.final_out"
        receiver = "macro.state_in"

        [resources.micro]
        threads = {threads}
        "#
    ))
}

/// `nodes` nodes named `node000`, `node001`, ... with `cores` cores each.
pub fn cluster_profile(nodes: usize, cores: u32) -> Resources {
    let mut resources = Resources::new();
    for node in 0..nodes {
        resources.add_cores(&format!("node{node:03}"), 0..cores);
    }
    resources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_profile_validates() {
        let model = fan_out_profile(100, 2).unwrap();
        assert_eq!(model.instances().count(), 101);
    }

    #[test]
    fn cluster_profile_sizes() {
        let cluster = cluster_profile(4, 16);
        assert_eq!(cluster.node_count(), 4);
        assert_eq!(cluster.total_cores(), 64);
        assert!(cluster.cores_on("node003").is_some());
    }
}
