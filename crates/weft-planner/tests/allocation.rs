//! Integration tests: allocation properties over generated clusters.

use proptest::prelude::*;

use weft_core::{Component, Model, ResourceRequirements};
use weft_planner::{Allocation, Planner, PlannerError};
use weft_test_utils::{cluster, macro_micro_model, r};

fn all_disjoint(alloc: &Allocation) -> bool {
    let values: Vec<_> = alloc.values().collect();
    values
        .iter()
        .enumerate()
        .all(|(i, a)| values[i + 1..].iter().all(|b| a.is_disjoint(b)))
}

fn node_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("node{i:03}")).collect()
}

#[test]
fn macro_micro_fits_on_small_cluster() {
    let model = macro_micro_model();
    let planner = Planner::new(cluster(&[("node000", 4), ("node001", 4), ("node002", 4)]));
    let alloc = planner.allocate_all(&model, false).unwrap();

    assert_eq!(alloc.len(), 11);
    assert_eq!(alloc[&r("macro")].total_cores(), 2);
    assert_eq!(alloc.keys().nth(1), Some(&r("micro[0]")));
    assert!(all_disjoint(&alloc));
}

#[test]
fn macro_micro_needs_oversubscription_on_one_core() {
    let model = macro_micro_model();
    let planner = Planner::new(cluster(&[("laptop", 2)]));
    assert!(matches!(
        planner.allocate_all(&model, false),
        Err(PlannerError::InsufficientResources { .. })
    ));
    let alloc = planner.allocate_all(&model, true).unwrap();
    assert_eq!(alloc.len(), 11);
}

proptest! {
    #[test]
    fn single_core_instances_fit_when_total_fits(
        cores in prop::collection::vec(1u32..6, 1..5),
        counts in prop::collection::vec(1usize..5, 1..4),
    ) {
        let names = node_names(cores.len());
        let nodes: Vec<(&str, u32)> = names.iter().map(String::as_str).zip(cores.iter().copied()).collect();
        let available: u32 = cores.iter().sum();
        let requested: usize = counts.iter().sum();

        let components = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| Component::new(r(&format!("comp{i}")), vec![n]))
            .collect();
        let model = Model {
            name: "prop".parse().unwrap(),
            components,
            conduits: vec![],
            resources: Default::default(),
        };

        let result = Planner::new(cluster(&nodes)).allocate_all(&model, false);
        if requested <= available as usize {
            let alloc = result.unwrap();
            prop_assert_eq!(alloc.len(), requested);
            prop_assert!(all_disjoint(&alloc));
        } else {
            let is_insufficient = matches!(result, Err(PlannerError::InsufficientResources { .. }));
            prop_assert!(is_insufficient);
        }
    }

    #[test]
    fn allocations_are_disjoint_and_deterministic(
        cores in prop::collection::vec(1u32..9, 1..4),
        threads in prop::collection::vec(1u32..4, 1..4),
        mpi in 1u32..3,
    ) {
        let names = node_names(cores.len());
        let nodes: Vec<(&str, u32)> = names.iter().map(String::as_str).zip(cores.iter().copied()).collect();

        let mut components: Vec<Component> = threads
            .iter()
            .enumerate()
            .map(|(i, _)| Component::new(r(&format!("t{i}")), vec![2]))
            .collect();
        components.push(Component::new(r("solver"), vec![]));
        let mut model = Model {
            name: "prop".parse().unwrap(),
            components,
            conduits: vec![],
            resources: Default::default(),
        };
        for (i, &t) in threads.iter().enumerate() {
            model.resources.insert(r(&format!("t{i}")), ResourceRequirements::threads(t));
        }
        model.resources.insert(r("solver"), ResourceRequirements::mpi(mpi, 1));

        let planner = Planner::new(cluster(&nodes));
        let first = planner.allocate_all(&model, false);
        let second = planner.allocate_all(&model, false);
        prop_assert_eq!(&first, &second);

        if let Ok(alloc) = first {
            prop_assert!(all_disjoint(&alloc));
            for (instance, res) in &alloc {
                let base = instance.without_trailing_ints();
                let wanted = model.requirements(&base).total_cores() as usize;
                prop_assert_eq!(res.total_cores(), wanted);
            }
        }
    }
}
