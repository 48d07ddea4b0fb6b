//! Property 1 (§8): resolving the same input twice yields identical
//! `install_actions` ordering, feature sets, and ABI-relevant data.

use portkit::core::dependency::Dependency;
use portkit::core::resolver::{resolve, ResolverInput, ResolverPolicy};
use portkit::core::spec::{PackageSpec, PortName, Triplet};
use portkit_resolver_tests::{linux_vars, port, relaxed, FakeRegistry, FixedVars};
use proptest::prelude::*;

fn build_registry(port_count: u8) -> FakeRegistry {
    let mut registry = FakeRegistry::new();
    for i in 0..port_count {
        let mut scf = port(&format!("p{i}"), relaxed(&((i as u64) + 1).to_string()));
        if i > 0 {
            scf = scf.depends_on(Dependency::new(format!("p{}", i - 1)));
        }
        registry.publish(scf);
    }
    registry
}

fn resolve_top(port_count: u8) -> portkit::core::plan::ActionPlan {
    let registry = build_registry(port_count);
    let vars = FixedVars(linux_vars());
    let input = ResolverInput {
        root_dependencies: vec![Dependency::new(format!("p{}", port_count - 1))],
        overrides: Vec::new(),
        toplevel: PackageSpec::new(PortName::new("app").unwrap(), Triplet::new("x64-linux")),
        host_triplet: Triplet::new("x64-linux"),
        overlay: &registry,
        registry: &registry,
        baseline: &registry,
        triplet_vars: &vars,
        policy: ResolverPolicy::default(),
        already_installed: &[],
    };
    resolve(input).unwrap()
}

proptest! {
    #[test]
    fn resolving_twice_yields_identical_plans(port_count in 1u8..12) {
        let first = resolve_top(port_count);
        let second = resolve_top(port_count);

        let first_names: Vec<String> = first.install_actions.iter().map(|a| a.spec.to_string()).collect();
        let second_names: Vec<String> = second.install_actions.iter().map(|a| a.spec.to_string()).collect();
        prop_assert_eq!(first_names, second_names);

        let first_features: Vec<Vec<String>> = first
            .install_actions
            .iter()
            .map(|a| a.feature_list.iter().map(|f| f.as_str().to_string()).collect())
            .collect();
        let second_features: Vec<Vec<String>> = second
            .install_actions
            .iter()
            .map(|a| a.feature_list.iter().map(|f| f.as_str().to_string()).collect())
            .collect();
        prop_assert_eq!(first_features, second_features);

        prop_assert!(first.is_topologically_sound());
        prop_assert!(second.is_topologically_sound());
    }
}

#[test]
fn linear_chain_resolves_leaves_first() {
    let plan = resolve_top(4);
    let order: Vec<String> = plan.install_actions.iter().map(|a| a.spec.name.as_str().to_string()).collect();
    assert_eq!(order, vec!["p0", "p1", "p2", "p3"]);
    assert_eq!(plan.install_actions[0].scf.version, relaxed("1"));
}
