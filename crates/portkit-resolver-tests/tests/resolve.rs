//! Scenario-level resolver tests (§8 S1-S6). Each test stands up a small
//! in-memory registry and asserts on the emitted `ActionPlan` or the
//! resulting `ResolveError`, the same granularity cargo's own
//! `resolver-tests` crate works at.

use portkit::core::dependency::{Dependency, DependencyOverride};
use portkit::core::resolver::errors::ResolveError;
use portkit::core::resolver::{resolve, ResolverInput, ResolverPolicy};
use portkit::core::spec::{PackageSpec, PortName, Triplet};
use portkit_resolver_tests::{linux_vars, port, relaxed, semver, FakeRegistry, FixedVars};

fn toplevel(triplet: &str) -> PackageSpec {
    PackageSpec::new(PortName::new("app").unwrap(), Triplet::new(triplet))
}

fn default_input<'a>(
    root_dependencies: Vec<Dependency>,
    registry: &'a FakeRegistry,
    vars: &'a FixedVars,
) -> ResolverInput<'a> {
    ResolverInput {
        root_dependencies,
        overrides: Vec::new(),
        toplevel: toplevel("x64-linux"),
        host_triplet: Triplet::new("x64-linux"),
        overlay: registry,
        registry,
        baseline: registry,
        triplet_vars: vars,
        policy: ResolverPolicy::default(),
        already_installed: &[],
    }
}

/// S1: a single port with no dependencies installs at its baseline version.
#[test]
fn s1_single_port_install() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("zlib", semver("1.3.0")));
    let vars = FixedVars(linux_vars());

    let plan = resolve(default_input(vec![Dependency::new("zlib")], &registry, &vars)).unwrap();

    assert_eq!(plan.install_actions.len(), 1);
    assert_eq!(plan.install_actions[0].spec.name.as_str(), "zlib");
    assert_eq!(plan.install_actions[0].scf.version, semver("1.3.0"));
    assert!(plan.is_topologically_sound());
}

/// S2: a diamond (`app -> a -> c`, `app -> b -> c`) under the Relaxed scheme
/// resolves `c` to the higher of the two floors a and b impose, and installs
/// `c` before both `a` and `b`.
#[test]
fn s2_diamond_resolves_to_highest_floor() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("c", relaxed("2.5")));
    registry.publish(
        port("a", relaxed("1.0")).depends_on(Dependency::new("c").with_minimum(relaxed("2.0"))),
    );
    registry.publish(
        port("b", relaxed("1.0")).depends_on(Dependency::new("c").with_minimum(relaxed("2.5"))),
    );
    let vars = FixedVars(linux_vars());

    let plan = resolve(default_input(
        vec![Dependency::new("a"), Dependency::new("b")],
        &registry,
        &vars,
    ))
    .unwrap();

    let c_index = plan.install_actions.iter().position(|a| a.spec.name.as_str() == "c").unwrap();
    let a_index = plan.install_actions.iter().position(|a| a.spec.name.as_str() == "a").unwrap();
    let b_index = plan.install_actions.iter().position(|a| a.spec.name.as_str() == "b").unwrap();
    assert!(c_index < a_index);
    assert!(c_index < b_index);
    assert_eq!(plan.install_actions[c_index].scf.version, relaxed("2.5"));
    assert!(plan.is_topologically_sound());
}

/// S3: `a -> b -> a` is a cycle; the resolver reports it rather than
/// recursing forever, naming the cycle's member ports.
#[test]
fn s3_cycle_is_detected() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("a", semver("1.0.0")).depends_on(Dependency::new("b")));
    registry.publish(port("b", semver("1.0.0")).depends_on(Dependency::new("a")));
    let vars = FixedVars(linux_vars());

    let err = resolve(default_input(vec![Dependency::new("a")], &registry, &vars)).unwrap_err();
    match err {
        ResolveError::CycleDetected { path, .. } => {
            assert!(path.iter().any(|p| p.starts_with("a:") && p.ends_with("@1.0.0")));
            assert!(path.iter().any(|p| p.starts_with("b:") && p.ends_with("@1.0.0")));
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

/// S4: two dependents impose incomparable String-scheme floors on the same
/// port -- the resolver cannot pick a winner and reports a localized
/// conflict rather than guessing.
#[test]
fn s4_incomparable_scheme_conflict() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("c", portkit_resolver_tests::string_version("abc")));
    registry.publish(
        port("a", semver("1.0.0"))
            .depends_on(Dependency::new("c").with_minimum(portkit_resolver_tests::string_version("abc"))),
    );
    registry.publish(
        port("b", semver("1.0.0"))
            .depends_on(Dependency::new("c").with_minimum(portkit_resolver_tests::string_version("xyz"))),
    );
    let vars = FixedVars(linux_vars());

    let err = resolve(default_input(
        vec![Dependency::new("a"), Dependency::new("b")],
        &registry,
        &vars,
    ))
    .unwrap_err();
    assert!(matches!(err, ResolveError::VersionIncomparable { .. }));
    assert!(err.to_string().contains("cannot be"));
}

/// S5: an overlay's metadata wins outright even when the baseline has a
/// newer-looking published version -- overlays short-circuit the normal
/// floor comparison entirely.
#[test]
fn s5_overlay_supremacy() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("zlib", semver("1.3.0")));
    registry.overlay(port("zlib", semver("0.1.0-local")));
    let vars = FixedVars(linux_vars());

    let plan = resolve(default_input(vec![Dependency::new("zlib")], &registry, &vars)).unwrap();
    assert_eq!(plan.install_actions[0].scf.version.raw(), "0.1.0-local");
}

/// S6: a dependency with no explicit feature list pulls in the port's
/// platform-gated default features for the resolved triplet.
#[test]
fn s6_default_features_gated_by_triplet() {
    use portkit::core::scf::FeatureParagraph;
    let mut registry = FakeRegistry::new();
    registry.publish(
        port("curl", semver("8.0.0"))
            .with_feature(FeatureParagraph {
                name: "ssl".to_string(),
                dependencies: Vec::new(),
                supports: None,
            })
            .with_feature(FeatureParagraph {
                name: "windows-only".to_string(),
                dependencies: Vec::new(),
                supports: Some(portkit_platform::PlatformExpr::parse("windows").unwrap()),
            })
            .with_default_feature("ssl", None)
            .with_default_feature("windows-only", Some(portkit_platform::PlatformExpr::parse("windows").unwrap())),
    );
    let vars = FixedVars(linux_vars());

    let plan = resolve(default_input(vec![Dependency::new("curl")], &registry, &vars)).unwrap();
    let action = &plan.install_actions[0];
    assert!(action.has_feature("ssl"));
    assert!(!action.has_feature("windows-only"));
    assert!(action.has_feature("core"));
}

/// A requested feature absent from the resolved version of its own target
/// is `VersionMissingFeature`, not the port-wide `UnsupportedFeature`.
#[test]
fn requesting_a_feature_missing_from_the_resolved_version_is_version_missing_feature() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("a", semver("1.0.0")));
    let vars = FixedVars(linux_vars());

    let err =
        resolve(default_input(vec![Dependency::new("a").with_feature("y")], &registry, &vars)).unwrap_err();
    match err {
        ResolveError::VersionMissingFeature { port, version, feature } => {
            assert_eq!(port, "a");
            assert_eq!(version, semver("1.0.0"));
            assert_eq!(feature, "y");
        }
        other => panic!("expected VersionMissingFeature, got {other:?}"),
    }
}

/// The same missing-feature check applies transitively: a dependency's own
/// dependency can be the one missing the requested feature.
#[test]
fn transitively_missing_feature_is_also_version_missing_feature() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("b", semver("1.0.0")));
    registry.publish(
        port("a", semver("1.0.0")).depends_on(Dependency::new("b").with_feature("y")),
    );
    let vars = FixedVars(linux_vars());

    let err = resolve(default_input(vec![Dependency::new("a")], &registry, &vars)).unwrap_err();
    assert!(matches!(err, ResolveError::VersionMissingFeature { ref port, .. } if port == "b"));
}

/// Pinning an override makes the resolver ignore a higher floor a
/// dependency would otherwise impose.
#[test]
fn override_pins_exact_version_despite_higher_floor() {
    let mut registry = FakeRegistry::new();
    registry.publish(port("zlib", semver("1.3.0")));
    registry.publish(port("zlib", semver("1.2.0")));
    registry.publish(
        port("needs-zlib", semver("1.0.0"))
            .depends_on(Dependency::new("zlib").with_minimum(semver("1.3.0"))),
    );
    let vars = FixedVars(linux_vars());

    let mut input = default_input(vec![Dependency::new("needs-zlib")], &registry, &vars);
    input.overrides = vec![DependencyOverride { name: "zlib".to_string(), version: semver("1.2.0") }];

    let plan = resolve(input).unwrap();
    let zlib = plan.install_actions.iter().find(|a| a.spec.name.as_str() == "zlib").unwrap();
    assert_eq!(zlib.scf.version, semver("1.2.0"));
}
