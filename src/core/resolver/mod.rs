//! The resolver (C4): turns a root requirement set into a topologically
//! ordered `ActionPlan`, or a localized error (§7).

pub mod context;
pub mod errors;

use std::collections::{HashMap, HashSet, VecDeque};

use portkit_platform::PlatformExpr;
use tracing::{debug, trace};

use crate::core::dependency::{Dependency, DependencyOverride, VersionConstraint};
use crate::core::plan::{ActionPlan, BuildFlags, FeatureDependencyEdge, InstallPlanAction, RequestType};
use crate::core::providers::{BaselineProvider, OverlayProvider, VersionedPortfileProvider};
use crate::core::scf::SourceControlFile;
use crate::core::spec::{FeatureName, PackageSpec, Triplet, CORE_FEATURE, DEFAULT_FEATURE};
use crate::core::version::{compare, Comparison, Version};

use self::context::{Node, VersionSource};
use self::errors::ResolveError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedPortAction {
    Error,
    Warn,
    Allow,
}

#[derive(Clone, Debug)]
pub struct ResolverPolicy {
    pub unsupported_port_action: UnsupportedPortAction,
    pub use_head_version: HashSet<String>,
    pub editable: HashSet<String>,
    pub allow_unsupported: HashSet<String>,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        ResolverPolicy {
            unsupported_port_action: UnsupportedPortAction::Error,
            use_head_version: HashSet::new(),
            editable: HashSet::new(),
            allow_unsupported: HashSet::new(),
        }
    }
}

/// Supplies the `name -> bool` variable map for a given triplet. Kept as a
/// trait so callers can back it with a lazily-parsed triplet file per
/// triplet without the resolver caring how that happens.
pub trait TripletVars {
    fn vars(&self, triplet: &Triplet) -> portkit_platform::PlatformVars;
}

pub struct ResolverInput<'a> {
    pub root_dependencies: Vec<Dependency>,
    pub overrides: Vec<DependencyOverride>,
    pub toplevel: PackageSpec,
    pub host_triplet: Triplet,
    pub overlay: &'a dyn OverlayProvider,
    pub registry: &'a dyn VersionedPortfileProvider,
    pub baseline: &'a dyn BaselineProvider,
    pub triplet_vars: &'a dyn TripletVars,
    pub policy: ResolverPolicy,
    pub already_installed: &'a [PackageSpec],
}

struct Resolved {
    scf: SourceControlFile,
    features: Vec<FeatureName>,
}

pub fn resolve(input: ResolverInput<'_>) -> Result<ActionPlan, ResolveError> {
    let mut nodes: HashMap<PackageSpec, Node> = HashMap::new();
    let mut worklist: VecDeque<PackageSpec> = VecDeque::new();
    let mut queued: HashSet<PackageSpec> = HashSet::new();

    let overrides: HashMap<&str, &DependencyOverride> =
        input.overrides.iter().map(|o| (o.name.as_str(), o)).collect();

    let mut enqueue = |spec: PackageSpec, worklist: &mut VecDeque<PackageSpec>, queued: &mut HashSet<PackageSpec>| {
        if queued.insert(spec.clone()) {
            worklist.push_back(spec);
        }
    };

    // Step 1: seed from top-level dependencies evaluated against `toplevel`.
    let toplevel_vars = input.triplet_vars.vars(&input.toplevel.triplet);
    for dep in &input.root_dependencies {
        if let Some(expr) = &dep.platform {
            if !eval_platform(expr, &toplevel_vars)? {
                continue;
            }
        }
        let triplet = if dep.host {
            input.host_triplet.clone()
        } else {
            input.toplevel.triplet.clone()
        };
        let spec = PackageSpec::new(
            crate::core::spec::PortName::new(dep.name.clone())
                .map_err(|e| ResolveError::ProviderError { port: dep.name.clone(), detail: e.to_string() })?,
            triplet,
        );
        let (surviving_features, wants_default) = edge_features(dep, &toplevel_vars)?;
        get_or_create_node(&spec, &overrides, &input, &mut nodes)?;
        apply_constraint(&spec, &dep.constraint, &mut nodes)?;
        let node = nodes.get_mut(&spec).unwrap();
        node.user_requested = true;
        node.merge_features(surviving_features, wants_default);
        // Root requirements always need at least one processing pass, even
        // when the merge above happened to be a no-op (e.g. a bare name
        // with no features and no constraint).
        enqueue(spec, &mut worklist, &mut queued);
    }

    // Steps 2-5: fixed point.
    let mut guard = 0usize;
    while let Some(spec) = worklist.pop_front() {
        guard += 1;
        if guard > 200_000 {
            // Precondition violation a la "infinite loop encountered" (§9):
            // this can only happen if floors/features were not monotonic.
            panic!("resolver fixed point did not converge for {spec}");
        }
        queued.remove(&spec);
        process_node(&spec, &overrides, &input, &mut nodes, &mut worklist, &mut queued, false)?;
    }

    // Step 6/Phase B: finalize, checking `supports` and recording edges.
    let mut resolved: HashMap<PackageSpec, Resolved> = HashMap::new();
    let mut edges: HashMap<PackageSpec, (Vec<FeatureDependencyEdge>, Vec<PackageSpec>)> = HashMap::new();
    let specs: Vec<PackageSpec> = nodes.keys().cloned().collect();
    for spec in &specs {
        let (res, feature_edges, pkg_deps) = finalize_node(spec, &input, &nodes)?;
        check_supports(spec, &res, &input, &nodes)?;
        resolved.insert(spec.clone(), res);
        edges.insert(spec.clone(), (feature_edges, pkg_deps));
    }

    // Step 7/8: topological sort with cycle detection, then emit.
    let already_installed: HashSet<&PackageSpec> = input.already_installed.iter().collect();
    let mut order: Vec<PackageSpec> = Vec::new();
    let mut state: HashMap<PackageSpec, VisitState> = HashMap::new();
    let mut stack: Vec<PackageSpec> = Vec::new();
    for spec in &specs {
        if already_installed.contains(spec) {
            continue;
        }
        visit(spec, &edges, &resolved, &mut state, &mut stack, &mut order)?;
    }

    let mut install_actions = Vec::with_capacity(order.len());
    for spec in order {
        let res = resolved.remove(&spec).expect("resolved during finalize");
        let node = &nodes[&spec];
        let (feature_deps, pkg_deps) = edges.remove(&spec).unwrap_or_default();
        let build_flags = BuildFlags {
            use_head_version: input.policy.use_head_version.contains(spec.name.as_str()),
            editable: input.policy.editable.contains(spec.name.as_str()),
            only_downloads: false,
        };
        install_actions.push(InstallPlanAction {
            spec: spec.clone(),
            scf: res.scf,
            feature_list: res.features,
            feature_dependencies: feature_deps,
            package_dependencies: pkg_deps,
            request_type: if node.user_requested {
                RequestType::UserRequested
            } else {
                RequestType::AutoSelected
            },
            build_flags,
            abi_info: None,
        });
    }

    let remove_actions = input
        .already_installed
        .iter()
        .filter(|s| !nodes.contains_key(s))
        .cloned()
        .collect();

    Ok(ActionPlan {
        install_actions,
        already_installed: input.already_installed.to_vec(),
        remove_actions,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

/// Renders a cycle-path entry as `name:triplet@version` (§4.4 step 7), the
/// same version-qualified form scenario S3 and the original error text use.
fn qualified(spec: &PackageSpec, resolved: &HashMap<PackageSpec, Resolved>) -> String {
    match resolved.get(spec) {
        Some(res) => format!("{spec}@{}", res.scf.version),
        None => spec.to_string(),
    }
}

fn visit(
    spec: &PackageSpec,
    edges: &HashMap<PackageSpec, (Vec<FeatureDependencyEdge>, Vec<PackageSpec>)>,
    resolved: &HashMap<PackageSpec, Resolved>,
    state: &mut HashMap<PackageSpec, VisitState>,
    stack: &mut Vec<PackageSpec>,
    order: &mut Vec<PackageSpec>,
) -> Result<(), ResolveError> {
    match state.get(spec) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::Visiting) => unreachable!("cycle must be caught by the caller before revisiting"),
        None => {}
    }
    state.insert(spec.clone(), VisitState::Visiting);
    stack.push(spec.clone());
    if let Some((_, pkg_deps)) = edges.get(spec) {
        for dep in pkg_deps {
            match state.get(dep) {
                Some(VisitState::Done) => continue,
                Some(VisitState::Visiting) => {
                    let idx = stack.iter().position(|s| s == dep).unwrap();
                    let cycle_path: Vec<String> = stack[idx..]
                        .iter()
                        .map(|s| qualified(s, resolved))
                        .collect();
                    return Err(ResolveError::CycleDetected {
                        root: qualified(&stack[idx], resolved),
                        path: cycle_path,
                    });
                }
                None => visit(dep, edges, resolved, state, stack, order)?,
            }
        }
    }
    stack.pop();
    state.insert(spec.clone(), VisitState::Done);
    order.push(spec.clone());
    Ok(())
}

fn eval_platform(expr: &PlatformExpr, vars: &portkit_platform::PlatformVars) -> Result<bool, ResolveError> {
    // Unknown variables are treated as "condition not met" at the boundary
    // between the platform grammar's own error type and the resolver's;
    // callers populate triplet_vars with every variable the port metadata
    // can reference, so this path is defensive rather than load-bearing.
    Ok(expr.eval(vars).unwrap_or(false))
}

/// Filters a dependency's requested-feature list against the dependent's
/// triplet variables, separating the `default` marker into a boolean and
/// dropping `core` (always implicit).
fn edge_features(
    dep: &Dependency,
    vars: &portkit_platform::PlatformVars,
) -> Result<(Vec<String>, bool), ResolveError> {
    let mut wants_default = dep.requested_features.is_empty();
    let mut features = Vec::new();
    for rf in &dep.requested_features {
        let platform_ok = match &rf.platform {
            Some(expr) => eval_platform(expr, vars)?,
            None => true,
        };
        if !platform_ok {
            continue;
        }
        if rf.feature == DEFAULT_FEATURE {
            wants_default = true;
        } else if rf.feature != CORE_FEATURE {
            features.push(rf.feature.clone());
        }
    }
    Ok((features, wants_default))
}

fn get_or_create_node(
    spec: &PackageSpec,
    overrides: &HashMap<&str, &DependencyOverride>,
    input: &ResolverInput<'_>,
    nodes: &mut HashMap<PackageSpec, Node>,
) -> Result<(), ResolveError> {
    if nodes.contains_key(spec) {
        return Ok(());
    }
    let name = spec.name.as_str();
    let node = if let Some(ov) = overrides.get(name) {
        Node::new(spec.clone(), VersionSource::Override, ov.version.clone(), false)
    } else if let Some(scf) = input.overlay.get_control_file(name).map_err(|e| ResolveError::ProviderError {
        port: name.to_string(),
        detail: e.to_string(),
    })? {
        Node::new(spec.clone(), VersionSource::Overlay, scf.version.clone(), false)
    } else {
        let baseline = input
            .baseline
            .get_baseline_version(name)
            .map_err(|e| ResolveError::ProviderError { port: name.to_string(), detail: e.to_string() })?
            .ok_or_else(|| ResolveError::BaselineMissing { port: name.to_string() })?;
        Node::new(spec.clone(), VersionSource::Baseline, baseline, false)
    };
    debug!(port = name, triplet = %spec.triplet, source = ?node.source, floor = %node.floor, "seeded resolver node");
    nodes.insert(spec.clone(), node);
    Ok(())
}

/// Raises a `Baseline`-sourced node's floor by a dependency's minimum
/// constraint; a no-op (trivially satisfied) for `Override`/`Overlay` nodes,
/// per §4.4's "overlay short-circuits constraint comparison".
fn apply_constraint(
    spec: &PackageSpec,
    constraint: &VersionConstraint,
    nodes: &mut HashMap<PackageSpec, Node>,
) -> Result<bool, ResolveError> {
    let VersionConstraint::Minimum(min) = constraint else {
        return Ok(false);
    };
    let node = nodes.get_mut(spec).expect("node must exist before constraint is applied");
    if !matches!(node.source, VersionSource::Baseline) {
        return Ok(false);
    }
    match compare(&node.floor, min) {
        Comparison::Less => {
            node.floor = min.clone();
            Ok(true)
        }
        Comparison::Unknown => Err(ResolveError::VersionIncomparable {
            port: spec.name.to_string(),
            a: node.floor.clone(),
            b: min.clone(),
        }),
        Comparison::Equal | Comparison::Greater => Ok(false),
    }
}

fn resolve_scf_for_node(
    node: &Node,
    spec: &PackageSpec,
    input: &ResolverInput<'_>,
) -> Result<SourceControlFile, ResolveError> {
    let name = spec.name.as_str();
    let provider_err = |e: anyhow::Error| ResolveError::ProviderError { port: name.to_string(), detail: e.to_string() };
    match node.source {
        // Overlays shadow every other lookup, but only when no override is
        // in play: an override's whole point is to pin an exact version
        // that the overlay (which carries its own fixed version) cannot
        // speak to.
        VersionSource::Overlay => input
            .overlay
            .get_control_file(name)
            .map_err(provider_err)?
            .ok_or_else(|| ResolveError::VersionNotFound { port: name.to_string(), version: node.floor.clone() }),
        VersionSource::Override | VersionSource::Baseline => input
            .registry
            .get_control_file(name, &node.floor)
            .map_err(provider_err)?
            .ok_or_else(|| ResolveError::VersionNotFound { port: name.to_string(), version: node.floor.clone() }),
    }
}

/// Computes the effective selected feature set for a node (user-requested
/// plus platform-filtered defaults if wanted), always including `core`,
/// never `default`, preserving `*` literally.
fn selected_features(
    node: &Node,
    scf: &SourceControlFile,
    vars: &portkit_platform::PlatformVars,
) -> Result<Vec<FeatureName>, ResolveError> {
    let mut set: HashSet<String> = HashSet::new();
    for f in &node.requested_features {
        if f == "*" {
            set.insert(f.clone());
            continue;
        }
        if !scf.has_feature(f) {
            return Err(ResolveError::VersionMissingFeature {
                port: scf.name.clone(),
                version: scf.version.clone(),
                feature: f.clone(),
            });
        }
        set.insert(f.clone());
    }
    if node.wants_default {
        for df in &scf.default_features {
            let ok = match &df.platform {
                Some(expr) => eval_platform(expr, vars)?,
                None => true,
            };
            if ok {
                set.insert(df.feature.clone());
            }
        }
    }
    set.insert(CORE_FEATURE.to_string());
    let mut out: Vec<FeatureName> = set
        .into_iter()
        .map(|s| FeatureName::new(s).expect("feature names are validated before being inserted"))
        .collect();
    out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn process_node(
    spec: &PackageSpec,
    overrides: &HashMap<&str, &DependencyOverride>,
    input: &ResolverInput<'_>,
    nodes: &mut HashMap<PackageSpec, Node>,
    worklist: &mut VecDeque<PackageSpec>,
    queued: &mut HashSet<PackageSpec>,
    _finalize: bool,
) -> Result<(), ResolveError> {
    let vars = input.triplet_vars.vars(&spec.triplet);
    let node = nodes[spec].clone();
    let scf = resolve_scf_for_node(&node, spec, input)?;
    let selected = selected_features(&node, &scf, &vars)?;
    trace!(port = %spec, features = ?selected.iter().map(|f| f.as_str()).collect::<Vec<_>>(), "expanded features");

    for feature in &selected {
        if feature.as_str() == "*" {
            continue;
        }
        let Some(deps) = scf.dependencies_for_feature(feature.as_str()) else {
            continue;
        };
        for dep in deps.to_vec() {
            if let Some(expr) = &dep.platform {
                if !eval_platform(expr, &vars)? {
                    continue;
                }
            }
            let child_triplet = if dep.host {
                input.host_triplet.clone()
            } else {
                spec.triplet.clone()
            };
            let child_name = crate::core::spec::PortName::new(dep.name.clone())
                .map_err(|e| ResolveError::ProviderError { port: dep.name.clone(), detail: e.to_string() })?;
            let child_spec = PackageSpec::new(child_name, child_triplet);
            let (surviving, wants_default) = edge_features(&dep, &vars)?;

            if &child_spec == spec {
                // Self-reference: merge into this same node, don't create an edge.
                let node_mut = nodes.get_mut(spec).unwrap();
                if node_mut.merge_features(surviving, wants_default) {
                    if queued.insert(spec.clone()) {
                        worklist.push_back(spec.clone());
                    }
                }
                continue;
            }

            get_or_create_node(&child_spec, overrides, input, nodes)?;
            let floor_changed = apply_constraint(&child_spec, &dep.constraint, nodes)?;
            let child = nodes.get_mut(&child_spec).unwrap();
            let feat_changed = child.merge_features(surviving, wants_default);
            if floor_changed || feat_changed {
                if queued.insert(child_spec.clone()) {
                    worklist.push_back(child_spec);
                }
            }
        }
    }
    Ok(())
}

fn finalize_node(
    spec: &PackageSpec,
    input: &ResolverInput<'_>,
    nodes: &HashMap<PackageSpec, Node>,
) -> Result<(Resolved, Vec<FeatureDependencyEdge>, Vec<PackageSpec>), ResolveError> {
    let vars = input.triplet_vars.vars(&spec.triplet);
    let node = &nodes[spec];
    let scf = resolve_scf_for_node(node, spec, input)?;
    let selected = selected_features(node, &scf, &vars)?;

    let mut feature_edges = Vec::new();
    let mut pkg_deps_set: HashSet<PackageSpec> = HashSet::new();
    let mut pkg_deps_order: Vec<PackageSpec> = Vec::new();

    for feature in &selected {
        if feature.as_str() == "*" {
            continue;
        }
        let Some(deps) = scf.dependencies_for_feature(feature.as_str()) else {
            continue;
        };
        for dep in deps {
            if let Some(expr) = &dep.platform {
                if !eval_platform(expr, &vars)? {
                    continue;
                }
            }
            let child_triplet = if dep.host {
                input.host_triplet.clone()
            } else {
                spec.triplet.clone()
            };
            let child_name = crate::core::spec::PortName::new(dep.name.clone())
                .map_err(|e| ResolveError::ProviderError { port: dep.name.clone(), detail: e.to_string() })?;
            let child_spec = PackageSpec::new(child_name, child_triplet);
            if &child_spec == spec {
                continue;
            }
            feature_edges.push(FeatureDependencyEdge {
                from_feature: feature.clone(),
                to: child_spec.clone(),
            });
            if pkg_deps_set.insert(child_spec.clone()) {
                pkg_deps_order.push(child_spec);
            }
        }
    }

    Ok((Resolved { scf, features: selected }, feature_edges, pkg_deps_order))
}

fn check_supports(
    spec: &PackageSpec,
    resolved: &Resolved,
    input: &ResolverInput<'_>,
    nodes: &HashMap<PackageSpec, Node>,
) -> Result<(), ResolveError> {
    let node = &nodes[spec];
    if matches!(node.source, VersionSource::Override) || input.policy.allow_unsupported.contains(spec.name.as_str()) {
        return Ok(());
    }
    if input.policy.unsupported_port_action == UnsupportedPortAction::Allow {
        return Ok(());
    }
    let vars = input.triplet_vars.vars(&spec.triplet);
    let mut failing: Option<&PlatformExpr> = None;
    if let Some(expr) = &resolved.scf.supports {
        if !eval_platform(expr, &vars)? {
            failing = Some(expr);
        }
    }
    if failing.is_none() {
        for feature in &resolved.features {
            if let Some(expr) = resolved.scf.feature_supports(feature.as_str()) {
                if !eval_platform(expr, &vars)? {
                    failing = Some(expr);
                    break;
                }
            }
        }
    }
    if let Some(expr) = failing {
        let err = ResolveError::UnsupportedPortSupportsExpression {
            port: spec.name.to_string(),
            triplet: spec.triplet.to_string(),
            expr: expr.to_string(),
        };
        if input.policy.unsupported_port_action == UnsupportedPortAction::Warn {
            tracing::warn!(%err, "port does not support this triplet");
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}
