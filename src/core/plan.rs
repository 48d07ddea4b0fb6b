//! The resolver's output: an ordered `ActionPlan` of install/already-
//! installed/remove actions.

use crate::core::scf::SourceControlFile;
use crate::core::spec::{FeatureName, PackageSpec};
use crate::core::version::Version;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    UserRequested,
    AutoSelected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub use_head_version: bool,
    pub editable: bool,
    pub only_downloads: bool,
}

/// A dependency edge from one of this action's selected features to another
/// spec's feature, kept separately from the flattened `package_dependencies`
/// list so callers can reconstruct which feature pulled in which package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureDependencyEdge {
    pub from_feature: FeatureName,
    pub to: PackageSpec,
}

/// Attached to an `InstallPlanAction` once the ABI hasher (C5) has run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbiInfo {
    /// Empty when the action's ABI could not be computed (head/editable
    /// build, or an untracked predecessor); an empty ABI disables caching.
    pub package_abi: String,
    pub triplet_abi: String,
    pub toolset: String,
    pub compiler_info: Option<CompilerInfo>,
    pub relative_port_files: Vec<String>,
    pub relative_port_hashes: Vec<String>,
    pub abi_tag_file: Option<std::path::PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerInfo {
    pub id: String,
    pub version: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallPlanAction {
    pub spec: PackageSpec,
    pub scf: SourceControlFile,
    /// The effective selected feature set, always including `core`, never
    /// including `default`.
    pub feature_list: Vec<FeatureName>,
    pub feature_dependencies: Vec<FeatureDependencyEdge>,
    pub package_dependencies: Vec<PackageSpec>,
    pub request_type: RequestType,
    pub build_flags: BuildFlags,
    pub abi_info: Option<AbiInfo>,
}

impl InstallPlanAction {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.feature_list.iter().any(|f| f.as_str() == feature)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActionPlan {
    /// Topologically sorted, leaves first.
    pub install_actions: Vec<InstallPlanAction>,
    pub already_installed: Vec<PackageSpec>,
    pub remove_actions: Vec<PackageSpec>,
}

impl ActionPlan {
    /// Invariant check (§3): every `package_dependencies` entry of an action
    /// precedes it, or is already installed. Intended for tests and debug
    /// assertions, not the hot path.
    pub fn is_topologically_sound(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for installed in &self.already_installed {
            seen.insert(installed.clone());
        }
        for action in &self.install_actions {
            for dep in &action.package_dependencies {
                if !seen.contains(dep) {
                    return false;
                }
            }
            seen.insert(action.spec.clone());
        }
        true
    }
}
