//! `SourceControlFile`: per-port metadata as provided by a registry or
//! overlay. Disk-level CONTROL/`vcpkg.json` parsing is out of scope (§1); we
//! only model the parsed result.

use portkit_platform::PlatformExpr;

use crate::core::dependency::{DefaultFeature, Dependency};
use crate::core::version::{Version, VersionScheme};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureParagraph {
    pub name: String,
    pub dependencies: Vec<Dependency>,
    pub supports: Option<PlatformExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceControlFile {
    pub name: String,
    pub version: Version,
    pub version_scheme: VersionScheme,
    pub port_version: u64,
    pub dependencies: Vec<Dependency>,
    pub default_features: Vec<DefaultFeature>,
    pub supports: Option<PlatformExpr>,
    pub features: Vec<FeatureParagraph>,
}

impl SourceControlFile {
    /// Dependencies contributed by the `core` pseudo-feature (the port's
    /// unconditional dependency list) plus, for each named feature, its own
    /// feature-paragraph dependencies.
    pub fn dependencies_for_feature(&self, feature: &str) -> Option<&[Dependency]> {
        if feature == crate::core::spec::CORE_FEATURE {
            return Some(&self.dependencies);
        }
        self.features
            .iter()
            .find(|f| f.name == feature)
            .map(|f| f.dependencies.as_slice())
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        feature == crate::core::spec::CORE_FEATURE || self.features.iter().any(|f| f.name == feature)
    }

    pub fn feature_supports(&self, feature: &str) -> Option<&PlatformExpr> {
        if feature == crate::core::spec::CORE_FEATURE {
            return None;
        }
        self.features
            .iter()
            .find(|f| f.name == feature)
            .and_then(|f| f.supports.as_ref())
    }
}
