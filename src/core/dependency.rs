//! Dependency edges as declared in a `SourceControlFile`.

use portkit_platform::PlatformExpr;

use crate::core::version::Version;

/// Either no constraint, or a floor version the resolver must raise the
/// chosen version's node up to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionConstraint {
    None,
    Minimum(Version),
}

/// A feature requested by a dependency edge, itself conditional on a
/// platform expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRequestedFeature {
    pub feature: String,
    pub platform: Option<PlatformExpr>,
}

/// A port's declared default feature, conditional on a platform expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultFeature {
    pub feature: String,
    pub platform: Option<PlatformExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub requested_features: Vec<DependencyRequestedFeature>,
    pub platform: Option<PlatformExpr>,
    pub host: bool,
    pub constraint: VersionConstraint,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            requested_features: Vec::new(),
            platform: None,
            host: false,
            constraint: VersionConstraint::None,
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.requested_features.push(DependencyRequestedFeature {
            feature: feature.into(),
            platform: None,
        });
        self
    }

    pub fn with_minimum(mut self, version: Version) -> Self {
        self.constraint = VersionConstraint::Minimum(version);
        self
    }

    pub fn host(mut self) -> Self {
        self.host = true;
        self
    }

    pub fn with_platform(mut self, expr: PlatformExpr) -> Self {
        self.platform = Some(expr);
        self
    }
}

/// An `overrides` entry: pin a port to an exact version, escaping normal
/// constraint comparison entirely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyOverride {
    pub name: String,
    pub version: Version,
}
