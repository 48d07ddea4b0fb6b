//! Builder helpers for resolver scenario tests, in the spirit of cargo's own
//! `resolver-tests` crate: small macros/functions to stand up an in-memory
//! registry + baseline + overlay without writing out real port files.

use std::collections::HashMap;

use portkit::core::dependency::Dependency;
use portkit::core::providers::{BaselineProvider, OverlayProvider, VersionedPortfileProvider};
use portkit::core::resolver::TripletVars;
use portkit::core::scf::SourceControlFile;
use portkit::core::spec::Triplet;
use portkit::core::version::{parse, Version, VersionScheme};
use portkit_platform::PlatformVars;

/// Parses an unadorned semver string into a `Version`. Panics on invalid
/// input -- this is test-fixture plumbing, not a code path under test.
pub fn semver(s: &str) -> Version {
    parse(s, VersionScheme::Semver).expect("fixture version must parse")
}

pub fn relaxed(s: &str) -> Version {
    parse(s, VersionScheme::Relaxed).expect("fixture version must parse")
}

pub fn string_version(s: &str) -> Version {
    parse(s, VersionScheme::String).expect("fixture version must parse")
}

/// Builds a minimal `SourceControlFile` with no dependencies.
pub fn port(name: &str, version: Version) -> SourceControlFile {
    SourceControlFile {
        name: name.to_string(),
        version,
        version_scheme: VersionScheme::Semver,
        port_version: 0,
        dependencies: Vec::new(),
        default_features: Vec::new(),
        supports: None,
        features: Vec::new(),
    }
}

impl SourceControlFile {
    pub fn depends_on(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_feature(mut self, feature: portkit::core::scf::FeatureParagraph) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_default_feature(
        mut self,
        feature: &str,
        platform: Option<portkit_platform::PlatformExpr>,
    ) -> Self {
        self.default_features.push(portkit::core::dependency::DefaultFeature {
            feature: feature.to_string(),
            platform,
        });
        self
    }
}

/// A version database: every published version of every port, plus the
/// baseline pointer, plus an overlay override map -- backing all three
/// provider traits the resolver needs.
#[derive(Default)]
pub struct FakeRegistry {
    versions: HashMap<String, Vec<SourceControlFile>>,
    baseline: HashMap<String, Version>,
    overlays: HashMap<String, SourceControlFile>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        FakeRegistry::default()
    }

    /// Publishes a version and, if this is the first version seen for the
    /// port, makes it the baseline too (call `set_baseline` to override).
    pub fn publish(&mut self, scf: SourceControlFile) -> &mut Self {
        let name = scf.name.clone();
        self.baseline.entry(name.clone()).or_insert_with(|| scf.version.clone());
        self.versions.entry(name).or_default().push(scf);
        self
    }

    pub fn set_baseline(&mut self, port_name: &str, version: Version) -> &mut Self {
        self.baseline.insert(port_name.to_string(), version);
        self
    }

    pub fn overlay(&mut self, scf: SourceControlFile) -> &mut Self {
        self.overlays.insert(scf.name.clone(), scf);
        self
    }
}

impl BaselineProvider for FakeRegistry {
    fn get_baseline_version(&self, port_name: &str) -> anyhow::Result<Option<Version>> {
        Ok(self.baseline.get(port_name).cloned())
    }
}

impl VersionedPortfileProvider for FakeRegistry {
    fn get_control_file(&self, port_name: &str, version: &Version) -> anyhow::Result<Option<SourceControlFile>> {
        Ok(self
            .versions
            .get(port_name)
            .and_then(|versions| versions.iter().find(|v| v.version == *version))
            .cloned())
    }
}

impl OverlayProvider for FakeRegistry {
    fn get_control_file(&self, port_name: &str) -> anyhow::Result<Option<SourceControlFile>> {
        Ok(self.overlays.get(port_name).cloned())
    }
}

/// A single fixed `PlatformVars` map handed back for every triplet -- enough
/// for scenarios that don't exercise cross-triplet platform gating.
pub struct FixedVars(pub PlatformVars);

impl TripletVars for FixedVars {
    fn vars(&self, _triplet: &Triplet) -> PlatformVars {
        self.0.clone()
    }
}

pub fn linux_vars() -> PlatformVars {
    PlatformVars::from_triplet("linux", "x64", true)
}
