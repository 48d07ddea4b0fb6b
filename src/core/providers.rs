//! Provider contracts (C3): pure, repeatedly-callable query interfaces over
//! baselines, versioned portfiles, and overlays. Disk/network
//! implementations (git, filesystem, builtin registries) are external
//! collaborators; only the contract is specified here.

use anyhow::Result;

use crate::core::scf::SourceControlFile;
use crate::core::version::Version;

/// Maps a port name to its minimum acceptable version at the configured
/// baseline commit.
pub trait BaselineProvider {
    fn get_baseline_version(&self, port_name: &str) -> Result<Option<Version>>;
}

/// Maps `(port_name, version)` to the parsed metadata at that version.
pub trait VersionedPortfileProvider {
    fn get_control_file(&self, port_name: &str, version: &Version) -> Result<Option<SourceControlFile>>;
}

/// Ad-hoc port directories that unconditionally shadow registry lookups.
pub trait OverlayProvider {
    /// `Some` shadows all other lookups for that port name.
    fn get_control_file(&self, port_name: &str) -> Result<Option<SourceControlFile>>;
}

/// A `name -> bool` map of CMake-style triplet variables, handed to platform
/// expression evaluation. Kept as a trait (rather than a concrete struct) so
/// callers can back it with a lazily-populated triplet file.
pub trait CMakeVariableProvider {
    fn get(&self, name: &str) -> Option<bool>;
}

impl CMakeVariableProvider for portkit_platform::PlatformVars {
    fn get(&self, name: &str) -> Option<bool> {
        portkit_platform::PlatformVars::get(self, name)
    }
}
