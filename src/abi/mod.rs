//! The ABI hasher (C5): computes the package-ABI cache key and the
//! companion SBOM for one planned install action. Never errors -- a
//! missing input just yields an empty ABI, which disables caching for
//! that action (§7).

mod entries;
pub mod sbom;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::plan::{AbiInfo, CompilerInfo};
use crate::core::spec::Triplet;
use entries::AbiEntry;

/// Everything the hasher needs for one action. Disk reads (triplet file,
/// toolchain file, port directory walk) are the caller's responsibility --
/// this module only hashes bytes it is handed or that it walks under
/// `port_dir`, matching §1's "Filesystem abstraction is out of scope".
pub struct AbiInput<'a> {
    pub triplet: &'a Triplet,
    pub triplet_file_contents: &'a [u8],
    pub toolchain_file_contents: &'a [u8],
    pub ports_cmake_contents: &'a [u8],
    pub compiler_info: Option<&'a CompilerInfo>,
    pub public_abi_override: Option<&'a str>,
    /// Only variables actually present in the caller's environment; absent
    /// variables contribute no `ENV:` entry at all.
    pub tracked_env_vars: &'a BTreeMap<String, String>,
    pub is_xbox: bool,
    pub grdk_header_contents: Option<&'a [u8]>,
    /// `(dependency_port_name, dependency.package_abi)`, already resolved in
    /// dependency order. An empty string marks an untracked predecessor.
    pub dependency_abis: &'a [(String, String)],
    pub port_dir: &'a Path,
    pub cmake_version: &'a str,
    pub powershell_version: Option<&'a str>,
    pub known_helpers: &'a [(String, String)],
    pub toolset: &'a str,
    pub features: &'a [String],
    pub use_head_version: bool,
    pub editable: bool,
    pub build_dir: &'a Path,
}

pub struct AbiOutput {
    pub info: Option<AbiInfo>,
    /// Keys whose value would have been empty, causing the whole ABI to be
    /// skipped. Empty when `info` is `Some` for a reason other than a
    /// deliberate head/editable/untracked-predecessor skip.
    pub missing_keys: Vec<String>,
}

/// Runs the full algorithm of §4.5. Steps 1-2 are short-circuits; step 3
/// collects entries; step 4 rejects the set if anything came up empty; step
/// 5 renders, hashes, and writes the tag file.
pub fn compute_package_abi(input: &AbiInput<'_>) -> std::io::Result<AbiOutput> {
    if input.use_head_version || input.editable {
        debug!(triplet = %input.triplet, "ABI skipped: head version or editable build");
        return Ok(AbiOutput { info: None, missing_keys: Vec::new() });
    }
    if input.dependency_abis.iter().any(|(_, abi)| abi.is_empty()) {
        debug!(triplet = %input.triplet, "ABI skipped: an untracked dependency has no ABI");
        return Ok(AbiOutput { info: None, missing_keys: Vec::new() });
    }

    let (entries, triplet_abi, relative_port_files, relative_port_hashes) = entries::collect(input)?;

    let missing_keys: Vec<String> = entries
        .iter()
        .filter(|e| e.value.is_empty())
        .map(|e| e.key.clone())
        .collect();
    if !missing_keys.is_empty() {
        debug!(?missing_keys, "ABI skipped: one or more entries had an empty value");
        return Ok(AbiOutput { info: None, missing_keys });
    }

    let rendered = entries::render(&entries);
    let package_abi = portkit_util::sha256_hex(rendered.as_bytes());

    let abi_tag_file = write_abi_tag_file(input.build_dir, input.triplet, &rendered)?;

    Ok(AbiOutput {
        info: Some(AbiInfo {
            package_abi,
            triplet_abi,
            toolset: input.toolset.to_string(),
            compiler_info: input.compiler_info.cloned(),
            relative_port_files,
            relative_port_hashes,
            abi_tag_file: Some(abi_tag_file),
        }),
        missing_keys: Vec::new(),
    })
}

fn write_abi_tag_file(build_dir: &Path, triplet: &Triplet, rendered: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(build_dir)?;
    let path = build_dir.join(format!("{triplet}.vcpkg_abi_info.txt"));
    std::fs::write(&path, rendered)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input<'a>(
        port_dir: &'a Path,
        build_dir: &'a Path,
        env: &'a BTreeMap<String, String>,
        deps: &'a [(String, String)],
        helpers: &'a [(String, String)],
        features: &'a [String],
        triplet: &'a Triplet,
    ) -> AbiInput<'a> {
        AbiInput {
            triplet,
            triplet_file_contents: b"set(VCPKG_TARGET_ARCHITECTURE x64)",
            toolchain_file_contents: b"# toolchain",
            ports_cmake_contents: b"# ports.cmake",
            compiler_info: None,
            public_abi_override: None,
            tracked_env_vars: env,
            is_xbox: false,
            grdk_header_contents: None,
            dependency_abis: deps,
            port_dir,
            cmake_version: "3.27.1",
            powershell_version: None,
            known_helpers: helpers,
            toolset: "msvc-14.3",
            features,
            use_head_version: false,
            editable: false,
            build_dir,
        }
    }

    #[test]
    fn head_version_skips_abi() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let triplet = Triplet::new("x64-linux");
        let features = vec!["core".to_string()];
        let mut input = base_input(dir.path(), dir.path(), &env, &[], &[], &features, &triplet);
        input.use_head_version = true;
        let out = compute_package_abi(&input).unwrap();
        assert!(out.info.is_none());
    }

    #[test]
    fn untracked_dependency_skips_abi() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let triplet = Triplet::new("x64-linux");
        let features = vec!["core".to_string()];
        let deps = vec![("zlib".to_string(), String::new())];
        let input = base_input(dir.path(), dir.path(), &env, &deps, &[], &features, &triplet);
        let out = compute_package_abi(&input).unwrap();
        assert!(out.info.is_none());
    }

    #[test]
    fn deterministic_across_runs() {
        let port_dir = tempfile::tempdir().unwrap();
        std::fs::write(port_dir.path().join("portfile.cmake"), "vcpkg_from_github(...)").unwrap();
        std::fs::write(port_dir.path().join("vcpkg.json"), "{\"name\":\"zlib\"}").unwrap();
        let build_dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let triplet = Triplet::new("x64-linux");
        let features = vec!["core".to_string(), "tools".to_string()];
        let deps = vec![("bzip2".to_string(), "abc123".to_string())];
        let input = base_input(port_dir.path(), build_dir.path(), &env, &deps, &[], &features, &triplet);

        let first = compute_package_abi(&input).unwrap().info.unwrap();
        let second = compute_package_abi(&input).unwrap().info.unwrap();
        assert_eq!(first.package_abi, second.package_abi);
        assert!(!first.package_abi.is_empty());
    }

    #[test]
    fn feature_list_excludes_default_and_sorts() {
        let port_dir = tempfile::tempdir().unwrap();
        let build_dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let triplet = Triplet::new("x64-linux");
        let features = vec!["tools".to_string(), "core".to_string(), "ssl".to_string()];
        let input = base_input(port_dir.path(), build_dir.path(), &env, &[], &[], &features, &triplet);
        let (entries, ..) = entries::collect(&input).unwrap();
        let features_entry = entries.iter().find(|e| e.key == "features").unwrap();
        assert_eq!(features_entry.value, "core;ssl;tools");
    }

    #[test]
    fn helper_detected_by_case_insensitive_substring() {
        let port_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            port_dir.path().join("portfile.cmake"),
            "vcpkg_FROM_github(REPO foo/bar)",
        )
        .unwrap();
        let build_dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let triplet = Triplet::new("x64-linux");
        let features = vec!["core".to_string()];
        let helpers = vec![("vcpkg_from_github.cmake".to_string(), "deadbeef".to_string())];
        let input = base_input(port_dir.path(), build_dir.path(), &env, &[], &helpers, &features, &triplet);
        let (entries, ..) = entries::collect(&input).unwrap();
        assert!(entries.iter().any(|e| e.key == "vcpkg_from_github.cmake" && e.value == "deadbeef"));
    }
}
