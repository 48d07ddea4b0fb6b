//! Key/value collection for the package-ABI tag (§4.5 step 3).

use portkit_util::sha256_hex;

use super::AbiInput;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiEntry {
    pub key: String,
    pub value: String,
}

/// Builds the full entry set plus the raw `triplet_abi` string (kept
/// separately since it also lands in `AbiInfo::triplet_abi`) and the
/// parallel `(relative_port_files, relative_port_hashes)` vectors used for
/// the SBOM.
pub fn collect(input: &AbiInput<'_>) -> std::io::Result<(Vec<AbiEntry>, String, Vec<String>, Vec<String>)> {
    let mut entries = Vec::new();

    entries.push(AbiEntry {
        key: "triplet".to_string(),
        value: input.triplet.as_str().to_string(),
    });

    let mut triplet_abi = sha256_hex(input.triplet_file_contents);
    triplet_abi.push_str(&sha256_hex(input.toolchain_file_contents));
    if let Some(compiler) = input.compiler_info {
        triplet_abi.push_str(&compiler.hash);
    }
    entries.push(AbiEntry {
        key: "triplet_abi".to_string(),
        value: triplet_abi.clone(),
    });

    if let Some(value) = input.public_abi_override {
        entries.push(AbiEntry {
            key: "public_abi_override".to_string(),
            value: sha256_hex(value.as_bytes()),
        });
    }

    for (name, value) in input.tracked_env_vars {
        entries.push(AbiEntry {
            key: format!("ENV:{name}"),
            value: sha256_hex(value.as_bytes()),
        });
    }

    if input.is_xbox {
        let value = match input.grdk_header_contents {
            Some(bytes) => sha256_hex(bytes),
            None => "none".to_string(),
        };
        entries.push(AbiEntry { key: "grdk.h".to_string(), value });
    }

    for (dep_name, dep_abi) in input.dependency_abis {
        entries.push(AbiEntry {
            key: dep_name.clone(),
            value: dep_abi.clone(),
        });
    }

    let mut relative_port_files = Vec::new();
    let mut relative_port_hashes = Vec::new();
    let mut portfile_cmake_contents = String::new();
    for path in portkit_util::tree::list_files_sorted(input.port_dir)? {
        let relative = portkit_util::tree::to_slash(
            path.strip_prefix(input.port_dir).unwrap_or(&path),
        );
        let contents = std::fs::read(&path)?;
        let hash = sha256_hex(&contents);
        if relative.ends_with(".cmake") {
            portfile_cmake_contents.push_str(&String::from_utf8_lossy(&contents));
        }
        entries.push(AbiEntry {
            key: relative.clone(),
            value: hash.clone(),
        });
        relative_port_files.push(relative);
        relative_port_hashes.push(hash);
    }

    entries.push(AbiEntry {
        key: "cmake".to_string(),
        value: input.cmake_version.to_string(),
    });
    if let Some(ps) = input.powershell_version {
        entries.push(AbiEntry {
            key: "powershell".to_string(),
            value: ps.to_string(),
        });
    }

    let portfile_lower = portfile_cmake_contents.to_ascii_lowercase();
    for (helper_name, helper_hash) in input.known_helpers {
        if portfile_lower.contains(&helper_name.to_ascii_lowercase()) {
            entries.push(AbiEntry {
                key: helper_name.clone(),
                value: helper_hash.clone(),
            });
        }
    }

    entries.push(AbiEntry {
        key: "ports.cmake".to_string(),
        value: sha256_hex(input.ports_cmake_contents),
    });
    entries.push(AbiEntry {
        key: "post_build_checks".to_string(),
        value: "2".to_string(),
    });

    let mut features: Vec<&str> = input.features.iter().map(String::as_str).collect();
    features.sort_unstable();
    features.dedup();
    entries.push(AbiEntry {
        key: "features".to_string(),
        value: features.join(";"),
    });

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok((entries, triplet_abi, relative_port_files, relative_port_hashes))
}

/// Renders sorted entries as `key value\n` lines (LF, UTF-8), the exact
/// shape written to `<triplet>.vcpkg_abi_info.txt`.
pub fn render(entries: &[AbiEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.key);
        out.push(' ');
        out.push_str(&entry.value);
        out.push('\n');
    }
    out
}
