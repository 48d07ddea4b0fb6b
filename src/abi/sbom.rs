//! SBOM emission (§6): an SPDX-lite JSON document built from the same
//! `(relative_port_files, relative_port_hashes)` pair the ABI hasher
//! already collected, plus one heuristic "this install came from a vcpkg
//! port" resource record.

use serde::Serialize;

use crate::core::spec::PackageSpec;

#[derive(Serialize)]
pub struct SpdxDocument {
    #[serde(rename = "spdxVersion")]
    pub spdx_version: String,
    #[serde(rename = "dataLicense")]
    pub data_license: String,
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,
    pub name: String,
    #[serde(rename = "documentNamespace")]
    pub document_namespace: String,
    #[serde(rename = "creationInfo")]
    pub creation_info: CreationInfo,
    pub packages: Vec<SpdxPackage>,
    pub files: Vec<SpdxFile>,
    pub relationships: Vec<SpdxRelationship>,
}

#[derive(Serialize)]
pub struct CreationInfo {
    pub creators: Vec<String>,
    pub created: String,
}

#[derive(Serialize)]
pub struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,
    pub name: String,
    #[serde(rename = "versionInfo")]
    pub version_info: String,
    #[serde(rename = "downloadLocation")]
    pub download_location: String,
    #[serde(rename = "licenseConcluded")]
    pub license_concluded: String,
    #[serde(rename = "licenseDeclared")]
    pub license_declared: String,
    #[serde(rename = "copyrightText")]
    pub copyright_text: String,
}

#[derive(Serialize)]
pub struct SpdxChecksum {
    pub algorithm: String,
    #[serde(rename = "checksumValue")]
    pub checksum_value: String,
}

#[derive(Serialize)]
pub struct SpdxFile {
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub checksums: Vec<SpdxChecksum>,
}

#[derive(Serialize)]
pub struct SpdxRelationship {
    #[serde(rename = "spdxElementId")]
    pub spdx_element_id: String,
    #[serde(rename = "relationshipType")]
    pub relationship_type: String,
    #[serde(rename = "relatedSpdxElement")]
    pub related_spdx_element: String,
}

/// Turns one port's file hashes into an SPDX document. `created_at` is
/// caller-supplied (an RFC 3339 timestamp) so this function stays a pure
/// transform of its inputs -- this module never reads the clock itself.
pub fn build_sbom(
    spec: &PackageSpec,
    version: &str,
    relative_port_files: &[String],
    relative_port_hashes: &[String],
    created_at: &str,
) -> SpdxDocument {
    let doc_name = format!("{}:{}@{version}", spec.name, spec.triplet);
    let package_id = format!("SPDXRef-port-{}", sanitize_id(spec.name.as_str()));

    let mut files = Vec::with_capacity(relative_port_files.len());
    let mut relationships = vec![SpdxRelationship {
        spdx_element_id: "SPDXRef-DOCUMENT".to_string(),
        relationship_type: "DESCRIBES".to_string(),
        related_spdx_element: package_id.clone(),
    }];
    for (path, hash) in relative_port_files.iter().zip(relative_port_hashes.iter()) {
        let file_id = format!("SPDXRef-file-{}", sanitize_id(path));
        files.push(SpdxFile {
            spdx_id: file_id.clone(),
            file_name: path.clone(),
            checksums: vec![SpdxChecksum {
                algorithm: "SHA256".to_string(),
                checksum_value: hash.clone(),
            }],
        });
        relationships.push(SpdxRelationship {
            spdx_element_id: package_id.clone(),
            relationship_type: "CONTAINS".to_string(),
            related_spdx_element: file_id,
        });
    }

    SpdxDocument {
        spdx_version: "SPDX-2.2".to_string(),
        data_license: "CC0-1.0".to_string(),
        spdx_id: "SPDXRef-DOCUMENT".to_string(),
        name: doc_name.clone(),
        document_namespace: format!(
            "https://portkit.invalid/spdx/{}-{}-{}",
            spec.name, spec.triplet, version
        ),
        creation_info: CreationInfo {
            creators: vec!["Tool: portkit".to_string()],
            created: created_at.to_string(),
        },
        packages: vec![SpdxPackage {
            spdx_id: package_id,
            name: spec.name.to_string(),
            version_info: version.to_string(),
            download_location: "NOASSERTION".to_string(),
            license_concluded: "NOASSERTION".to_string(),
            license_declared: "NOASSERTION".to_string(),
            copyright_text: "NOASSERTION".to_string(),
        }],
        files,
        relationships,
    }
}

fn sanitize_id(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::{PortName, Triplet};

    #[test]
    fn describes_document_and_contains_files() {
        let spec = PackageSpec::new(PortName::new("zlib").unwrap(), Triplet::new("x64-linux"));
        let doc = build_sbom(
            &spec,
            "1.3.1",
            &["portfile.cmake".to_string(), "vcpkg.json".to_string()],
            &["aaa".to_string(), "bbb".to_string()],
            "2024-01-01T00:00:00Z",
        );
        assert_eq!(doc.files.len(), 2);
        assert_eq!(doc.relationships.len(), 3);
        assert!(doc.relationships.iter().any(|r| r.relationship_type == "DESCRIBES"));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("SPDX-2.2"));
    }
}
