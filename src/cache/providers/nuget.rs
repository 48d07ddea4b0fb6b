//! NuGet backend (§4.7, §6): shells the `nuget` CLI, generating a
//! `<packages>` list for restores and a nuspec for pushes. Implements
//! `BinaryProvider` directly rather than going through `ObjectProvider`
//! because its object identity (`NugetReference`) and its auth-prompt
//! detection on stdout don't fit the generic blob-store shape.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Result};
use portkit_util::ProcessBuilder;
use tracing::warn;

use crate::cache::config::Access;
use crate::cache::providers::{BinaryProvider, PrefetchAction, PushInfo, RestoreOutcome};

/// Stdout substrings the original treats as "this push needs interactive
/// credentials" rather than a hard failure.
const AUTH_PROMPT_MARKERS: [&str; 3] = [
    "Authentication may require manual action.",
    "401 Unauthorized",
    "for example \"-ApiKey AzureDevOps\"",
];

/// `<id>.<version>.nupkg`, used both as the generated nuspec's file name
/// and the CLI package-id argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NugetReference {
    pub id: String,
    pub version: String,
}

impl fmt::Display for NugetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.nupkg", self.id, self.version)
    }
}

/// `X_VCPKG_NUGET_ID_PREFIX`, trimmed of leading/trailing dashes with a
/// single trailing `_` appended; empty if unset.
pub fn nuget_id_prefix(env: &HashMap<String, String>) -> String {
    match env.get("X_VCPKG_NUGET_ID_PREFIX") {
        Some(raw) => {
            let trimmed = raw.trim_matches('-');
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed}_")
            }
        }
        None => String::new(),
    }
}

pub fn nuget_reference(prefix: &str, port: &str, triplet: &str, raw_version: &str, abi_tag: &str) -> NugetReference {
    NugetReference {
        id: format!("{prefix}{port}_{triplet}"),
        version: derive_nuget_version(raw_version, abi_tag),
    }
}

/// §6: try a date shape (`YYYY-MM-DD[.N]*` -> `Y.M.D`, disambiguators
/// dropped), then a leading-`v`-stripped dot-version, then `0.0.0`; always
/// suffixed with `-vcpkg<abi-tag>`.
fn derive_nuget_version(raw_version: &str, abi_tag: &str) -> String {
    let ymd = raw_version.split('.').next().unwrap_or("");
    let base = if is_date_shape(ymd) {
        ymd.replace('-', ".")
    } else {
        let stripped = raw_version.strip_prefix('v').unwrap_or(raw_version);
        if stripped.split('.').all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
            stripped.to_string()
        } else {
            "0.0.0".to_string()
        }
    };
    format!("{base}-vcpkg{abi_tag}")
}

fn is_date_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 3
        && parts[0].len() == 4
        && parts[1].len() == 2
        && parts[2].len() == 2
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
}

/// Recovered from `binarycaching.cpp`: `VCPKG_NUGET_REPOSITORY` wins
/// outright; otherwise the four `GITHUB_*` variables, if all present, are
/// combined; otherwise no element is emitted.
pub fn repository_element(env: &HashMap<String, String>) -> Option<String> {
    if let Some(repo) = env.get("VCPKG_NUGET_REPOSITORY") {
        return Some(format!(r#"<repository type="git" url="{}" />"#, xml_escape(repo)));
    }
    let server = env.get("GITHUB_SERVER_URL")?;
    let repo = env.get("GITHUB_REPOSITORY")?;
    let git_ref = env.get("GITHUB_REF")?;
    let sha = env.get("GITHUB_SHA")?;
    Some(format!(
        r#"<repository type="git" url="{}/{}" branch="{}" commit="{}" />"#,
        xml_escape(server),
        xml_escape(repo),
        xml_escape(git_ref),
        xml_escape(sha)
    ))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

pub fn render_nuspec(reference: &NugetReference, description: &str, repository: Option<&str>) -> String {
    let repo_line = repository.map(|r| format!("    {r}\n")).unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <package xmlns=\"http://schemas.microsoft.com/packaging/2011/08/nuspec.xsd\">\n\
         <metadata>\n\
         <id>{}</id>\n\
         <version>{}</version>\n\
         <description>{}</description>\n\
         <authors>vcpkg</authors>\n\
         {repo_line}</metadata>\n\
         </package>\n",
        reference.id,
        reference.version,
        xml_escape(description)
    )
}

pub struct NugetBinaryProvider {
    source_uri: String,
    config_path: Option<PathBuf>,
    id_prefix: String,
    timeout_secs: Option<u64>,
    env: HashMap<String, String>,
    access: Access,
}

impl NugetBinaryProvider {
    pub fn new(
        source_uri: String,
        config_path: Option<PathBuf>,
        id_prefix: String,
        timeout_secs: Option<u64>,
        env: HashMap<String, String>,
        access: Access,
    ) -> Self {
        NugetBinaryProvider { source_uri, config_path, id_prefix, timeout_secs, env, access }
    }

    fn base_command(&self) -> ProcessBuilder {
        let mut p = ProcessBuilder::new("nuget");
        p.arg("-Source").arg(&self.source_uri);
        if let Some(config) = &self.config_path {
            p.arg("-ConfigFile").arg(config);
        }
        if let Some(secs) = self.timeout_secs {
            p.arg("-Timeout").arg(secs.to_string());
        }
        p.arg("-NonInteractive");
        p
    }

    fn reference_for(&self, action: &PrefetchAction) -> NugetReference {
        nuget_reference(
            &self.id_prefix,
            action.spec.name.as_str(),
            action.spec.triplet.as_str(),
            &action.version,
            &action.package_abi,
        )
    }
}

impl BinaryProvider for NugetBinaryProvider {
    fn name(&self) -> &str {
        "nuget"
    }

    fn needs_nuspec_data(&self) -> bool {
        true
    }

    fn prefetch(&self, actions: &[PrefetchAction]) -> Result<Vec<RestoreOutcome>> {
        actions.iter().map(|a| self.try_restore(a)).collect()
    }

    fn try_restore(&self, action: &PrefetchAction) -> Result<RestoreOutcome> {
        if !self.access.can_read() {
            return Ok(RestoreOutcome::Unavailable);
        }
        let reference = self.reference_for(action);
        std::fs::create_dir_all(&action.package_dir)?;
        let mut p = self.base_command();
        p.arg("install")
            .arg(&reference.id)
            .arg("-Version")
            .arg(&reference.version)
            .arg("-OutputDirectory")
            .arg(&action.package_dir);
        match p.exec() {
            Ok(()) => Ok(RestoreOutcome::Restored),
            Err(e) => {
                warn!(%e, package = %reference, "nuget install did not find the package");
                Ok(RestoreOutcome::Unavailable)
            }
        }
    }

    fn precheck(&self, actions: &[PrefetchAction]) -> Result<Vec<bool>> {
        if !self.access.can_read() {
            return Ok(vec![false; actions.len()]);
        }
        Ok(actions.iter().map(|_| true).collect())
    }

    fn push_success(&self, info: &PushInfo) -> Result<()> {
        if !self.access.can_write() {
            return Ok(());
        }
        let reference = nuget_reference(&self.id_prefix, info.spec.name.as_str(), info.spec.triplet.as_str(), &info.version, &info.package_abi);
        let repo = repository_element(&self.env);
        let nuspec = render_nuspec(&reference, &format!("{} built for {}", info.spec.name, info.spec.triplet), repo.as_deref());

        let nuspec_dir = tempfile::tempdir()?;
        let nuspec_path = nuspec_dir.path().join(format!("{}.nuspec", reference.id));
        std::fs::write(&nuspec_path, nuspec)?;

        let mut pack = ProcessBuilder::new("nuget");
        pack.arg("pack").arg(&nuspec_path).arg("-OutputDirectory").arg(nuspec_dir.path()).arg("-NoDefaultExcludes");
        pack.exec()?;

        let nupkg_path = nuspec_dir.path().join(reference.to_string());
        let mut push = self.base_command();
        push.arg("push").arg(&nupkg_path);
        let output = push.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if AUTH_PROMPT_MARKERS.iter().any(|m| stdout.contains(m)) {
            warn!(package = %reference, "nuget push requires interactive authentication, skipping");
            return Ok(());
        }
        if !output.status.success() {
            bail!("nuget push failed for {reference}: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_id_dot_version_dot_nupkg() {
        let reference = NugetReference { id: "zlib_x64-linux".to_string(), version: "1.3.1-vcpkgabc123".to_string() };
        assert_eq!(reference.to_string(), "zlib_x64-linux.1.3.1-vcpkgabc123.nupkg");
    }

    #[test]
    fn id_prefix_trims_dashes_and_appends_underscore() {
        let mut env = HashMap::new();
        env.insert("X_VCPKG_NUGET_ID_PREFIX".to_string(), "--myorg--".to_string());
        assert_eq!(nuget_id_prefix(&env), "myorg_");
    }

    #[test]
    fn id_prefix_empty_when_unset() {
        assert_eq!(nuget_id_prefix(&HashMap::new()), "");
    }

    #[test]
    fn version_prefers_date_shape() {
        assert_eq!(derive_nuget_version("2024-01-02.3", "abc"), "2024.01.02-vcpkgabc");
    }

    #[test]
    fn version_falls_back_to_stripped_dot_version() {
        assert_eq!(derive_nuget_version("v1.2.3", "abc"), "1.2.3-vcpkgabc");
    }

    #[test]
    fn version_falls_back_to_zero_for_opaque_strings() {
        assert_eq!(derive_nuget_version("2with\"quotes", "abc"), "0.0.0-vcpkgabc");
    }

    #[test]
    fn repository_element_prefers_explicit_override() {
        let mut env = HashMap::new();
        env.insert("VCPKG_NUGET_REPOSITORY".to_string(), "https://example/repo".to_string());
        env.insert("GITHUB_SERVER_URL".to_string(), "https://github.com".to_string());
        let elem = repository_element(&env).unwrap();
        assert!(elem.contains("https://example/repo"));
    }

    #[test]
    fn repository_element_falls_back_to_github_quadruple() {
        let mut env = HashMap::new();
        env.insert("GITHUB_SERVER_URL".to_string(), "https://github.com".to_string());
        env.insert("GITHUB_REPOSITORY".to_string(), "acme/widgets".to_string());
        env.insert("GITHUB_REF".to_string(), "refs/heads/main".to_string());
        env.insert("GITHUB_SHA".to_string(), "deadbeef".to_string());
        let elem = repository_element(&env).unwrap();
        assert!(elem.contains("https://github.com/acme/widgets"));
        assert!(elem.contains("refs/heads/main"));
        assert!(elem.contains("deadbeef"));
    }

    #[test]
    fn repository_element_absent_when_nothing_configured() {
        assert!(repository_element(&HashMap::new()).is_none());
    }
}
