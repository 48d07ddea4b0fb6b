//! Resolver failure taxonomy (§7). Each variant renders as a localized,
//! actionable message; `code()` gives callers a stable tag to match on
//! without parsing prose.

use std::fmt;

use crate::core::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    BaselineMissing {
        port: String,
    },
    VersionIncomparable {
        port: String,
        a: Version,
        b: Version,
    },
    VersionMissingFeature {
        port: String,
        version: Version,
        feature: String,
    },
    UnsupportedFeature {
        port: String,
        feature: String,
    },
    UnsupportedPortSupportsExpression {
        port: String,
        triplet: String,
        expr: String,
    },
    CycleDetected {
        root: String,
        path: Vec<String>,
    },
    OverlayPatchDir {
        port: String,
        path: String,
    },
    /// Not in the original C++ taxonomy by name, but required by the
    /// provider contract in §4.3 (`get_control_file` may legitimately
    /// return `None` for a version the baseline/override/constraint math
    /// names but the version database never published). Recorded as an
    /// Open Question resolution in DESIGN.md.
    VersionNotFound {
        port: String,
        version: Version,
    },
    /// A provider (baseline/overlay/registry) call itself returned `Err`,
    /// as opposed to a well-formed "not found" `Ok(None)`.
    ProviderError {
        port: String,
        detail: String,
    },
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::BaselineMissing { .. } => "baseline-missing",
            ResolveError::VersionIncomparable { .. } => "version-incomparable",
            ResolveError::VersionMissingFeature { .. } => "version-missing-feature",
            ResolveError::UnsupportedFeature { .. } => "unsupported-feature",
            ResolveError::UnsupportedPortSupportsExpression { .. } => {
                "unsupported-port-supports-expression"
            }
            ResolveError::CycleDetected { .. } => "cycle-detected",
            ResolveError::OverlayPatchDir { .. } => "overlay-patch-dir",
            ResolveError::VersionNotFound { .. } => "version-not-found",
            ResolveError::ProviderError { .. } => "provider-error",
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::BaselineMissing { port } => write!(
                f,
                "error: no baseline version is available for port `{port}`; \
                 add a `builtin-baseline` or extend the registry baseline"
            ),
            ResolveError::VersionIncomparable { port, a, b } => {
                let detail = if matches!(a.scheme(), crate::core::version::VersionScheme::String)
                    && matches!(b.scheme(), crate::core::version::VersionScheme::String)
                {
                    "Both versions have scheme string but different primary text".to_string()
                } else {
                    format!(
                        "one version has scheme {:?} but the other has scheme {:?}",
                        a.scheme(),
                        b.scheme()
                    )
                };
                write!(
                    f,
                    "error: version conflict on port `{port}`: `{a}` and `{b}` cannot be \
                     compared. {detail}\n\
                     Add an override to pin one version, for example:\n\
                     {{\n  \"overrides\": [\n    {{ \"name\": \"{port}\", \"version\": \"{a}\" }}\n  ]\n}}"
                )
            }
            ResolveError::VersionMissingFeature { port, version, feature } => write!(
                f,
                "error: port `{port}@{version}` has no feature `{feature}`; \
                 pick a version that provides it, or drop the feature"
            ),
            ResolveError::UnsupportedFeature { port, feature } => write!(
                f,
                "error: port `{port}` declares no feature named `{feature}`; check the port metadata"
            ),
            ResolveError::UnsupportedPortSupportsExpression { port, triplet, expr } => write!(
                f,
                "error: `{port}` is not supported on triplet `{triplet}`: `supports` expression \
                 `{expr}` evaluated to false. Change the triplet, or pass allow-unsupported."
            ),
            ResolveError::CycleDetected { root, path } => {
                write!(f, "error: cycle detected during {root}:\n{}", path.join("\n"))
            }
            ResolveError::OverlayPatchDir { port, path } => write!(
                f,
                "error: overlay path `{path}` for port `{port}` is not a directory; fix the configuration"
            ),
            ResolveError::VersionNotFound { port, version } => write!(
                f,
                "error: no metadata found for `{port}@{version}` in the version database"
            ),
            ResolveError::ProviderError { port, detail } => write!(
                f,
                "error: failed to query provider for `{port}`: {detail}"
            ),
        }
    }
}

impl std::error::Error for ResolveError {}
