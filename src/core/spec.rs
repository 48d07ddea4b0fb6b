//! Package/feature/triplet identifiers (C2) and the qualified-specifier
//! parser (`name[feat1,feat2]:triplet (expr)`).

use std::fmt;

use portkit_platform::PlatformExpr;
use thiserror::Error;

/// A lowercase `[a-z0-9-]+` name that is neither `default` nor `core`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortName(String);

/// The reserved feature names a port or feature may never be named.
pub const RESERVED_NAMES: [&str; 2] = ["default", "core"];
/// The feature every port implicitly has and that is always selected.
pub const CORE_FEATURE: &str = "core";
/// The virtual marker that expands to a port's declared default features.
pub const DEFAULT_FEATURE: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("`{0}` is not a valid name: must match [a-z0-9-]+")]
    InvalidCharacters(String),
    #[error("`{0}` is a reserved name and cannot be used as a port or feature name")]
    Reserved(String),
    #[error("name cannot be empty")]
    Empty,
}

fn validate_name(s: &str) -> Result<(), NameError> {
    if s.is_empty() {
        return Err(NameError::Empty);
    }
    if !s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(NameError::InvalidCharacters(s.to_string()));
    }
    if RESERVED_NAMES.contains(&s) {
        return Err(NameError::Reserved(s.to_string()));
    }
    Ok(())
}

impl PortName {
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        validate_name(&s)?;
        Ok(PortName(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A feature name: same charset as a port name, but `core` and `default` are
/// meaningful pseudo-features handled specially rather than rejected --
/// `core` is always implicitly selected, `default` is a virtual marker that
/// expands to the declared default-feature list. Everything else follows the
/// same validation as a port name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureName(String);

impl FeatureName {
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        // `*` is the "all features" wildcard: preserved literally rather
        // than expanded, so it bypasses the usual [a-z0-9-]+ charset check.
        if s == "*" {
            return Ok(FeatureName(s));
        }
        if !s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(NameError::InvalidCharacters(s.to_string()));
        }
        Ok(FeatureName(s))
    }

    pub fn core() -> Self {
        FeatureName(CORE_FEATURE.to_string())
    }

    pub fn default_marker() -> Self {
        FeatureName(DEFAULT_FEATURE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_core(&self) -> bool {
        self.0 == CORE_FEATURE
    }

    pub fn is_default_marker(&self) -> bool {
        self.0 == DEFAULT_FEATURE
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named build configuration (target arch + OS + linkage, etc).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triplet(String);

impl Triplet {
    pub fn new(s: impl Into<String>) -> Self {
        Triplet(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(name, triplet)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageSpec {
    pub name: PortName,
    pub triplet: Triplet,
}

impl PackageSpec {
    pub fn new(name: PortName, triplet: Triplet) -> Self {
        PackageSpec { name, triplet }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.triplet)
    }
}

/// `(PackageSpec, feature_name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureSpec {
    pub spec: PackageSpec,
    pub feature: FeatureName,
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.spec, self.feature)
    }
}

/// Flags controlling which parts of the qualified-specifier grammar are
/// permitted in a given context (e.g. baseline overrides forbid features).
#[derive(Clone, Copy, Debug, Default)]
pub struct QualifiedSpecifierParseFlags {
    pub forbid_features: bool,
    pub require_triplet: bool,
    pub forbid_triplet: bool,
    pub forbid_platform_suffix: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedQualifiedSpecifier {
    pub name: String,
    pub features: Vec<String>,
    pub triplet: Option<String>,
    pub platform: Option<PlatformExpr>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SpecifierParseError {
    pub message: String,
    pub input: String,
    pub column: usize,
}

impl fmt::Display for SpecifierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "  {}", self.input)?;
        write!(f, "  {}^", " ".repeat(self.column))
    }
}

impl std::error::Error for SpecifierParseError {}

/// Parses `name[feat1,feat2]:triplet (expr)`.
///
/// On the common typo `name:triplet[features]`, the error suggests the
/// correct order (`name[features]:triplet`) instead of a generic parse
/// failure.
pub fn parse_qualified_specifier(
    input: &str,
    flags: QualifiedSpecifierParseFlags,
) -> Result<ParsedQualifiedSpecifier, SpecifierParseError> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let err = |message: String, column: usize| SpecifierParseError {
        message,
        input: input.to_string(),
        column,
    };

    let is_name_char = |b: u8| (b as char).is_ascii_lowercase() || (b as char).is_ascii_digit() || b == b'-';
    let name_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    if i == name_start {
        return Err(err("expected a package name".to_string(), i));
    }
    let name = input[name_start..i].to_string();

    let mut features = Vec::new();
    if i < bytes.len() && bytes[i] == b'[' {
        if flags.forbid_features {
            return Err(err("features are not allowed here".to_string(), i));
        }
        i += 1;
        loop {
            let start = i;
            while i < bytes.len() && bytes[i] != b',' && bytes[i] != b']' {
                i += 1;
            }
            if i == start {
                return Err(err("expected a feature name".to_string(), i));
            }
            features.push(input[start..i].to_string());
            if i >= bytes.len() {
                return Err(err("unterminated feature list, expected `]`".to_string(), i));
            }
            if bytes[i] == b']' {
                i += 1;
                break;
            }
            i += 1; // comma
        }
    }

    let mut triplet = None;
    if i < bytes.len() && bytes[i] == b':' {
        if flags.forbid_triplet {
            return Err(err("an explicit triplet is not allowed here".to_string(), i));
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i] != b' ' && bytes[i] != b'[' {
            i += 1;
        }
        if i == start {
            return Err(err("expected a triplet name after `:`".to_string(), i));
        }
        // Special-case guidance: `name:triplet[features]` -- the features
        // landed after the triplet instead of before it.
        if i < bytes.len() && bytes[i] == b'[' {
            let close = input[i..]
                .find(']')
                .map(|e| i + e)
                .ok_or_else(|| err("unterminated feature list, expected `]`".to_string(), i))?;
            let triplet_text = &input[start..i];
            let features_text = &input[i + 1..close];
            return Err(err(
                format!(
                    "features must come before the triplet; did you mean `{name}[{features_text}]:{triplet_text}`?"
                ),
                i,
            ));
        }
        triplet = Some(input[start..i].to_string());
    } else if flags.require_triplet {
        return Err(err("a triplet is required here (`name:triplet`)".to_string(), i));
    }

    let mut platform = None;
    let rest = input[i..].trim_start();
    if !rest.is_empty() {
        if flags.forbid_platform_suffix {
            return Err(err(
                "a platform-qualifier suffix is not allowed here".to_string(),
                i,
            ));
        }
        let rest = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')).ok_or_else(|| {
            err(
                "expected a parenthesized platform expression after the specifier".to_string(),
                i,
            )
        })?;
        platform = Some(PlatformExpr::parse(rest).map_err(|e| err(e.to_string(), i))?);
    }

    validate_name(&name).map_err(|e| err(e.to_string(), name_start))?;

    Ok(ParsedQualifiedSpecifier {
        name,
        features,
        triplet,
        platform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let p = parse_qualified_specifier("zlib", QualifiedSpecifierParseFlags::default()).unwrap();
        assert_eq!(p.name, "zlib");
        assert!(p.features.is_empty());
        assert!(p.triplet.is_none());
        assert!(p.platform.is_none());
    }

    #[test]
    fn parses_features_and_triplet_and_platform() {
        let p = parse_qualified_specifier(
            "curl[ssl,http2]:x64-windows (windows & x64)",
            QualifiedSpecifierParseFlags::default(),
        )
        .unwrap();
        assert_eq!(p.name, "curl");
        assert_eq!(p.features, vec!["ssl", "http2"]);
        assert_eq!(p.triplet.as_deref(), Some("x64-windows"));
        assert!(p.platform.is_some());
    }

    #[test]
    fn suggests_reordering_on_common_typo() {
        let err = parse_qualified_specifier(
            "curl:x64-windows[ssl]",
            QualifiedSpecifierParseFlags::default(),
        )
        .unwrap_err();
        assert!(err.message.contains("curl[ssl]:x64-windows"));
    }

    #[test]
    fn forbids_features_when_flagged() {
        let flags = QualifiedSpecifierParseFlags {
            forbid_features: true,
            ..Default::default()
        };
        assert!(parse_qualified_specifier("curl[ssl]", flags).is_err());
    }

    #[test]
    fn requires_triplet_when_flagged() {
        let flags = QualifiedSpecifierParseFlags {
            require_triplet: true,
            ..Default::default()
        };
        assert!(parse_qualified_specifier("curl", flags).is_err());
        assert!(parse_qualified_specifier("curl:x64-linux", flags).is_ok());
    }

    #[test]
    fn rejects_reserved_names() {
        assert!(PortName::new("default").is_err());
        assert!(PortName::new("core").is_err());
        assert!(FeatureName::new("UpperCase").is_err());
    }
}
