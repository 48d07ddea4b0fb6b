//! Version model (C1): parse and compare semver, relaxed-dot, date, and
//! opaque-string versions, each carrying a `port_version` tiebreaker.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Which of the four version grammars a given version text is parsed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionScheme {
    Semver,
    Relaxed,
    Date,
    String,
}

/// The payload of a single dot-separated "relaxed" or semver version:
/// `major.minor.patch...` plus an optional `-pre.release` suffix. The
/// `+build` suffix is parsed but never affects comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DotVersion {
    pub components: Vec<u64>,
    pub prerelease: Vec<PrereleaseIdent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrereleaseIdent {
    Numeric(u64),
    Alnum(String),
}

impl Ord for PrereleaseIdent {
    fn cmp(&self, other: &Self) -> Ordering {
        use PrereleaseIdent::*;
        match (self, other) {
            (Numeric(a), Numeric(b)) => a.cmp(b),
            (Alnum(a), Alnum(b)) => a.cmp(b),
            // Mixed identifiers: numeric sorts lower than alnum, matching
            // semver 2.0's rule ("Numeric identifiers always have lower
            // precedence than alphanumeric identifiers").
            (Numeric(_), Alnum(_)) => Ordering::Less,
            (Alnum(_), Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for PrereleaseIdent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A calendar-date version: `YYYY-MM-DD` plus zero or more non-negative
/// integer disambiguators (`.N.N...`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateVersion {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub disambiguators: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VersionText {
    Semver(DotVersion),
    Relaxed(DotVersion),
    Date(DateVersion),
    String(String),
}

/// A full version: its parsed text plus the `#N` port-version tiebreaker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    pub text: VersionText,
    pub port_version: u64,
    /// The original, unparsed string (kept for display and for the
    /// byte-identity comparison String versions require).
    raw: String,
}

impl Version {
    pub fn scheme(&self) -> VersionScheme {
        match &self.text {
            VersionText::Semver(_) => VersionScheme::Semver,
            VersionText::Relaxed(_) => VersionScheme::Relaxed,
            VersionText::Date(_) => VersionScheme::Date,
            VersionText::String(_) => VersionScheme::String,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port_version == 0 {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "{}#{}", self.raw, self.port_version)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid semver version `{0}`")]
    InvalidSemver(String),
    #[error("invalid relaxed version `{0}`: must be dot-separated non-negative integers")]
    InvalidRelaxed(String),
    #[error("invalid date version `{0}`: expected YYYY-MM-DD[.N.N...]")]
    InvalidDate(String),
    #[error("version component has a leading zero in `{0}`")]
    LeadingZero(String),
}

/// Parses `text` (without any `#port_version` suffix) under `scheme`.
pub fn parse(text: &str, scheme: VersionScheme) -> Result<Version, ParseError> {
    let (body, port_version) = split_port_version(text);
    let parsed = match scheme {
        VersionScheme::Semver => VersionText::Semver(parse_dot_version(body, true)?),
        VersionScheme::Relaxed => VersionText::Relaxed(parse_dot_version(body, false)?),
        VersionScheme::Date => VersionText::Date(parse_date(body)?),
        VersionScheme::String => VersionText::String(body.to_string()),
    };
    Ok(Version {
        text: parsed,
        port_version,
        raw: body.to_string(),
    })
}

/// Splits a trailing `#N` port-version suffix off of `text`, defaulting to 0.
fn split_port_version(text: &str) -> (&str, u64) {
    match text.rsplit_once('#') {
        Some((body, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty() => {
            (body, suffix.parse().unwrap_or(0))
        }
        _ => (text, 0),
    }
}

fn no_leading_zero(s: &str) -> bool {
    s == "0" || !s.starts_with('0')
}

fn parse_dot_version(text: &str, strict_semver: bool) -> Result<DotVersion, ParseError> {
    let (main, prerelease_and_build) = match text.split_once('-') {
        Some((m, rest)) => (m, Some(rest)),
        None => (text, None),
    };
    // A `+build` suffix may appear either directly on `main` (no prerelease)
    // or after the prerelease part; strip it in both places and ignore it.
    let main = main.split_once('+').map(|(m, _)| m).unwrap_or(main);

    if main.is_empty() {
        return Err(ParseError::InvalidRelaxed(text.to_string()));
    }
    let mut components = Vec::new();
    for part in main.split('.') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(if strict_semver {
                ParseError::InvalidSemver(text.to_string())
            } else {
                ParseError::InvalidRelaxed(text.to_string())
            });
        }
        if !no_leading_zero(part) {
            return Err(ParseError::LeadingZero(text.to_string()));
        }
        components.push(part.parse::<u64>().map_err(|_| {
            if strict_semver {
                ParseError::InvalidSemver(text.to_string())
            } else {
                ParseError::InvalidRelaxed(text.to_string())
            }
        })?);
    }
    if strict_semver && components.len() != 3 {
        return Err(ParseError::InvalidSemver(text.to_string()));
    }

    let mut prerelease = Vec::new();
    if let Some(rest) = prerelease_and_build {
        let rest = rest.split_once('+').map(|(p, _)| p).unwrap_or(rest);
        if rest.is_empty() {
            return Err(ParseError::InvalidRelaxed(text.to_string()));
        }
        for ident in rest.split('.') {
            if ident.is_empty() {
                return Err(ParseError::InvalidRelaxed(text.to_string()));
            }
            if ident.chars().all(|c| c.is_ascii_digit()) {
                if !no_leading_zero(ident) {
                    return Err(ParseError::LeadingZero(text.to_string()));
                }
                prerelease.push(PrereleaseIdent::Numeric(ident.parse().unwrap()));
            } else {
                prerelease.push(PrereleaseIdent::Alnum(ident.to_string()));
            }
        }
    }

    Ok(DotVersion {
        components,
        prerelease,
    })
}

fn parse_date(text: &str) -> Result<DateVersion, ParseError> {
    let mut parts = text.split('.');
    let ymd = parts.next().ok_or_else(|| ParseError::InvalidDate(text.to_string()))?;
    let mut ymd_parts = ymd.split('-');
    let (y, m, d) = (
        ymd_parts.next(),
        ymd_parts.next(),
        ymd_parts.next(),
    );
    let (y, m, d) = match (y, m, d) {
        (Some(y), Some(m), Some(d)) if ymd_parts.next().is_none() => (y, m, d),
        _ => return Err(ParseError::InvalidDate(text.to_string())),
    };
    // Year, month, and day are fixed-width calendar fields (`YYYY-MM-DD`),
    // so the no-leading-zero rule does not apply to them -- only to the
    // trailing disambiguators below.
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return Err(ParseError::InvalidDate(text.to_string()));
    }
    for piece in [y, m, d] {
        if !piece.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseError::InvalidDate(text.to_string()));
        }
    }
    let year: u32 = y.parse().map_err(|_| ParseError::InvalidDate(text.to_string()))?;
    let month: u32 = m.parse().map_err(|_| ParseError::InvalidDate(text.to_string()))?;
    let day: u32 = d.parse().map_err(|_| ParseError::InvalidDate(text.to_string()))?;
    if month == 0 || month > 12 || day == 0 || day > 31 {
        return Err(ParseError::InvalidDate(text.to_string()));
    }

    let mut disambiguators = Vec::new();
    for part in parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) || !no_leading_zero(part) {
            return Err(ParseError::InvalidDate(text.to_string()));
        }
        disambiguators.push(part.parse().map_err(|_| ParseError::InvalidDate(text.to_string()))?);
    }

    Ok(DateVersion {
        year,
        month,
        day,
        disambiguators,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    Unknown,
}

/// Compares two versions, taking their (possibly different) schemes into
/// account. This is the single entry point the resolver uses; see §4.1.
pub fn compare(a: &Version, b: &Version) -> Comparison {
    let primary = compare_primary(&a.text, &b.text);
    match primary {
        Comparison::Equal => compare_port_version(a.port_version, b.port_version),
        other => other,
    }
}

fn compare_port_version(a: u64, b: u64) -> Comparison {
    match a.cmp(&b) {
        Ordering::Less => Comparison::Less,
        Ordering::Equal => Comparison::Equal,
        Ordering::Greater => Comparison::Greater,
    }
}

fn compare_primary(a: &VersionText, b: &VersionText) -> Comparison {
    use VersionText::*;
    match (a, b) {
        (String(x), String(y)) => {
            if x == y {
                Comparison::Equal
            } else {
                Comparison::Unknown
            }
        }
        (String(_), _) | (_, String(_)) => Comparison::Unknown,
        (Date(x), Date(y)) => from_ord(compare_date(x, y)),
        (Date(x), other @ (Relaxed(_) | Semver(_))) => {
            compare_dot(&date_as_dot(x), dot_of(other))
        }
        (other @ (Relaxed(_) | Semver(_)), Date(y)) => {
            compare_dot(dot_of(other), &date_as_dot(y))
        }
        (Semver(x), Semver(y)) | (Relaxed(x), Relaxed(y)) => compare_dot(x, y),
        (Semver(x), Relaxed(y)) | (Relaxed(x), Semver(y)) => compare_dot(x, y),
    }
}

fn dot_of(v: &VersionText) -> &DotVersion {
    match v {
        VersionText::Semver(d) | VersionText::Relaxed(d) => d,
        _ => unreachable!("dot_of called on non-dot version"),
    }
}

fn date_as_dot(d: &DateVersion) -> DotVersion {
    let mut components = vec![d.year as u64, d.month as u64, d.day as u64];
    components.extend(d.disambiguators.iter().copied());
    DotVersion {
        components,
        prerelease: Vec::new(),
    }
}

fn compare_date(a: &DateVersion, b: &DateVersion) -> Ordering {
    (a.year, a.month, a.day, &a.disambiguators).cmp(&(b.year, b.month, b.day, &b.disambiguators))
}

fn from_ord(o: Ordering) -> Comparison {
    match o {
        Ordering::Less => Comparison::Less,
        Ordering::Equal => Comparison::Equal,
        Ordering::Greater => Comparison::Greater,
    }
}

fn compare_dot(a: &DotVersion, b: &DotVersion) -> Comparison {
    let len = a.components.len().max(b.components.len());
    for i in 0..len {
        let x = a.components.get(i).copied().unwrap_or(0);
        let y = b.components.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return from_ord(other),
        }
    }
    from_ord(compare_prerelease(&a.prerelease, &b.prerelease))
}

/// Absence of a pre-release outranks presence of one; among two
/// pre-releases, compare identifier by identifier (numeric identifiers
/// compare numerically, everything else lexicographically), and a prefix is
/// smaller than its extension.
fn compare_prerelease(a: &[PrereleaseIdent], b: &[PrereleaseIdent]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str, scheme: VersionScheme) -> Version {
        parse(text, scheme).unwrap()
    }

    #[test]
    fn semver_basic_compare() {
        assert_eq!(
            compare(&v("1.2.3", VersionScheme::Semver), &v("1.2.4", VersionScheme::Semver)),
            Comparison::Less
        );
    }

    #[test]
    fn prerelease_less_than_release() {
        assert_eq!(
            compare(
                &v("1.0.0-alpha", VersionScheme::Semver),
                &v("1.0.0", VersionScheme::Semver)
            ),
            Comparison::Less
        );
    }

    #[test]
    fn numeric_prerelease_identifiers_compare_numerically() {
        assert_eq!(
            compare(
                &v("1.0.0-alpha.2", VersionScheme::Semver),
                &v("1.0.0-alpha.10", VersionScheme::Semver)
            ),
            Comparison::Less
        );
    }

    #[test]
    fn build_metadata_ignored() {
        assert_eq!(
            compare(
                &v("1.0.0+build1", VersionScheme::Semver),
                &v("1.0.0+build2", VersionScheme::Semver)
            ),
            Comparison::Equal
        );
    }

    #[test]
    fn string_versions_equal_iff_byte_identical() {
        assert_eq!(
            compare(&v("2with\"quotes", VersionScheme::String), &v("2with\"quotes", VersionScheme::String)),
            Comparison::Equal
        );
        assert_eq!(
            compare(&v("abc", VersionScheme::String), &v("abd", VersionScheme::String)),
            Comparison::Unknown
        );
    }

    #[test]
    fn cross_scheme_with_string_is_unknown() {
        assert_eq!(
            compare(&v("1.0.0", VersionScheme::Semver), &v("1.0.0", VersionScheme::String)),
            Comparison::Unknown
        );
    }

    #[test]
    fn date_compares_by_ymd_then_disambiguators() {
        assert_eq!(
            compare(&v("2020-01-01", VersionScheme::Date), &v("2020-01-02", VersionScheme::Date)),
            Comparison::Less
        );
        assert_eq!(
            compare(&v("2020-01-01.1", VersionScheme::Date), &v("2020-01-01.2", VersionScheme::Date)),
            Comparison::Less
        );
    }

    #[test]
    fn date_and_relaxed_are_comparable_as_dot_versions() {
        assert_eq!(
            compare(&v("2020-01-01", VersionScheme::Date), &v("2020.1.2", VersionScheme::Relaxed)),
            Comparison::Less
        );
    }

    #[test]
    fn port_version_is_tiebreaker_only_on_equal_primary() {
        assert_eq!(
            compare(&v("1.0.0#1", VersionScheme::Semver), &v("1.0.0#0", VersionScheme::Semver)),
            Comparison::Greater
        );
        assert_eq!(
            compare(&v("1.0.0#0", VersionScheme::Semver), &v("1.0.1#5", VersionScheme::Semver)),
            Comparison::Less
        );
    }

    #[test]
    fn rejects_leading_zeros_except_bare_zero() {
        assert!(parse("1.02.0", VersionScheme::Relaxed).is_err());
        assert!(parse("1.0.0", VersionScheme::Relaxed).is_ok());
    }

    #[test]
    fn date_requires_exact_shape() {
        assert!(parse("2020-1-1", VersionScheme::Date).is_err()); // missing leading zero digits
        assert!(parse("2020-01-01", VersionScheme::Date).is_ok());
        assert!(parse("not-a-date", VersionScheme::Date).is_err());
    }

    #[test]
    fn semver_requires_exactly_three_components() {
        assert!(parse("1.2", VersionScheme::Semver).is_err());
        assert!(parse("1.2.3.4", VersionScheme::Semver).is_err());
        assert!(parse("1.2.3", VersionScheme::Semver).is_ok());
    }
}
