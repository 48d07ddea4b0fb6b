//! Cache-config parser (C6): `VCPKG_BINARY_SOURCES`-style syntax and the
//! asset-cache grammar, both built on the same backtick-escaped,
//! semicolon/comma-segmented source list (§4.6).

use std::fmt;
use std::path::PathBuf;

use crate::cache::secrets::SecretList;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    fn parse(s: &str) -> Option<Access> {
        match s {
            "read" => Some(Access::Read),
            "write" => Some(Access::Write),
            "readwrite" => Some(Access::ReadWrite),
            _ => None,
        }
    }

    pub fn can_read(&self) -> bool {
        !matches!(self, Access::Write)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, Access::Read)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
    pub input: String,
    pub column: usize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "  {}", self.input)?;
        write!(f, "  {}^", " ".repeat(self.column))
    }
}

impl std::error::Error for ConfigError {}

/// One semicolon-delimited source, already split into backtick-unescaped,
/// comma-delimited segments, paired with the byte offset it started at (for
/// error reporting).
struct RawSource {
    segments: Vec<String>,
    offset: usize,
}

/// Splits `text` into sources, each a list of segments, honoring backtick
/// escapes of `,`, `;`, and `` ` `` itself. Sources consisting of a single
/// empty segment (`;;`) are dropped entirely, matching "empty sources are
/// skipped".
fn tokenize(text: &str) -> Vec<RawSource> {
    let mut sources = Vec::new();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut source_offset = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '`' => {
                if let Some(&(_, next)) = chars.peek() {
                    if next == ',' || next == ';' || next == '`' {
                        current.push(next);
                        chars.next();
                        continue;
                    }
                }
                current.push('`');
            }
            ',' => {
                segments.push(std::mem::take(&mut current));
            }
            ';' => {
                segments.push(std::mem::take(&mut current));
                flush_source(&mut sources, &mut segments, source_offset);
                source_offset = i + 1;
            }
            other => current.push(other),
        }
    }
    segments.push(current);
    flush_source(&mut sources, &mut segments, source_offset);

    sources
}

fn flush_source(sources: &mut Vec<RawSource>, segments: &mut Vec<String>, offset: usize) {
    let taken = std::mem::take(segments);
    if taken.len() == 1 && taken[0].is_empty() {
        return;
    }
    sources.push(RawSource { segments: taken, offset });
}

/// One parsed `VCPKG_BINARY_SOURCES`-style entry, with the one-shot
/// `clear`/`x-aws-config` directives already resolved away by [`resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedProvider {
    Default { access: Access },
    Files { path: PathBuf, access: Access },
    Http { url_template: String, access: Access, header: Option<String> },
    AzBlob { base_url: String, sas: String, access: Access },
    Gcs { prefix: String, access: Access },
    Aws { prefix: String, access: Access, no_sign_request: bool },
    Cos { prefix: String, access: Access },
    Gha { access: Access },
    Nuget { uri: String, access: Access },
    NugetConfig { path: PathBuf, access: Access },
}

enum Directive {
    Clear,
    Provider(ResolvedProvider),
    AwsConfigNoSignRequest,
    NugetTimeout(u64),
    Interactive,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub providers: Vec<ResolvedProvider>,
    pub nuget_timeout_secs: Option<u64>,
    pub interactive: bool,
}

/// Parses the `VCPKG_BINARY_SOURCES` grammar. Returns the fully resolved
/// config (with `clear`/`x-aws-config` already folded in) plus any
/// per-source diagnostics; a source with an error contributes nothing and
/// parsing continues with the next source.
pub fn parse(text: &str, secrets: &mut SecretList) -> (CacheConfig, Vec<ConfigError>) {
    let mut directives = Vec::new();
    let mut errors = Vec::new();
    for source in tokenize(text) {
        match parse_binary_source(&source, secrets) {
            Ok(d) => directives.push(d),
            Err(e) => errors.push(e),
        }
    }
    (resolve(directives), errors)
}

/// §6: `VCPKG_BINARY_SOURCES`, followed by CLI `--binarysource=` arguments
/// in order, with an implicit `default,readwrite` prepended.
pub fn parse_binary_sources(
    env_value: Option<&str>,
    cli_args: &[String],
    secrets: &mut SecretList,
) -> (CacheConfig, Vec<ConfigError>) {
    let mut combined = "default,readwrite".to_string();
    if let Some(env) = env_value {
        if !env.is_empty() {
            combined.push(';');
            combined.push_str(env);
        }
    }
    for arg in cli_args {
        combined.push(';');
        combined.push_str(arg);
    }
    parse(&combined, secrets)
}

fn parse_binary_source(source: &RawSource, secrets: &mut SecretList) -> Result<Directive, ConfigError> {
    let err = |message: String| ConfigError {
        message,
        input: source.segments.join(","),
        column: source.offset,
    };
    let seg = &source.segments;
    let access_at = |i: usize| -> Result<Access, ConfigError> {
        match seg.get(i) {
            None => Ok(Access::Read),
            Some(s) if s.is_empty() => Ok(Access::Read),
            Some(s) => Access::parse(s).ok_or_else(|| err(format!("invalid access `{s}`: expected read, write, or readwrite"))),
        }
    };

    match seg[0].as_str() {
        "clear" => Ok(Directive::Clear),
        "default" => Ok(Directive::Provider(ResolvedProvider::Default { access: access_at(1)? })),
        "files" => {
            let path = seg.get(1).ok_or_else(|| err("`files` requires an absolute path".to_string()))?;
            let path = PathBuf::from(path);
            if !path.is_absolute() {
                return Err(err(format!("`files` path `{}` must be absolute", path.display())));
            }
            Ok(Directive::Provider(ResolvedProvider::Files { path, access: access_at(2)? }))
        }
        "http" => {
            let url_template = seg
                .get(1)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| err("`http` requires a URL template".to_string()))?
                .clone();
            let header = seg.get(3).filter(|s| !s.is_empty()).cloned();
            Ok(Directive::Provider(ResolvedProvider::Http {
                url_template,
                access: access_at(2)?,
                header,
            }))
        }
        "x-azblob" => {
            let base_url = seg
                .get(1)
                .filter(|s| s.starts_with("https://"))
                .ok_or_else(|| err("`x-azblob` requires an https base URL".to_string()))?
                .clone();
            let sas = seg
                .get(2)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| err("`x-azblob` requires a SAS query string".to_string()))?
                .clone();
            secrets.register(sas.clone());
            Ok(Directive::Provider(ResolvedProvider::AzBlob { base_url, sas, access: access_at(3)? }))
        }
        "x-gcs" => Ok(Directive::Provider(ResolvedProvider::Gcs {
            prefix: require_prefixed(&err, seg, "gs://")?,
            access: access_at(2)?,
        })),
        "x-aws" => Ok(Directive::Provider(ResolvedProvider::Aws {
            prefix: require_prefixed(&err, seg, "s3://")?,
            access: access_at(2)?,
            no_sign_request: false,
        })),
        "x-cos" => Ok(Directive::Provider(ResolvedProvider::Cos {
            prefix: require_prefixed(&err, seg, "cos://")?,
            access: access_at(2)?,
        })),
        "x-aws-config" => {
            if seg.get(1).map(String::as_str) != Some("no-sign-request") {
                return Err(err("`x-aws-config` only supports `no-sign-request`".to_string()));
            }
            Ok(Directive::AwsConfigNoSignRequest)
        }
        "x-gha" => Ok(Directive::Provider(ResolvedProvider::Gha { access: access_at(1)? })),
        "nuget" => {
            let uri = seg.get(1).filter(|s| !s.is_empty()).ok_or_else(|| err("`nuget` requires a URI".to_string()))?.clone();
            Ok(Directive::Provider(ResolvedProvider::Nuget { uri, access: access_at(2)? }))
        }
        "nugetconfig" => {
            let path = seg.get(1).filter(|s| !s.is_empty()).ok_or_else(|| err("`nugetconfig` requires a path".to_string()))?;
            Ok(Directive::Provider(ResolvedProvider::NugetConfig {
                path: PathBuf::from(path),
                access: access_at(2)?,
            }))
        }
        "nugettimeout" => {
            let secs = seg
                .get(1)
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| err("`nugettimeout` requires an integer number of seconds".to_string()))?;
            Ok(Directive::NugetTimeout(secs))
        }
        "interactive" => Ok(Directive::Interactive),
        other => Err(err(format!("unrecognized binary cache source kind `{other}`"))),
    }
}

fn require_prefixed(
    err: &impl Fn(String) -> ConfigError,
    seg: &[String],
    prefix: &str,
) -> Result<String, ConfigError> {
    seg.get(1)
        .filter(|s| s.starts_with(prefix))
        .cloned()
        .ok_or_else(|| err(format!("expected a `{prefix}` prefixed bucket path")))
}

fn resolve(directives: Vec<Directive>) -> CacheConfig {
    let mut config = CacheConfig::default();
    let mut aws_no_sign_request = false;
    for directive in directives {
        match directive {
            Directive::Clear => {
                config.providers.clear();
                aws_no_sign_request = false;
            }
            Directive::AwsConfigNoSignRequest => aws_no_sign_request = true,
            Directive::NugetTimeout(secs) => config.nuget_timeout_secs = Some(secs),
            Directive::Interactive => config.interactive = true,
            Directive::Provider(ResolvedProvider::Aws { prefix, access, .. }) => {
                config.providers.push(ResolvedProvider::Aws { prefix, access, no_sign_request: aws_no_sign_request });
            }
            Directive::Provider(p) => config.providers.push(p),
        }
    }
    config
}

/// The asset-cache grammar (§4.6): same tokenizer, different source kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetSource {
    AzUrl { base_url: String, sas: Option<String> },
    Script { template: String },
    BlockOrigin,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetConfig {
    pub sources: Vec<AssetSource>,
    pub block_origin: bool,
}

pub fn parse_asset_sources(text: &str, secrets: &mut SecretList) -> (AssetConfig, Vec<ConfigError>) {
    let mut config = AssetConfig::default();
    let mut errors = Vec::new();
    for source in tokenize(text) {
        let err = |message: String| ConfigError {
            message,
            input: source.segments.join(","),
            column: source.offset,
        };
        let seg = &source.segments;
        match seg[0].as_str() {
            "clear" => {
                config.sources.clear();
                config.block_origin = false;
            }
            "x-block-origin" => config.block_origin = true,
            "x-azurl" => {
                let Some(base_url) = seg.get(1).filter(|s| !s.is_empty()) else {
                    errors.push(err("`x-azurl` requires a base URL".to_string()));
                    continue;
                };
                let sas = seg.get(2).filter(|s| !s.is_empty()).cloned();
                if let Some(sas) = &sas {
                    secrets.register(sas.clone());
                }
                config.sources.push(AssetSource::AzUrl { base_url: base_url.clone(), sas });
            }
            "x-script" => {
                let Some(template) = seg.get(1).filter(|s| !s.is_empty()) else {
                    errors.push(err("`x-script` requires a template".to_string()));
                    continue;
                };
                config.sources.push(AssetSource::Script { template: template.clone() });
            }
            other => errors.push(err(format!("unrecognized asset cache source kind `{other}`"))),
        }
    }
    (config, errors)
}

/// Expands `{url}`, `{sha512}`, `{dst}` in an `x-script` template; `{{` and
/// `}}` are literal braces.
pub fn render_script_template(template: &str, url: &str, sha512: &str, dst: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                match name.as_str() {
                    "url" => out.push_str(url),
                    "sha512" => out.push_str(sha512),
                    "dst" => out.push_str(dst),
                    other => {
                        out.push('{');
                        out.push_str(other);
                        out.push('}');
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_providers_idempotently() {
        let mut secrets = SecretList::new();
        let (config, errors) = parse("default,readwrite;clear;default,readwrite", &mut secrets);
        assert!(errors.is_empty());
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0], ResolvedProvider::Default { access: Access::ReadWrite });
    }

    #[test]
    fn backtick_escapes_comma_and_semicolon() {
        let sources = tokenize("http,https://x/`{sha`},read");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].segments, vec!["http", "https://x/{sha}", "read"]);
    }

    #[test]
    fn empty_sources_are_skipped() {
        let sources = tokenize("default;;files,/tmp/cache");
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn files_requires_absolute_path() {
        let mut secrets = SecretList::new();
        let (_, errors) = parse("files,relative/path", &mut secrets);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("absolute"));
    }

    #[test]
    fn aws_config_modifier_applies_to_later_aws_entries() {
        let mut secrets = SecretList::new();
        let (config, errors) = parse("x-aws-config,no-sign-request;x-aws,s3://bucket/prefix", &mut secrets);
        assert!(errors.is_empty());
        assert_eq!(
            config.providers[0],
            ResolvedProvider::Aws { prefix: "s3://bucket/prefix".to_string(), access: Access::Read, no_sign_request: true }
        );
    }

    #[test]
    fn azblob_sas_is_registered_as_secret() {
        let mut secrets = SecretList::new();
        let (_, errors) = parse("x-azblob,https://acct.blob.core.windows.net/container,sv=2020&sig=abc,readwrite", &mut secrets);
        assert!(errors.is_empty());
        assert_eq!(secrets.redact("sv=2020&sig=abc"), "***");
    }

    #[test]
    fn unrecognized_source_kind_is_an_error() {
        let mut secrets = SecretList::new();
        let (_, errors) = parse("bogus-kind,foo", &mut secrets);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn script_template_expands_placeholders_and_literal_braces() {
        let rendered = render_script_template("curl {{ {url} }} -o {dst} # {sha512}", "https://x", "abc123", "/tmp/out");
        assert_eq!(rendered, "curl { https://x } -o /tmp/out # abc123");
    }

    #[test]
    fn asset_clear_resets_sources() {
        let mut secrets = SecretList::new();
        let (config, errors) = parse_asset_sources("x-azurl,https://x;clear;x-block-origin", &mut secrets);
        assert!(errors.is_empty());
        assert!(config.sources.is_empty());
        assert!(config.block_origin);
    }
}
