//! A shared, append-only list of strings that must never reach a log line
//! verbatim (SAS tokens, bearer tokens, API keys). Every provider that
//! carries one registers it here; the orchestrator's log sink redacts
//! through this list before printing (§4.7's "secrets list must be
//! redacted from logs", made concrete per the original's `SecretList`).

use portkit_util::ProcessBuilder;

#[derive(Clone, Debug, Default)]
pub struct SecretList {
    secrets: Vec<String>,
}

impl SecretList {
    pub fn new() -> Self {
        SecretList::default()
    }

    /// No-op for empty strings so accidentally registering an unset token
    /// doesn't redact every character position in every message.
    pub fn register(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), "***");
        }
        out
    }

    /// Registers every secret in this list onto a `ProcessBuilder` so its
    /// own `Display` (and therefore every log line or bailed error that
    /// renders it) comes out already redacted.
    pub fn apply(&self, builder: &mut ProcessBuilder) {
        for secret in &self.secrets {
            builder.secret(secret.clone());
        }
    }

    /// Merges every provider's registered secrets into one list, for
    /// redacting orchestrator-level log lines that didn't themselves go
    /// through a `ProcessBuilder` (e.g. a provider's own error text).
    pub fn merge(lists: impl IntoIterator<Item = SecretList>) -> SecretList {
        let mut merged = SecretList::new();
        for list in lists {
            merged.secrets.extend(list.secrets);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_registered_secrets() {
        let mut list = SecretList::new();
        list.register("sv=2020-01-01&sig=deadbeef");
        let redacted = list.redact("GET https://x/blob?sv=2020-01-01&sig=deadbeef HTTP/1.1");
        assert_eq!(redacted, "GET https://x/blob?*** HTTP/1.1");
    }

    #[test]
    fn ignores_empty_registration() {
        let mut list = SecretList::new();
        list.register("");
        assert_eq!(list.redact("unchanged"), "unchanged");
    }

    #[test]
    fn apply_redacts_the_resulting_process_display() {
        let mut list = SecretList::new();
        list.register("tok-123");
        let mut p = ProcessBuilder::new("curl");
        p.arg("-H").arg("Authorization: Bearer tok-123");
        list.apply(&mut p);
        assert_eq!(p.to_string(), "curl -H Authorization: Bearer ***");
    }

    #[test]
    fn merge_combines_every_list() {
        let mut a = SecretList::new();
        a.register("secret-a");
        let mut b = SecretList::new();
        b.register("secret-b");
        let merged = SecretList::merge([a, b]);
        assert_eq!(merged.redact("secret-a and secret-b"), "*** and ***");
    }
}
