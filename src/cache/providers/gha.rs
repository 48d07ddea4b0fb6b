//! GitHub Actions cache backend (§4.7): the two-endpoint reserve/upload/
//! commit protocol under `<ACTIONS_CACHE_URL>_apis/artifactcache/*`,
//! driven through `curl` the same way the other CLI-shelled backends are.

use anyhow::{Context, Result};
use portkit_util::ProcessBuilder;
use serde::Deserialize;
use tracing::warn;

use crate::cache::config::Access;
use crate::cache::providers::{BinaryProvider, PrefetchAction, PushInfo, RestoreOutcome};
use crate::cache::secrets::SecretList;

pub struct GhaBinaryProvider {
    cache_url: String,
    runtime_token: String,
    access: Access,
    secrets: SecretList,
}

impl GhaBinaryProvider {
    pub fn new(cache_url: String, runtime_token: String, access: Access) -> Self {
        let cache_url = if cache_url.ends_with('/') { cache_url } else { format!("{cache_url}/") };
        let mut secrets = SecretList::new();
        secrets.register(runtime_token.clone());
        GhaBinaryProvider { cache_url, runtime_token, access, secrets }
    }

    fn cache_key(action: &PrefetchAction) -> String {
        format!("{}-{}", action.spec, action.package_abi)
    }

    fn curl(&self) -> ProcessBuilder {
        let mut p = ProcessBuilder::new("curl");
        p.arg("--fail")
            .arg("--silent")
            .arg("-H")
            .arg(format!("Authorization: Bearer {}", self.runtime_token))
            .arg("-H")
            .arg("Accept: application/json;api-version=6.0-preview.1");
        self.secrets.apply(&mut p);
        p
    }

    fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        let url = format!("{}_apis/artifactcache/cache?keys={key}", self.cache_url);
        let output = self.curl().arg(&url).exec_with_output();
        let body = match output {
            Ok(body) if !body.trim().is_empty() => body,
            _ => return Ok(None),
        };
        let entry: CacheEntry = serde_json::from_str(&body).context("parsing GHA cache lookup response")?;
        Ok(Some(entry))
    }
}

#[derive(Deserialize)]
struct CacheEntry {
    #[serde(rename = "archiveLocation")]
    archive_location: String,
}

#[derive(Deserialize)]
struct ReserveResponse {
    #[serde(rename = "cacheId")]
    cache_id: u64,
}

impl BinaryProvider for GhaBinaryProvider {
    fn name(&self) -> &str {
        "x-gha"
    }

    fn prefetch(&self, actions: &[PrefetchAction]) -> Result<Vec<RestoreOutcome>> {
        actions.iter().map(|a| self.try_restore(a)).collect()
    }

    fn try_restore(&self, action: &PrefetchAction) -> Result<RestoreOutcome> {
        if !self.access.can_read() {
            return Ok(RestoreOutcome::Unavailable);
        }
        let key = Self::cache_key(action);
        let Some(entry) = self.lookup(&key)? else {
            return Ok(RestoreOutcome::Unavailable);
        };
        std::fs::create_dir_all(&action.package_dir)?;
        let dest = action.package_dir.join(format!("{}.zip", action.package_abi));
        let mut download = ProcessBuilder::new("curl");
        download.arg("--fail").arg("--silent").arg("-o").arg(&dest).arg(&entry.archive_location);
        self.secrets.apply(&mut download);
        match download.exec() {
            Ok(()) => Ok(RestoreOutcome::Restored),
            Err(e) => {
                warn!(error = %self.secrets.redact(&e.to_string()), "GHA cache download failed after a successful lookup");
                Ok(RestoreOutcome::Unavailable)
            }
        }
    }

    fn precheck(&self, actions: &[PrefetchAction]) -> Result<Vec<bool>> {
        if !self.access.can_read() {
            return Ok(vec![false; actions.len()]);
        }
        actions.iter().map(|a| Ok(self.lookup(&Self::cache_key(a))?.is_some())).collect()
    }

    fn push_success(&self, info: &PushInfo) -> Result<()> {
        if !self.access.can_write() {
            return Ok(());
        }
        let key = format!("{}-{}", info.spec, info.package_abi);
        let reserve_url = format!("{}_apis/artifactcache/caches", self.cache_url);
        let body = serde_json::json!({ "key": key, "version": info.package_abi }).to_string();
        let reserve_output = self.curl().arg("-X").arg("POST").arg("-d").arg(&body).arg(&reserve_url).exec_with_output()?;
        let reserved: ReserveResponse = serde_json::from_str(&reserve_output).context("parsing GHA cache reserve response")?;

        let bytes = std::fs::metadata(&info.artifact_path)?.len();
        let patch_url = format!("{}_apis/artifactcache/caches/{}", self.cache_url, reserved.cache_id);
        self.curl()
            .arg("-X")
            .arg("PATCH")
            .arg("-H")
            .arg(format!("Content-Range: bytes 0-{}/*", bytes.saturating_sub(1)))
            .arg("--upload-file")
            .arg(&info.artifact_path)
            .arg(&patch_url)
            .exec()?;

        let commit_body = serde_json::json!({ "size": bytes }).to_string();
        self.curl().arg("-X").arg("POST").arg("-d").arg(&commit_body).arg(&patch_url).exec()?;
        Ok(())
    }

    fn secrets(&self) -> SecretList {
        self.secrets.clone()
    }
}
