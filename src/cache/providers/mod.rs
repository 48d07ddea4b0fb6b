//! Object-store providers (C7): the batch `ObjectProvider` contract most
//! backends implement, the plan-oriented `BinaryProvider` contract the
//! orchestrator actually drives, and a generic adapter from the former to
//! the latter for the backends that are pure blob stores (file, http,
//! gsutil/aws/cos). GHA and NuGet have enough backend-specific shape
//! (reserve/patch/commit, nuspec generation) that they implement
//! `BinaryProvider` directly instead.

pub mod cli;
pub mod file;
pub mod gha;
pub mod http;
pub mod nuget;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cache::config::Access;
use crate::cache::secrets::SecretList;
use crate::core::spec::PackageSpec;

/// `<package_abi>.zip` regardless of backend, except NuGet which derives
/// its own id/version shape (§4.7).
pub fn zip_object_id(package_abi: &str) -> String {
    format!("{package_abi}.zip")
}

/// Batch blob-store interface (§4.7's `IObjectProvider`).
pub trait ObjectProvider: Send + Sync {
    fn name(&self) -> &str;
    fn access(&self) -> Access;
    /// One bool per input object, `true` iff the download succeeded.
    fn download(&self, object_ids: &[String], target_dir: &Path) -> Result<Vec<bool>>;
    fn upload(&self, object_id: &str, file: &Path) -> Result<()>;
    /// One bool per input object, `true` iff the object is present.
    fn check_availability(&self, object_ids: &[String]) -> Result<Vec<bool>>;
    /// Tokens this provider embeds in its requests (SAS signatures, bearer
    /// tokens) that must never reach a log line verbatim. Empty by default.
    fn secrets(&self) -> SecretList {
        SecretList::new()
    }
}

/// One action as the orchestrator presents it to a provider: enough to key
/// a blob (`package_abi`) and to know where bytes land.
#[derive(Clone, Debug)]
pub struct PrefetchAction {
    pub spec: PackageSpec,
    pub package_abi: String,
    pub package_dir: PathBuf,
    pub version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    Unavailable,
}

#[derive(Clone, Debug)]
pub struct PushInfo {
    pub spec: PackageSpec,
    pub package_abi: String,
    /// Path to the already-packed artifact blob. Packing the install tree
    /// into this file is build-executor machinery and out of scope here
    /// (§1); the orchestrator only moves/uploads the finished artifact.
    pub artifact_path: PathBuf,
    pub version: String,
}

/// Plan-oriented interface (§4.7's `IBinaryProvider`); this is what the
/// orchestrator (C8) actually calls.
pub trait BinaryProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Attempts to download+decompress every action whose `CacheStatus`
    /// accepts this provider; returns one outcome per input action, same
    /// order.
    fn prefetch(&self, actions: &[PrefetchAction]) -> Result<Vec<RestoreOutcome>>;
    fn try_restore(&self, action: &PrefetchAction) -> Result<RestoreOutcome>;
    /// One bool per input action, `true` iff the provider believes it has
    /// the object (a precheck never downloads).
    fn precheck(&self, actions: &[PrefetchAction]) -> Result<Vec<bool>>;
    fn push_success(&self, info: &PushInfo) -> Result<()>;
    fn needs_nuspec_data(&self) -> bool {
        false
    }
    /// Tokens this provider embeds in its requests that must never reach a
    /// log line verbatim. Empty by default.
    fn secrets(&self) -> SecretList {
        SecretList::new()
    }
}

/// Adapts any blob-store `ObjectProvider` into a `BinaryProvider` using the
/// uniform `<package_abi>.zip` object-id convention. "Decompress" here is a
/// plain move into `package_dir` since the un-zipping step itself is the
/// external build-executor's job (§1 scope).
pub struct ObjectBackedBinaryProvider<O> {
    inner: O,
}

impl<O: ObjectProvider> ObjectBackedBinaryProvider<O> {
    pub fn new(inner: O) -> Self {
        ObjectBackedBinaryProvider { inner }
    }
}

impl<O: ObjectProvider> BinaryProvider for ObjectBackedBinaryProvider<O> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn prefetch(&self, actions: &[PrefetchAction]) -> Result<Vec<RestoreOutcome>> {
        if !self.inner.access().can_read() {
            return Ok(vec![RestoreOutcome::Unavailable; actions.len()]);
        }
        let ids: Vec<String> = actions.iter().map(|a| zip_object_id(&a.package_abi)).collect();
        let mut outcomes = Vec::with_capacity(actions.len());
        for (action, id) in actions.iter().zip(ids.iter()) {
            let ok = self.inner.download(std::slice::from_ref(id), &action.package_dir)?;
            outcomes.push(if ok.first().copied().unwrap_or(false) {
                RestoreOutcome::Restored
            } else {
                RestoreOutcome::Unavailable
            });
        }
        Ok(outcomes)
    }

    fn try_restore(&self, action: &PrefetchAction) -> Result<RestoreOutcome> {
        Ok(self.prefetch(std::slice::from_ref(action))?.remove(0))
    }

    fn precheck(&self, actions: &[PrefetchAction]) -> Result<Vec<bool>> {
        if !self.inner.access().can_read() {
            return Ok(vec![false; actions.len()]);
        }
        let ids: Vec<String> = actions.iter().map(|a| zip_object_id(&a.package_abi)).collect();
        self.inner.check_availability(&ids)
    }

    fn push_success(&self, info: &PushInfo) -> Result<()> {
        if !self.inner.access().can_write() {
            return Ok(());
        }
        let id = zip_object_id(&info.package_abi);
        self.inner.upload(&id, &info.artifact_path)
    }

    fn secrets(&self) -> SecretList {
        self.inner.secrets()
    }
}
