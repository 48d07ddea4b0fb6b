//! File backend (§4.7): maps `<abi>` to `<root>/<abi[0..2]>/<abi>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cache::config::Access;
use crate::cache::providers::ObjectProvider;

pub struct FileObjectProvider {
    root: PathBuf,
    access: Access,
}

impl FileObjectProvider {
    pub fn new(root: PathBuf, access: Access) -> Self {
        FileObjectProvider { root, access }
    }

    fn path_for(&self, object_id: &str) -> PathBuf {
        let prefix: String = object_id.chars().take(2).collect();
        self.root.join(prefix).join(object_id)
    }
}

impl ObjectProvider for FileObjectProvider {
    fn name(&self) -> &str {
        "files"
    }

    fn access(&self) -> Access {
        self.access
    }

    fn download(&self, object_ids: &[String], target_dir: &Path) -> Result<Vec<bool>> {
        let mut ok = Vec::with_capacity(object_ids.len());
        for id in object_ids {
            let src = self.path_for(id);
            if !src.is_file() {
                ok.push(false);
                continue;
            }
            std::fs::create_dir_all(target_dir)?;
            std::fs::copy(&src, target_dir.join(id)).with_context(|| format!("copying {}", src.display()))?;
            ok.push(true);
        }
        Ok(ok)
    }

    fn upload(&self, object_id: &str, file: &Path) -> Result<()> {
        let dest = self.path_for(object_id);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(file, &dest).with_context(|| format!("copying to {}", dest.display()))?;
        Ok(())
    }

    fn check_availability(&self, object_ids: &[String]) -> Result<Vec<bool>> {
        Ok(object_ids.iter().map(|id| self.path_for(id).is_file()).collect())
    }
}
