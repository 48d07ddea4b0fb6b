//! CLI-shelled backends (§4.7): `gsutil`, `aws s3`, and `cos`, all driven
//! through the same `cp`/`ls`-or-`stat` shape.

use std::path::Path;

use anyhow::Result;
use portkit_util::ProcessBuilder;

use crate::cache::config::Access;
use crate::cache::providers::ObjectProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliBackend {
    Gsutil,
    Aws { no_sign_request: bool },
    Cos,
}

impl CliBackend {
    fn program(&self) -> &'static str {
        match self {
            CliBackend::Gsutil => "gsutil",
            CliBackend::Aws { .. } => "aws",
            CliBackend::Cos => "cos",
        }
    }

    fn existence_verb(&self) -> &'static str {
        match self {
            CliBackend::Gsutil => "stat",
            CliBackend::Aws { .. } => "ls",
            CliBackend::Cos => "ls",
        }
    }

    fn base_command(&self) -> ProcessBuilder {
        let mut p = ProcessBuilder::new(self.program());
        if matches!(self, CliBackend::Aws { .. }) {
            p.arg("s3");
        }
        p
    }

    fn apply_sign_flag(&self, p: &mut ProcessBuilder) {
        if let CliBackend::Aws { no_sign_request: true } = self {
            p.arg("--no-sign-request");
        }
    }
}

pub struct CliObjectProvider {
    backend: CliBackend,
    prefix: String,
    access: Access,
}

impl CliObjectProvider {
    pub fn new(backend: CliBackend, prefix: String, access: Access) -> Self {
        CliObjectProvider { backend, prefix, access }
    }

    fn object_url(&self, object_id: &str) -> String {
        format!("{}/{}", self.prefix.trim_end_matches('/'), object_id)
    }
}

impl ObjectProvider for CliObjectProvider {
    fn name(&self) -> &str {
        match self.backend {
            CliBackend::Gsutil => "x-gcs",
            CliBackend::Aws { .. } => "x-aws",
            CliBackend::Cos => "x-cos",
        }
    }

    fn access(&self) -> Access {
        self.access
    }

    fn download(&self, object_ids: &[String], target_dir: &Path) -> Result<Vec<bool>> {
        std::fs::create_dir_all(target_dir)?;
        let mut ok = Vec::with_capacity(object_ids.len());
        for id in object_ids {
            let mut p = self.backend.base_command();
            p.arg("cp");
            self.backend.apply_sign_flag(&mut p);
            p.arg(self.object_url(id)).arg(target_dir.join(id));
            ok.push(p.exec().is_ok());
        }
        Ok(ok)
    }

    fn upload(&self, object_id: &str, file: &Path) -> Result<()> {
        let mut p = self.backend.base_command();
        p.arg("cp");
        self.backend.apply_sign_flag(&mut p);
        p.arg(file).arg(self.object_url(object_id));
        p.exec()
    }

    fn check_availability(&self, object_ids: &[String]) -> Result<Vec<bool>> {
        let mut ok = Vec::with_capacity(object_ids.len());
        for id in object_ids {
            let mut p = self.backend.base_command();
            p.arg(self.backend.existence_verb());
            self.backend.apply_sign_flag(&mut p);
            p.arg(self.object_url(id));
            ok.push(p.exec().is_ok());
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_prefix_and_id() {
        let provider = CliObjectProvider::new(CliBackend::Gsutil, "gs://bucket/prefix".to_string(), Access::Read);
        assert_eq!(provider.object_url("abc.zip"), "gs://bucket/prefix/abc.zip");
    }

    #[test]
    fn aws_base_command_includes_s3_subcommand() {
        let mut p = CliBackend::Aws { no_sign_request: false }.base_command();
        p.arg("cp");
        assert_eq!(p.to_string(), "aws s3 cp");
    }

    #[test]
    fn no_sign_request_only_applies_to_aws() {
        let mut p = CliBackend::Gsutil.base_command();
        CliBackend::Gsutil.apply_sign_flag(&mut p);
        assert_eq!(p.to_string(), "gsutil");

        let mut p = CliBackend::Aws { no_sign_request: true }.base_command();
        CliBackend::Aws { no_sign_request: true }.apply_sign_flag(&mut p);
        assert_eq!(p.to_string(), "aws s3 --no-sign-request");
    }
}
