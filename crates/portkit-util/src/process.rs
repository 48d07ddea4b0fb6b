use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// A builder for shelling out to external tools (`gsutil`, `aws`, `cos`,
/// `nuget`, `curl`), in the same spirit as cargo's own `ProcessBuilder`:
/// accumulate arguments and env vars, then either run it for its exit status
/// or capture its output, logging the rendered command line either way.
#[derive(Clone, Debug)]
pub struct ProcessBuilder {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<String, Option<OsString>>,
    cwd: Option<OsString>,
    /// Literal substrings (bearer tokens, SAS signatures, API keys) that
    /// must never appear verbatim in a rendered command line, whether in a
    /// log line or an error message -- both routes through `Display`.
    secrets: Vec<String>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            secrets: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Registers a literal value that must be redacted from this command's
    /// rendered form. No-op for an empty string, so an unset credential
    /// doesn't redact every position in the line.
    pub fn secret(&mut self, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn env(&mut self, key: impl Into<String>, val: impl AsRef<OsStr>) -> &mut Self {
        self.env.insert(key.into(), Some(val.as_ref().to_owned()));
        self
    }

    pub fn cwd(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cwd = Some(path.as_ref().as_os_str().to_owned());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            match v {
                Some(v) => {
                    cmd.env(k, v);
                }
                None => {
                    cmd.env_remove(k);
                }
            }
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Runs the command, returning an error (including the rendered command
    /// line) if it exits non-zero.
    pub fn exec(&self) -> Result<()> {
        tracing::debug!(command = %self, "running process");
        let status = self
            .build_command()
            .status()
            .with_context(|| format!("failed to spawn `{self}`"))?;
        if !status.success() {
            bail!("process `{self}` did not exit successfully: {status}");
        }
        Ok(())
    }

    /// Runs the command capturing stdout/stderr, regardless of exit status.
    pub fn output(&self) -> Result<Output> {
        tracing::debug!(command = %self, "running process (captured)");
        self.build_command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn `{self}`"))
    }

    /// Runs the command and returns its stdout as a lossily-decoded string,
    /// erroring (with stderr attached) on non-zero exit.
    pub fn exec_with_output(&self) -> Result<String> {
        let output = self.output()?;
        if !output.status.success() {
            bail!(
                "process `{self}` did not exit successfully: {}\n--- stderr ---\n{}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl fmt::Display for ProcessBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        for secret in &self.secrets {
            rendered = rendered.replace(secret.as_str(), "***");
        }
        write!(f, "{rendered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_line() {
        let mut p = ProcessBuilder::new("aws");
        p.arg("s3").arg("cp").arg("--no-sign-request");
        assert_eq!(p.to_string(), "aws s3 cp --no-sign-request");
    }

    #[test]
    fn true_succeeds() {
        let p = ProcessBuilder::new("true");
        p.exec().unwrap();
    }

    #[test]
    fn false_fails() {
        let p = ProcessBuilder::new("false");
        assert!(p.exec().is_err());
    }

    #[test]
    fn registered_secrets_are_redacted_from_display() {
        let mut p = ProcessBuilder::new("curl");
        p.arg("-H").arg("Authorization: Bearer sekrit-token");
        p.secret("sekrit-token");
        assert_eq!(p.to_string(), "curl -H Authorization: Bearer ***");
    }

    #[test]
    fn empty_secret_registration_is_a_noop() {
        let mut p = ProcessBuilder::new("curl");
        p.arg("--fail");
        p.secret("");
        assert_eq!(p.to_string(), "curl --fail");
    }
}
