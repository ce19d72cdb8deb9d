//! External process execution.
//!
//! A nonzero exit is a normal outcome and is returned as data. Only failure
//! to start the process at all is an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use repocheck_core::CheckError;
use tokio::process::Command;
use tracing::debug;

/// A command line plus optional working directory and env overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program and arguments joined by spaces, for logs and matching.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Combined output and exit code of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr.
    pub output: String,
    /// `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    /// True when the executable could not be found.
    pub fn is_not_found(&self) -> bool {
        match self {
            RunnerError::Spawn { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        }
    }
}

impl From<RunnerError> for CheckError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Spawn { program, source } => CheckError::ProcessStart { program, source },
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        debug!(command = %spec.command_line(), cwd = ?spec.cwd, "running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        let spawn_error = |source: std::io::Error| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        };
        let child = command.spawn().map_err(spawn_error)?;
        let output = child.wait_with_output().await.map_err(spawn_error)?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            output: combined,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = ProcessRunner.run(&spec).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.output, "out\nerr\n");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn empty_output_still_reports_exit_code() {
        let out = ProcessRunner
            .run(&CommandSpec::new("true"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.output.is_empty());
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s %s' \"$GREETING\" \"$(pwd -P)\""])
            .current_dir(dir.path())
            .env("GREETING", "hi");
        let out = ProcessRunner.run(&spec).await.unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(out.output, format!("hi {}", canonical.display()));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = ProcessRunner
            .run(&CommandSpec::new("definitely-not-a-real-binary-3f9a"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            CheckError::from(err),
            CheckError::ProcessStart { .. }
        ));
    }

    #[test]
    fn command_line_joins_argv() {
        let spec = CommandSpec::new("git").args(["clone", "--quiet", "u", "d"]);
        assert_eq!(spec.command_line(), "git clone --quiet u d");
    }
}
