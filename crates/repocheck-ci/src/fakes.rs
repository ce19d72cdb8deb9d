//! Test doubles for the engine's collaborators.
//!
//! - `ScriptedRunner`: answers commands from scripted responses and records
//!   every call
//! - `RecordingNotifier`: collects failure reports, optionally failing
//! - `StaticHost`: serves repository metadata from a fixed list

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use repocheck_core::{CheckError, CheckResult, RemoteRepository, RepositoryHost, RepositoryRef};

use crate::notify::{FailureNotifier, FailureReport};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    SpawnError(std::io::ErrorKind),
}

#[derive(Debug)]
struct Rule {
    needle: String,
    responses: VecDeque<Response>,
}

/// A [`CommandRunner`] driven by scripted responses.
///
/// A rule matches when its needle occurs in the command line. Rules are
/// tried in the order they were first registered. Responses for a rule are
/// consumed in order and the last one repeats. Unmatched commands succeed
/// with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, needle: &str, response: Response) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.needle == needle) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    needle: needle.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Answer commands containing `needle` with `exit_code` and `output`.
    pub fn on(self, needle: &str, exit_code: i32, output: &str) -> Self {
        self.push(
            needle,
            Response::Output(CommandOutput {
                output: output.to_string(),
                exit_code,
            }),
        )
    }

    /// Fail to start commands containing `needle`.
    pub fn on_spawn_error(self, needle: &str, kind: std::io::ErrorKind) -> Self {
        self.push(needle, Response::SpawnError(kind))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn respond(&self, line: &str) -> Option<Response> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules.iter_mut().find(|r| line.contains(&r.needle))?;
        if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(spec.clone());
        match self.respond(&spec.command_line()) {
            Some(Response::Output(out)) => Ok(out),
            Some(Response::SpawnError(kind)) => Err(RunnerError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(kind, format!("scripted spawn error for {}", spec.program)),
            }),
            None => Ok(CommandOutput {
                output: String::new(),
                exit_code: 0,
            }),
        }
    }
}

/// A [`FailureNotifier`] that stores every report it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<FailureReport>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records reports but returns an error from every call.
    pub fn failing() -> Self {
        Self {
            reports: Mutex::default(),
            fail: true,
        }
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn notify(&self, report: FailureReport) -> CheckResult<()> {
        self.reports.lock().unwrap().push(report);
        if self.fail {
            Err(CheckError::Notification("recording notifier told to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A [`RepositoryHost`] backed by a fixed list of repositories.
#[derive(Debug, Default)]
pub struct StaticHost {
    repositories: Vec<RemoteRepository>,
    hooks: Mutex<Vec<(String, String)>>,
}

impl StaticHost {
    pub fn new(repositories: Vec<RemoteRepository>) -> Self {
        Self {
            repositories,
            hooks: Mutex::default(),
        }
    }

    /// `(full_name, callback_url)` pairs registered so far.
    pub fn hooks(&self) -> Vec<(String, String)> {
        self.hooks.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryHost for StaticHost {
    async fn lookup_repository(&self, repo: &RepositoryRef) -> CheckResult<RemoteRepository> {
        self.repositories
            .iter()
            .find(|r| match repo {
                RepositoryRef::ExternalId(id) => r.id == *id,
                RepositoryRef::FullName(name) => &r.full_name == name,
            })
            .cloned()
            .ok_or_else(|| CheckError::RepositoryNotFound(repo.to_string()))
    }

    async fn create_hook(&self, full_name: &str, callback_url: &str) -> CheckResult<()> {
        if !self.repositories.iter().any(|r| r.full_name == full_name) {
            return Err(CheckError::RepositoryNotFound(full_name.to_string()));
        }
        self.hooks
            .lock()
            .unwrap()
            .push((full_name.to_string(), callback_url.to_string()));
        Ok(())
    }
}
