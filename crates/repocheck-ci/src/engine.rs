//! Check execution engine.
//!
//! [`CheckEngine::perform`] drives one queued check to a terminal state:
//!
//! 1. record the start time, `start` (queued -> cloning)
//! 2. acquire a workspace
//! 3. resolve the clone URL and clone
//! 4. `run` (cloning -> running), check out the pinned commit or record HEAD
//! 5. lint with the analyzer for the repository's language
//! 6. exit 0 -> `succeed`; anything else -> `fail` and notify
//!
//! Any error in steps 1-6 is caught: its message becomes the check's
//! `error`, is appended to the log, the check is failed and the notifier
//! runs. Finally the finish time is recorded and the workspace removed,
//! whatever happened before.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use repocheck_core::obs;
use repocheck_core::{fire, may_fire, CheckError, CheckEvent, CheckResult, EngineConfig};
use repocheck_state::{CheckRecord, CheckState, CheckStore, RepositoryRecord, RepositoryStore};
use tracing::{error, info, warn, Instrument};

use crate::analyzer;
use crate::check_log::CheckLog;
use crate::git;
use crate::notify::{FailureNotifier, FailureReport};
use crate::runner::CommandRunner;
use crate::workspace::Workspace;

/// Per-`perform` mutable state.
#[derive(Default)]
struct RunState {
    log: CheckLog,
    workspace: Option<Workspace>,
    notified: bool,
}

/// Runs checks. Holds only shared collaborators, so one engine can perform
/// many checks concurrently.
pub struct CheckEngine {
    repositories: Arc<dyn RepositoryStore>,
    checks: Arc<dyn CheckStore>,
    runner: Arc<dyn CommandRunner>,
    notifier: Arc<dyn FailureNotifier>,
    config: EngineConfig,
}

impl CheckEngine {
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        checks: Arc<dyn CheckStore>,
        runner: Arc<dyn CommandRunner>,
        notifier: Arc<dyn FailureNotifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repositories,
            checks,
            runner,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repositories(&self) -> &Arc<dyn RepositoryStore> {
        &self.repositories
    }

    pub fn checks(&self) -> &Arc<dyn CheckStore> {
        &self.checks
    }

    /// Create a queued check for `repo`. `commit_id`, when given, must be at
    /// least 7 characters.
    pub async fn create_check(
        &self,
        repo: &RepositoryRecord,
        commit_id: Option<String>,
    ) -> CheckResult<CheckRecord> {
        let check = self
            .checks
            .create_check(repo.external_id, commit_id)
            .await?;
        obs::emit_check_created(&check.id, &repo.full_name, check.commit_id.as_deref());
        Ok(check)
    }

    /// Create a check and perform it.
    pub async fn run_check(
        &self,
        repo: &RepositoryRecord,
        commit_id: Option<String>,
    ) -> CheckResult<CheckRecord> {
        let mut check = self.create_check(repo, commit_id).await?;
        self.perform(&mut check).await?;
        Ok(check)
    }

    /// Drive a queued check to `finished` or `failed`.
    ///
    /// Failures of the run itself are recorded on the check, not returned.
    /// An `Err` means the check was not queued, its repository is gone, or
    /// the final record could not be persisted; in the last case `check`
    /// itself is still terminal.
    pub async fn perform(&self, check: &mut CheckRecord) -> CheckResult<()> {
        if !may_fire(check, CheckEvent::Start) {
            return Err(CheckError::InvalidTransition {
                from: check.state,
                event: CheckEvent::Start,
            });
        }
        let repo = self
            .repositories
            .find_by_external_id(check.repository_id)
            .await?
            .ok_or_else(|| CheckError::RepositoryNotFound(check.repository_id.to_string()))?;

        let span = obs::check_span(&check.id);
        self.drive(check, &repo).instrument(span).await
    }

    async fn drive(&self, check: &mut CheckRecord, repo: &RepositoryRecord) -> CheckResult<()> {
        let started = Instant::now();
        let mut run = RunState::default();

        let result = match self.execute(check, repo, &mut run).await {
            Ok(exit_code) => self.finalize(check, repo, &mut run, exit_code).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.handle_failure(check, repo, &mut run, &e).await;
        }

        check.finished_at = Some(Utc::now());
        if let Some(workspace) = run.workspace.take() {
            if let Err(e) = workspace.release() {
                obs::emit_workspace_cleanup_failed(&check.id, &e);
            }
        }
        let persisted = self.checks.update_check(check).await;

        obs::emit_check_finished(
            &check.id,
            check.state,
            check.exit_status,
            check.passed,
            started.elapsed().as_millis() as u64,
        );
        persisted.map_err(CheckError::from)
    }

    /// Steps 1-5. Returns the analyzer exit code.
    async fn execute(
        &self,
        check: &mut CheckRecord,
        repo: &RepositoryRecord,
        run: &mut RunState,
    ) -> CheckResult<i32> {
        check.started_at = Some(Utc::now());
        self.transition(check, CheckEvent::Start).await?;

        let dest: PathBuf = run
            .workspace
            .insert(Workspace::acquire(&self.config.workspace_root, &check.id)?)
            .path()
            .to_path_buf();

        let url = git::resolve_clone_url(repo, self.config.git.host())?;
        git::clone_repo(self.runner.as_ref(), &url, &dest, &mut run.log).await?;
        self.flush_log(check, &run.log).await?;

        self.transition(check, CheckEvent::Run).await?;
        match check.commit_id.clone() {
            Some(commit) => {
                git::checkout_commit(
                    self.runner.as_ref(),
                    &dest,
                    &commit,
                    self.config.git.checkout_retries,
                    &mut run.log,
                )
                .await?;
            }
            None => {
                let head = git::read_head(self.runner.as_ref(), &dest, &mut run.log).await?;
                info!(commit = %head, "resolved HEAD");
                check.commit_id = Some(head);
                self.checks.update_check(check).await?;
            }
        }

        let outcome = analyzer::lint_workspace(
            self.runner.as_ref(),
            &self.config.lint,
            &dest,
            &repo.language,
            &mut run.log,
        )
        .await?;
        Ok(outcome.exit_code)
    }

    /// Step 6: record the analyzer result and pick the terminal state.
    async fn finalize(
        &self,
        check: &mut CheckRecord,
        repo: &RepositoryRecord,
        run: &mut RunState,
        exit_code: i32,
    ) -> CheckResult<()> {
        check.stdout = run.log.as_str().to_string();
        check.exit_status = Some(exit_code);

        if exit_code == 0 {
            check.passed = true;
            self.transition(check, CheckEvent::Succeed).await
        } else {
            check.passed = false;
            self.transition(check, CheckEvent::Fail).await?;
            self.notify_once(check, repo, run).await;
            Ok(())
        }
    }

    async fn handle_failure(
        &self,
        check: &mut CheckRecord,
        repo: &RepositoryRecord,
        run: &mut RunState,
        err: &CheckError,
    ) {
        let message = err.to_string();
        warn!(error = %message, "check failed");

        check.error = Some(message.clone());
        check.stdout = run.log.with_error(&message);
        check.passed = false;

        let from = check.state;
        if may_fire(check, CheckEvent::Fail) {
            if fire(check, CheckEvent::Fail).is_ok() {
                obs::emit_transition(&check.id, from, check.state);
            }
        } else if from != CheckState::Failed {
            error!(state = %from, error = %message, "forcing failed state after error in terminal state");
            check.state = CheckState::Failed;
            obs::emit_transition(&check.id, from, check.state);
        }

        if let Err(e) = self.checks.update_check(check).await {
            error!(error = %e, "failed to persist failed check");
        }
        self.notify_once(check, repo, run).await;
    }

    /// Fire `event`, then persist the whole record.
    async fn transition(&self, check: &mut CheckRecord, event: CheckEvent) -> CheckResult<()> {
        let from = check.state;
        let to = fire(check, event)?;
        obs::emit_transition(&check.id, from, to);
        self.checks.update_check(check).await?;
        Ok(())
    }

    async fn flush_log(&self, check: &mut CheckRecord, log: &CheckLog) -> CheckResult<()> {
        check.stdout = log.as_str().to_string();
        self.checks.update_check(check).await?;
        Ok(())
    }

    async fn notify_once(&self, check: &CheckRecord, repo: &RepositoryRecord, run: &mut RunState) {
        if run.notified {
            return;
        }
        run.notified = true;

        let report = FailureReport::new(
            check,
            repo,
            &self.config.notify,
            self.config.git.host(),
        );
        if let Err(e) = self.notifier.notify(report).await {
            obs::emit_notify_failed(&check.id, &e);
        }
    }
}
