//! Entry points that start checks: push webhooks, direct requests and
//! repository registration.

use std::sync::Arc;

use repocheck_core::{CheckError, CheckResult, RepositoryHost, RepositoryRef};
use repocheck_state::{CheckRecord, CheckStore, RepositoryRecord, RepositoryStore};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::engine::CheckEngine;

/// Event type that starts a check.
pub const PUSH_EVENT: &str = "push";

/// The parts of a push payload the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repository: RepositoryRef,
    pub commit_id: Option<String>,
}

impl PushEvent {
    /// Repository from `repository.id`, else `repository.full_name`; commit
    /// from `after`, else `head_commit.id`.
    pub fn from_payload(payload: &Value) -> CheckResult<Self> {
        let repo = &payload["repository"];
        let repository = match (external_id(&repo["id"]), non_blank(&repo["full_name"])) {
            (Some(id), _) => RepositoryRef::ExternalId(id),
            (None, Some(name)) => RepositoryRef::FullName(name),
            (None, None) => {
                return Err(CheckError::RepositoryNotFound(
                    "payload names no repository".to_string(),
                ))
            }
        };
        let commit_id =
            non_blank(&payload["after"]).or_else(|| non_blank(&payload["head_commit"]["id"]));
        Ok(Self {
            repository,
            commit_id,
        })
    }
}

fn external_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Result of handling one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Not a push; acknowledged without creating a check.
    Ignored { event: String },
    /// A check was created and performed.
    Completed(CheckRecord),
}

/// How a webhook result should be reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Created,
    Accepted,
    NotFound,
    Unprocessable,
}

impl ReplyStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            ReplyStatus::Created => 201,
            ReplyStatus::Accepted => 202,
            ReplyStatus::NotFound => 404,
            ReplyStatus::Unprocessable => 422,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookReply {
    pub status: ReplyStatus,
    pub body: Value,
}

impl WebhookReply {
    pub fn from_result(result: &CheckResult<WebhookOutcome>) -> Self {
        match result {
            Ok(WebhookOutcome::Completed(check)) => Self {
                status: ReplyStatus::Created,
                body: json!({
                    "id": check.id.as_str(),
                    "state": check.state.as_str(),
                    "exit": check.exit_status,
                }),
            },
            Ok(WebhookOutcome::Ignored { event }) => Self {
                status: ReplyStatus::Accepted,
                body: json!({ "ignored": event }),
            },
            Err(e) if e.is_not_found() => Self {
                status: ReplyStatus::NotFound,
                body: json!({ "error": "repository_not_found" }),
            },
            Err(e) => Self {
                status: ReplyStatus::Unprocessable,
                body: json!({ "error": e.to_string() }),
            },
        }
    }
}

/// Caller-facing operations on top of a [`CheckEngine`].
pub struct CheckService {
    engine: Arc<CheckEngine>,
}

impl CheckService {
    pub fn new(engine: Arc<CheckEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CheckEngine {
        &self.engine
    }

    /// Look up a registered repository. A miss is always
    /// [`CheckError::RepositoryNotFound`].
    pub async fn find_repository(&self, repo: &RepositoryRef) -> CheckResult<RepositoryRecord> {
        let store = self.engine.repositories();
        let found = match repo {
            RepositoryRef::ExternalId(id) => store.find_by_external_id(*id).await?,
            RepositoryRef::FullName(name) => store.find_by_full_name(name).await?,
        };
        found.ok_or_else(|| CheckError::RepositoryNotFound(repo.to_string()))
    }

    /// Handle a webhook delivery. A missing or empty event type counts as a
    /// push; any other event is ignored.
    pub async fn handle_webhook(
        &self,
        event: Option<&str>,
        payload: &Value,
    ) -> CheckResult<WebhookOutcome> {
        let event = event.map(str::trim).unwrap_or_default();
        if !event.is_empty() && event != PUSH_EVENT {
            debug!(%event, "ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event: event.to_string(),
            });
        }

        let push = PushEvent::from_payload(payload)?;
        let repo = self.find_repository(&push.repository).await?;
        info!(repository = %repo.full_name, commit = ?push.commit_id, "push received");

        let check = self.engine.run_check(&repo, push.commit_id).await?;
        Ok(WebhookOutcome::Completed(check))
    }

    /// Create and perform a check on request. Without a commit the
    /// workspace HEAD is checked and recorded.
    pub async fn request_check(
        &self,
        repo: &RepositoryRef,
        commit_id: Option<String>,
    ) -> CheckResult<CheckRecord> {
        let repo = self.find_repository(repo).await?;
        self.engine.run_check(&repo, commit_id).await
    }

    /// Most recent checks for a repository, newest first.
    pub async fn recent_checks(
        &self,
        repo: &RepositoryRef,
        limit: usize,
    ) -> CheckResult<Vec<CheckRecord>> {
        let repo = self.find_repository(repo).await?;
        Ok(self
            .engine
            .checks()
            .recent_checks(repo.external_id, limit)
            .await?)
    }

    /// Register (or refresh) a repository from host metadata, optionally
    /// installing a push hook that delivers to `hook_url`.
    pub async fn register_repository(
        &self,
        host: &dyn RepositoryHost,
        repo: &RepositoryRef,
        hook_url: Option<&str>,
    ) -> CheckResult<RepositoryRecord> {
        let remote = host.lookup_repository(repo).await?;
        let language = remote.language();
        if !language.is_supported() {
            let name = if language.as_str().is_empty() {
                "unknown".to_string()
            } else {
                language.to_string()
            };
            return Err(CheckError::UnsupportedLanguage(name));
        }

        let saved = self
            .engine
            .repositories()
            .save_repository(remote.into_record())
            .await?;
        info!(repository = %saved.full_name, id = saved.external_id, "repository registered");

        if let Some(url) = hook_url {
            host.create_hook(&saved.full_name, url).await?;
        }
        Ok(saved)
    }

    /// Remove a repository and, with it, all of its checks.
    pub async fn remove_repository(&self, repo: &RepositoryRef) -> CheckResult<RepositoryRecord> {
        let found = self.find_repository(repo).await?;
        self.engine
            .repositories()
            .delete_repository(found.external_id)
            .await?;
        info!(repository = %found.full_name, "repository removed");
        Ok(found)
    }
}
