//! Failure notification.
//!
//! The engine hands a [`FailureReport`] to a [`FailureNotifier`] exactly once
//! when a check fails. Notifier errors are logged by the engine and never
//! change the check's outcome.

use std::sync::Mutex;

use async_trait::async_trait;
use repocheck_core::{CheckError, CheckResult, NotifyConfig};
use repocheck_state::{CheckRecord, RepositoryRecord};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

const SHORT_SHA_LEN: usize = 7;

/// Everything a recipient needs to act on a failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub check: CheckRecord,
    pub repository: String,
    pub subject: String,
    pub short_sha: String,
    pub commit_url: Option<String>,
    pub check_url: Option<String>,
    pub recipient: Option<String>,
}

impl FailureReport {
    pub fn new(
        check: &CheckRecord,
        repo: &RepositoryRecord,
        notify: &NotifyConfig,
        host_url: &str,
    ) -> Self {
        let short_sha = short_sha(check.commit_id.as_deref());
        let commit_url = check.commit_id.as_deref().map(|sha| {
            format!(
                "{}/{}/commit/{}",
                host_url.trim_end_matches('/'),
                repo.full_name,
                sha
            )
        });
        let check_url = notify
            .check_url_base
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), check.id));

        Self {
            check: check.clone(),
            repository: repo.full_name.clone(),
            subject: format!("Check failed: {} @ {}", repo.full_name, short_sha),
            short_sha,
            commit_url,
            check_url,
            recipient: notify.recipient.clone(),
        }
    }
}

fn short_sha(commit_id: Option<&str>) -> String {
    match commit_id {
        Some(sha) if !sha.is_empty() => sha.chars().take(SHORT_SHA_LEN).collect(),
        _ => "-".to_string(),
    }
}

#[async_trait]
pub trait FailureNotifier: Send + Sync {
    /// Hand off the report for delivery. Delivery may complete after this
    /// returns.
    async fn notify(&self, report: FailureReport) -> CheckResult<()>;
}

/// Logs failures through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl FailureNotifier for LogNotifier {
    async fn notify(&self, report: FailureReport) -> CheckResult<()> {
        warn!(
            event = "check.failure_report",
            check_id = %report.check.id,
            repository = %report.repository,
            commit = %report.short_sha,
            exit_status = ?report.check.exit_status,
            error = report.check.error.as_deref().unwrap_or(""),
            recipient = report.recipient.as_deref().unwrap_or(""),
            "{}",
            report.subject
        );
        Ok(())
    }
}

/// POSTs the report as JSON to a fixed URL from a background task.
///
/// Short-lived processes call [`WebhookNotifier::flush`] before exiting so
/// in-flight deliveries are not dropped with the runtime.
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
    pending: Mutex<JoinSet<()>>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> CheckResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("repocheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckError::Notification(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http_client,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Deliveries still running. Finished ones are reaped first.
    pub fn in_flight(&self) -> usize {
        match self.pending.lock() {
            Ok(mut pending) => {
                reap_finished(&mut pending);
                pending.len()
            }
            Err(_) => 0,
        }
    }

    /// Wait for every delivery spawned so far.
    pub async fn flush(&self) {
        let mut pending = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        while pending.join_next().await.is_some() {}
    }

    async fn deliver(
        client: reqwest::Client,
        url: String,
        report: FailureReport,
    ) -> CheckResult<()> {
        let response = client
            .post(&url)
            .json(&report)
            .send()
            .await
            .map_err(|e| CheckError::Notification(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            debug!(check_id = %report.check.id, %status, "failure report delivered");
            Ok(())
        } else {
            Err(CheckError::Notification(format!(
                "webhook {url} returned {status}"
            )))
        }
    }
}

fn reap_finished(pending: &mut JoinSet<()>) {
    while pending.try_join_next().is_some() {}
}

#[async_trait]
impl FailureNotifier for WebhookNotifier {
    async fn notify(&self, report: FailureReport) -> CheckResult<()> {
        let client = self.http_client.clone();
        let url = self.url.clone();
        let check_id = report.check.id.clone();
        let delivery = async move {
            if let Err(e) = Self::deliver(client, url, report).await {
                repocheck_core::obs::emit_notify_failed(&check_id, &e);
            }
        };
        match self.pending.lock() {
            Ok(mut pending) => {
                reap_finished(&mut pending);
                pending.spawn(delivery);
            }
            Err(_) => {
                tokio::spawn(delivery);
            }
        }
        Ok(())
    }
}
