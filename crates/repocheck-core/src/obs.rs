//! Structured tracing events for the check lifecycle.
//!
//! These go to the tracing subscriber only. The per-check audit log that
//! users read is the persisted `stdout` field, built by the engine.

use repocheck_state::{CheckId, CheckState};
use tracing::{info, warn};

/// Span carrying the check id. Attach it to futures with
/// `tracing::Instrument`; an entered guard must not live across `.await`.
pub fn check_span(check_id: &CheckId) -> tracing::Span {
    tracing::info_span!("repocheck.check", check_id = %check_id)
}

pub fn emit_check_created(check_id: &CheckId, repository: &str, commit_id: Option<&str>) {
    info!(
        event = "check.created",
        check_id = %check_id,
        repository = %repository,
        commit_id = commit_id.unwrap_or("HEAD"),
    );
}

pub fn emit_transition(check_id: &CheckId, from: CheckState, to: CheckState) {
    info!(
        event = "check.transition",
        check_id = %check_id,
        from = %from,
        to = %to,
    );
}

pub fn emit_check_finished(
    check_id: &CheckId,
    state: CheckState,
    exit_status: Option<i32>,
    passed: bool,
    duration_ms: u64,
) {
    info!(
        event = "check.finished",
        check_id = %check_id,
        state = %state,
        exit_status = ?exit_status,
        passed = passed,
        duration_ms = duration_ms,
    );
}

/// Notifier failures never fail the check; they are only logged.
pub fn emit_notify_failed(check_id: &CheckId, error: &dyn std::fmt::Display) {
    warn!(event = "check.notify_failed", check_id = %check_id, error = %error);
}

pub fn emit_workspace_cleanup_failed(check_id: &CheckId, error: &dyn std::fmt::Display) {
    warn!(
        event = "check.workspace_cleanup_failed",
        check_id = %check_id,
        error = %error,
    );
}
