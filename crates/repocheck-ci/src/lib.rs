//! repocheck-ci: check execution
//!
//! Runs a check end to end:
//! - clones the repository into a disposable workspace
//! - pins the commit (or records HEAD)
//! - runs the analyzer for the repository's language
//! - records the verdict and notifies on failure
//!
//! ## Layer 2 - Execution

pub mod analyzer;
pub mod check_log;
pub mod engine;
pub mod fakes;
pub mod git;
pub mod notify;
pub mod runner;
pub mod trigger;
pub mod workspace;

pub use analyzer::{Analyzer, LintOutcome};
pub use check_log::CheckLog;
pub use engine::CheckEngine;
pub use notify::{FailureNotifier, FailureReport, LogNotifier, WebhookNotifier};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, RunnerError};
pub use trigger::{
    CheckService, PushEvent, ReplyStatus, WebhookOutcome, WebhookReply, PUSH_EVENT,
};
pub use workspace::Workspace;
