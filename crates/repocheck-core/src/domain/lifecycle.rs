//! Check lifecycle state machine.
//!
//! ```text
//! queued --start--> cloning --run--> running --succeed--> finished
//!    \                 |                 |
//!     +-------fail-----+-------fail------+--------------> failed
//! ```
//!
//! Transitions are named events. Firing an event from a state it does not
//! accept is an error and leaves the record untouched.

use std::fmt;

use repocheck_state::{CheckRecord, CheckState};

use super::error::{CheckError, CheckResult};

/// A named lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckEvent {
    Start,
    Run,
    Succeed,
    Fail,
}

impl CheckEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckEvent::Start => "start",
            CheckEvent::Run => "run",
            CheckEvent::Succeed => "succeed",
            CheckEvent::Fail => "fail",
        }
    }

    /// States this event may be fired from.
    pub fn sources(&self) -> &'static [CheckState] {
        match self {
            CheckEvent::Start => &[CheckState::Queued],
            CheckEvent::Run => &[CheckState::Cloning],
            CheckEvent::Succeed => &[CheckState::Running],
            CheckEvent::Fail => &[CheckState::Queued, CheckState::Cloning, CheckState::Running],
        }
    }

    pub fn target(&self) -> CheckState {
        match self {
            CheckEvent::Start => CheckState::Cloning,
            CheckEvent::Run => CheckState::Running,
            CheckEvent::Succeed => CheckState::Finished,
            CheckEvent::Fail => CheckState::Failed,
        }
    }
}

impl fmt::Display for CheckEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the state reached by firing `event` from `from`.
pub fn next_state(from: CheckState, event: CheckEvent) -> CheckResult<CheckState> {
    if event.sources().contains(&from) {
        Ok(event.target())
    } else {
        Err(CheckError::InvalidTransition { from, event })
    }
}

/// Whether `event` is accepted in the check's current state.
pub fn may_fire(check: &CheckRecord, event: CheckEvent) -> bool {
    event.sources().contains(&check.state)
}

/// Apply `event` to the check, returning the new state.
pub fn fire(check: &mut CheckRecord, event: CheckEvent) -> CheckResult<CheckState> {
    let next = next_state(check.state, event)?;
    check.state = next;
    Ok(next)
}
