//! Check domain: lifecycle and error taxonomy.

pub mod error;
pub mod lifecycle;

pub use error::{CheckError, CheckResult, GitOperation};
pub use lifecycle::{fire, may_fire, next_state, CheckEvent};
