//! repocheck-core: domain layer for repository checks
//!
//! ## Layer 1 - Domain
//!
//! - `domain`: check lifecycle state machine and error taxonomy
//! - `config`: engine configuration loaded from TOML
//! - `host`: repository host collaborator (`RepositoryHost`, `GithubClient`)
//! - `presenter`: offense listing recovered from captured analyzer output
//! - `telemetry` / `obs`: tracing setup and lifecycle events

pub mod config;
pub mod domain;
pub mod host;
pub mod obs;
pub mod presenter;
pub mod telemetry;

pub use config::{
    ConfigError, EngineConfig, GitConfig, GithubConfig, LintConfig, NotifyConfig,
    MAX_CHECKOUT_RETRIES,
};
pub use domain::{fire, may_fire, next_state, CheckError, CheckEvent, CheckResult, GitOperation};
pub use host::{GithubClient, RemoteRepository, RepositoryHost, RepositoryRef};
pub use presenter::{present, OffenseEntry, Presentation};

pub use repocheck_state::{
    CheckId, CheckRecord, CheckState, CheckStore, Language, RepositoryRecord, RepositoryStore,
};
