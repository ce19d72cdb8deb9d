//! Storage trait definitions for repocheck
//!
//! These traits define the persistence surface the check engine relies on:
//! - `RepositoryStore`: registered repositories, looked up by external id or
//!   full name
//! - `CheckStore`: check records, created in `queued` state and mutated by a
//!   single writer while the check runs
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Minimum length of a commit identifier once it is set.
pub const MIN_COMMIT_ID_LEN: usize = 7;

/// Reject commit identifiers shorter than [`MIN_COMMIT_ID_LEN`].
pub fn validate_commit_id(commit_id: Option<&str>) -> StorageResult<()> {
    match commit_id {
        Some(sha) if sha.chars().count() < MIN_COMMIT_ID_LEN => {
            Err(StorageError::InvalidCommitId {
                commit_id: sha.to_string(),
                min_len: MIN_COMMIT_ID_LEN,
            })
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Declared repository language.
///
/// Stored as the plain language name reported by the hosting service.
/// Anything outside the supported set is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    Ruby,
    JavaScript,
    Other(String),
}

impl Language {
    /// Name as reported by the hosting service.
    pub fn as_str(&self) -> &str {
        match self {
            Language::Ruby => "Ruby",
            Language::JavaScript => "JavaScript",
            Language::Other(name) => name,
        }
    }

    /// Whether an analyzer exists for this language.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Language::Other(_))
    }
}

impl From<&str> for Language {
    fn from(name: &str) -> Self {
        match name {
            "Ruby" => Language::Ruby,
            "JavaScript" => Language::JavaScript,
            other => Language::Other(other.to_string()),
        }
    }
}

impl From<String> for Language {
    fn from(name: String) -> Self {
        Language::from(name.as_str())
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered repository. Owns zero or more checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Globally unique id assigned by the hosting service
    pub external_id: i64,
    /// Short display name
    pub name: String,
    /// Fully qualified name (`owner/name`)
    pub full_name: String,
    /// Declared language
    pub language: Language,
    /// HTTPS clone URL
    pub clone_url: Option<String>,
    /// Alternate (ssh) clone URL
    pub ssh_url: Option<String>,
    /// When the repository was first registered
    pub created_at: DateTime<Utc>,
}

impl RepositoryRecord {
    pub fn new(
        external_id: i64,
        name: impl Into<String>,
        full_name: impl Into<String>,
        language: Language,
    ) -> Self {
        Self {
            external_id,
            name: name.into(),
            full_name: full_name.into(),
            language,
            clone_url: None,
            ssh_url: None,
            created_at: Utc::now(),
        }
    }

    /// Set the HTTPS clone URL
    pub fn with_clone_url(mut self, url: impl Into<String>) -> Self {
        self.clone_url = Some(url.into());
        self
    }

    /// Set the ssh clone URL
    pub fn with_ssh_url(mut self, url: impl Into<String>) -> Self {
        self.ssh_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Unique identifier for a check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckId(pub String);

impl CheckId {
    /// Generate a new random CheckId
    pub fn new() -> Self {
        CheckId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CheckId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a check.
///
/// `queued → cloning → running → finished`, with `failed` reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Queued,
    Cloning,
    Running,
    Finished,
    Failed,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Queued => "queued",
            CheckState::Cloning => "cloning",
            CheckState::Running => "running",
            CheckState::Finished => "finished",
            CheckState::Failed => "failed",
        }
    }

    /// `finished` and `failed` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckState::Finished | CheckState::Failed)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckState {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(CheckState::Queued),
            "cloning" => Ok(CheckState::Cloning),
            "running" => Ok(CheckState::Running),
            "finished" => Ok(CheckState::Finished),
            "failed" => Ok(CheckState::Failed),
            other => Err(StorageError::Backend(format!("unknown check state: {other}"))),
        }
    }
}

/// Full check record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: CheckId,
    /// External id of the owning repository (immutable)
    pub repository_id: i64,
    /// Commit under check; `None` until resolved when no commit was pinned
    pub commit_id: Option<String>,
    pub state: CheckState,
    /// Combined analyzer/git output captured during the run
    pub stdout: String,
    pub exit_status: Option<i32>,
    pub error: Option<String>,
    pub passed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CheckRecord {
    /// Create a new check in `queued` state.
    pub fn new(repository_id: i64, commit_id: Option<String>) -> Self {
        Self {
            id: CheckId::new(),
            repository_id,
            commit_id,
            state: CheckState::Queued,
            stdout: String::new(),
            exit_status: None,
            error: None,
            passed: false,
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Repository persistence.
///
/// Guarantees:
/// - `external_id` is unique; `save_repository` upserts on it.
/// - Deleting a repository deletes all of its checks.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Insert or update a repository keyed by `external_id`.
    async fn save_repository(&self, record: RepositoryRecord) -> StorageResult<RepositoryRecord>;

    /// Find a repository by its external id.
    async fn find_by_external_id(&self, external_id: i64)
        -> StorageResult<Option<RepositoryRecord>>;

    /// Find a repository by its fully qualified name.
    async fn find_by_full_name(&self, full_name: &str) -> StorageResult<Option<RepositoryRecord>>;

    /// List repositories ordered by name.
    async fn list_repositories(&self) -> StorageResult<Vec<RepositoryRecord>>;

    /// Delete a repository and cascade to its checks.
    async fn delete_repository(&self, external_id: i64) -> StorageResult<()>;
}

/// Check persistence.
///
/// Guarantees:
/// - `create_check` returns a record in `queued` state owned by an existing
///   repository.
/// - `update_check` overwrites the mutable fields of an existing record; the
///   owning repository and creation time never change.
/// - Commit identifiers shorter than [`MIN_COMMIT_ID_LEN`] are rejected.
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Create a queued check for the given repository.
    async fn create_check(
        &self,
        repository_id: i64,
        commit_id: Option<String>,
    ) -> StorageResult<CheckRecord>;

    /// Retrieve a check by ID.
    async fn get_check(&self, check_id: &CheckId) -> StorageResult<CheckRecord>;

    /// Persist the current state of a check.
    async fn update_check(&self, check: &CheckRecord) -> StorageResult<()>;

    /// Most recent checks for a repository, newest first.
    async fn recent_checks(&self, repository_id: i64, limit: usize)
        -> StorageResult<Vec<CheckRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trips_through_its_name() {
        assert_eq!(Language::from("Ruby"), Language::Ruby);
        assert_eq!(Language::from("JavaScript"), Language::JavaScript);
        assert_eq!(
            Language::from("Haskell"),
            Language::Other("Haskell".to_string())
        );
        assert_eq!(String::from(Language::JavaScript), "JavaScript");
    }

    #[test]
    fn language_serializes_as_plain_string() {
        let json = serde_json::to_string(&Language::Ruby).unwrap();
        assert_eq!(json, "\"Ruby\"");
        let back: Language = serde_json::from_str("\"Go\"").unwrap();
        assert_eq!(back, Language::Other("Go".to_string()));
        assert!(!back.is_supported());
    }

    #[test]
    fn check_state_parses_its_own_names() {
        for state in [
            CheckState::Queued,
            CheckState::Cloning,
            CheckState::Running,
            CheckState::Finished,
            CheckState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<CheckState>().unwrap(), state);
        }
        assert!("paused".parse::<CheckState>().is_err());
    }

    #[test]
    fn only_finished_and_failed_are_terminal() {
        assert!(!CheckState::Queued.is_terminal());
        assert!(!CheckState::Cloning.is_terminal());
        assert!(!CheckState::Running.is_terminal());
        assert!(CheckState::Finished.is_terminal());
        assert!(CheckState::Failed.is_terminal());
    }

    #[test]
    fn new_check_starts_queued_and_not_passed() {
        let check = CheckRecord::new(42, None);
        assert_eq!(check.state, CheckState::Queued);
        assert!(!check.passed);
        assert!(check.exit_status.is_none());
        assert!(check.started_at.is_none());
    }

    #[test]
    fn commit_id_validation() {
        assert!(validate_commit_id(None).is_ok());
        assert!(validate_commit_id(Some("503d6af")).is_ok());
        let err = validate_commit_id(Some("503d6a")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidCommitId { min_len: 7, .. }));
    }
}
