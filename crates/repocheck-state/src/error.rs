//! Error types for repocheck-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors returned by the [`RepositoryStore`](crate::RepositoryStore) and
/// [`CheckStore`](crate::CheckStore) traits.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("repository not found: {repository}")]
    RepositoryNotFound { repository: String },

    #[error("check not found: {check_id}")]
    CheckNotFound { check_id: String },

    #[error("invalid commit id {commit_id:?}: must be at least {min_len} characters")]
    InvalidCommitId { commit_id: String, min_len: usize },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
