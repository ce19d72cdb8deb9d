//! repocheck-state: persistence for repocheck
//!
//! This crate provides the persistence layer for repository checks. The check
//! engine only needs a record store with the attributes of a repository and a
//! check; everything else about the storage technology stays here.
//!
//! ## Layer 0 - Data/Persistence
//!
//! ## Key Components
//!
//! - `RepositoryStore` / `CheckStore`: backend-agnostic store traits
//! - `MemoryStore`: in-memory implementation for tests and embedding
//! - `SurrealStore`: SurrealDB implementation (in-memory, local file or remote)

mod error;
pub mod fakes;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use storage_traits::{
    validate_commit_id, CheckId, CheckRecord, CheckState, CheckStore, Language, RepositoryRecord,
    RepositoryStore, StorageResult, MIN_COMMIT_ID_LEN,
};
pub use surreal_store::SurrealStore;

/// Result type for repocheck-state connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
