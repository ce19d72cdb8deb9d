//! SurrealDB schema migrations and initialization
//!
//! Sets up the `repositories` and `checks` tables with their indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all repocheck tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing repocheck SurrealDB schema");

    init_repositories_table(db).await?;
    init_checks_table(db).await?;

    info!("repocheck schema initialization complete");
    Ok(())
}

/// Initialize `repositories` table
///
/// Schema:
/// ```text
/// TABLE repositories {
///   external_id:  INT (unique)
///   name:         STRING
///   full_name:    STRING (indexed)
///   language:     STRING
///   clone_url:    STRING?
///   ssh_url:      STRING?
///   created_at:   DATETIME
/// }
/// ```
async fn init_repositories_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing repositories table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS repositories SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_external_id ON TABLE repositories COLUMNS external_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_full_name ON TABLE repositories COLUMNS full_name;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ repositories table initialized");
    Ok(())
}

/// Initialize `checks` table
///
/// Schema:
/// ```text
/// TABLE checks {
///   check_id:       STRING (unique)
///   repository_id:  INT (owner, external id)
///   commit_id:      STRING?
///   state:          STRING (queued | cloning | running | finished | failed)
///   stdout:         STRING
///   exit_status:    INT?
///   error:          STRING?
///   passed:         BOOL
///   started_at:     DATETIME?
///   finished_at:    DATETIME?
///   created_at:     DATETIME
/// }
/// ```
///
/// The `(repository_id, created_at)` index backs "most recent checks for a
/// repository".
async fn init_checks_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing checks table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS checks SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_check_id ON TABLE checks COLUMNS check_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_repository_id ON TABLE checks COLUMNS repository_id;
        DEFINE INDEX IF NOT EXISTS idx_repository_created_at ON TABLE checks COLUMNS repository_id, created_at;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ checks table initialized");
    Ok(())
}
