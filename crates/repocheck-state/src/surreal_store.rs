//! SurrealDB-backed repository and check store
//!
//! Uses `schema::RepositoryRow` and `schema::CheckRow` for persistence,
//! converting to/from `storage_traits` types at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{CheckRow, RepositoryRow};
use crate::storage_traits::{
    validate_commit_id, CheckId, CheckRecord, CheckStore, RepositoryRecord, RepositoryStore,
    StorageResult,
};

const NAMESPACE: &str = "repocheck";
const DATABASE: &str = "main";

/// Default on-disk location when no endpoint is configured.
pub const DEFAULT_LOCAL_PATH: &str = ".repocheck/db";

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// SurrealDB-backed implementation of [`RepositoryStore`] and [`CheckStore`].
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`,
    /// `ws://host:port`), select `repocheck/main` and run migrations.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealStore connected ({})", url);
        Ok(Self { db })
    }

    /// Connect using `SURREALDB_URL`, falling back to local persistence in
    /// [`DEFAULT_LOCAL_PATH`].
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                DEFAULT_LOCAL_PATH, e
            ))
        })?;
        info!(
            "No SURREALDB_URL found, using local persistence: {}",
            DEFAULT_LOCAL_PATH
        );
        Self::connect(&format!("surrealkv://{DEFAULT_LOCAL_PATH}")).await
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_repository_row(&self, external_id: i64) -> StorageResult<Option<RepositoryRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM repositories WHERE external_id = $eid")
            .bind(("eid", external_id))
            .await
            .map_err(backend)?;

        let rows: Vec<RepositoryRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_check_row(&self, check_id: &str) -> StorageResult<CheckRow> {
        let cid = check_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM checks WHERE check_id = $cid")
            .bind(("cid", cid))
            .await
            .map_err(backend)?;

        let rows: Vec<CheckRow> = res.take(0).map_err(backend)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::CheckNotFound {
                check_id: check_id.to_string(),
            })
    }
}

#[async_trait]
impl RepositoryStore for SurrealStore {
    async fn save_repository(&self, record: RepositoryRecord) -> StorageResult<RepositoryRecord> {
        match self.fetch_repository_row(record.external_id).await? {
            Some(existing) => {
                let updated = RepositoryRow {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..RepositoryRow::from(record)
                };
                let eid = updated.external_id;
                debug!(external_id = eid, "updating repository");
                self.db
                    .query("UPDATE repositories CONTENT $row WHERE external_id = $eid")
                    .bind(("row", updated.clone()))
                    .bind(("eid", eid))
                    .await
                    .map_err(backend)?
                    .check()
                    .map_err(backend)?;
                Ok(updated.into())
            }
            None => {
                debug!(external_id = record.external_id, "creating repository");
                let row = RepositoryRow::from(record);
                let _created: Option<RepositoryRow> = self
                    .db
                    .create("repositories")
                    .content(row.clone())
                    .await
                    .map_err(backend)?;
                Ok(row.into())
            }
        }
    }

    async fn find_by_external_id(
        &self,
        external_id: i64,
    ) -> StorageResult<Option<RepositoryRecord>> {
        Ok(self
            .fetch_repository_row(external_id)
            .await?
            .map(RepositoryRecord::from))
    }

    async fn find_by_full_name(&self, full_name: &str) -> StorageResult<Option<RepositoryRecord>> {
        let name = full_name.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM repositories WHERE full_name = $name LIMIT 1")
            .bind(("name", name))
            .await
            .map_err(backend)?;

        let rows: Vec<RepositoryRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(RepositoryRecord::from))
    }

    async fn list_repositories(&self) -> StorageResult<Vec<RepositoryRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM repositories ORDER BY name ASC")
            .await
            .map_err(backend)?;

        let rows: Vec<RepositoryRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(RepositoryRecord::from).collect())
    }

    async fn delete_repository(&self, external_id: i64) -> StorageResult<()> {
        if self.fetch_repository_row(external_id).await?.is_none() {
            return Err(StorageError::RepositoryNotFound {
                repository: external_id.to_string(),
            });
        }

        self.db
            .query("DELETE checks WHERE repository_id = $eid; DELETE repositories WHERE external_id = $eid;")
            .bind(("eid", external_id))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;

        Ok(())
    }
}

#[async_trait]
impl CheckStore for SurrealStore {
    async fn create_check(
        &self,
        repository_id: i64,
        commit_id: Option<String>,
    ) -> StorageResult<CheckRecord> {
        validate_commit_id(commit_id.as_deref())?;
        if self.fetch_repository_row(repository_id).await?.is_none() {
            return Err(StorageError::RepositoryNotFound {
                repository: repository_id.to_string(),
            });
        }

        let check = CheckRecord::new(repository_id, commit_id);
        debug!(check_id = %check.id, repository_id, "creating check");

        let _created: Option<CheckRow> = self
            .db
            .create("checks")
            .content(CheckRow::from(&check))
            .await
            .map_err(backend)?;

        Ok(check)
    }

    async fn get_check(&self, check_id: &CheckId) -> StorageResult<CheckRecord> {
        self.fetch_check_row(&check_id.0).await?.into_record()
    }

    async fn update_check(&self, check: &CheckRecord) -> StorageResult<()> {
        validate_commit_id(check.commit_id.as_deref())?;
        let row = self.fetch_check_row(&check.id.0).await?.apply(check);
        let cid = check.id.0.clone();

        self.db
            .query("UPDATE checks CONTENT $row WHERE check_id = $cid")
            .bind(("row", row))
            .bind(("cid", cid))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;

        Ok(())
    }

    async fn recent_checks(
        &self,
        repository_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<CheckRecord>> {
        let sql = format!(
            "SELECT * FROM checks WHERE repository_id = $rid ORDER BY created_at DESC LIMIT {limit}"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("rid", repository_id))
            .await
            .map_err(backend)?;

        let rows: Vec<CheckRow> = res.take(0).map_err(backend)?;
        rows.into_iter().map(CheckRow::into_record).collect()
    }
}
