//! SurrealDB row types
//!
//! Rows use plain strings/numbers suitable for SurrealDB storage and are
//! converted to the `storage_traits` records at the store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{CheckId, CheckRecord, RepositoryRecord, StorageResult};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

// ---------------------------------------------------------------------------
// repositories
// ---------------------------------------------------------------------------

/// Repository row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub external_id: i64,
    pub name: String,
    pub full_name: String,
    pub language: String,
    pub clone_url: Option<String>,
    pub ssh_url: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<RepositoryRecord> for RepositoryRow {
    fn from(record: RepositoryRecord) -> Self {
        RepositoryRow {
            id: None,
            external_id: record.external_id,
            name: record.name,
            full_name: record.full_name,
            language: record.language.into(),
            clone_url: record.clone_url,
            ssh_url: record.ssh_url,
            created_at: record.created_at,
        }
    }
}

impl From<RepositoryRow> for RepositoryRecord {
    fn from(row: RepositoryRow) -> Self {
        RepositoryRecord {
            external_id: row.external_id,
            name: row.name,
            full_name: row.full_name,
            language: row.language.into(),
            clone_url: row.clone_url,
            ssh_url: row.ssh_url,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// checks
// ---------------------------------------------------------------------------

/// Check row. `state` holds the lowercase lifecycle name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub check_id: String,
    pub repository_id: i64,
    pub commit_id: Option<String>,
    pub state: String,
    pub stdout: String,
    pub exit_status: Option<i32>,
    pub error: Option<String>,
    pub passed: bool,
    #[serde(default, with = "surreal_datetime_opt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CheckRow {
    /// Copy the mutable fields of `check` onto this row, keeping its
    /// record id, owner and creation time.
    pub fn apply(mut self, check: &CheckRecord) -> Self {
        self.commit_id = check.commit_id.clone();
        self.state = check.state.as_str().to_string();
        self.stdout = check.stdout.clone();
        self.exit_status = check.exit_status;
        self.error = check.error.clone();
        self.passed = check.passed;
        self.started_at = check.started_at;
        self.finished_at = check.finished_at;
        self
    }

    pub fn into_record(self) -> StorageResult<CheckRecord> {
        Ok(CheckRecord {
            id: CheckId(self.check_id),
            repository_id: self.repository_id,
            commit_id: self.commit_id,
            state: self.state.parse()?,
            stdout: self.stdout,
            exit_status: self.exit_status,
            error: self.error,
            passed: self.passed,
            started_at: self.started_at,
            finished_at: self.finished_at,
            created_at: self.created_at,
        })
    }
}

impl From<&CheckRecord> for CheckRow {
    fn from(check: &CheckRecord) -> Self {
        CheckRow {
            id: None,
            check_id: check.id.0.clone(),
            repository_id: check.repository_id,
            commit_id: check.commit_id.clone(),
            state: check.state.as_str().to_string(),
            stdout: check.stdout.clone(),
            exit_status: check.exit_status,
            error: check.error.clone(),
            passed: check.passed,
            started_at: check.started_at,
            finished_at: check.finished_at,
            created_at: check.created_at,
        }
    }
}
