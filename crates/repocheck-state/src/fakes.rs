//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryStore` satisfies both `RepositoryStore` and `CheckStore` without
//! any external dependencies. One store backs both traits so that deleting
//! a repository can cascade to its checks.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Tables {
    repositories: HashMap<i64, RepositoryRecord>,
    checks: Vec<CheckRecord>,
}

/// In-memory repository + check store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of checks across all repositories.
    pub fn check_count(&self) -> usize {
        self.tables.lock().unwrap().checks.len()
    }
}

#[async_trait]
impl RepositoryStore for MemoryStore {
    async fn save_repository(&self, record: RepositoryRecord) -> StorageResult<RepositoryRecord> {
        let mut tables = self.tables.lock().unwrap();
        let saved = match tables.repositories.get(&record.external_id) {
            Some(existing) => RepositoryRecord {
                created_at: existing.created_at,
                ..record
            },
            None => record,
        };
        tables
            .repositories
            .insert(saved.external_id, saved.clone());
        Ok(saved)
    }

    async fn find_by_external_id(
        &self,
        external_id: i64,
    ) -> StorageResult<Option<RepositoryRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.repositories.get(&external_id).cloned())
    }

    async fn find_by_full_name(&self, full_name: &str) -> StorageResult<Option<RepositoryRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .repositories
            .values()
            .find(|r| r.full_name == full_name)
            .cloned())
    }

    async fn list_repositories(&self) -> StorageResult<Vec<RepositoryRecord>> {
        let tables = self.tables.lock().unwrap();
        let mut repos: Vec<_> = tables.repositories.values().cloned().collect();
        repos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repos)
    }

    async fn delete_repository(&self, external_id: i64) -> StorageResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.repositories.remove(&external_id).is_none() {
            return Err(StorageError::RepositoryNotFound {
                repository: external_id.to_string(),
            });
        }
        tables.checks.retain(|c| c.repository_id != external_id);
        Ok(())
    }
}

#[async_trait]
impl CheckStore for MemoryStore {
    async fn create_check(
        &self,
        repository_id: i64,
        commit_id: Option<String>,
    ) -> StorageResult<CheckRecord> {
        validate_commit_id(commit_id.as_deref())?;
        let mut tables = self.tables.lock().unwrap();
        if !tables.repositories.contains_key(&repository_id) {
            return Err(StorageError::RepositoryNotFound {
                repository: repository_id.to_string(),
            });
        }
        let check = CheckRecord::new(repository_id, commit_id);
        tables.checks.push(check.clone());
        Ok(check)
    }

    async fn get_check(&self, check_id: &CheckId) -> StorageResult<CheckRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .checks
            .iter()
            .find(|c| &c.id == check_id)
            .cloned()
            .ok_or_else(|| StorageError::CheckNotFound {
                check_id: check_id.0.clone(),
            })
    }

    async fn update_check(&self, check: &CheckRecord) -> StorageResult<()> {
        validate_commit_id(check.commit_id.as_deref())?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .checks
            .iter_mut()
            .find(|c| c.id == check.id)
            .ok_or_else(|| StorageError::CheckNotFound {
                check_id: check.id.0.clone(),
            })?;
        *stored = CheckRecord {
            repository_id: stored.repository_id,
            created_at: stored.created_at,
            ..check.clone()
        };
        Ok(())
    }

    async fn recent_checks(
        &self,
        repository_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<CheckRecord>> {
        let tables = self.tables.lock().unwrap();
        // Insertion order breaks ties between identical timestamps.
        let mut checks: Vec<(usize, &CheckRecord)> = tables
            .checks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.repository_id == repository_id)
            .collect();
        checks.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(checks
            .into_iter()
            .take(limit)
            .map(|(_, c)| c.clone())
            .collect())
    }
}
