//! Contract tests for RepositoryStore and CheckStore.
//!
//! Every conforming implementation must pass these. Each contract runs
//! against `MemoryStore` and the in-memory `SurrealStore`.

use chrono::Utc;
use repocheck_state::fakes::MemoryStore;
use repocheck_state::{
    CheckId, CheckState, CheckStore, Language, RepositoryRecord, RepositoryStore, StorageError,
    SurrealStore,
};

fn sample_repo(external_id: i64, name: &str, language: Language) -> RepositoryRecord {
    RepositoryRecord::new(external_id, name, format!("octo/{name}"), language)
        .with_clone_url(format!("https://example.com/octo/{name}.git"))
        .with_ssh_url(format!("git@example.com:octo/{name}.git"))
}

async fn repository_lookup_by_id_and_name<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(12_345_678, "widgets", Language::JavaScript))
        .await
        .unwrap();

    let by_id = store.find_by_external_id(12_345_678).await.unwrap().unwrap();
    assert_eq!(by_id.full_name, "octo/widgets");
    assert_eq!(by_id.language, Language::JavaScript);

    let by_name = store.find_by_full_name("octo/widgets").await.unwrap().unwrap();
    assert_eq!(by_name.external_id, 12_345_678);

    assert!(store.find_by_external_id(999_999).await.unwrap().is_none());
    assert!(store.find_by_full_name("octo/missing").await.unwrap().is_none());
}

async fn repository_save_is_upsert<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    let moved = RepositoryRecord {
        full_name: "octo/widgets-v2".to_string(),
        ..sample_repo(1, "widgets", Language::Ruby)
    };
    store.save_repository(moved).await.unwrap();

    let all = store.list_repositories().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].full_name, "octo/widgets-v2");
}

async fn repositories_listed_by_name<S: RepositoryStore + CheckStore>(store: S) {
    for (id, name) in [(3, "zeta"), (1, "alpha"), (2, "mid")] {
        store
            .save_repository(sample_repo(id, name, Language::Ruby))
            .await
            .unwrap();
    }
    let names: Vec<String> = store
        .list_repositories()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

async fn create_check_starts_queued<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();

    let check = store
        .create_check(1, Some("503d6af".to_string()))
        .await
        .unwrap();
    assert_eq!(check.state, CheckState::Queued);
    assert_eq!(check.commit_id.as_deref(), Some("503d6af"));
    assert!(!check.passed);

    let fetched = store.get_check(&check.id).await.unwrap();
    assert_eq!(fetched.id, check.id);
    assert_eq!(fetched.state, CheckState::Queued);
    assert_eq!(fetched.repository_id, 1);
}

async fn create_check_requires_repository<S: RepositoryStore + CheckStore>(store: S) {
    let err = store.create_check(404, None).await.unwrap_err();
    assert!(matches!(err, StorageError::RepositoryNotFound { .. }));
}

async fn create_check_rejects_short_commit<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    let err = store
        .create_check(1, Some("abc".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidCommitId { .. }));
    assert!(store.recent_checks(1, 10).await.unwrap().is_empty());
}

async fn update_check_persists_progress<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    let mut check = store.create_check(1, None).await.unwrap();

    check.state = CheckState::Failed;
    check.commit_id = Some("0123456789abcdef".to_string());
    check.stdout = "fatal: repository not found\n".to_string();
    check.exit_status = Some(128);
    check.error = Some("fatal: repository not found".to_string());
    check.started_at = Some(Utc::now());
    check.finished_at = Some(Utc::now());
    store.update_check(&check).await.unwrap();

    let fetched = store.get_check(&check.id).await.unwrap();
    assert_eq!(fetched.state, CheckState::Failed);
    assert_eq!(fetched.commit_id.as_deref(), Some("0123456789abcdef"));
    assert_eq!(fetched.exit_status, Some(128));
    assert_eq!(fetched.error.as_deref(), Some("fatal: repository not found"));
    assert!(fetched.started_at.is_some());
    assert!(fetched.finished_at.is_some());
}

async fn update_unknown_check_fails<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    let mut check = store.create_check(1, None).await.unwrap();
    check.id = CheckId("nonexistent".to_string());

    let err = store.update_check(&check).await.unwrap_err();
    assert!(matches!(err, StorageError::CheckNotFound { .. }));

    let err = store.get_check(&check.id).await.unwrap_err();
    assert!(matches!(err, StorageError::CheckNotFound { .. }));
}

async fn recent_checks_newest_first<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    store
        .save_repository(sample_repo(2, "gadgets", Language::Ruby))
        .await
        .unwrap();

    let mut created = Vec::new();
    for _ in 0..3 {
        created.push(store.create_check(1, None).await.unwrap().id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    store.create_check(2, None).await.unwrap();

    let recent: Vec<CheckId> = store
        .recent_checks(1, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(recent, vec![created[2].clone(), created[1].clone()]);
}

async fn delete_repository_cascades<S: RepositoryStore + CheckStore>(store: S) {
    store
        .save_repository(sample_repo(1, "widgets", Language::Ruby))
        .await
        .unwrap();
    store
        .save_repository(sample_repo(2, "gadgets", Language::Ruby))
        .await
        .unwrap();
    let doomed = store.create_check(1, None).await.unwrap();
    let survivor = store.create_check(2, None).await.unwrap();

    store.delete_repository(1).await.unwrap();

    assert!(store.find_by_external_id(1).await.unwrap().is_none());
    assert!(matches!(
        store.get_check(&doomed.id).await.unwrap_err(),
        StorageError::CheckNotFound { .. }
    ));
    assert!(store.get_check(&survivor.id).await.is_ok());

    let err = store.delete_repository(1).await.unwrap_err();
    assert!(matches!(err, StorageError::RepositoryNotFound { .. }));
}

macro_rules! store_contracts {
    ($module:ident, $store:expr) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn repository_lookup_by_id_and_name() {
                super::repository_lookup_by_id_and_name($store).await;
            }

            #[tokio::test]
            async fn repository_save_is_upsert() {
                super::repository_save_is_upsert($store).await;
            }

            #[tokio::test]
            async fn repositories_listed_by_name() {
                super::repositories_listed_by_name($store).await;
            }

            #[tokio::test]
            async fn create_check_starts_queued() {
                super::create_check_starts_queued($store).await;
            }

            #[tokio::test]
            async fn create_check_requires_repository() {
                super::create_check_requires_repository($store).await;
            }

            #[tokio::test]
            async fn create_check_rejects_short_commit() {
                super::create_check_rejects_short_commit($store).await;
            }

            #[tokio::test]
            async fn update_check_persists_progress() {
                super::update_check_persists_progress($store).await;
            }

            #[tokio::test]
            async fn update_unknown_check_fails() {
                super::update_unknown_check_fails($store).await;
            }

            #[tokio::test]
            async fn recent_checks_newest_first() {
                super::recent_checks_newest_first($store).await;
            }

            #[tokio::test]
            async fn delete_repository_cascades() {
                super::delete_repository_cascades($store).await;
            }
        }
    };
}

store_contracts!(memory_store, MemoryStore::new());
store_contracts!(
    surreal_store,
    SurrealStore::in_memory().await.expect("in_memory() failed")
);
