//! Webhook, direct request and registration flows through `CheckService`.

use std::sync::Arc;

use repocheck_ci::fakes::{RecordingNotifier, ScriptedRunner, StaticHost};
use repocheck_ci::{CheckEngine, CheckService, ReplyStatus, WebhookOutcome, WebhookReply};
use repocheck_core::{CheckError, EngineConfig, RemoteRepository, RepositoryRef};
use repocheck_state::fakes::MemoryStore;
use repocheck_state::{
    CheckState, CheckStore, Language, RepositoryRecord, RepositoryStore, SurrealStore,
};
use serde_json::json;
use tempfile::TempDir;

const SHA: &str = "6dcb09b5b57875f334f61aebed695e2e4193db5e";

struct Fixture {
    service: CheckService,
    store: Arc<MemoryStore>,
    runner: Arc<ScriptedRunner>,
    _root: TempDir,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(ScriptedRunner::new().on("rev-parse", 0, SHA));
    let engine = CheckEngine::new(
        store.clone(),
        store.clone(),
        runner.clone(),
        Arc::new(RecordingNotifier::new()),
        EngineConfig {
            workspace_root: root.path().to_path_buf(),
            ..EngineConfig::default()
        },
    );
    Fixture {
        service: CheckService::new(Arc::new(engine)),
        store,
        runner,
        _root: root,
    }
}

async fn seed(store: &MemoryStore) -> RepositoryRecord {
    store
        .save_repository(RepositoryRecord::new(
            1296269,
            "Hello-World",
            "octocat/Hello-World",
            Language::from("Go"),
        ))
        .await
        .unwrap()
}

fn push_payload() -> serde_json::Value {
    json!({
        "ref": "refs/heads/main",
        "after": SHA,
        "repository": { "id": 1296269, "full_name": "octocat/Hello-World" }
    })
}

#[tokio::test]
async fn push_creates_and_performs_check() {
    let f = fixture();
    seed(&f.store).await;

    let result = f
        .service
        .handle_webhook(Some("push"), &push_payload())
        .await;
    let reply = WebhookReply::from_result(&result);

    let Ok(WebhookOutcome::Completed(check)) = result else {
        panic!("expected a completed check");
    };
    assert_eq!(check.commit_id.as_deref(), Some(SHA));
    assert_eq!(check.state, CheckState::Finished);
    assert_eq!(reply.status, ReplyStatus::Created);
    assert_eq!(
        reply.body,
        json!({ "id": check.id.as_str(), "state": "finished", "exit": 0 })
    );
    assert_eq!(f.runner.calls_matching(&format!("checkout --quiet {SHA}")), 1);
}

#[tokio::test]
async fn other_events_are_acknowledged_without_a_check() {
    let f = fixture();
    let repo = seed(&f.store).await;

    let result = f
        .service
        .handle_webhook(Some("ping"), &push_payload())
        .await;

    assert_eq!(
        WebhookReply::from_result(&result).status,
        ReplyStatus::Accepted
    );
    assert!(matches!(result, Ok(WebhookOutcome::Ignored { ref event }) if event == "ping"));
    assert_eq!(f.store.check_count(), 0);
    assert!(f
        .store
        .recent_checks(repo.external_id, 5)
        .await
        .unwrap()
        .is_empty());
    assert!(f.runner.calls().is_empty());
}

#[tokio::test]
async fn missing_event_header_counts_as_push() {
    let f = fixture();
    seed(&f.store).await;

    let result = f.service.handle_webhook(None, &push_payload()).await;
    assert!(matches!(result, Ok(WebhookOutcome::Completed(_))));

    let result = f.service.handle_webhook(Some(""), &push_payload()).await;
    assert!(matches!(result, Ok(WebhookOutcome::Completed(_))));
    assert_eq!(f.store.check_count(), 2);
}

#[tokio::test]
async fn unknown_repository_is_not_found_and_creates_nothing() {
    let f = fixture();
    seed(&f.store).await;

    let payload = json!({ "after": SHA, "repository": { "id": 99 } });
    let result = f.service.handle_webhook(Some("push"), &payload).await;
    let reply = WebhookReply::from_result(&result);

    assert_eq!(reply.status, ReplyStatus::NotFound);
    assert_eq!(reply.body, json!({ "error": "repository_not_found" }));
    assert_eq!(f.store.check_count(), 0);
}

#[tokio::test]
async fn full_name_lookup_when_id_absent() {
    let f = fixture();
    seed(&f.store).await;

    let payload = json!({
        "head_commit": { "id": SHA },
        "repository": { "full_name": "octocat/Hello-World" }
    });
    let result = f.service.handle_webhook(Some("push"), &payload).await;
    let Ok(WebhookOutcome::Completed(check)) = result else {
        panic!("expected a completed check");
    };
    assert_eq!(check.repository_id, 1296269);
    assert_eq!(check.commit_id.as_deref(), Some(SHA));
}

#[tokio::test]
async fn short_commit_is_unprocessable() {
    let f = fixture();
    seed(&f.store).await;

    let payload = json!({ "after": "abc", "repository": { "id": 1296269 } });
    let result = f.service.handle_webhook(Some("push"), &payload).await;

    assert_eq!(
        WebhookReply::from_result(&result).status,
        ReplyStatus::Unprocessable
    );
    assert_eq!(f.store.check_count(), 0);
}

#[tokio::test]
async fn direct_request_uses_head() {
    let f = fixture();
    seed(&f.store).await;

    let check = f
        .service
        .request_check(&RepositoryRef::parse("octocat/Hello-World"), None)
        .await
        .unwrap();

    assert_eq!(check.commit_id.as_deref(), Some(SHA));
    assert_eq!(f.runner.calls_matching("rev-parse HEAD"), 1);
    assert_eq!(f.runner.calls_matching("checkout"), 0);

    let err = f
        .service
        .request_check(&RepositoryRef::parse("nobody/nothing"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn recent_checks_are_newest_first() {
    let f = fixture();
    seed(&f.store).await;
    let repo_ref = RepositoryRef::ExternalId(1296269);

    let first = f.service.request_check(&repo_ref, None).await.unwrap();
    let second = f.service.request_check(&repo_ref, None).await.unwrap();

    let recent = f.service.recent_checks(&repo_ref, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
    assert_eq!(recent[1].id, first.id);
    assert_eq!(f.service.recent_checks(&repo_ref, 1).await.unwrap().len(), 1);
}

fn remote(id: i64, full_name: &str, language: Option<&str>) -> RemoteRepository {
    RemoteRepository {
        id,
        name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
        full_name: full_name.to_string(),
        language: language.map(str::to_string),
        clone_url: Some(format!("https://github.com/{full_name}.git")),
        ssh_url: Some(format!("git@github.com:{full_name}.git")),
    }
}

#[tokio::test]
async fn register_repository_upserts_and_installs_hook() {
    let f = fixture();
    let host = StaticHost::new(vec![remote(10, "octo/rails-app", Some("Ruby"))]);

    let first = f
        .service
        .register_repository(
            &host,
            &RepositoryRef::parse("10"),
            Some("https://ci.example.com/api/checks"),
        )
        .await
        .unwrap();
    assert_eq!(first.language, Language::Ruby);
    assert_eq!(
        first.clone_url.as_deref(),
        Some("https://github.com/octo/rails-app.git")
    );
    assert_eq!(
        host.hooks(),
        vec![(
            "octo/rails-app".to_string(),
            "https://ci.example.com/api/checks".to_string()
        )]
    );

    let again = f
        .service
        .register_repository(&host, &RepositoryRef::parse("octo/rails-app"), None)
        .await
        .unwrap();
    assert_eq!(again.created_at, first.created_at);
    assert_eq!(f.store.list_repositories().await.unwrap().len(), 1);
    assert_eq!(host.hooks().len(), 1);
}

#[tokio::test]
async fn register_repository_rejects_unsupported_language() {
    let f = fixture();
    let host = StaticHost::new(vec![
        remote(11, "octo/go-tool", Some("Go")),
        remote(12, "octo/empty", None),
    ]);

    let err = f
        .service
        .register_repository(&host, &RepositoryRef::ExternalId(11), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::UnsupportedLanguage(ref l) if l == "Go"));

    let err = f
        .service
        .register_repository(&host, &RepositoryRef::ExternalId(12), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::UnsupportedLanguage(ref l) if l == "unknown"));

    let err = f
        .service
        .register_repository(&host, &RepositoryRef::ExternalId(13), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(f.store.list_repositories().await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_repository_drops_its_checks() {
    let f = fixture();
    seed(&f.store).await;
    let repo_ref = RepositoryRef::ExternalId(1296269);
    f.service.request_check(&repo_ref, None).await.unwrap();
    assert_eq!(f.store.check_count(), 1);

    let removed = f.service.remove_repository(&repo_ref).await.unwrap();
    assert_eq!(removed.full_name, "octocat/Hello-World");
    assert_eq!(f.store.check_count(), 0);
    assert!(f.service.find_repository(&repo_ref).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn webhook_flow_over_surreal_store() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(SurrealStore::in_memory().await.unwrap());
    store
        .save_repository(RepositoryRecord::new(
            1296269,
            "Hello-World",
            "octocat/Hello-World",
            Language::from("Go"),
        ))
        .await
        .unwrap();

    let engine = CheckEngine::new(
        store.clone(),
        store.clone(),
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingNotifier::new()),
        EngineConfig {
            workspace_root: root.path().to_path_buf(),
            ..EngineConfig::default()
        },
    );
    let service = CheckService::new(Arc::new(engine));

    let result = service.handle_webhook(Some("push"), &push_payload()).await;
    let Ok(WebhookOutcome::Completed(check)) = result else {
        panic!("expected a completed check");
    };

    let stored = store.get_check(&check.id).await.unwrap();
    assert_eq!(stored.state, CheckState::Finished);
    assert_eq!(stored.commit_id.as_deref(), Some(SHA));
    assert!(stored.finished_at.is_some());
    assert!(stored.stdout.contains("skipping lint"));
}
