mod common;

use uuid::Uuid;

use ascode_core::export::WorkflowExport;
use ascode_core::hook::{repository_webhook_model, HOOK_CONFIG_WORKFLOW};
use ascode_core::{Actor, Message, MessageId, NodeHook, Workflow};
use ascode_sync::reconcile::{GIT_BRANCH, GIT_REPOSITORY};
use ascode_sync::{parse_and_import, ImportOptions, ProjectValidator, SyncError};

use common::{project, RecordingStore, REPO_URL, WORKFLOW_YAML};

fn export() -> WorkflowExport {
    serde_yaml::from_str(WORKFLOW_YAML).expect("workflow yaml")
}

fn bare_export(name: &str) -> WorkflowExport {
    WorkflowExport {
        name: name.to_string(),
        pipeline: Some("build".to_string()),
        application: Some("api".to_string()),
        ..Default::default()
    }
}

fn repo_opts() -> ImportOptions {
    ImportOptions {
        force: true,
        from_repository: Some(REPO_URL.to_string()),
        is_default_branch: true,
        from_branch: Some("main".to_string()),
        default_branch: Some("main".to_string()),
        ..Default::default()
    }
}

fn actor() -> Actor {
    Actor::from("alice")
}

fn repository_hooks(w: &Workflow) -> Vec<&NodeHook> {
    w.root.hooks.iter().filter(|h| h.is_repository_webhook()).collect()
}

#[tokio::test]
async fn name_mismatch_never_reaches_the_store() {
    let store = RecordingStore::new(project());
    let opts = ImportOptions {
        workflow_name: Some("other".to_string()),
        ..repo_opts()
    };

    let failure = parse_and_import(&store, &ProjectValidator, &project(), None, &export(), &actor(), &opts)
        .await
        .unwrap_err();

    assert!(matches!(failure.source, SyncError::NameMismatch { .. }));
    assert!(failure.to_string().contains("expected other"));
    assert_eq!(store.workflow_calls(), 0);
}

#[tokio::test]
async fn invalid_name_never_reaches_the_store() {
    let store = RecordingStore::new(project());
    let failure = parse_and_import(
        &store,
        &ProjectValidator,
        &project(),
        None,
        &bare_export("not valid!"),
        &actor(),
        &repo_opts(),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.source, SyncError::InvalidName { .. }));
    assert_eq!(store.workflow_calls(), 0);
}

#[tokio::test]
async fn validation_failure_returns_its_message() {
    let store = RecordingStore::new(project());
    let mut broken = bare_export("release");
    broken.pipeline = Some("deploy".to_string());

    let failure = parse_and_import(&store, &ProjectValidator, &project(), None, &broken, &actor(), &repo_opts())
        .await
        .unwrap_err();

    assert!(matches!(failure.source, SyncError::Validation(_)));
    assert_eq!(
        failure.messages.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![MessageId::WorkflowInvalid]
    );
    assert_eq!(store.workflow_calls(), 0);
}

#[tokio::test]
async fn every_store_message_is_collected_in_order() {
    let mut store = RecordingStore::new(project());
    store.extra_messages = (0..8)
        .map(|i| Message::with_args(MessageId::HookRegistered, [format!("hook-{i}")]))
        .collect();

    let outcome = parse_and_import(&store, &ProjectValidator, &project(), None, &export(), &actor(), &repo_opts())
        .await
        .expect("import");

    let args: Vec<&str> = outcome
        .messages
        .iter()
        .map(|m| m.args[0].as_str())
        .collect();
    let mut expected: Vec<String> = (0..8).map(|i| format!("hook-{i}")).collect();
    expected.push("release".to_string());
    assert_eq!(args, expected);
    assert_eq!(
        outcome.messages.last().map(|m| m.id),
        Some(MessageId::WorkflowImportedInserted)
    );
}

#[tokio::test]
async fn store_failure_keeps_collected_messages() {
    let mut store = RecordingStore::new(project());
    store.reject = true;
    store.extra_messages = vec![Message::with_args(MessageId::HookRegistered, ["early"])];

    let failure = parse_and_import(&store, &ProjectValidator, &project(), None, &export(), &actor(), &repo_opts())
        .await
        .unwrap_err();

    assert!(matches!(failure.source, SyncError::Persistence { .. }));
    let ids: Vec<MessageId> = failure.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MessageId::HookRegistered, MessageId::WorkflowAlreadyExists]);
}

#[tokio::test]
async fn repository_webhook_keeps_its_identity() {
    let store = RecordingStore::new(project());
    let legacy_uuid = Uuid::new_v4();
    let mut previous = Workflow {
        id: 42,
        name: "legacy-release".to_string(),
        ..Default::default()
    };
    let mut legacy = NodeHook::from_model(&repository_webhook_model());
    legacy.uuid = Some(legacy_uuid);
    previous.root.hooks.push(legacy);

    let outcome = parse_and_import(
        &store,
        &ProjectValidator,
        &project(),
        Some(&previous),
        &export(),
        &actor(),
        &repo_opts(),
    )
    .await
    .expect("import");

    let hooks = repository_hooks(&outcome.workflow);
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].uuid, Some(legacy_uuid));
    assert_eq!(hooks[0].config.value(HOOK_CONFIG_WORKFLOW), Some("release"));
    assert_eq!(outcome.workflow.id, 42);
}

async fn import_from_repo(store: &RecordingStore, previous: Option<&Workflow>) -> Workflow {
    parse_and_import(store, &ProjectValidator, &project(), previous, &export(), &actor(), &repo_opts())
        .await
        .expect("import")
        .workflow
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let store = RecordingStore::new(project());
    let first = import_from_repo(&store, None).await;
    let second = import_from_repo(&store, Some(&first)).await;
    let third = import_from_repo(&store, Some(&second)).await;

    assert_eq!(third.root.hooks, second.root.hooks);
    assert_eq!(repository_hooks(&third).len(), 1);
    assert_eq!(repository_hooks(&third)[0].uuid, repository_hooks(&first)[0].uuid);
}

#[tokio::test]
async fn default_repository_webhook_and_payload() {
    let store = RecordingStore::new(project());
    let opts = ImportOptions {
        default_branch: Some("develop".to_string()),
        ..repo_opts()
    };

    let outcome = parse_and_import(&store, &ProjectValidator, &project(), None, &bare_export("release"), &actor(), &opts)
        .await
        .expect("import");

    let w = &outcome.workflow;
    assert_eq!(repository_hooks(w).len(), 1);
    assert!(w.root.hooks[0].uuid.is_some());
    let payload = &w.root.context.default_payload;
    assert_eq!(payload.get(GIT_BRANCH).map(String::as_str), Some("develop"));
    assert_eq!(payload.get(GIT_REPOSITORY).map(String::as_str), Some("acme/api"));
    assert_eq!(w.from_repository.as_deref(), Some(REPO_URL));
    assert_eq!(w.derivation_branch, None);
}

#[tokio::test]
async fn plain_import_adds_no_hook() {
    let store = RecordingStore::new(project());
    let outcome = parse_and_import(
        &store,
        &ProjectValidator,
        &project(),
        None,
        &bare_export("release"),
        &actor(),
        &ImportOptions::default(),
    )
    .await
    .expect("import");

    assert!(outcome.workflow.root.hooks.is_empty());
    assert!(outcome.workflow.from_repository.is_none());
}
