mod common;

use common::FlakyWorkflow;
use std::sync::Arc;
use workspace_gate::application::engine::{EngineStores, WorkspaceEngine};
use workspace_gate::application::template::{ProjectTemplateInitializer, TemplatePolicy};
use workspace_gate::config::EngineConfig;
use workspace_gate::domain::ids::{PrincipalId, ProjectId, TenantId};
use workspace_gate::domain::ports::{ProjectStore, WorkflowStore};
use workspace_gate::domain::subscription::RawBillingRecord;
use workspace_gate::domain::workflow::TemplateItemFailure;
use workspace_gate::error::EngineError;
use workspace_gate::infrastructure::in_memory::InMemoryStore;

const TENANT: TenantId = TenantId(7);

/// "Design" with three checklist items and "Launch" with one.
async fn agency_template(store: &InMemoryStore) {
    let design = store.add_stage_template(TENANT, "Design", 1).await.unwrap();
    let launch = store.add_stage_template(TENANT, "Launch", 2).await.unwrap();
    for (name, position) in [("Moodboard", 1), ("Mockups", 2), ("Approval", 3)] {
        store
            .add_task_template(design, name, position, None)
            .await
            .unwrap();
    }
    store
        .add_task_template(launch, "Go live", 1, Some("DNS and SSL"))
        .await
        .unwrap();
}

async fn new_project(store: &InMemoryStore) -> ProjectId {
    store.create_project(TENANT, "Bakery site").await.unwrap()
}

#[tokio::test]
async fn test_two_stage_template_yields_four_unchecked_tasks() {
    let store = InMemoryStore::new();
    agency_template(&store).await;
    let project = new_project(&store).await;

    let initializer =
        ProjectTemplateInitializer::new(Arc::new(store.clone()), TemplatePolicy::BestEffort);
    let report = initializer.initialize(project, TENANT).await.unwrap();

    assert!(report.is_complete());
    assert!(!report.used_default);
    assert_eq!(report.tasks_created, 4);

    let stages = store.fetch_stages(project).await.unwrap();
    let stage_names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(stage_names, ["Design", "Launch"]);

    let design = store.fetch_tasks(stages[0].id).await.unwrap();
    let names: Vec<&str> = design.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["Moodboard", "Mockups", "Approval"]);

    let launch = store.fetch_tasks(stages[1].id).await.unwrap();
    assert_eq!(launch.len(), 1);
    assert_eq!(launch[0].description.as_deref(), Some("DNS and SSL"));

    assert!(design.iter().chain(&launch).all(|t| !t.is_done));
}

#[tokio::test]
async fn test_best_effort_skips_failed_items() {
    let store = InMemoryStore::new();
    agency_template(&store).await;
    let project = new_project(&store).await;
    let flaky = FlakyWorkflow::new(store.clone()).fail_on("Mockups");

    let initializer = ProjectTemplateInitializer::new(Arc::new(flaky), TemplatePolicy::BestEffort);
    let report = initializer.initialize(project, TENANT).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.tasks_created, 3);
    assert!(matches!(
        &report.failures[..],
        [TemplateItemFailure::Task { name, .. }] if name == "Mockups"
    ));

    let stages = store.fetch_stages(project).await.unwrap();
    let design = store.fetch_tasks(stages[0].id).await.unwrap();
    let names: Vec<&str> = design.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["Moodboard", "Approval"]);
}

#[tokio::test]
async fn test_best_effort_failed_stage_skips_its_tasks() {
    let store = InMemoryStore::new();
    agency_template(&store).await;
    let project = new_project(&store).await;
    let flaky = FlakyWorkflow::new(store.clone()).fail_on("Design");

    let initializer = ProjectTemplateInitializer::new(Arc::new(flaky), TemplatePolicy::BestEffort);
    let report = initializer.initialize(project, TENANT).await.unwrap();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.tasks_created, 1);
    let stages = store.fetch_stages(project).await.unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].name, "Launch");
}

#[tokio::test]
async fn test_all_or_nothing_rolls_back() {
    let store = InMemoryStore::new();
    agency_template(&store).await;
    let project = new_project(&store).await;
    let flaky = FlakyWorkflow::new(store.clone()).fail_on("Go live");

    let initializer =
        ProjectTemplateInitializer::new(Arc::new(flaky), TemplatePolicy::AllOrNothing);
    let result = initializer.initialize(project, TENANT).await;

    match result {
        Err(EngineError::TemplateInitialization { project: failed, failures }) => {
            assert_eq!(failed, project);
            assert_eq!(failures.len(), 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(store.fetch_stages(project).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_initialization_discards_project() {
    let store = InMemoryStore::new();
    agency_template(&store).await;
    let principal = PrincipalId::new("owner@bakery.example");
    store.link_principal(principal.clone(), TENANT).await;
    store
        .set_billing_record(TENANT, RawBillingRecord::new("paid", Some("monthly"), "active"))
        .await;

    let stores = EngineStores {
        workflow: Arc::new(FlakyWorkflow::new(store.clone()).fail_on("Approval")),
        ..EngineStores::shared(store.clone())
    };
    let config: EngineConfig =
        serde_json::from_str(r#"{ "template_policy": "all_or_nothing" }"#).unwrap();
    let engine = WorkspaceEngine::start(principal, stores, &config);
    engine.subscriptions().initialized().await.unwrap();

    let failed = match engine.create_project("Bakery site").await {
        Err(EngineError::TemplateInitialization { project, .. }) => project,
        other => panic!("unexpected result: {other:?}"),
    };

    assert!(store.fetch_project(failed).await.unwrap().is_none());
    assert!(store.fetch_stages(failed).await.unwrap().is_empty());
}
