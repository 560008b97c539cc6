mod common;

use common::FlakyWorkflow;
use std::collections::HashSet;
use std::sync::Arc;
use workspace_gate::application::reorder::Reorderer;
use workspace_gate::domain::ids::{ProjectId, StageId, TenantId};
use workspace_gate::domain::ordering::Direction;
use workspace_gate::domain::ports::{ProjectStore, WorkflowStore};
use workspace_gate::domain::workflow::{NewStage, NewTask};
use workspace_gate::error::EngineError;
use workspace_gate::infrastructure::in_memory::InMemoryStore;

async fn project_with_stages(store: &InMemoryStore, names: &[&str]) -> (ProjectId, Vec<StageId>) {
    let project = store.create_project(TenantId(1), "Bakery site").await.unwrap();
    let mut ids = Vec::new();
    for (name, position) in names.iter().zip(1..) {
        let stage = NewStage {
            name: (*name).to_string(),
            position,
        };
        ids.push(store.create_stage(project, stage).await.unwrap());
    }
    (project, ids)
}

async fn stage_names(store: &InMemoryStore, project: ProjectId) -> Vec<String> {
    store
        .fetch_stages(project)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect()
}

#[tokio::test]
async fn test_positions_stay_unique_at_every_step() {
    let store = InMemoryStore::new();
    let (project, stages) = project_with_stages(&store, &["Brief", "Design", "Build", "Launch"]).await;
    let flaky = Arc::new(FlakyWorkflow::new(store.clone()));
    let reorderer = Reorderer::new(flaky.clone());

    assert!(reorderer.move_stage(stages[1], Direction::Down).await.unwrap());

    let snapshots = flaky.snapshots();
    assert_eq!(snapshots.len(), 3);
    for positions in &snapshots {
        let unique: HashSet<_> = positions.iter().collect();
        assert_eq!(unique.len(), positions.len(), "duplicate in {positions:?}");
    }
    assert_eq!(snapshots.last().unwrap(), &vec![1, 2, 3, 4]);
    assert_eq!(stage_names(&store, project).await, ["Brief", "Build", "Design", "Launch"]);
}

#[tokio::test]
async fn test_failed_write_restores_original_order() {
    let store = InMemoryStore::new();
    let (project, stages) = project_with_stages(&store, &["Brief", "Design", "Build"]).await;
    let reorderer = Reorderer::new(Arc::new(
        FlakyWorkflow::new(store.clone()).fail_position_write(1),
    ));

    let result = reorderer.move_stage(stages[2], Direction::Up).await;

    assert!(matches!(result, Err(EngineError::StoreError(_))));
    assert_eq!(stage_names(&store, project).await, ["Brief", "Design", "Build"]);
    let positions: Vec<i32> = store
        .fetch_stages(project)
        .await
        .unwrap()
        .iter()
        .map(|s| s.position)
        .collect();
    assert_eq!(positions, [1, 2, 3]);
}

#[tokio::test]
async fn test_boundary_moves_are_no_ops() {
    let store = InMemoryStore::new();
    let (project, stages) = project_with_stages(&store, &["Brief", "Launch"]).await;
    let flaky = Arc::new(FlakyWorkflow::new(store.clone()));
    let reorderer = Reorderer::new(flaky.clone());

    assert!(!reorderer.move_stage(stages[0], Direction::Up).await.unwrap());
    assert!(!reorderer.move_stage(stages[1], Direction::Down).await.unwrap());

    assert!(flaky.snapshots().is_empty());
    assert_eq!(stage_names(&store, project).await, ["Brief", "Launch"]);
}

#[tokio::test]
async fn test_tasks_move_within_their_stage_only() {
    let store = InMemoryStore::new();
    let (_, stages) = project_with_stages(&store, &["Design", "Build"]).await;
    let mut design_tasks = Vec::new();
    for (name, position) in [("Moodboard", 1), ("Mockups", 2)] {
        let task = NewTask {
            name: name.to_string(),
            position,
            description: None,
        };
        design_tasks.push(store.create_task(stages[0], task).await.unwrap());
    }
    let other = NewTask {
        name: "Code".to_string(),
        position: 1,
        description: None,
    };
    store.create_task(stages[1], other).await.unwrap();
    let reorderer = Reorderer::new(Arc::new(store.clone()));

    assert!(reorderer.move_task(design_tasks[1], Direction::Up).await.unwrap());

    let names: Vec<String> = store
        .fetch_tasks(stages[0])
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["Mockups", "Moodboard"]);
    let build = store.fetch_tasks(stages[1]).await.unwrap();
    assert_eq!(build[0].position, 1);
}

#[tokio::test]
async fn test_stage_templates_reorder_per_tenant() {
    let store = InMemoryStore::new();
    let design = store.add_stage_template(TenantId(1), "Design", 1).await.unwrap();
    let launch = store.add_stage_template(TenantId(1), "Launch", 2).await.unwrap();
    store.add_stage_template(TenantId(2), "Intake", 1).await.unwrap();
    let reorderer = Reorderer::new(Arc::new(store.clone()));

    assert!(reorderer.move_stage_template(launch, Direction::Up).await.unwrap());

    let ordered: Vec<_> = store
        .fetch_workflow_template(TenantId(1))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ordered, [launch, design]);
    let other_tenant = store.fetch_workflow_template(TenantId(2)).await.unwrap();
    assert_eq!(other_tenant[0].position, 1);
}
