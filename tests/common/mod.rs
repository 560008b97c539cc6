#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use workspace_gate::domain::ids::{ProjectId, StageId, StageTemplateId, TaskId, TenantId};
use workspace_gate::domain::ordering::{OrderedItem, Placement};
use workspace_gate::domain::ports::WorkflowStore;
use workspace_gate::domain::workflow::{
    NewStage, NewTask, Position, Stage, StageTemplate, Task, TaskTemplate,
};
use workspace_gate::error::{EngineError, Result};
use workspace_gate::infrastructure::in_memory::InMemoryStore;

/// Writes a payments CSV with one row per `(project, amount, due_date, status, paid_at)`.
pub fn write_payments_csv(path: &Path, rows: &[[&str; 5]]) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["project", "amount", "due_date", "status", "paid_at"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Workflow store that fails chosen writes and records the positions of a
/// list after every position update.
pub struct FlakyWorkflow {
    inner: InMemoryStore,
    failing_names: Mutex<HashSet<String>>,
    failing_write: Mutex<Option<usize>>,
    position_writes: AtomicUsize,
    snapshots: Mutex<Vec<Vec<Position>>>,
}

impl FlakyWorkflow {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            failing_names: Mutex::new(HashSet::new()),
            failing_write: Mutex::new(None),
            position_writes: AtomicUsize::new(0),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    /// Creating a stage or task with this name fails.
    pub fn fail_on(self, name: &str) -> Self {
        self.failing_names.lock().unwrap().insert(name.to_string());
        self
    }

    /// The `n`th position update (0-based) fails.
    pub fn fail_position_write(self, n: usize) -> Self {
        *self.failing_write.lock().unwrap() = Some(n);
        self
    }

    pub fn snapshots(&self) -> Vec<Vec<Position>> {
        self.snapshots.lock().unwrap().clone()
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.failing_names.lock().unwrap().contains(name) {
            return Err(EngineError::StoreError(format!("injected failure for '{name}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for FlakyWorkflow {
    async fn fetch_workflow_template(&self, tenant: TenantId) -> Result<Vec<StageTemplate>> {
        self.inner.fetch_workflow_template(tenant).await
    }

    async fn fetch_task_templates(&self, stage: StageTemplateId) -> Result<Vec<TaskTemplate>> {
        self.inner.fetch_task_templates(stage).await
    }

    async fn create_stage(&self, project: ProjectId, stage: NewStage) -> Result<StageId> {
        self.check_name(&stage.name)?;
        self.inner.create_stage(project, stage).await
    }

    async fn create_task(&self, stage: StageId, task: NewTask) -> Result<TaskId> {
        self.check_name(&task.name)?;
        self.inner.create_task(stage, task).await
    }

    async fn delete_stage(&self, stage: StageId) -> Result<()> {
        self.inner.delete_stage(stage).await
    }

    async fn fetch_stages(&self, project: ProjectId) -> Result<Vec<Stage>> {
        self.inner.fetch_stages(project).await
    }

    async fn fetch_tasks(&self, stage: StageId) -> Result<Vec<Task>> {
        self.inner.fetch_tasks(stage).await
    }

    async fn sibling_positions(&self, item: OrderedItem) -> Result<Vec<Placement>> {
        self.inner.sibling_positions(item).await
    }

    async fn item_tenant(&self, item: OrderedItem) -> Result<Option<TenantId>> {
        self.inner.item_tenant(item).await
    }

    async fn update_position(&self, item: OrderedItem, position: Position) -> Result<()> {
        let n = self.position_writes.fetch_add(1, Ordering::SeqCst);
        if *self.failing_write.lock().unwrap() == Some(n) {
            return Err(EngineError::StoreError(format!("injected failure on write {n}")));
        }
        self.inner.update_position(item, position).await?;

        let mut positions: Vec<Position> = self
            .inner
            .sibling_positions(item)
            .await?
            .into_iter()
            .map(|p| p.position)
            .collect();
        positions.sort();
        self.snapshots.lock().unwrap().push(positions);
        Ok(())
    }
}
