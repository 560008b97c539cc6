use crate::domain::ids::{
    PaymentId, PrincipalId, ProjectId, StageId, StageTemplateId, TaskId, TaskTemplateId, TenantId,
};
use crate::domain::ordering::{OrderedItem, Placement};
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::ports::{
    BillingFeed, BillingStore, PaymentStore, ProjectStore, TenantDirectory, WorkflowStore,
};
use crate::domain::project::Project;
use crate::domain::subscription::RawBillingRecord;
use crate::domain::workflow::{
    NewStage, NewTask, Position, Stage, StageTemplate, Task, TaskTemplate,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// Buffer size of each billing change feed.
pub const FEED_CAPACITY: usize = 32;

#[derive(Default)]
struct Tables {
    next_id: u64,
    principals: HashMap<PrincipalId, TenantId>,
    billing: HashMap<TenantId, RawBillingRecord>,
    feeds: HashMap<TenantId, Vec<mpsc::Sender<RawBillingRecord>>>,
    stage_templates: HashMap<StageTemplateId, (TenantId, StageTemplate)>,
    task_templates: HashMap<TaskTemplateId, TaskTemplate>,
    projects: HashMap<ProjectId, Project>,
    stages: HashMap<StageId, Stage>,
    tasks: HashMap<TaskId, Task>,
    payments: HashMap<PaymentId, Payment>,
}

/// A thread-safe in-memory stand-in for the collaborator store.
///
/// Implements every port over one shared set of tables. Like the hosted store
/// it enforces unique positions within each parent scope, so a write that
/// would create a duplicate position is rejected.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn siblings(&self, item: OrderedItem) -> Result<Vec<Placement>> {
        let placements = match item {
            OrderedItem::Stage(id) => {
                let project = self.stage(id)?.project;
                self.stages
                    .values()
                    .filter(|s| s.project == project)
                    .map(|s| Placement {
                        item: OrderedItem::Stage(s.id),
                        position: s.position,
                    })
                    .collect()
            }
            OrderedItem::Task(id) => {
                let stage = self.task(id)?.stage;
                self.tasks
                    .values()
                    .filter(|t| t.stage == stage)
                    .map(|t| Placement {
                        item: OrderedItem::Task(t.id),
                        position: t.position,
                    })
                    .collect()
            }
            OrderedItem::StageTemplate(id) => {
                let tenant = self.stage_template(id)?.0;
                self.stage_templates
                    .values()
                    .filter(|(owner, _)| *owner == tenant)
                    .map(|(_, s)| Placement {
                        item: OrderedItem::StageTemplate(s.id),
                        position: s.position,
                    })
                    .collect()
            }
            OrderedItem::TaskTemplate(id) => {
                let stage = self
                    .task_templates
                    .get(&id)
                    .ok_or_else(|| EngineError::NotFound(format!("task template {id}")))?
                    .stage;
                self.task_templates
                    .values()
                    .filter(|t| t.stage == stage)
                    .map(|t| Placement {
                        item: OrderedItem::TaskTemplate(t.id),
                        position: t.position,
                    })
                    .collect()
            }
        };
        Ok(placements)
    }

    fn stage(&self, id: StageId) -> Result<&Stage> {
        self.stages
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("stage {id}")))
    }

    fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("task {id}")))
    }

    fn stage_template(&self, id: StageTemplateId) -> Result<&(TenantId, StageTemplate)> {
        self.stage_templates
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("stage template {id}")))
    }
}

fn ensure_free<I>(mut positions: I, position: Position, scope: &str) -> Result<()>
where
    I: Iterator<Item = Position>,
{
    if positions.any(|p| p == position) {
        Err(EngineError::StoreError(format!(
            "unique constraint violated: position {position} already taken in {scope}"
        )))
    } else {
        Ok(())
    }
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn link_principal(&self, principal: PrincipalId, tenant: TenantId) {
        self.tables.write().await.principals.insert(principal, tenant);
    }

    /// Replaces the tenant's billing record and pushes it to every live feed.
    pub async fn set_billing_record(&self, tenant: TenantId, record: RawBillingRecord) {
        let senders = {
            let mut tables = self.tables.write().await;
            tables.billing.insert(tenant, record.clone());
            let feeds = tables.feeds.entry(tenant).or_default();
            feeds.retain(|tx| !tx.is_closed());
            feeds.clone()
        };
        for tx in senders {
            if tx.send(record.clone()).await.is_err() {
                tracing::debug!(%tenant, "Billing subscriber went away");
            }
        }
    }

    pub async fn add_stage_template(
        &self,
        tenant: TenantId,
        name: &str,
        position: Position,
    ) -> Result<StageTemplateId> {
        let mut tables = self.tables.write().await;
        ensure_free(
            tables
                .stage_templates
                .values()
                .filter(|(owner, _)| *owner == tenant)
                .map(|(_, s)| s.position),
            position,
            "stage templates",
        )?;
        let id = StageTemplateId(tables.next_id());
        let template = StageTemplate {
            id,
            name: name.to_string(),
            position,
        };
        tables.stage_templates.insert(id, (tenant, template));
        Ok(id)
    }

    pub async fn add_task_template(
        &self,
        stage: StageTemplateId,
        name: &str,
        position: Position,
        description: Option<&str>,
    ) -> Result<TaskTemplateId> {
        let mut tables = self.tables.write().await;
        tables.stage_template(stage)?;
        ensure_free(
            tables
                .task_templates
                .values()
                .filter(|t| t.stage == stage)
                .map(|t| t.position),
            position,
            "task templates",
        )?;
        let id = TaskTemplateId(tables.next_id());
        tables.task_templates.insert(
            id,
            TaskTemplate {
                id,
                stage,
                name: name.to_string(),
                position,
                description: description.map(str::to_owned),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryStore {
    async fn resolve_tenant(&self, principal: &PrincipalId) -> Result<Option<TenantId>> {
        Ok(self.tables.read().await.principals.get(principal).copied())
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn fetch_billing_record(&self, tenant: TenantId) -> Result<Option<RawBillingRecord>> {
        Ok(self.tables.read().await.billing.get(&tenant).cloned())
    }

    async fn subscribe_to_billing_changes(&self, tenant: TenantId) -> Result<BillingFeed> {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        self.tables
            .write()
            .await
            .feeds
            .entry(tenant)
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn fetch_workflow_template(&self, tenant: TenantId) -> Result<Vec<StageTemplate>> {
        let tables = self.tables.read().await;
        let mut stages: Vec<StageTemplate> = tables
            .stage_templates
            .values()
            .filter(|(owner, _)| *owner == tenant)
            .map(|(_, s)| s.clone())
            .collect();
        stages.sort_by_key(|s| s.position);
        Ok(stages)
    }

    async fn fetch_task_templates(&self, stage: StageTemplateId) -> Result<Vec<TaskTemplate>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<TaskTemplate> = tables
            .task_templates
            .values()
            .filter(|t| t.stage == stage)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn create_stage(&self, project: ProjectId, stage: NewStage) -> Result<StageId> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project) {
            return Err(EngineError::NotFound(format!("project {project}")));
        }
        ensure_free(
            tables
                .stages
                .values()
                .filter(|s| s.project == project)
                .map(|s| s.position),
            stage.position,
            "project stages",
        )?;
        let id = StageId(tables.next_id());
        tables.stages.insert(
            id,
            Stage {
                id,
                project,
                name: stage.name,
                position: stage.position,
            },
        );
        Ok(id)
    }

    async fn create_task(&self, stage: StageId, task: NewTask) -> Result<TaskId> {
        let mut tables = self.tables.write().await;
        tables.stage(stage)?;
        ensure_free(
            tables
                .tasks
                .values()
                .filter(|t| t.stage == stage)
                .map(|t| t.position),
            task.position,
            "stage tasks",
        )?;
        let id = TaskId(tables.next_id());
        tables.tasks.insert(
            id,
            Task {
                id,
                stage,
                name: task.name,
                position: task.position,
                description: task.description,
                is_done: false,
            },
        );
        Ok(id)
    }

    async fn delete_stage(&self, stage: StageId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.stages.remove(&stage);
        tables.tasks.retain(|_, t| t.stage != stage);
        Ok(())
    }

    async fn fetch_stages(&self, project: ProjectId) -> Result<Vec<Stage>> {
        let tables = self.tables.read().await;
        let mut stages: Vec<Stage> = tables
            .stages
            .values()
            .filter(|s| s.project == project)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.position);
        Ok(stages)
    }

    async fn fetch_tasks(&self, stage: StageId) -> Result<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| t.stage == stage)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn sibling_positions(&self, item: OrderedItem) -> Result<Vec<Placement>> {
        self.tables.read().await.siblings(item)
    }

    async fn update_position(&self, item: OrderedItem, position: Position) -> Result<()> {
        let mut tables = self.tables.write().await;
        let siblings = tables.siblings(item)?;
        ensure_free(
            siblings
                .iter()
                .filter(|p| p.item != item)
                .map(|p| p.position),
            position,
            "ordered list",
        )?;
        match item {
            OrderedItem::Stage(id) => {
                if let Some(stage) = tables.stages.get_mut(&id) {
                    stage.position = position;
                }
            }
            OrderedItem::Task(id) => {
                if let Some(task) = tables.tasks.get_mut(&id) {
                    task.position = position;
                }
            }
            OrderedItem::StageTemplate(id) => {
                if let Some((_, template)) = tables.stage_templates.get_mut(&id) {
                    template.position = position;
                }
            }
            OrderedItem::TaskTemplate(id) => {
                if let Some(template) = tables.task_templates.get_mut(&id) {
                    template.position = position;
                }
            }
        }
        Ok(())
    }

    async fn item_tenant(&self, item: OrderedItem) -> Result<Option<TenantId>> {
        let tables = self.tables.read().await;
        let stage_tenant = |stage: &Stage| tables.projects.get(&stage.project).map(|p| p.tenant);
        let tenant = match item {
            OrderedItem::Stage(id) => tables.stages.get(&id).and_then(stage_tenant),
            OrderedItem::Task(id) => tables
                .tasks
                .get(&id)
                .and_then(|t| tables.stages.get(&t.stage))
                .and_then(stage_tenant),
            OrderedItem::StageTemplate(id) => {
                tables.stage_templates.get(&id).map(|(owner, _)| *owner)
            }
            OrderedItem::TaskTemplate(id) => tables
                .task_templates
                .get(&id)
                .and_then(|t| tables.stage_templates.get(&t.stage))
                .map(|(owner, _)| *owner),
        };
        Ok(tenant)
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn create_project(&self, tenant: TenantId, name: &str) -> Result<ProjectId> {
        let mut tables = self.tables.write().await;
        let id = ProjectId(u32::try_from(tables.next_id()).map_err(|_| {
            EngineError::StoreError("project id space exhausted".to_string())
        })?);
        tables.projects.insert(id, Project::new(id, tenant, name));
        Ok(id)
    }

    async fn mark_project_ready(&self, project: ProjectId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .projects
            .get_mut(&project)
            .ok_or_else(|| EngineError::NotFound(format!("project {project}")))?;
        entry.ready = true;
        Ok(())
    }

    async fn fetch_project(&self, project: ProjectId) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&project).cloned())
    }

    async fn delete_project(&self, project: ProjectId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.projects.remove(&project);
        let stages: Vec<StageId> = tables
            .stages
            .values()
            .filter(|s| s.project == project)
            .map(|s| s.id)
            .collect();
        tables.tasks.retain(|_, t| !stages.contains(&t.stage));
        tables.stages.retain(|_, s| s.project != project);
        tables.payments.retain(|_, p| p.project != project);
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn fetch_payments(&self, project: ProjectId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.project == project)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.due_date, p.id));
        Ok(payments)
    }

    async fn fetch_payment(&self, payment: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&payment).cloned())
    }

    async fn create_payment(&self, project: ProjectId, payment: NewPayment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project) {
            return Err(EngineError::NotFound(format!("project {project}")));
        }
        let payment = Payment {
            id: PaymentId(tables.next_id()),
            project,
            amount: payment.amount,
            due_date: payment.due_date,
            status: payment.status,
            paid_at: payment.paid_at,
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn save_payment(&self, payment: Payment) -> Result<()> {
        self.tables
            .write()
            .await
            .payments
            .insert(payment.id, payment);
        Ok(())
    }

    async fn delete_payment(&self, payment: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.write().await.payments.remove(&payment))
    }

    async fn update_project_rollup_status(
        &self,
        project: ProjectId,
        status: PaymentStatus,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .projects
            .get_mut(&project)
            .ok_or_else(|| EngineError::NotFound(format!("project {project}")))?;
        entry.payment_status = status;
        Ok(())
    }
}
