//! Traits the engine uses to reach the collaborator store.
//!
//! Every write is a single-row statement; no port promises multi-row
//! transactions.

use super::ids::{PaymentId, PrincipalId, ProjectId, StageId, StageTemplateId, TaskId, TenantId};
use super::ordering::{OrderedItem, Placement};
use super::payment::{NewPayment, Payment, PaymentStatus};
use super::project::Project;
use super::subscription::RawBillingRecord;
use super::workflow::{NewStage, NewTask, Position, Stage, StageTemplate, Task, TaskTemplate};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Billing records pushed by the store, in delivery order.
pub type BillingFeed = mpsc::Receiver<RawBillingRecord>;

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// `None` when the principal has no tenant association.
    async fn resolve_tenant(&self, principal: &PrincipalId) -> Result<Option<TenantId>>;
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn fetch_billing_record(&self, tenant: TenantId) -> Result<Option<RawBillingRecord>>;
    async fn subscribe_to_billing_changes(&self, tenant: TenantId) -> Result<BillingFeed>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn fetch_workflow_template(&self, tenant: TenantId) -> Result<Vec<StageTemplate>>;
    async fn fetch_task_templates(&self, stage: StageTemplateId) -> Result<Vec<TaskTemplate>>;
    async fn create_stage(&self, project: ProjectId, stage: NewStage) -> Result<StageId>;
    async fn create_task(&self, stage: StageId, task: NewTask) -> Result<TaskId>;
    /// Removes a stage together with its tasks.
    async fn delete_stage(&self, stage: StageId) -> Result<()>;
    async fn fetch_stages(&self, project: ProjectId) -> Result<Vec<Stage>>;
    async fn fetch_tasks(&self, stage: StageId) -> Result<Vec<Task>>;
    /// Every item sharing `item`'s parent scope, `item` included.
    async fn sibling_positions(&self, item: OrderedItem) -> Result<Vec<Placement>>;
    async fn update_position(&self, item: OrderedItem, position: Position) -> Result<()>;
    /// The tenant owning `item`, through its project or template. `None`
    /// when the item does not exist.
    async fn item_tenant(&self, item: OrderedItem) -> Result<Option<TenantId>>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, tenant: TenantId, name: &str) -> Result<ProjectId>;
    async fn mark_project_ready(&self, project: ProjectId) -> Result<()>;
    async fn fetch_project(&self, project: ProjectId) -> Result<Option<Project>>;
    /// Removes a project together with its payments.
    async fn delete_project(&self, project: ProjectId) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn fetch_payments(&self, project: ProjectId) -> Result<Vec<Payment>>;
    async fn fetch_payment(&self, payment: PaymentId) -> Result<Option<Payment>>;
    async fn create_payment(&self, project: ProjectId, payment: NewPayment) -> Result<Payment>;
    async fn save_payment(&self, payment: Payment) -> Result<()>;
    /// Returns the removed payment, `None` if it did not exist.
    async fn delete_payment(&self, payment: PaymentId) -> Result<Option<Payment>>;
    async fn update_project_rollup_status(
        &self,
        project: ProjectId,
        status: PaymentStatus,
    ) -> Result<()>;
}

pub type TenantDirectoryRef = Arc<dyn TenantDirectory>;
pub type BillingStoreRef = Arc<dyn BillingStore>;
pub type WorkflowStoreRef = Arc<dyn WorkflowStore>;
pub type ProjectStoreRef = Arc<dyn ProjectStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
