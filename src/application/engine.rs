use super::guard::CrudGuard;
use super::payments::PaymentLedger;
use super::reorder::Reorderer;
use super::subscription_store::SubscriptionStore;
use super::template::{InitializationReport, ProjectTemplateInitializer};
use crate::config::EngineConfig;
use crate::domain::ids::{PaymentId, PrincipalId, ProjectId};
use crate::domain::ordering::{Direction, OrderedItem};
use crate::domain::payment::{NewPayment, Payment, PaymentStatus, PaymentUpdate};
use crate::domain::ports::{
    BillingStore, BillingStoreRef, PaymentStore, PaymentStoreRef, ProjectStore, ProjectStoreRef,
    TenantDirectory, TenantDirectoryRef, WorkflowStore, WorkflowStoreRef,
};
use crate::error::{EngineError, Result};
use chrono::NaiveDate;
use std::sync::Arc;

pub const FEATURE_PROJECTS: &str = "projects";
pub const FEATURE_PAYMENTS: &str = "payments";
pub const FEATURE_WORKFLOW: &str = "workflow";

/// Handles to each port of the collaborator store.
#[derive(Clone)]
pub struct EngineStores {
    pub directory: TenantDirectoryRef,
    pub billing: BillingStoreRef,
    pub workflow: WorkflowStoreRef,
    pub projects: ProjectStoreRef,
    pub payments: PaymentStoreRef,
}

impl EngineStores {
    /// Uses one store for every port.
    pub fn shared<S>(store: S) -> Self
    where
        S: TenantDirectory + BillingStore + WorkflowStore + ProjectStore + PaymentStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            directory: store.clone(),
            billing: store.clone(),
            workflow: store.clone(),
            projects: store.clone(),
            payments: store,
        }
    }
}

/// Entry point for the signed-in tenant's mutations.
///
/// Every mutation passes through the [`CrudGuard`]; payment mutations are
/// followed by a rollup, and project creation by template initialization.
pub struct WorkspaceEngine {
    subscriptions: SubscriptionStore,
    guard: CrudGuard,
    projects: ProjectStoreRef,
    workflow: WorkflowStoreRef,
    initializer: ProjectTemplateInitializer,
    ledger: PaymentLedger,
    reorderer: Reorderer,
}

impl WorkspaceEngine {
    /// Starts tracking `principal`'s subscription and wires the services.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `principal` - The signed-in identity whose tenant is gated.
    /// * `stores` - Handles to the collaborator store ports.
    /// * `config` - Guard timing and template failure policy.
    pub fn start(principal: PrincipalId, stores: EngineStores, config: &EngineConfig) -> Self {
        let subscriptions = SubscriptionStore::spawn(principal, stores.directory, stores.billing);
        let guard = CrudGuard::for_store(&subscriptions, config.guard.clone());
        Self {
            subscriptions,
            guard,
            projects: stores.projects,
            workflow: stores.workflow.clone(),
            initializer: ProjectTemplateInitializer::new(
                stores.workflow.clone(),
                config.template_policy,
            ),
            ledger: PaymentLedger::new(stores.payments),
            reorderer: Reorderer::new(stores.workflow),
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionStore {
        &self.subscriptions
    }

    pub fn guard(&self) -> &CrudGuard {
        &self.guard
    }

    /// Creates a project and copies the tenant's workflow onto it.
    ///
    /// The project is marked ready only after initialization succeeded. If
    /// initialization fails (strict template policy, or an unreadable stage
    /// template) the project row is deleted again before the error is
    /// returned, so no half-built project is left behind.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name of the new project.
    ///
    /// # Errors
    ///
    /// [`EngineError::AccessDenied`] when the guard refuses, otherwise the
    /// store or template error that stopped the creation.
    pub async fn create_project(&self, name: &str) -> Result<(ProjectId, InitializationReport)> {
        self.guard
            .execute_guarded(Some(FEATURE_PROJECTS), || async {
                let tenant = self.subscriptions.tenant().ok_or_else(|| {
                    EngineError::StoreError("tenant no longer resolved".to_string())
                })?;
                let project = self.projects.create_project(tenant, name).await?;
                let report = match self.initializer.initialize(project, tenant).await {
                    Ok(report) => report,
                    Err(e) => {
                        self.discard_project(project).await;
                        return Err(e);
                    }
                };
                self.projects.mark_project_ready(project).await?;
                tracing::info!(%tenant, %project, "Project created");
                Ok((project, report))
            })
            .await
            .flatten()
    }

    pub async fn add_payment(
        &self,
        project: ProjectId,
        payment: NewPayment,
    ) -> Result<(Payment, PaymentStatus)> {
        self.guard
            .execute_guarded(Some(FEATURE_PAYMENTS), || async {
                self.ensure_owned(project).await?;
                self.ledger.add_payment(project, payment).await
            })
            .await
            .flatten()
    }

    pub async fn update_payment(
        &self,
        project: ProjectId,
        payment: PaymentId,
        update: PaymentUpdate,
    ) -> Result<(Payment, PaymentStatus)> {
        self.guard
            .execute_guarded(Some(FEATURE_PAYMENTS), || async {
                self.ensure_owned(project).await?;
                self.ledger.ensure_in_project(project, payment).await?;
                self.ledger.update_payment(payment, update).await
            })
            .await
            .flatten()
    }

    pub async fn delete_payment(
        &self,
        project: ProjectId,
        payment: PaymentId,
    ) -> Result<PaymentStatus> {
        self.guard
            .execute_guarded(Some(FEATURE_PAYMENTS), || async {
                self.ensure_owned(project).await?;
                self.ledger.ensure_in_project(project, payment).await?;
                self.ledger.delete_payment(payment).await
            })
            .await
            .flatten()
    }

    pub async fn sweep_overdue(
        &self,
        project: ProjectId,
        today: NaiveDate,
    ) -> Result<PaymentStatus> {
        self.guard
            .execute_guarded(Some(FEATURE_PAYMENTS), || async {
                self.ensure_owned(project).await?;
                self.ledger.sweep_overdue(project, today).await
            })
            .await
            .flatten()
    }

    /// Moves a stage, task or template item one slot in `direction`.
    ///
    /// Items belonging to another tenant are reported as
    /// [`EngineError::NotFound`] and left untouched.
    pub async fn move_item(&self, item: OrderedItem, direction: Direction) -> Result<bool> {
        self.guard
            .execute_guarded(Some(FEATURE_WORKFLOW), || async {
                self.ensure_item_owned(item).await?;
                self.reorderer.move_item(item, direction).await
            })
            .await
            .flatten()
    }

    async fn discard_project(&self, project: ProjectId) {
        if let Err(e) = self.projects.delete_project(project).await {
            tracing::error!(%project, error = %e, "Could not delete failed project");
        }
    }

    async fn ensure_owned(&self, project: ProjectId) -> Result<()> {
        let tenant = self.subscriptions.tenant();
        match self.projects.fetch_project(project).await? {
            Some(found) if Some(found.tenant) == tenant => Ok(()),
            _ => Err(EngineError::NotFound(format!("project {project}"))),
        }
    }

    async fn ensure_item_owned(&self, item: OrderedItem) -> Result<()> {
        let tenant = self.subscriptions.tenant();
        match self.workflow.item_tenant(item).await? {
            Some(owner) if Some(owner) == tenant => Ok(()),
            _ => Err(EngineError::NotFound(format!("{item:?}"))),
        }
    }
}
