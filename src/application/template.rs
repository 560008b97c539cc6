use crate::domain::ids::{ProjectId, StageId, TenantId};
use crate::domain::ports::WorkflowStoreRef;
use crate::domain::workflow::{NewStage, NewTask, StageTemplate, TemplateItemFailure, default_stages};
use crate::error::{EngineError, Result};
use serde::Deserialize;

/// What happens when a single stage or task cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePolicy {
    /// Log the failure and keep going with the remaining items.
    #[default]
    BestEffort,
    /// Remove everything created so far and fail the initialization.
    AllOrNothing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitializationReport {
    /// Created stages, in position order.
    pub stages: Vec<StageId>,
    pub tasks_created: usize,
    pub failures: Vec<TemplateItemFailure>,
    /// The tenant had no template and the built-in stages were used.
    pub used_default: bool,
}

impl InitializationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copies a tenant's workflow template onto a newly created project.
pub struct ProjectTemplateInitializer {
    store: WorkflowStoreRef,
    policy: TemplatePolicy,
}

impl ProjectTemplateInitializer {
    pub fn new(store: WorkflowStoreRef, policy: TemplatePolicy) -> Self {
        Self { store, policy }
    }

    /// Instantiates the tenant's stages and checklist items on `project`.
    ///
    /// Stages are created in template position order, each followed by its
    /// tasks (unchecked). A tenant without any template stage gets the
    /// three built-in stages. Run once, right after the project is created.
    ///
    /// # Errors
    ///
    /// Failing to read the stage template is always an error. Item creation
    /// failures only error under [`TemplatePolicy::AllOrNothing`].
    pub async fn initialize(
        &self,
        project: ProjectId,
        tenant: TenantId,
    ) -> Result<InitializationReport> {
        let mut templates = self.store.fetch_workflow_template(tenant).await?;
        templates.sort_by_key(|t| t.position);

        let mut report = InitializationReport::default();
        if templates.is_empty() {
            tracing::info!(%project, %tenant, "No workflow template, using default stages");
            report.used_default = true;
            for stage in default_stages() {
                self.create_stage(project, stage, &mut report).await?;
            }
        } else {
            for template in &templates {
                if let Some(stage) = self
                    .create_stage(project, NewStage::from(template), &mut report)
                    .await?
                {
                    self.copy_tasks(project, template, stage, &mut report)
                        .await?;
                }
            }
        }

        tracing::info!(
            %project,
            stages = report.stages.len(),
            tasks = report.tasks_created,
            failures = report.failures.len(),
            "Project workflow initialized"
        );
        Ok(report)
    }

    async fn create_stage(
        &self,
        project: ProjectId,
        stage: NewStage,
        report: &mut InitializationReport,
    ) -> Result<Option<StageId>> {
        let (name, position) = (stage.name.clone(), stage.position);
        match self.store.create_stage(project, stage).await {
            Ok(id) => {
                report.stages.push(id);
                Ok(Some(id))
            }
            Err(e) => {
                let failure = TemplateItemFailure::Stage {
                    name,
                    position,
                    error: e.to_string(),
                };
                self.record_failure(project, failure, report).await?;
                Ok(None)
            }
        }
    }

    async fn copy_tasks(
        &self,
        project: ProjectId,
        template: &StageTemplate,
        stage: StageId,
        report: &mut InitializationReport,
    ) -> Result<()> {
        let mut tasks = match self.store.fetch_task_templates(template.id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                let failure = TemplateItemFailure::TaskList {
                    stage: template.name.clone(),
                    error: e.to_string(),
                };
                return self.record_failure(project, failure, report).await;
            }
        };
        tasks.sort_by_key(|t| t.position);

        for task in &tasks {
            match self.store.create_task(stage, NewTask::from(task)).await {
                Ok(_) => report.tasks_created += 1,
                Err(e) => {
                    let failure = TemplateItemFailure::Task {
                        stage: template.name.clone(),
                        name: task.name.clone(),
                        position: task.position,
                        error: e.to_string(),
                    };
                    self.record_failure(project, failure, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        project: ProjectId,
        failure: TemplateItemFailure,
        report: &mut InitializationReport,
    ) -> Result<()> {
        tracing::warn!(%project, %failure, "Template item could not be created");
        report.failures.push(failure);

        match self.policy {
            TemplatePolicy::BestEffort => Ok(()),
            TemplatePolicy::AllOrNothing => {
                self.roll_back(project, &report.stages).await;
                Err(EngineError::TemplateInitialization {
                    project,
                    failures: std::mem::take(&mut report.failures),
                })
            }
        }
    }

    async fn roll_back(&self, project: ProjectId, stages: &[StageId]) {
        for stage in stages.iter().rev() {
            if let Err(e) = self.store.delete_stage(*stage).await {
                tracing::error!(%project, %stage, error = %e, "Rollback could not delete stage");
            }
        }
    }
}
