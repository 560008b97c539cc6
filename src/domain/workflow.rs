use super::ids::{ProjectId, StageId, StageTemplateId, TaskId, TaskTemplateId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based position of an item within its parent list.
pub type Position = i32;

/// Stages created when a tenant has no workflow template of its own.
pub const DEFAULT_STAGES: [&str; 3] = ["To do", "In progress", "Done"];

/// A tenant-level stage definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub id: StageTemplateId,
    pub name: String,
    pub position: Position,
}

/// A checklist item definition belonging to a [`StageTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: TaskTemplateId,
    pub stage: StageTemplateId,
    pub name: String,
    pub position: Position,
    pub description: Option<String>,
}

/// A stage of a project's own workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub project: ProjectId,
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub stage: StageId,
    pub name: String,
    pub position: Position,
    pub description: Option<String>,
    pub is_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStage {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub position: Position,
    pub description: Option<String>,
}

impl From<&StageTemplate> for NewStage {
    fn from(template: &StageTemplate) -> Self {
        Self {
            name: template.name.clone(),
            position: template.position,
        }
    }
}

impl From<&TaskTemplate> for NewTask {
    fn from(template: &TaskTemplate) -> Self {
        Self {
            name: template.name.clone(),
            position: template.position,
            description: template.description.clone(),
        }
    }
}

/// The fallback template used for tenants without stage templates.
///
/// Returns [`DEFAULT_STAGES`] as new stages at positions 1..=3, in order.
pub fn default_stages() -> Vec<NewStage> {
    DEFAULT_STAGES
        .iter()
        .zip(1..)
        .map(|(name, position)| NewStage {
            name: (*name).to_string(),
            position,
        })
        .collect()
}

/// A template item that could not be copied onto a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateItemFailure {
    Stage {
        name: String,
        position: Position,
        error: String,
    },
    Task {
        stage: String,
        name: String,
        position: Position,
        error: String,
    },
    /// The checklist of a template stage could not be read.
    TaskList { stage: String, error: String },
}

impl fmt::Display for TemplateItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateItemFailure::Stage {
                name,
                position,
                error,
            } => write!(f, "stage '{name}' (#{position}): {error}"),
            TemplateItemFailure::Task {
                stage,
                name,
                position,
                error,
            } => write!(f, "task '{name}' (#{position}) in stage '{stage}': {error}"),
            TemplateItemFailure::TaskList { stage, error } => {
                write!(f, "tasks of stage '{stage}': {error}")
            }
        }
    }
}
