use crate::domain::access::Denial;
use crate::domain::ids::ProjectId;
use crate::domain::workflow::TemplateItemFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Principal {principal} is not associated with any tenant")]
    TenantNotAssociated { principal: String },
    #[error("Operation denied: {0}")]
    AccessDenied(Denial),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Template initialization of project {project} failed: {} item(s)", failures.len())]
    TemplateInitialization {
        project: ProjectId,
        failures: Vec<TemplateItemFailure>,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
