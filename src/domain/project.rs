use super::ids::{ProjectId, TenantId};
use super::payment::PaymentStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub tenant: TenantId,
    pub name: String,
    /// Set once the workflow has been initialized from the tenant template.
    pub ready: bool,
    /// Derived from the project's payments; never edited by hand.
    pub payment_status: PaymentStatus,
}

impl Project {
    pub fn new(id: ProjectId, tenant: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            name: name.into(),
            ready: false,
            payment_status: PaymentStatus::Pendente,
        }
    }
}
