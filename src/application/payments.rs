use crate::domain::ids::{PaymentId, ProjectId};
use crate::domain::payment::{NewPayment, Payment, PaymentStatus, PaymentUpdate, rollup};
use crate::domain::ports::PaymentStoreRef;
use crate::error::{EngineError, Result};
use chrono::{NaiveDate, Utc};

/// Payment mutations, each followed by a fresh rollup of the project status.
///
/// The rollup is always recomputed from the full current payment set, so two
/// racing mutations may briefly persist a stale status; the next mutation
/// corrects it.
pub struct PaymentLedger {
    store: PaymentStoreRef,
}

impl PaymentLedger {
    pub fn new(store: PaymentStoreRef) -> Self {
        Self { store }
    }

    /// Stores a new payment on `project` and recomputes the rollup.
    ///
    /// # Arguments
    ///
    /// * `project` - The owning project.
    /// * `payment` - Amount, due date and initial status.
    ///
    /// # Returns
    ///
    /// The stored payment and the project's new rollup status.
    pub async fn add_payment(
        &self,
        project: ProjectId,
        payment: NewPayment,
    ) -> Result<(Payment, PaymentStatus)> {
        let payment = self.store.create_payment(project, payment).await?;
        let status = self.refresh_rollup(project).await?;
        Ok((payment, status))
    }

    /// Applies `update` to a stored payment and recomputes the rollup.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the payment does not exist.
    pub async fn update_payment(
        &self,
        id: PaymentId,
        update: PaymentUpdate,
    ) -> Result<(Payment, PaymentStatus)> {
        let mut payment = self
            .store
            .fetch_payment(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("payment {id}")))?;
        update.apply_to(&mut payment, Utc::now());
        self.store.save_payment(payment.clone()).await?;
        let status = self.refresh_rollup(payment.project).await?;
        Ok((payment, status))
    }

    /// Removes a payment and returns the owning project's new rollup.
    pub async fn delete_payment(&self, id: PaymentId) -> Result<PaymentStatus> {
        let removed = self
            .store
            .delete_payment(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("payment {id}")))?;
        self.refresh_rollup(removed.project).await
    }

    /// Fails with `NotFound` unless `id` belongs to `project`.
    pub async fn ensure_in_project(&self, project: ProjectId, id: PaymentId) -> Result<()> {
        match self.store.fetch_payment(id).await? {
            Some(payment) if payment.project == project => Ok(()),
            _ => Err(EngineError::NotFound(format!("payment {id}"))),
        }
    }

    /// Marks every unpaid payment due before `today` as `atrasado`.
    pub async fn sweep_overdue(
        &self,
        project: ProjectId,
        today: NaiveDate,
    ) -> Result<PaymentStatus> {
        let payments = self.store.fetch_payments(project).await?;
        for mut payment in payments
            .into_iter()
            .filter(|p| p.is_overdue(today) && p.status != PaymentStatus::Atrasado)
        {
            tracing::debug!(
                %project,
                payment = %payment.id,
                due = %payment.due_date,
                "Payment is overdue"
            );
            payment.status = PaymentStatus::Atrasado;
            self.store.save_payment(payment).await?;
        }
        self.refresh_rollup(project).await
    }

    /// Recomputes the project's payment status and persists it.
    pub async fn refresh_rollup(&self, project: ProjectId) -> Result<PaymentStatus> {
        let payments = self.store.fetch_payments(project).await?;
        let status = rollup(&payments);
        self.store
            .update_project_rollup_status(project, status)
            .await?;
        tracing::debug!(%project, payments = payments.len(), %status, "Payment rollup updated");
        Ok(status)
    }
}
