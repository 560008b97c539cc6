use crate::domain::ids::{PrincipalId, TenantId};
use crate::domain::ports::{BillingFeed, BillingStoreRef, TenantDirectoryRef};
use crate::domain::subscription::{RawBillingRecord, SubscriptionState};
use crate::error::{EngineError, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Where the signed-in tenant's subscription state currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionPhase {
    /// No billing record has been read yet.
    Loading,
    Ready {
        tenant: TenantId,
        state: SubscriptionState,
    },
    /// The principal has no tenant association. Terminal.
    NoTenant,
    /// The collaborator store failed before any state could be read.
    Unavailable(String),
}

/// Owns the current [`SubscriptionState`] of the signed-in tenant.
///
/// A background task resolves the tenant, subscribes to its billing feed,
/// reads the current record and then keeps replacing the published state with
/// the latest record delivered by the feed. Readers observe the phase through
/// a `watch` channel, so the only mutation is an atomic replacement of the
/// published value.
pub struct SubscriptionStore {
    principal: PrincipalId,
    phase: watch::Receiver<SubscriptionPhase>,
    task: JoinHandle<()>,
}

impl SubscriptionStore {
    /// Starts resolving the subscription of `principal`.
    ///
    /// Returns immediately in the `Loading` phase; the background task is
    /// aborted when the store is dropped. Must be called within a tokio
    /// runtime.
    ///
    /// # Arguments
    ///
    /// * `principal` - The signed-in identity.
    /// * `directory` - Resolves the principal's tenant.
    /// * `billing` - Source of the tenant's billing record and its changes.
    pub fn spawn(
        principal: PrincipalId,
        directory: TenantDirectoryRef,
        billing: BillingStoreRef,
    ) -> Self {
        let (tx, rx) = watch::channel(SubscriptionPhase::Loading);
        let task = tokio::spawn(track_subscription(
            principal.clone(),
            directory,
            billing,
            tx,
        ));
        Self {
            principal,
            phase: rx,
            task,
        }
    }

    pub fn phase(&self) -> SubscriptionPhase {
        self.phase.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.phase.borrow(), SubscriptionPhase::Ready { .. })
    }

    pub fn state(&self) -> Option<SubscriptionState> {
        match *self.phase.borrow() {
            SubscriptionPhase::Ready { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn tenant(&self) -> Option<TenantId> {
        match *self.phase.borrow() {
            SubscriptionPhase::Ready { tenant, .. } => Some(tenant),
            _ => None,
        }
    }

    /// A receiver that observes every phase change.
    pub fn watch(&self) -> watch::Receiver<SubscriptionPhase> {
        self.phase.clone()
    }

    /// Waits for the first state resolution.
    ///
    /// # Errors
    ///
    /// [`EngineError::TenantNotAssociated`] when the principal has no tenant,
    /// [`EngineError::StoreError`] when the store failed during resolution.
    pub async fn initialized(&self) -> Result<SubscriptionState> {
        let mut rx = self.phase.clone();
        let phase = rx
            .wait_for(|phase| !matches!(phase, SubscriptionPhase::Loading))
            .await
            .map_err(|_| EngineError::StoreError("subscription tracking stopped".to_string()))?
            .clone();

        match phase {
            SubscriptionPhase::Ready { state, .. } => Ok(state),
            SubscriptionPhase::NoTenant => Err(EngineError::TenantNotAssociated {
                principal: self.principal.to_string(),
            }),
            SubscriptionPhase::Unavailable(reason) => Err(EngineError::StoreError(reason)),
            SubscriptionPhase::Loading => Err(EngineError::StoreError(
                "subscription state still loading".to_string(),
            )),
        }
    }
}

impl Drop for SubscriptionStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn track_subscription(
    principal: PrincipalId,
    directory: TenantDirectoryRef,
    billing: BillingStoreRef,
    phase: watch::Sender<SubscriptionPhase>,
) {
    let tenant = match directory.resolve_tenant(&principal).await {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            tracing::warn!(%principal, "Principal has no tenant association");
            phase.send_replace(SubscriptionPhase::NoTenant);
            return;
        }
        Err(e) => {
            tracing::error!(%principal, error = %e, "Tenant lookup failed");
            phase.send_replace(SubscriptionPhase::Unavailable(e.to_string()));
            return;
        }
    };

    // Subscribe before the initial read so no change can fall in between.
    let feed = match billing.subscribe_to_billing_changes(tenant).await {
        Ok(feed) => feed,
        Err(e) => {
            tracing::error!(%tenant, error = %e, "Billing subscription failed");
            phase.send_replace(SubscriptionPhase::Unavailable(e.to_string()));
            return;
        }
    };

    match billing.fetch_billing_record(tenant).await {
        Ok(record) => publish(&phase, tenant, &record.unwrap_or_default()),
        Err(e) => {
            // A later feed event can still make the store ready.
            tracing::error!(%tenant, error = %e, "Initial billing fetch failed");
            phase.send_replace(SubscriptionPhase::Unavailable(e.to_string()));
        }
    }

    follow_feed(feed, &phase, tenant).await;
}

async fn follow_feed(
    mut feed: BillingFeed,
    phase: &watch::Sender<SubscriptionPhase>,
    tenant: TenantId,
) {
    while let Some(mut latest) = feed.recv().await {
        let mut skipped = 0usize;
        while let Ok(next) = feed.try_recv() {
            latest = next;
            skipped += 1;
        }
        if skipped > 0 {
            tracing::debug!(%tenant, skipped, "Coalesced queued billing updates");
        }
        publish(phase, tenant, &latest);
    }
    tracing::debug!(%tenant, "Billing feed closed");
}

fn publish(phase: &watch::Sender<SubscriptionPhase>, tenant: TenantId, raw: &RawBillingRecord) {
    let state = SubscriptionState::normalize(raw);
    tracing::debug!(
        %tenant,
        plan = ?state.plan,
        provider_status = ?state.provider_status,
        "Subscription state updated"
    );
    phase.send_replace(SubscriptionPhase::Ready { tenant, state });
}
