//! Gate in front of every mutating operation.

use super::subscription_store::{SubscriptionPhase, SubscriptionStore};
use crate::domain::access::{self, Denial, DenialReason};
use crate::domain::subscription::SubscriptionState;
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;

/// Bounds the wait for the subscription state to become known.
///
/// The delay between readiness checks grows exponentially from
/// `initial_delay_ms` and is capped at `max_delay_ms`. After `max_attempts`
/// waits the guard gives up and denies with [`DenialReason::Unresolved`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 50,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl GuardPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Upper bound on the total readiness wait.
    pub fn max_wait(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for_attempt(a)).sum()
    }
}

/// Outcome of a guarded call.
#[derive(Debug, PartialEq)]
pub enum Guarded<T> {
    /// The operation ran; this is whatever it returned.
    Allowed(T),
    /// The operation was not invoked.
    Denied(Denial),
}

impl<T> Guarded<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Guarded::Allowed(_))
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Guarded::Allowed(_) => None,
            Guarded::Denied(denial) => Some(denial),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Guarded::Allowed(value) => Ok(value),
            Guarded::Denied(denial) => Err(EngineError::AccessDenied(denial)),
        }
    }
}

impl<T> Guarded<Result<T>> {
    /// Merges a denial and the operation's own error into one `Result`.
    pub fn flatten(self) -> Result<T> {
        self.into_result().and_then(|inner| inner)
    }
}

enum Readiness {
    Ready(SubscriptionState),
    Pending,
    Failed(DenialReason),
}

fn readiness(phase: &SubscriptionPhase) -> Readiness {
    match phase {
        SubscriptionPhase::Ready { state, .. } => Readiness::Ready(*state),
        SubscriptionPhase::Loading => Readiness::Pending,
        SubscriptionPhase::NoTenant => Readiness::Failed(DenialReason::NoTenant),
        SubscriptionPhase::Unavailable(_) => Readiness::Failed(DenialReason::Unresolved),
    }
}

/// Runs operations only while the tenant's subscription allows changes.
#[derive(Clone)]
pub struct CrudGuard {
    phase: watch::Receiver<SubscriptionPhase>,
    policy: GuardPolicy,
}

impl CrudGuard {
    pub fn new(phase: watch::Receiver<SubscriptionPhase>, policy: GuardPolicy) -> Self {
        Self { phase, policy }
    }

    pub fn for_store(store: &SubscriptionStore, policy: GuardPolicy) -> Self {
        Self::new(store.watch(), policy)
    }

    /// Current decision without waiting. `false` while loading.
    pub fn allows_now(&self) -> bool {
        match readiness(&self.phase.borrow()) {
            Readiness::Ready(state) => access::evaluate(&state),
            Readiness::Pending | Readiness::Failed(_) => false,
        }
    }

    /// Waits until the subscription state is known, evaluates the access
    /// policy against the freshest state, and invokes `operation` only if it
    /// allows changes.
    ///
    /// `operation` runs at most once and never on denial. Whatever it returns,
    /// errors included, is handed back untouched inside [`Guarded::Allowed`].
    /// `feature` is carried on the denial for UI messaging.
    pub async fn execute_guarded<F, Fut, T>(
        &self,
        feature: Option<&str>,
        operation: F,
    ) -> Guarded<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let state = match self.await_ready().await {
            Ok(state) => state,
            Err(reason) => {
                tracing::warn!(?reason, feature, "Guarded operation denied by system state");
                return Guarded::Denied(Denial::system(reason, feature));
            }
        };

        if !access::evaluate(&state) {
            tracing::info!(
                feature,
                plan = ?state.plan,
                provider_status = ?state.provider_status,
                "Guarded operation denied by subscription policy"
            );
            return Guarded::Denied(Denial::policy(feature, &state));
        }

        Guarded::Allowed(operation().await)
    }

    async fn await_ready(&self) -> std::result::Result<SubscriptionState, DenialReason> {
        let mut phase = self.phase.clone();

        for attempt in 0..self.policy.max_attempts {
            let current = readiness(&phase.borrow_and_update());
            match current {
                Readiness::Ready(state) => return Ok(state),
                Readiness::Failed(reason) => return Err(reason),
                Readiness::Pending => {}
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tracing::debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis(),
                "Subscription not ready, waiting"
            );
            // Wakes early on a phase change; a closed channel leaves the last value.
            if let Ok(Err(_)) = tokio::time::timeout(delay, phase.changed()).await {
                break;
            }
        }

        let last = readiness(&phase.borrow());
        match last {
            Readiness::Ready(state) => Ok(state),
            Readiness::Failed(reason) => Err(reason),
            Readiness::Pending => Err(DenialReason::Unresolved),
        }
    }
}
