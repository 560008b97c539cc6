//! CRUD gating policy and the denial values handed back to callers.

use super::subscription::{Plan, ProviderStatus, SubscriptionState};
use serde::Serialize;
use std::fmt;

/// Decides whether mutating operations are allowed under `state`.
///
/// `true` iff the tenant is on the paid plan and the provider reports the
/// subscription as active. There is no grace period: `paid` + `past_due` is
/// denied. Callers must evaluate again after every state change instead of
/// holding on to a previous answer.
pub fn evaluate(state: &SubscriptionState) -> bool {
    state.plan == Plan::Paid && state.provider_status == ProviderStatus::Active
}

/// What the UI should tell the user about a policy denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialNotice {
    UpgradeRequired,
    PaymentPastDue,
    SubscriptionEnded,
    CheckoutIncomplete,
}

/// Maps a denied state to a notice. `None` when [`evaluate`] allows access.
pub fn denial_notice(state: &SubscriptionState) -> Option<DenialNotice> {
    if evaluate(state) {
        return None;
    }
    let notice = match (state.plan, state.provider_status) {
        (Plan::Free, _) => DenialNotice::UpgradeRequired,
        (Plan::Paid, ProviderStatus::PastDue) => DenialNotice::PaymentPastDue,
        (Plan::Paid, ProviderStatus::Canceled | ProviderStatus::Expired) => {
            DenialNotice::SubscriptionEnded
        }
        (Plan::Paid, ProviderStatus::Incomplete | ProviderStatus::Active) => {
            DenialNotice::CheckoutIncomplete
        }
    };
    Some(notice)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The policy evaluated to `false`.
    Policy,
    /// The subscription state could not be resolved in time.
    Unresolved,
    /// The signed-in principal has no tenant.
    NoTenant,
}

impl DenialReason {
    /// System errors warrant a "retry" message rather than an upgrade prompt.
    pub fn is_system_error(&self) -> bool {
        !matches!(self, DenialReason::Policy)
    }
}

/// A refused guarded operation. The operation was never invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub reason: DenialReason,
    /// Identifier of the feature the caller tried to use, for UI messaging.
    pub feature: Option<String>,
    pub notice: Option<DenialNotice>,
}

impl Denial {
    pub fn policy(feature: Option<&str>, state: &SubscriptionState) -> Self {
        Self {
            reason: DenialReason::Policy,
            feature: feature.map(str::to_owned),
            notice: denial_notice(state),
        }
    }

    pub fn system(reason: DenialReason, feature: Option<&str>) -> Self {
        Self {
            reason,
            feature: feature.map(str::to_owned),
            notice: None,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            DenialReason::Policy => "subscription does not allow changes",
            DenialReason::Unresolved => "subscription state unresolved",
            DenialReason::NoTenant => "no tenant associated",
        };
        match &self.feature {
            Some(feature) => write!(f, "{reason} (feature: {feature})"),
            None => f.write_str(reason),
        }
    }
}
