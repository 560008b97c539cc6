use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Annual,
}

/// The payment processor's view of subscription health, distinct from [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    #[default]
    Incomplete,
    Active,
    PastDue,
    Canceled,
    Expired,
}

impl Plan {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl BillingInterval {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(Self::Monthly),
            "annual" => Some(Self::Annual),
            _ => None,
        }
    }
}

impl ProviderStatus {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "incomplete" => Some(Self::Incomplete),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A tenant's billing fields exactly as the collaborator store hands them over.
///
/// The record is owned by an external billing integration, so every field is
/// kept as a raw JSON value: missing, null, wrongly typed or unknown values are
/// all representable and are only interpreted by [`SubscriptionState::normalize`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBillingRecord {
    #[serde(alias = "subscription_plan")]
    pub plan: Value,
    #[serde(alias = "billingInterval")]
    pub billing_interval: Value,
    #[serde(alias = "subscription_status", alias = "providerStatus")]
    pub provider_status: Value,
    #[serde(alias = "currentPeriodEnd")]
    pub current_period_end: Value,
}

impl RawBillingRecord {
    /// Reads a record out of arbitrary JSON.
    ///
    /// Known field names and their camelCase aliases are picked up. Anything
    /// that is not a usable object yields an empty record, which normalizes
    /// to the free plan.
    ///
    /// # Arguments
    ///
    /// * `value` - The billing row as delivered by the store.
    pub fn from_json(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Builds a record from string fields.
    ///
    /// No validation happens here; unknown tokens are kept verbatim and only
    /// collapse to defaults during normalization.
    ///
    /// # Arguments
    ///
    /// * `plan` - Subscription tier, e.g. `"paid"`.
    /// * `billing_interval` - `"monthly"` or `"annual"`, if any.
    /// * `provider_status` - Processor status, e.g. `"past_due"`.
    pub fn new(plan: &str, billing_interval: Option<&str>, provider_status: &str) -> Self {
        Self {
            plan: Value::from(plan),
            billing_interval: billing_interval.map(Value::from).unwrap_or(Value::Null),
            provider_status: Value::from(provider_status),
            current_period_end: Value::Null,
        }
    }
}

/// Canonical, always-valid subscription state for one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionState {
    pub plan: Plan,
    /// Always `None` on the free plan.
    pub billing_interval: Option<BillingInterval>,
    pub provider_status: ProviderStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// Normalizes a raw billing record.
    ///
    /// Each field is checked independently against its closed set of values;
    /// anything absent or unrecognised collapses to the field's safe default
    /// (`free`, `None`, `incomplete`, `None`). This never fails.
    pub fn normalize(raw: &RawBillingRecord) -> Self {
        let plan = as_token(&raw.plan)
            .and_then(Plan::parse)
            .unwrap_or_default();
        let billing_interval = match plan {
            Plan::Free => None,
            Plan::Paid => as_token(&raw.billing_interval).and_then(BillingInterval::parse),
        };
        let provider_status = as_token(&raw.provider_status)
            .and_then(ProviderStatus::parse)
            .unwrap_or_default();

        Self {
            plan,
            billing_interval,
            provider_status,
            current_period_end: parse_timestamp(&raw.current_period_end),
        }
    }
}

impl From<&RawBillingRecord> for SubscriptionState {
    fn from(raw: &RawBillingRecord) -> Self {
        Self::normalize(raw)
    }
}

fn as_token(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim)
}

// Accepts RFC 3339 strings and unix timestamps in seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}
