use super::ids::{PaymentId, ProjectId};
use crate::error::EngineError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a positive monetary amount for a payment installment.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Validates and wraps a payment amount.
    ///
    /// # Arguments
    ///
    /// * `value` - The decimal amount, in the project's currency.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ValidationError`] if `value` is zero or negative.
    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Status of a single payment, and of the project-level rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pendente,
    ParcialmentePago,
    Pago,
    Atrasado,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pendente => "pendente",
            PaymentStatus::ParcialmentePago => "parcialmente_pago",
            PaymentStatus::Pago => "pago",
            PaymentStatus::Atrasado => "atrasado",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(PaymentStatus::Pendente),
            "parcialmente_pago" => Ok(PaymentStatus::ParcialmentePago),
            "pago" => Ok(PaymentStatus::Pago),
            "atrasado" => Ok(PaymentStatus::Atrasado),
            other => Err(EngineError::ValidationError(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

/// A payment installment owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub project: ProjectId,
    pub amount: Amount,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Not settled and due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != PaymentStatus::Pago && self.due_date < today
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub amount: Amount,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Partial update of a payment; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentUpdate {
    pub amount: Option<Amount>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<PaymentStatus>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    /// An update that only changes the status.
    ///
    /// # Arguments
    ///
    /// * `status` - The new status. Moving to `pago` stamps `paid_at` when
    ///   applied; moving away from it clears the stamp.
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Applies the update to `payment` in place.
    ///
    /// `paid_at` follows the status: a payment becoming `pago` without an
    /// explicit payment time is stamped with `now`, and a payment leaving
    /// `pago` loses its stamp unless the update sets one.
    ///
    /// # Arguments
    ///
    /// * `payment` - The stored payment to modify.
    /// * `now` - Timestamp used when a payment time must be stamped.
    pub fn apply_to(&self, payment: &mut Payment, now: DateTime<Utc>) {
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(due_date) = self.due_date {
            payment.due_date = due_date;
        }
        if let Some(status) = self.status {
            payment.status = status;
        }
        payment.paid_at = match (self.paid_at, payment.status) {
            (Some(paid_at), _) => Some(paid_at),
            (None, PaymentStatus::Pago) => payment.paid_at.or(Some(now)),
            (None, _) if self.status.is_some() => None,
            (None, _) => payment.paid_at,
        };
    }
}

/// Derives the project-level payment status from its payments.
///
/// First match wins: all `pago` (non-empty) gives `pago`; any `atrasado` gives
/// `atrasado`; any `pago` gives `parcialmente_pago`; otherwise `pendente`.
/// Order of the input is irrelevant and the empty set is `pendente`.
pub fn rollup<'a, I>(payments: I) -> PaymentStatus
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut any = false;
    let mut all_paid = true;
    let mut any_paid = false;
    let mut any_late = false;

    for payment in payments {
        any = true;
        match payment.status {
            PaymentStatus::Pago => any_paid = true,
            PaymentStatus::Atrasado => {
                any_late = true;
                all_paid = false;
            }
            PaymentStatus::Pendente | PaymentStatus::ParcialmentePago => all_paid = false,
        }
    }

    if any && all_paid {
        PaymentStatus::Pago
    } else if any_late {
        PaymentStatus::Atrasado
    } else if any_paid {
        PaymentStatus::ParcialmentePago
    } else {
        PaymentStatus::Pendente
    }
}
