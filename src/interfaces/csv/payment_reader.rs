use crate::domain::ids::{PaymentId, ProjectId};
use crate::domain::payment::{Amount, Payment, PaymentStatus};
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a payments export: `project, amount, due_date, status, paid_at`.
#[derive(Debug, Deserialize)]
struct PaymentRow {
    project: ProjectId,
    amount: Decimal,
    due_date: NaiveDate,
    status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
}

/// Reads payments from a CSV source.
///
/// Wraps `csv::Reader` and yields one `Result<Payment>` per row, numbering
/// payments by row. Whitespace is trimmed and short rows are accepted.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates payments.
    pub fn payments(self) -> impl Iterator<Item = Result<Payment>> {
        self.reader
            .into_deserialize::<PaymentRow>()
            .zip(1u64..)
            .map(|(row, id)| {
                let row = row.map_err(EngineError::from)?;
                Ok(Payment {
                    id: PaymentId(id),
                    project: row.project,
                    amount: Amount::new(row.amount)?,
                    due_date: row.due_date,
                    status: row.status,
                    paid_at: row.paid_at,
                })
            })
    }
}
