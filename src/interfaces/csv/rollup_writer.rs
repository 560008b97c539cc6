use crate::domain::ids::ProjectId;
use crate::domain::payment::PaymentStatus;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct RollupRow {
    project: ProjectId,
    status: PaymentStatus,
}

/// Writes project payment rollups as `project,status` CSV.
pub struct RollupWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RollupWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rollups<I>(&mut self, rollups: I) -> Result<()>
    where
        I: IntoIterator<Item = (ProjectId, PaymentStatus)>,
    {
        for (project, status) in rollups {
            self.writer.serialize(RollupRow { project, status })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
