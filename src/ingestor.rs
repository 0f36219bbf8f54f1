use crate::readers::DataReader;
use crate::writers::DataWriter;
use anyhow::Result;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub batches: usize,
    pub rows: usize,
}

///Loads every batch of a reader into one destination table. The first batch
///defines the table, later batches are appended in source order.
pub struct TableIngest {
    table_name: String,
}

impl TableIngest {
    pub fn new(table_name: String) -> TableIngest {
        TableIngest { table_name }
    }

    pub async fn execute(
        &self,
        reader: &mut dyn DataReader,
        writer: &mut dyn DataWriter,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        //Nothing is created until the source has produced its first batch
        let first = reader.next_batch().await?;
        let schema = match &first {
            Some(batch) => batch.schema(),
            None => reader.schema(),
        };

        writer.setup(schema).await?;
        info!("Table {} created", self.table_name);

        if let Some(batch) = first {
            if let Err(e) = writer.write(&batch).await {
                if let Err(abort_error) = writer.abort().await {
                    error!(%abort_error, "could not drop table {}", self.table_name);
                }
                return Err(e);
            }
            summary.batches += 1;
            summary.rows += batch.num_rows();
            info!(rows = summary.rows, "Inserted first chunk: {}", batch.num_rows());

            while let Some(batch) = reader.next_batch().await? {
                writer.write(&batch).await?;
                summary.batches += 1;
                summary.rows += batch.num_rows();
                info!(rows = summary.rows, "Inserted chunk: {}", batch.num_rows());
            }
        }

        writer.finish().await?;
        info!(batches = summary.batches, rows = summary.rows, "done ingesting to {}", self.table_name);
        Ok(summary)
    }
}
