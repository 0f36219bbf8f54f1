use crate::writers::DataWriter;
use crate::writers::cells::Cell;
use crate::writers::sql::Dialect;
use anyhow::{Context, Result, bail};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, pin_mut};
use tokio_postgres::{Client, Config, CopyInSink, NoTls};
use tracing::{debug, error};

const COPY_CHUNK_BYTES: usize = 1 << 20;

/// Encodes the rows of a batch as COPY csv text, cut into chunks of roughly
/// `chunk_bytes` that always end on a row boundary.
struct CopyRows<'a> {
    batch: &'a RecordBatch,
    next_row: usize,
    chunk_bytes: usize,
}

impl<'a> CopyRows<'a> {
    fn new(batch: &'a RecordBatch, chunk_bytes: usize) -> CopyRows<'a> {
        CopyRows {
            batch,
            next_row: 0,
            chunk_bytes,
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buffer = String::with_capacity(self.chunk_bytes + 4096);
        while self.next_row < self.batch.num_rows() && buffer.len() < self.chunk_bytes {
            for (i, column) in self.batch.columns().iter().enumerate() {
                if i > 0 {
                    buffer.push(',');
                }
                Cell::read(column.as_ref(), self.next_row)?.write_copy_csv(&mut buffer);
            }
            buffer.push('\n');
            self.next_row += 1;
        }
        if buffer.is_empty() {
            return Ok(None);
        }
        Ok(Some(Bytes::from(buffer)))
    }
}

fn check_copied(table_name: &str, copied: u64, expected: usize) -> Result<()> {
    if copied != expected as u64 {
        bail!(
            "Inserted {} rows into {} but the batch had {}.",
            copied,
            table_name,
            expected
        );
    }
    Ok(())
}

/// Writes batches into a PostgreSQL table through `COPY FROM STDIN`.
pub struct PostgresWriter {
    client: Client,
    table_name: String,
    schema: Option<SchemaRef>,
}

impl PostgresWriter {
    pub async fn connect(config: &Config, table_name: String) -> Result<PostgresWriter> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .context("Could not connect to PostgreSQL")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(%err, "Postgres connection error");
            }
        });
        Ok(PostgresWriter {
            client,
            table_name,
            schema: None,
        })
    }
}

#[async_trait]
impl DataWriter for PostgresWriter {
    async fn setup(&mut self, schema: SchemaRef) -> Result<()> {
        let dialect = Dialect::Postgres;
        //A multi statement simple query runs as a single transaction
        let statement = format!(
            "{}; {}",
            dialect.drop_table(&self.table_name),
            dialect.create_table(&self.table_name, &schema)?
        );
        debug!(%statement, "replacing table");
        self.client
            .batch_execute(&statement)
            .await
            .with_context(|| format!("Could not create table {}", self.table_name))?;
        self.schema = Some(schema);
        Ok(())
    }

    async fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        let Some(schema) = &self.schema else {
            bail!("Table {} was not set up.", self.table_name);
        };
        let statement = Dialect::Postgres.copy_in(&self.table_name, schema);
        let sink: CopyInSink<Bytes> = self
            .client
            .copy_in(statement.as_str())
            .await
            .with_context(|| format!("Could not start COPY into {}", self.table_name))?;
        pin_mut!(sink);

        let mut rows = CopyRows::new(batch, COPY_CHUNK_BYTES);
        while let Some(chunk) = rows.next_chunk()? {
            sink.as_mut().send(chunk).await?;
        }

        let copied = sink
            .as_mut()
            .finish()
            .await
            .with_context(|| format!("Could not insert into {}", self.table_name))?;
        check_copied(&self.table_name, copied, batch.num_rows())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.schema.is_none() {
            bail!("Table {} was not set up.", self.table_name);
        }
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        let statement = Dialect::Postgres.drop_table(&self.table_name);
        self.client
            .batch_execute(&statement)
            .await
            .with_context(|| format!("Could not drop table {}", self.table_name))?;
        self.schema = None;
        Ok(())
    }
}
