use crate::config::{DatabaseConfig, Driver};
use anyhow::{Context, Result};
use arrow::{array::RecordBatch, datatypes::SchemaRef};
use async_trait::async_trait;
use tracing::info;

/// Destination of a sequence of record batches sharing one schema.
#[async_trait]
pub trait DataWriter: Send {
    /// Creates the destination, replacing an existing one of the same name.
    async fn setup(&mut self, schema: SchemaRef) -> Result<()>;
    async fn write(&mut self, batch: &RecordBatch) -> Result<()>;
    async fn finish(&mut self) -> Result<()>;
    /// Removes whatever `setup` created.
    async fn abort(&mut self) -> Result<()>;
}

mod cells;
mod mysql_writer;
pub use mysql_writer::MysqlWriter;
mod parquet_writer;
pub use parquet_writer::ParquetWriter;
mod postgres_writer;
pub use postgres_writer::PostgresWriter;
pub mod sql;

/// Opens a connection to the configured database and returns a writer for `table_name`.
pub async fn connect(database: &DatabaseConfig, table_name: &str) -> Result<Box<dyn DataWriter>> {
    info!(uri = %database.get_uri(), "connecting");
    match database.driver {
        Driver::Postgres => {
            let writer = PostgresWriter::connect(&database.postgres_config(), table_name.to_string()).await?;
            Ok(Box::new(writer))
        }
        Driver::Mysql => {
            let pool = mysql_async::Pool::new(database.mysql_opts());
            //Fail on bad credentials before the source is touched
            let conn = pool.get_conn().await.context("Could not connect to MySQL")?;
            drop(conn);
            Ok(Box::new(MysqlWriter::new(pool, table_name.to_string())))
        }
    }
}
