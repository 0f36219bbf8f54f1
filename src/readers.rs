use crate::data::DeclaredSchema;
use anyhow::Result;
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use reqwest::Client;
use std::io::Read;

/// A lazy, forward-only sequence of record batches.
#[async_trait]
pub trait DataReader: Send {
    fn schema(&self) -> SchemaRef;
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}

mod csv_reader;
pub use csv_reader::CsvReader;
mod source;
pub use source::{DEFAULT_URL_PREFIX, Source, monthly_url};

/// Opens `source` and reads its header. Nothing but the header is consumed.
pub async fn open_csv(
    source: &Source,
    client: &Client,
    declared: DeclaredSchema,
    chunk_size: usize,
) -> Result<CsvReader<Box<dyn Read + Send>>> {
    let raw = source.open(client).await?;
    let source = source.clone();
    tokio::task::spawn_blocking(move || CsvReader::new(source.decode(raw), &declared, chunk_size)).await?
}
