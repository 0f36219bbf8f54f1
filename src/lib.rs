use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub use config::{DatabaseConfig, Driver, IngestConfig};

pub mod data;
pub mod ingestor;
pub mod pipeline;
pub mod readers;
pub mod writers;

use crate::data::DeclaredSchema;
use crate::ingestor::{IngestSummary, TableIngest};

/// Connects to the destination, opens the source and loads it into the target table.
pub async fn ingest(database: &DatabaseConfig, config: &IngestConfig) -> Result<IngestSummary> {
    let mut writer = writers::connect(database, &config.target_table).await?;

    let client = reqwest::Client::new();
    info!(source = %config.source, chunk_size = config.chunk_size.get(), "reading");
    let mut reader = readers::open_csv(
        &config.source,
        &client,
        DeclaredSchema::yellow_tripdata(),
        config.chunk_size.get(),
    )
    .await
    .with_context(|| format!("Could not read {}", config.source))?;

    TableIngest::new(config.target_table.clone())
        .execute(&mut reader, writer.as_mut())
        .await
        .with_context(|| format!("Ingesting {} into {} failed", config.source, config.target_table))
}
