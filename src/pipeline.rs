use crate::writers::{DataWriter, ParquetWriter};
use anyhow::{Context, Result};
use arrow::array::{Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::util::pretty::pretty_format_batches;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// The demo table: two fixed columns plus the requested month on every row.
pub fn sample_batch(month: i64) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("A", DataType::Int64, false),
        Field::new("B", DataType::Int64, false),
        Field::new("month", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Int64Array::from(vec![3, 4])),
            Arc::new(Int64Array::from(vec![month; 2])),
        ],
    )?;
    Ok(batch)
}

pub fn output_path(output_dir: &Path, month: i64) -> PathBuf {
    output_dir.join(format!("output_{month}.parquet"))
}

pub async fn run_pipeline(month: i64, output_dir: &Path) -> Result<PathBuf> {
    println!("Hello Pipeline!, month={month}");
    let batch = sample_batch(month)?;
    println!("{}", pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])?);

    let path = output_path(output_dir, month);
    let mut writer = ParquetWriter::new(path.clone());
    writer.setup(batch.schema()).await?;
    if let Err(e) = write_all(&mut writer, &batch).await {
        if let Err(abort_err) = writer.abort().await {
            warn!(%abort_err, "could not remove partial parquet file");
        }
        return Err(e).with_context(|| format!("Could not write {}", path.display()));
    }
    info!(path = %path.display(), "wrote parquet file");
    Ok(path)
}

async fn write_all(writer: &mut dyn DataWriter, batch: &RecordBatch) -> Result<()> {
    writer.write(batch).await?;
    writer.finish().await
}
