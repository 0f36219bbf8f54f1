use crate::writers::DataWriter;
use anyhow::{Result, bail};
use arrow::{array::RecordBatch, datatypes::SchemaRef};
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use std::fs;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Writes batches to a Parquet file. Output goes to a temporary file which is
/// renamed into place by `finish`; `abort` only removes the temporary file, so
/// an earlier output survives a failed run.
pub struct ParquetWriter {
    file_path: PathBuf,
    temp_path: PathBuf,
    writer: Option<ArrowWriter<File>>,
}

impl ParquetWriter {
    pub fn new(file_path: PathBuf) -> ParquetWriter {
        let mut temp_path = file_path.clone();
        temp_path.set_extension("temp");
        ParquetWriter {
            file_path,
            temp_path,
            writer: None,
        }
    }
}

#[async_trait]
impl DataWriter for ParquetWriter {
    async fn setup(&mut self, schema: SchemaRef) -> Result<()> {
        let file = File::create(&self.temp_path)?;
        self.writer = Some(ArrowWriter::try_new(file, schema, None)?);
        Ok(())
    }

    async fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.write(batch)?;
        } else {
            bail!("No file handle.")
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        } else {
            bail!("Invalid Parquet writer.");
        }
        fs::rename(&self.temp_path, &self.file_path)?;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.writer = None;
        if let Err(e) = fs::remove_file(&self.temp_path) {
            if e.kind() != ErrorKind::NotFound {
                bail!(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("A", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
    }

    #[tokio::test]
    async fn finish_moves_temp_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut writer = ParquetWriter::new(path.clone());
        let batch = batch();

        writer.setup(batch.schema()).await.unwrap();
        writer.write(&batch).await.unwrap();
        writer.write(&batch).await.unwrap();
        assert!(dir.path().join("out.temp").exists());
        writer.finish().await.unwrap();

        assert!(!dir.path().join("out.temp").exists());
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 6);
    }

    #[tokio::test]
    async fn abort_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut writer = ParquetWriter::new(path.clone());
        let batch = batch();

        writer.setup(batch.schema()).await.unwrap();
        writer.write(&batch).await.unwrap();
        writer.abort().await.unwrap();

        assert!(!dir.path().join("out.temp").exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn abort_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        fs::write(&path, b"previous run").unwrap();
        let mut writer = ParquetWriter::new(path.clone());
        let batch = batch();

        writer.setup(batch.schema()).await.unwrap();
        writer.write(&batch).await.unwrap();
        writer.abort().await.unwrap();

        assert!(!dir.path().join("out.temp").exists());
        assert_eq!(fs::read(&path).unwrap(), b"previous run");
    }

    #[tokio::test]
    async fn failed_rename_leaves_temp_file_for_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();
        let mut writer = ParquetWriter::new(path.clone());
        let batch = batch();

        writer.setup(batch.schema()).await.unwrap();
        writer.write(&batch).await.unwrap();
        assert!(writer.finish().await.is_err());
        assert!(dir.path().join("out.temp").exists());

        writer.abort().await.unwrap();
        assert!(!dir.path().join("out.temp").exists());
        assert!(path.join("occupied").exists());
    }

    #[tokio::test]
    async fn write_before_setup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ParquetWriter::new(dir.path().join("out.parquet"));
        assert!(writer.write(&batch()).await.is_err());
        assert!(writer.finish().await.is_err());
    }
}
