use crate::data::columns::{Column, ColumnData};
use crate::data::trips::{DeclaredSchema, schema_of};
use crate::readers::DataReader;
use anyhow::{Context, Result, bail};
use arrow::array::{Array, RecordBatch};
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use csv::StringRecord;
use std::io::Read;
use std::sync::Arc;

const MAX_PREALLOCATED_ROWS: usize = 1 << 16;

/// Decodes delimited text with a header row into record batches of at most
/// `chunk_size` rows.
pub struct CsvReader<R> {
    //Taken while a chunk is being decoded on the blocking pool
    reader: Option<csv::Reader<R>>,
    columns: Arc<Vec<Arc<ColumnData>>>,
    schema: SchemaRef,
    chunk_size: usize,
}

impl<R: Read> CsvReader<R> {
    /// Reads the header row. Blocks on `inner`.
    pub fn new(inner: R, declared: &DeclaredSchema, chunk_size: usize) -> Result<CsvReader<R>> {
        if chunk_size == 0 {
            bail!("Chunk size must be a positive number of rows.");
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(inner);
        let headers = reader.headers().context("Could not read the header row")?.clone();
        let columns = declared.resolve(headers.iter())?;
        let schema = schema_of(&columns);
        Ok(CsvReader {
            reader: Some(reader),
            columns: Arc::new(columns),
            schema,
            chunk_size,
        })
    }

    /// Reads the next chunk, blocking on the underlying reader.
    pub fn read_batch(&mut self) -> Result<Option<RecordBatch>> {
        let Some(reader) = self.reader.as_mut() else {
            bail!("Reader was lost after a failed read.");
        };
        read_chunk(reader, &self.columns, &self.schema, self.chunk_size)
    }
}

fn read_chunk<R: Read>(
    reader: &mut csv::Reader<R>,
    column_data: &[Arc<ColumnData>],
    schema: &SchemaRef,
    chunk_size: usize,
) -> Result<Option<RecordBatch>> {
    let capacity = chunk_size.min(MAX_PREALLOCATED_ROWS);
    let mut columns: Vec<Column> = column_data
        .iter()
        .map(|data| Column::from_data(data.clone(), capacity))
        .collect();

    let mut record = StringRecord::new();
    let mut rows: usize = 0;
    while rows < chunk_size {
        if !reader.read_record(&mut record).context("Malformed row")? {
            break;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        for (i, value) in record.iter().enumerate() {
            Column::push(&mut columns[i], value).with_context(|| format!("Malformed row at line {line}"))?;
        }
        rows += 1;
    }

    if rows == 0 {
        return Ok(None);
    }

    let arrays: Vec<Arc<dyn Array>> = columns.into_iter().map(|col| col.finish()).collect();
    Ok(Some(RecordBatch::try_new(schema.clone(), arrays)?))
}

#[async_trait]
impl<R: Read + Send + 'static> DataReader for CsvReader<R> {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        let Some(mut reader) = self.reader.take() else {
            bail!("Reader was lost after a failed read.");
        };
        let columns = self.columns.clone();
        let schema = self.schema.clone();
        let chunk_size = self.chunk_size;
        let (reader, result) = tokio::task::spawn_blocking(move || {
            let result = read_chunk(&mut reader, &columns, &schema, chunk_size);
            (reader, result)
        })
        .await?;
        self.reader = Some(reader);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnKind;
    use arrow::array::{AsArray, Int64Array, StringArray};
    use std::io::Cursor;
    use test_case::test_case;

    const TRIPS: &str = "\
VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,store_and_fwd_flag
1,2021-01-01 00:30:10,2021-01-01 00:36:12,1,2.10,N
2,2021-01-01 00:51:20,2021-01-01 00:52:19,,0.20,
,2021-01-01 00:43:30,2021-01-01 01:11:06,1,14.70,Y
";

    fn reader(text: &str, chunk_size: usize) -> CsvReader<Cursor<Vec<u8>>> {
        CsvReader::new(
            Cursor::new(text.as_bytes().to_vec()),
            &DeclaredSchema::yellow_tripdata(),
            chunk_size,
        )
        .unwrap()
    }

    #[test_case(1, vec![1, 1, 1]; "one row per chunk")]
    #[test_case(2, vec![2, 1]; "three rows in chunks of two")]
    #[test_case(3, vec![3]; "exact fit")]
    #[test_case(100_000, vec![3]; "default chunk size")]
    fn chunking_preserves_row_count(chunk_size: usize, expected: Vec<usize>) {
        let mut reader = reader(TRIPS, chunk_size);
        let mut sizes = Vec::new();
        while let Some(batch) = reader.read_batch().unwrap() {
            assert_eq!(batch.schema(), reader.schema());
            sizes.push(batch.num_rows());
        }
        assert_eq!(sizes, expected);
    }

    #[test]
    fn decodes_declared_types_and_nulls() {
        let mut reader = reader(TRIPS, 10);
        let batch = reader.read_batch().unwrap().unwrap();

        let vendors = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(vendors.value(1), 2);
        assert!(vendors.is_null(2));

        let passengers = batch.column_by_name("passenger_count").unwrap();
        assert!(passengers.is_null(1));

        let flags = batch.column(5).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(flags.value(0), "N");
        assert!(flags.is_null(1));

        let distance = batch
            .column_by_name("trip_distance")
            .unwrap()
            .as_primitive::<arrow::datatypes::Float64Type>();
        assert_eq!(distance.value(2), 14.7);
    }

    #[test]
    fn missing_value_tokens_and_integral_floats() {
        let text = "\
VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,fare_amount,store_and_fwd_flag
1.0,2021-01-01 00:30:10,2021-01-01 00:36:12,NaN,NA
NA,2021-01-01 00:51:20,NaT,7.5,N
";
        let mut reader = reader(text, 10);
        let batch = reader.read_batch().unwrap().unwrap();

        let vendors = batch.column(0).as_primitive::<arrow::datatypes::Int64Type>();
        assert_eq!(vendors.value(0), 1);
        assert!(vendors.is_null(1));
        assert!(batch.column(3).is_null(0));
        assert_eq!(batch.column(3).null_count(), 1);
        assert!(batch.column(4).is_null(0));
        assert_eq!(batch.column(4).as_string::<i32>().value(1), "N");
        assert!(batch.column(2).is_null(1));
    }

    #[test]
    fn header_only_source_has_schema_and_no_batches() {
        let header = TRIPS.lines().next().unwrap();
        let mut reader = reader(&format!("{header}\n"), 2);
        assert_eq!(reader.schema().fields().len(), 6);
        assert!(reader.read_batch().unwrap().is_none());
    }

    #[test]
    fn malformed_value_names_the_line() {
        let text = TRIPS.replace("14.70", "fourteen");
        let mut reader = reader(&text, 10);
        let err = reader.read_batch().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 4"), "{message}");
        assert!(message.contains("trip_distance"), "{message}");
    }

    #[test]
    fn short_row_is_rejected() {
        let text = format!("{TRIPS}1,2021-01-01 00:30:10\n");
        let mut reader = reader(&text, 2);
        assert_eq!(reader.read_batch().unwrap().unwrap().num_rows(), 2);
        assert!(reader.read_batch().is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let result = CsvReader::new(
            Cursor::new(TRIPS.as_bytes().to_vec()),
            &DeclaredSchema::yellow_tripdata(),
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn custom_declarations_are_honoured() {
        let declared = DeclaredSchema::new(&[("when", ColumnKind::Timestamp), ("n", ColumnKind::Int64)]);
        let mut reader = CsvReader::new(Cursor::new(b"when,n\n2020-02-29 12:00:00,7\n".to_vec()), &declared, 5).unwrap();
        let batch = reader.read_batch().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(1).as_primitive::<arrow::datatypes::Int64Type>().value(0), 7);
    }

    #[tokio::test]
    async fn async_batches_follow_source_order() {
        let mut reader = reader(TRIPS, 2);
        let first = reader.next_batch().await.unwrap().unwrap();
        let second = reader.next_batch().await.unwrap().unwrap();
        assert!(reader.next_batch().await.unwrap().is_none());

        let vendors = first.column(0).as_primitive::<arrow::datatypes::Int64Type>();
        assert_eq!(vendors.value(0), 1);
        assert_eq!(second.num_rows(), 1);
        assert_eq!(second.column(5).as_string::<i32>().value(0), "Y");
    }
}
