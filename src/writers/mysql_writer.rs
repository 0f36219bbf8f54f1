use crate::writers::DataWriter;
use crate::writers::cells::Cell;
use crate::writers::sql::Dialect;
use anyhow::{Context, Result, bail};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Params, Pool, Value};

/// Writes batches into a MySQL table, one prepared `INSERT` execution per row.
pub struct MysqlWriter {
    pool: Pool,
    table_name: String,
    schema: Option<SchemaRef>,
}

impl MysqlWriter {
    pub fn new(pool: Pool, table_name: String) -> MysqlWriter {
        MysqlWriter {
            pool,
            table_name,
            schema: None,
        }
    }

    fn to_value(cell: Cell<'_>) -> Value {
        match cell {
            Cell::Null => Value::NULL,
            Cell::Int(v) => Value::Int(v),
            Cell::Float(v) => Value::Double(v),
            Cell::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
            Cell::Timestamp(dt) => MysqlWriter::datetime_value(dt),
        }
    }

    fn datetime_value(dt: NaiveDateTime) -> Value {
        Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        )
    }

    fn row_params(batch: &RecordBatch) -> Result<Vec<Params>> {
        let mut rows = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let mut values = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                values.push(MysqlWriter::to_value(Cell::read(column.as_ref(), row)?));
            }
            rows.push(Params::Positional(values));
        }
        Ok(rows)
    }
}

#[async_trait]
impl DataWriter for MysqlWriter {
    async fn setup(&mut self, schema: SchemaRef) -> Result<()> {
        let dialect = Dialect::Mysql;
        let create = dialect.create_table(&self.table_name, &schema)?;
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Could not connect to MySQL")?;
        conn.query_drop(dialect.drop_table(&self.table_name)).await?;
        conn.query_drop(create)
            .await
            .with_context(|| format!("Could not create table {}", self.table_name))?;
        self.schema = Some(schema);
        Ok(())
    }

    async fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        let Some(schema) = &self.schema else {
            bail!("Table {} was not set up.", self.table_name);
        };
        let statement = Dialect::Mysql.insert(&self.table_name, schema);
        let params = MysqlWriter::row_params(batch)?;
        let mut conn = self.pool.get_conn().await?;
        conn.exec_batch(statement, params)
            .await
            .with_context(|| format!("Could not insert into {}", self.table_name))?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.schema.is_none() {
            bail!("Table {} was not set up.", self.table_name);
        }
        self.pool.clone().disconnect().await?;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(Dialect::Mysql.drop_table(&self.table_name))
            .await
            .with_context(|| format!("Could not drop table {}", self.table_name))?;
        self.schema = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use std::sync::Arc;

    #[test]
    fn rows_become_positional_params() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("fare", DataType::Float64, true),
            Field::new("flag", DataType::Utf8, true),
            Field::new("at", DataType::Timestamp(TimeUnit::Microsecond, None), true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(1), None])),
                Arc::new(Float64Array::from(vec![Some(9.5), None])),
                Arc::new(StringArray::from(vec![Some("N"), None])),
                Arc::new(TimestampMicrosecondArray::from(vec![Some(1_609_461_010_000_250), None])),
            ],
        )
        .unwrap();

        let rows = MysqlWriter::row_params(&batch).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            Params::Positional(vec![
                Value::Int(1),
                Value::Double(9.5),
                Value::Bytes(b"N".to_vec()),
                Value::Date(2021, 1, 1, 0, 30, 10, 250),
            ])
        );
        assert_eq!(rows[1], Params::Positional(vec![Value::NULL; 4]));
    }
}
