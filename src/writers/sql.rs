use anyhow::{Result, bail};
use arrow::datatypes::{DataType, Schema, TimeUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub fn column_type(&self, data_type: &DataType) -> Result<&'static str> {
        let sql_type = match (self, data_type) {
            (_, DataType::Int64) => "BIGINT",
            (Dialect::Postgres, DataType::Float64) => "DOUBLE PRECISION",
            (Dialect::Mysql, DataType::Float64) => "DOUBLE",
            (_, DataType::Utf8) => "TEXT",
            (Dialect::Postgres, DataType::Timestamp(TimeUnit::Microsecond, None)) => "TIMESTAMP",
            (Dialect::Mysql, DataType::Timestamp(TimeUnit::Microsecond, None)) => "DATETIME(6)",
            _ => bail!("No matching SQL type for column type {data_type}."),
        };
        Ok(sql_type)
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_ident(table))
    }

    pub fn create_table(&self, table: &str, schema: &Schema) -> Result<String> {
        if schema.fields().is_empty() {
            bail!("Cannot create table {table} without columns.");
        }
        let mut columns = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let mut column = format!(
                "{} {}",
                self.quote_ident(field.name()),
                self.column_type(field.data_type())?
            );
            if !field.is_nullable() {
                column.push_str(" NOT NULL");
            }
            columns.push(column);
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote_ident(table),
            columns.join(", ")
        ))
    }

    fn column_list(&self, schema: &Schema) -> String {
        schema
            .fields()
            .iter()
            .map(|f| self.quote_ident(f.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn insert(&self, table: &str, schema: &Schema) -> String {
        let placeholders = vec!["?"; schema.fields().len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_ident(table),
            self.column_list(schema),
            placeholders
        )
    }

    pub fn copy_in(&self, table: &str, schema: &Schema) -> String {
        format!(
            r"COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '\N')",
            self.quote_ident(table),
            self.column_list(schema)
        )
    }
}
