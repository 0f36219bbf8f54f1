use anyhow::{Context, Result, bail};
use arrow::array::Array;
use arrow::datatypes::{DataType, Field, TimeUnit};
use chrono::NaiveDateTime;
use std::sync::Arc;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Field values read as missing in every column, whatever its kind.
pub const NULL_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_null_token(value: &str) -> bool {
    NULL_TOKENS.contains(&value)
}

/// Semantic type a source column is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int64,
    Float64,
    Text,
    Timestamp,
}

//Enums are used here instead of dyn/fat pointers for performance
pub trait ColumnBuilder {
    fn finish(self) -> Arc<dyn Array>;
    fn push_null(&mut self) -> Result<()>;
    fn push_value(&mut self, value: &str) -> Result<()>;
}

#[derive(Debug, PartialEq, Eq)]
pub struct ColumnData {
    name: String,
    nullable: bool,
    kind: ColumnKind,
    arrow_type: DataType,
}

impl ColumnData {
    pub fn get_arrow_type(kind: ColumnKind) -> DataType {
        match kind {
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    pub fn new(name: String, nullable: bool, kind: ColumnKind) -> ColumnData {
        let arrow_type = ColumnData::get_arrow_type(kind);
        ColumnData {
            name,
            nullable,
            kind,
            arrow_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn get_schema_field(&self) -> Field {
        Field::new(self.name.clone(), self.arrow_type.clone(), self.nullable)
    }
}

pub struct ColumnHolder<T: ColumnBuilder> {
    data: Arc<ColumnData>,
    builder: T,
}

impl<T: ColumnBuilder> ColumnHolder<T> {
    pub fn new(data: Arc<ColumnData>, builder: T) -> ColumnHolder<T> {
        ColumnHolder { data, builder }
    }

    pub fn finish(self) -> Arc<dyn Array> {
        self.builder.finish()
    }

    /// Empty fields and the other null tokens are nulls for every kind of column.
    pub fn push(&mut self, value: &str) -> Result<()> {
        if is_null_token(value) {
            if self.data.nullable {
                return self.builder.push_null();
            }
            bail!("Column {} does not accept missing values.", self.data.name);
        }
        self.builder
            .push_value(value)
            .with_context(|| format!("Invalid value for column {}", self.data.name))
    }
}

pub struct StringColumnBuilder {
    builder: arrow::array::StringBuilder,
}

impl StringColumnBuilder {
    fn new(capacity: usize) -> StringColumnBuilder {
        StringColumnBuilder {
            builder: arrow::array::StringBuilder::with_capacity(capacity, capacity * 8),
        }
    }
}

impl ColumnBuilder for StringColumnBuilder {
    fn finish(mut self) -> Arc<dyn Array> {
        Arc::new(self.builder.finish())
    }

    fn push_null(&mut self) -> Result<()> {
        self.builder.append_null();
        Ok(())
    }

    fn push_value(&mut self, value: &str) -> Result<()> {
        self.builder.append_value(value);
        Ok(())
    }
}

pub struct Int64ColumnBuilder {
    builder: arrow::array::Int64Builder,
}

impl Int64ColumnBuilder {
    fn new(capacity: usize) -> Int64ColumnBuilder {
        Int64ColumnBuilder {
            builder: arrow::array::Int64Builder::with_capacity(capacity),
        }
    }
}

impl Int64ColumnBuilder {
    /// Integral floats such as `1.0` are accepted when they fit an `i64`.
    pub fn parse(value: &str) -> Option<i64> {
        let value = value.trim();
        if let Ok(int) = value.parse::<i64>() {
            return Some(int);
        }
        let float = value.parse::<f64>().ok()?;
        if float.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&float) {
            Some(float as i64)
        } else {
            None
        }
    }
}

impl ColumnBuilder for Int64ColumnBuilder {
    fn finish(mut self) -> Arc<dyn Array> {
        Arc::new(self.builder.finish())
    }

    fn push_null(&mut self) -> Result<()> {
        self.builder.append_null();
        Ok(())
    }

    fn push_value(&mut self, value: &str) -> Result<()> {
        match Int64ColumnBuilder::parse(value) {
            Some(value) => {
                self.builder.append_value(value);
                Ok(())
            }
            None => bail!("Value must be an integer but it is {:?}.", value),
        }
    }
}

pub struct FloatColumnBuilder {
    builder: arrow::array::Float64Builder,
}

impl FloatColumnBuilder {
    fn new(capacity: usize) -> FloatColumnBuilder {
        FloatColumnBuilder {
            builder: arrow::array::Float64Builder::with_capacity(capacity),
        }
    }
}

impl ColumnBuilder for FloatColumnBuilder {
    fn finish(mut self) -> Arc<dyn Array> {
        Arc::new(self.builder.finish())
    }

    fn push_null(&mut self) -> Result<()> {
        self.builder.append_null();
        Ok(())
    }

    fn push_value(&mut self, value: &str) -> Result<()> {
        match value.trim().parse::<f64>() {
            Ok(value) if value.is_nan() => self.push_null(),
            Ok(value) => {
                self.builder.append_value(value);
                Ok(())
            }
            Err(_) => bail!("Value must be a float but it is {:?}.", value),
        }
    }
}

pub struct DateTimeColumnBuilder {
    builder: arrow::array::TimestampMicrosecondBuilder,
}

impl DateTimeColumnBuilder {
    pub fn new(capacity: usize) -> DateTimeColumnBuilder {
        DateTimeColumnBuilder {
            builder: arrow::array::TimestampMicrosecondBuilder::with_capacity(capacity),
        }
    }

    pub fn parse(value: &str) -> Result<NaiveDateTime> {
        let value = value.trim();
        for format in TIMESTAMP_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(dt);
            }
        }
        bail!("Value must be a DateTime but it is {:?}.", value)
    }
}

impl ColumnBuilder for DateTimeColumnBuilder {
    fn finish(mut self) -> Arc<dyn Array> {
        Arc::new(self.builder.finish())
    }

    fn push_null(&mut self) -> Result<()> {
        self.builder.append_null();
        Ok(())
    }

    fn push_value(&mut self, value: &str) -> Result<()> {
        if value.trim() == "NaT" {
            return self.push_null();
        }
        let dt = DateTimeColumnBuilder::parse(value)?;
        self.builder.append_value(dt.and_utc().timestamp_micros());
        Ok(())
    }
}

pub enum Column {
    String(ColumnHolder<StringColumnBuilder>),
    Int64(ColumnHolder<Int64ColumnBuilder>),
    Float(ColumnHolder<FloatColumnBuilder>),
    DateTime(ColumnHolder<DateTimeColumnBuilder>),
}

impl Column {
    pub fn finish(self) -> Arc<dyn Array> {
        match self {
            Column::String(data) => data.finish(),
            Column::Int64(data) => data.finish(),
            Column::Float(data) => data.finish(),
            Column::DateTime(data) => data.finish(),
        }
    }

    pub fn from_data(data: Arc<ColumnData>, capacity: usize) -> Column {
        match data.kind {
            ColumnKind::Int64 => Column::Int64(ColumnHolder::new(data, Int64ColumnBuilder::new(capacity))),
            ColumnKind::Float64 => Column::Float(ColumnHolder::new(data, FloatColumnBuilder::new(capacity))),
            ColumnKind::Text => Column::String(ColumnHolder::new(data, StringColumnBuilder::new(capacity))),
            ColumnKind::Timestamp => {
                Column::DateTime(ColumnHolder::new(data, DateTimeColumnBuilder::new(capacity)))
            }
        }
    }

    pub fn push(column: &mut Column, value: &str) -> Result<()> {
        match column {
            Column::String(holder) => holder.push(value),
            Column::Int64(holder) => holder.push(value),
            Column::Float(holder) => holder.push(value),
            Column::DateTime(holder) => holder.push(value),
        }
    }
}
