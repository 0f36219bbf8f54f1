use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use chrono::{DateTime, NaiveDateTime};
use std::fmt::Write;

/// One value of a record batch, borrowed from its column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell<'a> {
    Null,
    Int(i64),
    Float(f64),
    Text(&'a str),
    Timestamp(NaiveDateTime),
}

impl<'a> Cell<'a> {
    pub fn read(array: &'a dyn Array, row: usize) -> Result<Cell<'a>> {
        if array.is_null(row) {
            return Ok(Cell::Null);
        }
        let cell = match array.data_type() {
            DataType::Int64 => Cell::Int(array.as_primitive::<Int64Type>().value(row)),
            DataType::Float64 => Cell::Float(array.as_primitive::<Float64Type>().value(row)),
            DataType::Utf8 => Cell::Text(array.as_string::<i32>().value(row)),
            DataType::Timestamp(TimeUnit::Microsecond, None) => {
                let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
                let dt = DateTime::from_timestamp_micros(micros)
                    .with_context(|| format!("Timestamp {micros} is out of range."))?;
                Cell::Timestamp(dt.naive_utc())
            }
            other => bail!("Unsupported column type {other}."),
        };
        Ok(cell)
    }

    /// Appends the value as a field of PostgreSQL `COPY ... (FORMAT csv, NULL '\N')`.
    pub fn write_copy_csv(&self, out: &mut String) {
        match self {
            Cell::Null => out.push_str("\\N"),
            Cell::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Cell::Float(v) if v.is_nan() => out.push_str("NaN"),
            Cell::Float(v) if v.is_infinite() => {
                out.push_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Cell::Float(v) => {
                let _ = write!(out, "{v}");
            }
            //Quoted text never matches the null marker
            Cell::Text(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Cell::Timestamp(dt) => {
                let _ = write!(out, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use test_case::test_case;

    fn encoded(cell: Cell) -> String {
        let mut out = String::new();
        cell.write_copy_csv(&mut out);
        out
    }

    #[test]
    fn reads_each_supported_type() {
        let ints = Int64Array::from(vec![Some(4), None]);
        let floats = Float64Array::from(vec![1.25]);
        let text = StringArray::from(vec!["N"]);
        let times = TimestampMicrosecondArray::from(vec![1_609_461_010_000_000]);

        assert_eq!(Cell::read(&ints, 0).unwrap(), Cell::Int(4));
        assert_eq!(Cell::read(&ints, 1).unwrap(), Cell::Null);
        assert_eq!(Cell::read(&floats, 0).unwrap(), Cell::Float(1.25));
        assert_eq!(Cell::read(&text, 0).unwrap(), Cell::Text("N"));
        let Cell::Timestamp(dt) = Cell::read(&times, 0).unwrap() else {
            panic!("expected a timestamp");
        };
        assert_eq!(dt.to_string(), "2021-01-01 00:30:10");
    }

    #[test]
    fn rejects_unsupported_types() {
        let flags = arrow::array::BooleanArray::from(vec![true]);
        assert!(Cell::read(&flags, 0).is_err());
    }

    #[test_case(Cell::Null, "\\N"; "null")]
    #[test_case(Cell::Int(-7), "-7"; "int")]
    #[test_case(Cell::Float(2.5), "2.5"; "float")]
    #[test_case(Cell::Float(f64::NAN), "NaN"; "nan")]
    #[test_case(Cell::Float(f64::NEG_INFINITY), "-Infinity"; "negative infinity")]
    #[test_case(Cell::Text("say \"hi\", ok"), "\"say \"\"hi\"\", ok\""; "quoted text")]
    #[test_case(Cell::Text("\\N"), "\"\\N\""; "text that looks like null")]
    fn copy_csv_encoding(cell: Cell<'static>, expected: &str) {
        assert_eq!(encoded(cell), expected);
    }

    #[test]
    fn copy_csv_timestamps_keep_microseconds() {
        let dt = DateTime::from_timestamp_micros(1_609_461_010_000_001).unwrap().naive_utc();
        assert_eq!(encoded(Cell::Timestamp(dt)), "2021-01-01 00:30:10.000001");
    }
}
