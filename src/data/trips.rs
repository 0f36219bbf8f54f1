use crate::data::columns::{ColumnData, ColumnKind};
use anyhow::{Result, bail};
use arrow::datatypes::{Schema, SchemaRef};
use std::sync::Arc;

/// Column types the yellow taxi trip files are decoded with.
pub const YELLOW_TRIPDATA: &[(&str, ColumnKind)] = &[
    ("VendorID", ColumnKind::Int64),
    ("tpep_pickup_datetime", ColumnKind::Timestamp),
    ("tpep_dropoff_datetime", ColumnKind::Timestamp),
    ("passenger_count", ColumnKind::Int64),
    ("trip_distance", ColumnKind::Float64),
    ("RatecodeID", ColumnKind::Int64),
    ("store_and_fwd_flag", ColumnKind::Text),
    ("PULocationID", ColumnKind::Int64),
    ("DOLocationID", ColumnKind::Int64),
    ("payment_type", ColumnKind::Int64),
    ("fare_amount", ColumnKind::Float64),
    ("extra", ColumnKind::Float64),
    ("mta_tax", ColumnKind::Float64),
    ("tip_amount", ColumnKind::Float64),
    ("tolls_amount", ColumnKind::Float64),
    ("improvement_surcharge", ColumnKind::Float64),
    ("total_amount", ColumnKind::Float64),
    ("congestion_surcharge", ColumnKind::Float64),
];

/// Declared column types for a delimited source. The header of the file decides
/// the column order; the declaration only decides types.
#[derive(Debug, Clone)]
pub struct DeclaredSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl DeclaredSchema {
    pub fn new(columns: &[(&str, ColumnKind)]) -> DeclaredSchema {
        DeclaredSchema {
            columns: columns
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
        }
    }

    pub fn yellow_tripdata() -> DeclaredSchema {
        DeclaredSchema::new(YELLOW_TRIPDATA)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, kind)| *kind)
    }

    /// Resolves the header of a file against the declaration. Undeclared columns
    /// are read as text; every declared timestamp column has to be present.
    pub fn resolve<'a, I>(&self, headers: I) -> Result<Vec<Arc<ColumnData>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let columns: Vec<Arc<ColumnData>> = headers
            .into_iter()
            .map(|name| {
                let kind = self.kind_of(name).unwrap_or(ColumnKind::Text);
                Arc::new(ColumnData::new(name.to_string(), true, kind))
            })
            .collect();

        let missing: Vec<&str> = self
            .columns
            .iter()
            .filter(|(_, kind)| *kind == ColumnKind::Timestamp)
            .filter(|(name, _)| !columns.iter().any(|c| c.name() == name.as_str()))
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("Missing timestamp column(s) in header: {}.", missing.join(", "));
        }
        Ok(columns)
    }
}

pub fn schema_of(columns: &[Arc<ColumnData>]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| c.get_schema_field())
            .collect::<Vec<_>>(),
    ))
}
