//! Sample data loading.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_derive::Deserialize;

use crate::decimal::Decimal;
use crate::error::{Result, StoreError};
use crate::model::{Attributes, Record, RecordKey, Value};
use crate::store::RecordStore;

/// Default location of the sample movie data.
pub const DEFAULT_DATA_FILE: &str = "data/moviedata.json";

/// One entry of the movie data file.
#[derive(Debug, Deserialize)]
struct MovieEntry {
    year: serde_json::Number,
    title: String,
    info: serde_json::Value,
}

impl TryFrom<MovieEntry> for Record {
    type Error = StoreError;

    fn try_from(entry: MovieEntry) -> Result<Self> {
        let year = parse_year(&entry.year)?;
        let mut attributes = Attributes::new();
        attributes.insert("info".to_string(), Value::try_from(entry.info)?);
        Ok(Record::new(RecordKey::new(year, entry.title), attributes))
    }
}

/// Accepts any whole number, so `2013.0` is the year 2013.
fn parse_year(year: &serde_json::Number) -> Result<i64> {
    if let Some(year) = year.as_i64() {
        return Ok(year);
    }
    let decimal: Decimal = year.to_string().parse()?;
    decimal
        .to_i64()
        .ok_or_else(|| StoreError::InvalidKey(format!("year must be a whole number: {year}")))
}

/// Parses a JSON array of `{year, title, info}` objects.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let entries: Vec<MovieEntry> =
        serde_json::from_str(json).map_err(|e| StoreError::Deserialization(e.to_string()))?;
    entries.into_iter().map(Record::try_from).collect()
}

pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let json = fs::read_to_string(path)?;
    parse_records(&json)
}

/// Puts every record into the store, reporting each one as it goes.
/// Stops at the first failure.
pub async fn load_records(
    store: &dyn RecordStore,
    records: &[Record],
    out: &mut dyn Write,
) -> Result<usize> {
    for record in records {
        writeln!(out, "Adding movie: {} {}", record.key.year, record.key.title)?;
        store.put(record).await?;
    }
    tracing::info!(count = records.len(), "loaded records");
    Ok(records.len())
}
