//! The tutorial steps, each one a single store operation plus its console report.
//!
//! Expected outcomes (a missing movie, a condition that does not hold) are
//! reported and return normally. Every other store error is returned to the
//! caller untouched.

use std::io::Write;

use crate::decimal::Decimal;
use crate::error::{Result, StoreError};
use crate::expression::{Comparison, Condition, Update};
use crate::model::{Attributes, Record, RecordKey, Value};
use crate::normalize::{normalize_attributes, normalize_record, to_pretty_json};
use crate::store::RecordStore;

pub const SAMPLE_YEAR: i64 = 2015;
pub const SAMPLE_TITLE: &str = "The Big New Movie";

/// Partition queried by the query step.
pub const QUERY_YEAR: i64 = 1985;

pub fn sample_key() -> RecordKey {
    RecordKey::new(SAMPLE_YEAR, SAMPLE_TITLE)
}

fn print_attributes(out: &mut dyn Write, attributes: &Attributes) -> Result<()> {
    let json = serde_json::Value::Object(normalize_attributes(attributes));
    writeln!(out, "{}", to_pretty_json(&json))?;
    Ok(())
}

/// Writes a brand new movie with a plot and a zero rating.
pub async fn put_movie(store: &dyn RecordStore, key: &RecordKey, out: &mut dyn Write) -> Result<()> {
    let info = Attributes::from([
        ("plot".to_string(), Value::from("Nothing happens at all.")),
        ("rating".to_string(), Value::from(0)),
    ]);
    let record = Record::new(
        key.clone(),
        Attributes::from([("info".to_string(), Value::M(info))]),
    );

    store.put(&record).await?;
    writeln!(out, "PutItem succeeded: {} {}", key.year, key.title)?;
    Ok(())
}

pub async fn get_movie(
    store: &dyn RecordStore,
    key: &RecordKey,
    out: &mut dyn Write,
) -> Result<Option<Record>> {
    let record = store.get(key).await?;
    match &record {
        Some(record) => {
            writeln!(out, "GetItem succeeded:")?;
            writeln!(out, "{}", to_pretty_json(&normalize_record(record)))?;
        }
        None => writeln!(out, "Movie not found: {} {}", key.year, key.title)?,
    }
    Ok(record)
}

/// Replaces the rating and plot and adds a cast list.
pub async fn update_movie(
    store: &dyn RecordStore,
    key: &RecordKey,
    out: &mut dyn Write,
) -> Result<Attributes> {
    let update = Update::new()
        .set("info.rating".parse()?, Decimal::new(55, -1)?)
        .set("info.plot".parse()?, "Everything happens all at once.")
        .set("info.actors".parse()?, vec!["Larry", "Moe", "Curly"]);

    let attributes = store.update(key, &update).await?;
    writeln!(out, "UpdateItem succeeded:")?;
    print_attributes(out, &attributes)?;
    Ok(attributes)
}

/// Atomically adds one to the rating.
pub async fn increment_rating(
    store: &dyn RecordStore,
    key: &RecordKey,
    out: &mut dyn Write,
) -> Result<Attributes> {
    let update = Update::new().increment("info.rating".parse()?, Decimal::from(1));

    let attributes = store.update(key, &update).await?;
    writeln!(out, "UpdateItem succeeded:")?;
    print_attributes(out, &attributes)?;
    Ok(attributes)
}

/// Drops the first actor, but only when the movie has more than three.
///
/// Returns `Ok(None)` when the condition did not hold.
pub async fn remove_first_actor_if_crowded(
    store: &dyn RecordStore,
    key: &RecordKey,
    out: &mut dyn Write,
) -> Result<Option<Attributes>> {
    writeln!(out, "Attempting conditional update...")?;
    let update = Update::new()
        .remove("info.actors[0]".parse()?)
        .when(Condition::size("info.actors".parse()?, Comparison::Gt, 3));

    match store.update(key, &update).await {
        Ok(attributes) => {
            writeln!(out, "UpdateItem succeeded:")?;
            print_attributes(out, &attributes)?;
            Ok(Some(attributes))
        }
        Err(StoreError::ConditionFailed) => {
            writeln!(out, "{}", StoreError::ConditionFailed)?;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Deletes the movie only if its rating is five or less.
///
/// Returns whether the movie was deleted.
pub async fn delete_if_poorly_rated(
    store: &dyn RecordStore,
    key: &RecordKey,
    out: &mut dyn Write,
) -> Result<bool> {
    writeln!(out, "Attempting a conditional delete...")?;
    let condition = Condition::compare("info.rating".parse()?, Comparison::Le, 5);

    match store.delete(key, Some(&condition)).await {
        Ok(()) => {
            writeln!(out, "DeleteItem succeeded: {} {}", key.year, key.title)?;
            Ok(true)
        }
        Err(StoreError::ConditionFailed) => {
            writeln!(out, "{}", StoreError::ConditionFailed)?;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

pub async fn query_movies(
    store: &dyn RecordStore,
    year: i64,
    out: &mut dyn Write,
) -> Result<Vec<Record>> {
    writeln!(out, "Movies from {year}")?;
    let records = store.query(year).await?;
    for record in &records {
        writeln!(out, "{} : {}", record.key.year, record.key.title)?;
    }
    Ok(records)
}

/// Runs the item steps in tutorial order against one store, after loading
/// `records` into it.
pub async fn walkthrough(
    store: &dyn RecordStore,
    records: &[Record],
    out: &mut dyn Write,
) -> Result<()> {
    let key = sample_key();

    crate::loader::load_records(store, records, out).await?;
    put_movie(store, &key, out).await?;
    get_movie(store, &key, out).await?;
    update_movie(store, &key, out).await?;
    increment_rating(store, &key, out).await?;
    remove_first_actor_if_crowded(store, &key, out).await?;
    delete_if_poorly_rated(store, &key, out).await?;
    query_movies(store, QUERY_YEAR, out).await?;
    Ok(())
}
