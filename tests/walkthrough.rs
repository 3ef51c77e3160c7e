use std::path::Path;

use movies::expression::{Comparison, Condition, Update};
use movies::loader::{DEFAULT_DATA_FILE, read_records};
use movies::normalize::normalize_value;
use movies::tutorial::{self, sample_key};
use movies::{Attributes, MemoryStore, Record, RecordKey, RecordStore, StoreError, Value};
use serde_json::json;

fn sample_records() -> Vec<Record> {
    read_records(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_DATA_FILE)).unwrap()
}

#[tokio::test]
async fn walkthrough_runs_every_step_in_order() {
    let store = MemoryStore::new();
    let records = sample_records();
    let mut out: Vec<u8> = Vec::new();

    tutorial::walkthrough(&store, &records, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    let markers = [
        "Adding movie: 2013 Rush",
        "PutItem succeeded: 2015 The Big New Movie",
        "GetItem succeeded:",
        "\"rating\": 5.5",
        "\"rating\": 6.5",
        "Attempting conditional update...\nThe conditional request failed",
        "Attempting a conditional delete...\nThe conditional request failed",
        "Movies from 1985\n1985 : Back to the Future\n1985 : Brazil\n1985 : The Breakfast Club\n",
    ];
    let mut from = 0;
    for marker in markers {
        let at = text[from..]
            .find(marker)
            .unwrap_or_else(|| panic!("missing {marker:?} after byte {from} in:\n{text}"));
        from += at + marker.len();
    }

    // Both conditional steps were refused, so the movie survives with all actors.
    let movie = store.get(&sample_key()).await.unwrap().unwrap();
    assert_eq!(
        normalize_value(&movie.attributes["info"]),
        json!({
            "plot": "Everything happens all at once.",
            "rating": 6.5,
            "actors": ["Larry", "Moe", "Curly"],
        })
    );
}

#[tokio::test]
async fn put_then_get_returns_written_attributes() {
    let store = MemoryStore::new();
    for record in sample_records() {
        store.put(&record).await.unwrap();
        assert_eq!(store.get(&record.key).await.unwrap(), Some(record));
    }
}

#[tokio::test]
async fn deleted_record_is_not_found() {
    let store = MemoryStore::new();
    let record = sample_records().remove(0);
    store.put(&record).await.unwrap();

    store.delete(&record.key, None).await.unwrap();

    assert_eq!(store.get(&record.key).await.unwrap(), None);
}

#[tokio::test]
async fn failed_condition_leaves_record_unchanged() {
    let store = MemoryStore::new();
    let record = sample_records().remove(0);
    store.put(&record).await.unwrap();

    let update = Update::new()
        .set("info.rating".parse().unwrap(), 1)
        .when(Condition::compare(
            "info.rank".parse().unwrap(),
            Comparison::Gt,
            1000,
        ));
    let result = store.update(&record.key, &update).await;

    assert!(matches!(result, Err(StoreError::ConditionFailed)));
    assert_eq!(store.get(&record.key).await.unwrap(), Some(record));
}

#[tokio::test]
async fn query_returns_exactly_one_partition() {
    let store = MemoryStore::new();
    let records = sample_records();
    for record in &records {
        store.put(record).await.unwrap();
    }

    for year in [1985, 1992, 2013, 2015] {
        let found: Vec<RecordKey> = store
            .query(year)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.key)
            .collect();
        let mut expected: Vec<RecordKey> = records
            .iter()
            .filter(|record| record.key.year == year)
            .map(|record| record.key.clone())
            .collect();
        expected.sort();
        assert_eq!(found, expected, "partition {year}");
    }
}

#[tokio::test]
async fn big_new_movie_rating_reads_back_as_float() {
    let store = MemoryStore::new();
    let key = sample_key();
    let mut sink = std::io::sink();

    tutorial::put_movie(&store, &key, &mut sink).await.unwrap();
    tutorial::update_movie(&store, &key, &mut sink).await.unwrap();

    let movie = store.get(&key).await.unwrap().unwrap();
    let info = normalize_value(&movie.attributes["info"]);
    assert!(info["rating"].is_f64());
    assert_eq!(info["rating"], json!(5.5));
    assert_eq!(info["plot"], json!("Everything happens all at once."));
    assert_eq!(info["actors"], json!(["Larry", "Moe", "Curly"]));

    let before: Attributes = movie.attributes.clone();
    tutorial::increment_rating(&store, &key, &mut sink).await.unwrap();
    let after = store.get(&key).await.unwrap().unwrap().attributes;
    assert_ne!(before, after);
    assert_eq!(
        after["info"].as_map().unwrap()["rating"],
        Value::N("6.5".parse().unwrap())
    );
}
