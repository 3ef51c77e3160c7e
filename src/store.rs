use async_trait::async_trait;

use crate::error::Result;
use crate::expression::{Condition, Update};
use crate::model::{Attributes, Record, RecordKey};

/// The narrow surface every movie table backend provides.
///
/// `get` reports a missing record as `Ok(None)`. A conditional `update` or
/// `delete` whose condition does not hold fails with
/// [`StoreError::ConditionFailed`](crate::error::StoreError::ConditionFailed)
/// and leaves the record untouched.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes the full record, replacing any record with the same key.
    async fn put(&self, record: &Record) -> Result<()>;

    async fn get(&self, key: &RecordKey) -> Result<Option<Record>>;

    /// Applies the update's actions and returns all attributes afterwards.
    async fn update(&self, key: &RecordKey, update: &Update) -> Result<Attributes>;

    async fn delete(&self, key: &RecordKey, condition: Option<&Condition>) -> Result<()>;

    /// All records of one partition, ordered by sort key.
    async fn query(&self, year: i64) -> Result<Vec<Record>>;
}
