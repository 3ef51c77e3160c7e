//! In-memory record store.
//!
//! Follows DynamoDB's item semantics closely enough to stand in for the real
//! table in tests: updates upsert, conditions see key attributes, nested sets
//! need an existing parent, and records come back from `query` in sort key
//! order. Data lives only as long as the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::TableSchema;
use crate::decimal::Decimal;
use crate::error::{Result, StoreError};
use crate::expression::{AttrPath, Comparison, Condition, Operand, PathSegment, Update, UpdateAction};
use crate::model::{Attributes, Record, RecordKey, Value};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    schema: TableSchema,
    records: Arc<RwLock<BTreeMap<RecordKey, Attributes>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_schema(TableSchema::default())
    }

    pub fn with_schema(schema: TableSchema) -> Self {
        Self {
            schema,
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        name == self.schema.partition_key || name == self.schema.sort_key
    }

    /// The item as conditions see it: attributes plus the key attributes.
    fn item_view(&self, key: &RecordKey, attributes: &Attributes) -> Attributes {
        let mut item = attributes.clone();
        item.insert(self.schema.partition_key.clone(), Value::from(key.year));
        item.insert(self.schema.sort_key.clone(), Value::from(key.title.as_str()));
        item
    }

    fn check_condition(
        &self,
        key: &RecordKey,
        current: Option<&Attributes>,
        condition: &Condition,
    ) -> Result<()> {
        let item = current
            .map(|attributes| self.item_view(key, attributes))
            .unwrap_or_default();
        if evaluate(condition, &item) {
            Ok(())
        } else {
            Err(StoreError::ConditionFailed)
        }
    }

    fn validate_update(&self, update: &Update) -> Result<()> {
        if update.actions.is_empty() {
            return Err(StoreError::Validation(
                "an update needs at least one action".to_string(),
            ));
        }
        for (i, action) in update.actions.iter().enumerate() {
            let path = action.path();
            if self.is_key_attribute(path.root()) {
                return Err(StoreError::Validation(format!(
                    "Cannot update attribute {}. This attribute is part of the key",
                    path.root()
                )));
            }
            if update.actions[..i].iter().any(|a| a.path().overlaps(path)) {
                return Err(StoreError::Validation(format!(
                    "Two document paths overlap with each other: {path}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, record: &Record) -> Result<()> {
        debug!(key = %record.key, "put");
        let mut attributes = record.attributes.clone();
        attributes.retain(|name, _| !self.is_key_attribute(name));
        self.records
            .write()
            .await
            .insert(record.key.clone(), attributes);
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        debug!(%key, "get");
        let records = self.records.read().await;
        Ok(records
            .get(key)
            .map(|attributes| Record::new(key.clone(), attributes.clone())))
    }

    async fn update(&self, key: &RecordKey, update: &Update) -> Result<Attributes> {
        debug!(%key, actions = update.actions.len(), "update");
        self.validate_update(update)?;

        let mut records = self.records.write().await;
        let current = records.get(key);
        if let Some(condition) = &update.condition {
            self.check_condition(key, current, condition)?;
        }

        let mut next = current.cloned().unwrap_or_default();
        apply_actions(&mut next, &update.actions)?;
        records.insert(key.clone(), next.clone());
        Ok(next)
    }

    async fn delete(&self, key: &RecordKey, condition: Option<&Condition>) -> Result<()> {
        debug!(%key, conditional = condition.is_some(), "delete");
        let mut records = self.records.write().await;
        if let Some(condition) = condition {
            self.check_condition(key, records.get(key), condition)?;
        }
        records.remove(key);
        Ok(())
    }

    async fn query(&self, year: i64) -> Result<Vec<Record>> {
        debug!(year, "query");
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|(key, _)| key.year == year)
            .map(|(key, attributes)| Record::new(key.clone(), attributes.clone()))
            .collect())
    }
}

fn resolve<'a>(item: &'a Attributes, path: &AttrPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = match first {
        PathSegment::Field(name) => item.get(name)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Field(name), Value::M(map)) => map.get(name)?,
            (PathSegment::Index(index), Value::L(list)) => list.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_mut<'a>(item: &'a mut Attributes, segments: &[PathSegment]) -> Option<&'a mut Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = match first {
        PathSegment::Field(name) => item.get_mut(name)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Field(name), Value::M(map)) => map.get_mut(name)?,
            (PathSegment::Index(index), Value::L(list)) => list.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn invalid_path(path: &AttrPath) -> StoreError {
    StoreError::Validation(format!(
        "The document path provided in the update expression is invalid for update: {path}"
    ))
}

fn set_path(item: &mut Attributes, path: &AttrPath, value: Value) -> Result<()> {
    let (last, parents) = path
        .segments()
        .split_last()
        .ok_or_else(|| invalid_path(path))?;

    if parents.is_empty() {
        return match last {
            PathSegment::Field(name) => {
                item.insert(name.clone(), value);
                Ok(())
            }
            PathSegment::Index(_) => Err(invalid_path(path)),
        };
    }

    match (last, resolve_mut(item, parents)) {
        (PathSegment::Field(name), Some(Value::M(map))) => {
            map.insert(name.clone(), value);
        }
        // An index past the end appends.
        (PathSegment::Index(index), Some(Value::L(list))) => match list.get_mut(*index) {
            Some(slot) => *slot = value,
            None => list.push(value),
        },
        _ => return Err(invalid_path(path)),
    }
    Ok(())
}

fn remove_path(item: &mut Attributes, path: &AttrPath) -> Result<()> {
    let (last, parents) = path
        .segments()
        .split_last()
        .ok_or_else(|| invalid_path(path))?;

    if parents.is_empty() {
        if let PathSegment::Field(name) = last {
            item.remove(name);
        }
        return Ok(());
    }

    match (last, resolve_mut(item, parents)) {
        (PathSegment::Field(name), Some(Value::M(map))) => {
            map.remove(name);
        }
        (PathSegment::Index(index), Some(Value::L(list))) => {
            if *index < list.len() {
                list.remove(*index);
            }
        }
        _ => return Err(invalid_path(path)),
    }
    Ok(())
}

fn increment_path(item: &mut Attributes, path: &AttrPath, by: Decimal) -> Result<()> {
    let current = match resolve(item, path) {
        Some(Value::N(n)) => *n,
        Some(other) => {
            return Err(StoreError::Validation(format!(
                "An operand in the update expression has an incorrect data type: {path} is {}",
                other.type_name()
            )));
        }
        None => {
            return Err(StoreError::Validation(format!(
                "The provided expression refers to an attribute that does not exist in the item: {path}"
            )));
        }
    };
    set_path(item, path, Value::N(current.checked_add(by)?))
}

/// Sets and increments apply in order; removes go last, deepest index first,
/// so each index refers to the list as it was before the update.
fn apply_actions(item: &mut Attributes, actions: &[UpdateAction]) -> Result<()> {
    let mut removes = Vec::new();
    for action in actions {
        match action {
            UpdateAction::Set { path, value } => set_path(item, path, value.clone())?,
            UpdateAction::Increment { path, by } => increment_path(item, path, *by)?,
            UpdateAction::Remove { path } => removes.push(path),
        }
    }
    removes.sort_by(|a, b| b.cmp(a));
    for path in removes {
        remove_path(item, path)?;
    }
    Ok(())
}

fn size_of(value: &Value) -> Option<i64> {
    let size = match value {
        Value::S(s) => s.chars().count(),
        Value::L(list) => list.len(),
        Value::M(map) => map.len(),
        _ => return None,
    };
    i64::try_from(size).ok()
}

fn compare(lhs: &Value, op: Comparison, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::N(a), Value::N(b)) => Some(a.cmp(b)),
        (Value::S(a), Value::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        _ => None,
    };
    match op {
        Comparison::Eq => lhs == rhs,
        Comparison::Ne => lhs != rhs,
        Comparison::Lt => ordering.is_some_and(|o| o.is_lt()),
        Comparison::Le => ordering.is_some_and(|o| o.is_le()),
        Comparison::Gt => ordering.is_some_and(|o| o.is_gt()),
        Comparison::Ge => ordering.is_some_and(|o| o.is_ge()),
    }
}

/// Evaluates a condition against an item. Missing attributes make
/// comparisons false.
pub fn evaluate(condition: &Condition, item: &Attributes) -> bool {
    match condition {
        Condition::Compare { operand, op, value } => {
            let lhs = match operand {
                Operand::Path(path) => resolve(item, path).cloned(),
                Operand::Size(path) => resolve(item, path).and_then(size_of).map(Value::from),
            };
            lhs.is_some_and(|lhs| compare(&lhs, *op, value))
        }
        Condition::AttributeExists(path) => resolve(item, path).is_some(),
        Condition::AttributeNotExists(path) => resolve(item, path).is_none(),
        Condition::And(parts) => parts.iter().all(|part| evaluate(part, item)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> AttrPath {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn big_new_movie() -> Record {
        Record::new(
            RecordKey::new(2015, "The Big New Movie"),
            Attributes::from([(
                "info".to_string(),
                Value::M(Attributes::from([
                    ("plot".to_string(), Value::from("Nothing happens at all.")),
                    ("rating".to_string(), Value::from(0)),
                ])),
            )]),
        )
    }

    fn info(attributes: &Attributes) -> &Attributes {
        attributes["info"].as_map().unwrap()
    }

    // ==================== Put / Get ====================

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let movie = big_new_movie();

        store.put(&movie).await.unwrap();

        let retrieved = store.get(&movie.key).await.unwrap();
        assert_eq!(retrieved, Some(movie));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = MemoryStore::new();
        let result = store.get(&RecordKey::new(1999, "Nothing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        let mut movie = big_new_movie();
        store.put(&movie).await.unwrap();

        movie.attributes = Attributes::from([("rank".to_string(), Value::from(1))]);
        store.put(&movie).await.unwrap();

        let retrieved = store.get(&movie.key).await.unwrap().unwrap();
        assert_eq!(retrieved.attributes, movie.attributes);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_drops_key_attributes_from_bag() {
        let store = MemoryStore::new();
        let mut movie = big_new_movie();
        movie
            .attributes
            .insert("year".to_string(), Value::from(1900));
        store.put(&movie).await.unwrap();

        let retrieved = store.get(&movie.key).await.unwrap().unwrap();
        assert!(retrieved.get("year").is_none());
        assert_eq!(retrieved.key.year, 2015);
    }

    // ==================== Update ====================

    #[tokio::test]
    async fn test_update_sets_nested_fields() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        let update = Update::new()
            .set(path("info.rating"), dec("5.5"))
            .set(path("info.plot"), "Everything happens all at once.")
            .set(path("info.actors"), vec!["Larry", "Moe", "Curly"]);
        let attributes = store.update(&movie.key, &update).await.unwrap();

        let info = info(&attributes);
        assert_eq!(info["rating"], Value::N(dec("5.5")));
        assert_eq!(info["plot"], Value::from("Everything happens all at once."));
        assert_eq!(info["actors"], Value::from(vec!["Larry", "Moe", "Curly"]));

        let stored = store.get(&movie.key).await.unwrap().unwrap();
        assert_eq!(stored.attributes, attributes);
    }

    #[tokio::test]
    async fn test_update_increments() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        let update = Update::new().increment(path("info.rating"), dec("1"));
        store.update(&movie.key, &update).await.unwrap();
        let attributes = store.update(&movie.key, &update).await.unwrap();

        assert_eq!(info(&attributes)["rating"], Value::from(2));
    }

    #[tokio::test]
    async fn test_update_missing_record_creates_it() {
        let store = MemoryStore::new();
        let key = RecordKey::new(2020, "Fresh");

        store
            .update(&key, &Update::new().set(path("rank"), 7))
            .await
            .unwrap();

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.get("rank"), Some(&Value::from(7)));
    }

    #[tokio::test]
    async fn test_update_with_false_condition_leaves_record_unchanged() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();
        store
            .update(
                &movie.key,
                &Update::new().set(path("info.actors"), vec!["Larry", "Moe", "Curly"]),
            )
            .await
            .unwrap();
        let before = store.get(&movie.key).await.unwrap();

        let update = Update::new()
            .remove(path("info.actors[0]"))
            .when(Condition::size(path("info.actors"), Comparison::Gt, 3));
        let result = store.update(&movie.key, &update).await;

        assert!(matches!(result, Err(StoreError::ConditionFailed)));
        assert_eq!(store.get(&movie.key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_with_true_condition_removes_list_element() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();
        store
            .update(
                &movie.key,
                &Update::new().set(path("info.actors"), vec!["Larry", "Moe", "Curly"]),
            )
            .await
            .unwrap();

        let update = Update::new()
            .remove(path("info.actors[0]"))
            .when(Condition::size(path("info.actors"), Comparison::Ge, 3));
        let attributes = store.update(&movie.key, &update).await.unwrap();

        assert_eq!(info(&attributes)["actors"], Value::from(vec!["Moe", "Curly"]));
    }

    #[tokio::test]
    async fn test_remove_indexes_refer_to_original_list() {
        let store = MemoryStore::new();
        let key = RecordKey::new(2001, "List");
        store
            .update(&key, &Update::new().set(path("cast"), vec!["a", "b", "c", "d"]))
            .await
            .unwrap();

        let update = Update::new()
            .remove(path("cast[0]"))
            .remove(path("cast[2]"));
        let attributes = store.update(&key, &update).await.unwrap();

        assert_eq!(attributes["cast"], Value::from(vec!["b", "d"]));
    }

    #[tokio::test]
    async fn test_set_under_missing_parent_is_rejected() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        let result = store
            .update(&movie.key, &Update::new().set(path("details.budget"), 10))
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_increment_requires_existing_number() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        let missing = store
            .update(&movie.key, &Update::new().increment(path("info.rank"), dec("1")))
            .await;
        assert!(matches!(missing, Err(StoreError::Validation(_))));

        let not_a_number = store
            .update(&movie.key, &Update::new().increment(path("info.plot"), dec("1")))
            .await;
        assert!(matches!(not_a_number, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_key_attributes_and_overlaps() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        let key_update = store
            .update(&movie.key, &Update::new().set(path("year"), 2016))
            .await;
        assert!(matches!(key_update, Err(StoreError::Validation(_))));

        let overlapping = store
            .update(
                &movie.key,
                &Update::new()
                    .set(path("info"), Attributes::new())
                    .set(path("info.rating"), 1),
            )
            .await;
        assert!(matches!(overlapping, Err(StoreError::Validation(_))));

        let empty = store.update(&movie.key, &Update::new()).await;
        assert!(matches!(empty, Err(StoreError::Validation(_))));
    }

    // ==================== Delete ====================

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();

        store.delete(&movie.key, None).await.unwrap();

        assert!(store.get(&movie.key).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        store.put(&movie).await.unwrap();
        store
            .update(&movie.key, &Update::new().set(path("info.rating"), dec("6.5")))
            .await
            .unwrap();

        let condition = Condition::compare(path("info.rating"), Comparison::Le, 5);
        let result = store.delete(&movie.key, Some(&condition)).await;
        assert!(matches!(result, Err(StoreError::ConditionFailed)));
        assert!(store.get(&movie.key).await.unwrap().is_some());

        let condition = Condition::compare(path("info.rating"), Comparison::Le, 7);
        store.delete(&movie.key, Some(&condition)).await.unwrap();
        assert!(store.get(&movie.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_delete_of_missing_record_fails() {
        let store = MemoryStore::new();
        let condition = Condition::AttributeExists(path("info"));
        let result = store
            .delete(&RecordKey::new(1900, "Ghost"), Some(&condition))
            .await;
        assert!(matches!(result, Err(StoreError::ConditionFailed)));
    }

    // ==================== Query ====================

    #[tokio::test]
    async fn test_query_returns_partition_in_sort_key_order() {
        let store = MemoryStore::new();
        for (year, title) in [
            (1985, "Witness"),
            (1985, "Brazil"),
            (1986, "Aliens"),
            (1985, "Back to the Future"),
        ] {
            store
                .put(&Record::new(RecordKey::new(year, title), Attributes::new()))
                .await
                .unwrap();
        }

        let titles: Vec<String> = store
            .query(1985)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.key.title)
            .collect();
        assert_eq!(titles, vec!["Back to the Future", "Brazil", "Witness"]);

        assert!(store.query(1999).await.unwrap().is_empty());
    }

    // ==================== Conditions ====================

    #[test]
    fn test_condition_sees_key_attributes() {
        let store = MemoryStore::new();
        let movie = big_new_movie();
        let item = store.item_view(&movie.key, &movie.attributes);

        assert!(evaluate(
            &Condition::compare(path("year"), Comparison::Eq, 2015),
            &item
        ));
        assert!(evaluate(
            &Condition::compare(path("title"), Comparison::Ge, "The"),
            &item
        ));
    }

    #[test]
    fn test_comparison_across_types_is_false() {
        let item = Attributes::from([("rating".to_string(), Value::from("high"))]);
        assert!(!evaluate(
            &Condition::compare(path("rating"), Comparison::Gt, 5),
            &item
        ));
        assert!(evaluate(
            &Condition::compare(path("rating"), Comparison::Ne, 5),
            &item
        ));
    }

    #[test]
    fn test_size_and_existence() {
        let item = Attributes::from([
            ("title".to_string(), Value::from("Héros")),
            ("tags".to_string(), Value::from(vec!["a", "b"])),
        ]);
        assert!(evaluate(
            &Condition::size(path("title"), Comparison::Eq, 5),
            &item
        ));
        assert!(evaluate(
            &Condition::And(vec![
                Condition::size(path("tags"), Comparison::Lt, 3),
                Condition::AttributeExists(path("tags[1]")),
                Condition::AttributeNotExists(path("tags[2]")),
            ]),
            &item
        ));
        assert!(!evaluate(
            &Condition::size(path("missing"), Comparison::Ge, 0),
            &item
        ));
    }
}
