use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ReturnValue, ScalarAttributeType,
};
use tracing::{debug, info};

use crate::config::{StoreConfig, TableSchema};
use crate::error::{Result, StoreError};
use crate::expression::{Condition, Rendered, Update, render_condition, render_update};
use crate::model::{Attributes, Record, RecordKey, Value};
use crate::store::RecordStore;

type Item = HashMap<String, AttributeValue>;

pub struct DynamoAgent {
    pub client: Client,
    schema: TableSchema,
}

impl DynamoAgent {
    /// Builds a client for the configured region and endpoint.
    pub async fn connect(config: &StoreConfig) -> Self {
        let shared_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&shared_config)
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        Self::new(client, config.schema.clone())
    }

    pub fn new(client: Client, schema: TableSchema) -> Self {
        Self { client, schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Creates the table with the (number HASH, string RANGE) key schema.
    /// Returns the table status reported by DynamoDB.
    pub async fn create_table(&self) -> Result<String> {
        let schema = &self.schema;
        info!(table = %schema.table_name, "creating table");

        let output = self
            .client
            .create_table()
            .table_name(&schema.table_name)
            .key_schema(key_schema_element(&schema.partition_key, KeyType::Hash)?)
            .key_schema(key_schema_element(&schema.sort_key, KeyType::Range)?)
            .attribute_definitions(attribute_definition(
                &schema.partition_key,
                ScalarAttributeType::N,
            )?)
            .attribute_definitions(attribute_definition(
                &schema.sort_key,
                ScalarAttributeType::S,
            )?)
            .provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(schema.read_capacity_units)
                    .write_capacity_units(schema.write_capacity_units)
                    .build()
                    .map_err(|e| StoreError::Validation(e.to_string()))?,
            )
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(output
            .table_description()
            .and_then(|table| table.table_status())
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string()))
    }

    pub async fn delete_table(&self) -> Result<()> {
        info!(table = %self.schema.table_name, "deleting table");
        self.client
            .delete_table()
            .table_name(&self.schema.table_name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DynamoAgent {
    async fn put(&self, record: &Record) -> Result<()> {
        debug!(table = %self.schema.table_name, key = %record.key, "put_item");
        self.client
            .put_item()
            .table_name(&self.schema.table_name)
            .set_item(Some(record_to_item(&self.schema, record)))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        debug!(table = %self.schema.table_name, %key, "get_item");
        let output = self
            .client
            .get_item()
            .table_name(&self.schema.table_name)
            .set_key(Some(key_map(&self.schema, key)))
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .item
            .map(|item| item_to_record(&self.schema, item))
            .transpose()
    }

    async fn update(&self, key: &RecordKey, update: &Update) -> Result<Attributes> {
        debug!(table = %self.schema.table_name, %key, actions = update.actions.len(), "update_item");
        let Rendered {
            update_expression,
            condition_expression,
            names,
            values,
        } = render_update(update)?;

        let output = self
            .client
            .update_item()
            .table_name(&self.schema.table_name)
            .set_key(Some(key_map(&self.schema, key)))
            .set_update_expression(update_expression)
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(non_empty(names))
            .set_expression_attribute_values(non_empty(values_to_avs(&values)))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(map_update_item_error)?;

        strip_key(&self.schema, output.attributes.unwrap_or_default())
    }

    async fn delete(&self, key: &RecordKey, condition: Option<&Condition>) -> Result<()> {
        debug!(table = %self.schema.table_name, %key, conditional = condition.is_some(), "delete_item");
        let mut request = self
            .client
            .delete_item()
            .table_name(&self.schema.table_name)
            .set_key(Some(key_map(&self.schema, key)));

        if let Some(condition) = condition {
            let rendered = render_condition(condition);
            request = request
                .set_condition_expression(rendered.condition_expression)
                .set_expression_attribute_names(non_empty(rendered.names))
                .set_expression_attribute_values(non_empty(values_to_avs(&rendered.values)));
        }

        request.send().await.map_err(map_delete_item_error)?;
        Ok(())
    }

    /// Follows `LastEvaluatedKey` until the whole partition has been read.
    async fn query(&self, year: i64) -> Result<Vec<Record>> {
        debug!(table = %self.schema.table_name, year, "query");
        let mut results = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.schema.table_name)
                .key_condition_expression("#pk = :pk_val")
                .expression_attribute_names("#pk", &self.schema.partition_key)
                .expression_attribute_values(":pk_val", AttributeValue::N(year.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(sdk_error)?;

            for item in output.items.unwrap_or_default() {
                results.push(item_to_record(&self.schema, item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(results)
    }
}

fn key_map(schema: &TableSchema, key: &RecordKey) -> Item {
    HashMap::from([
        (
            schema.partition_key.clone(),
            AttributeValue::N(key.year.to_string()),
        ),
        (schema.sort_key.clone(), AttributeValue::S(key.title.clone())),
    ])
}

fn record_to_item(schema: &TableSchema, record: &Record) -> Item {
    let mut item: Item = record
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), value_to_av(v)))
        .collect();
    item.extend(key_map(schema, &record.key));
    item
}

fn item_to_record(schema: &TableSchema, mut item: Item) -> Result<Record> {
    let year = match item.remove(&schema.partition_key) {
        Some(AttributeValue::N(n)) => n
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidKey(format!("partition key {n:?}")))?,
        other => {
            return Err(StoreError::InvalidKey(format!(
                "missing numeric {} in item: {other:?}",
                schema.partition_key
            )));
        }
    };
    let title = match item.remove(&schema.sort_key) {
        Some(AttributeValue::S(s)) => s,
        other => {
            return Err(StoreError::InvalidKey(format!(
                "missing string {} in item: {other:?}",
                schema.sort_key
            )));
        }
    };
    Ok(Record::new(RecordKey::new(year, title), item_to_attributes(item)?))
}

/// Attributes of an item returned by UpdateItem, without the key.
fn strip_key(schema: &TableSchema, mut item: Item) -> Result<Attributes> {
    item.remove(&schema.partition_key);
    item.remove(&schema.sort_key);
    item_to_attributes(item)
}

fn key_schema_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| StoreError::Validation(e.to_string()))
}

fn attribute_definition(
    name: &str,
    attribute_type: ScalarAttributeType,
) -> Result<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(attribute_type)
        .build()
        .map_err(|e| StoreError::Validation(e.to_string()))
}

/// Any SDK failure, with the full error chain kept in the message.
fn sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    StoreError::DynamoDb(DisplayErrorContext(&err).to_string())
}

fn map_update_item_error<R: Debug>(err: SdkError<UpdateItemError, R>) -> StoreError {
    match err {
        SdkError::ServiceError(ref service)
            if matches!(
                service.err(),
                UpdateItemError::ConditionalCheckFailedException(_)
            ) =>
        {
            StoreError::ConditionFailed
        }
        err => sdk_error(err),
    }
}

fn map_delete_item_error<R: Debug>(err: SdkError<DeleteItemError, R>) -> StoreError {
    match err {
        SdkError::ServiceError(ref service)
            if matches!(
                service.err(),
                DeleteItemError::ConditionalCheckFailedException(_)
            ) =>
        {
            StoreError::ConditionFailed
        }
        err => sdk_error(err),
    }
}

/// DynamoDB rejects empty expression maps; they must be left unset.
fn non_empty<V>(map: HashMap<String, V>) -> Option<HashMap<String, V>> {
    (!map.is_empty()).then_some(map)
}

fn values_to_avs(values: &HashMap<String, Value>) -> Item {
    values
        .iter()
        .map(|(k, v)| (k.clone(), value_to_av(v)))
        .collect()
}

// Helper: Convert Value to AttributeValue
fn value_to_av(value: &Value) -> AttributeValue {
    match value {
        Value::S(s) => AttributeValue::S(s.clone()),
        Value::N(n) => AttributeValue::N(n.to_string()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Null => AttributeValue::Null(true),
        Value::L(items) => AttributeValue::L(items.iter().map(value_to_av).collect()),
        Value::M(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_av(v)))
                .collect(),
        ),
    }
}

// Helper: Convert AttributeValue to Value
fn av_to_value(av: &AttributeValue) -> Result<Value> {
    match av {
        AttributeValue::S(s) => Ok(Value::S(s.clone())),
        AttributeValue::N(n) => Ok(Value::N(n.parse()?)),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(lst) => Ok(Value::L(
            lst.iter().map(av_to_value).collect::<Result<_>>()?,
        )),
        AttributeValue::M(map) => {
            let mut attributes = Attributes::new();
            for (k, v) in map {
                attributes.insert(k.clone(), av_to_value(v)?);
            }
            Ok(Value::M(attributes))
        }
        other => Err(StoreError::Deserialization(format!(
            "Unsupported AttributeValue: {other:?}"
        ))),
    }
}

fn item_to_attributes(item: Item) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for (k, v) in item {
        attributes.insert(k, av_to_value(&v)?);
    }
    Ok(attributes)
}
