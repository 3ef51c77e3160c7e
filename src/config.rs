//! Store configuration (pure data, no I/O).

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Local DynamoDB endpoint the tutorial runs against.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

pub const DEFAULT_TABLE_NAME: &str = "Movies";

/// Key schema and throughput of the movies table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    /// Numeric partition key attribute.
    pub partition_key: String,
    /// String sort key attribute.
    pub sort_key: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            partition_key: "year".to_string(),
            sort_key: "title".to_string(),
            read_capacity_units: 10,
            write_capacity_units: 10,
        }
    }
}

impl TableSchema {
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }
}

/// Everything needed to reach the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub region: String,
    /// `None` targets the managed service for `region`.
    pub endpoint_url: Option<String>,
    pub schema: TableSchema,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: Some(DEFAULT_ENDPOINT.to_string()),
            schema: TableSchema::default(),
        }
    }
}

impl StoreConfig {
    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    /// Human-readable description of where requests go.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({url})"),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_local_movies_table() {
        let config = StoreConfig::default();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.table_name(), "Movies");
        assert_eq!(config.schema.partition_key, "year");
        assert_eq!(config.schema.sort_key, "title");
    }

    #[test]
    fn test_target_display() {
        let local = StoreConfig::default();
        assert_eq!(
            local.target_display(),
            "Local DynamoDB (http://localhost:8000)"
        );

        let remote = StoreConfig {
            endpoint_url: None,
            ..StoreConfig::default()
        };
        assert_eq!(remote.target_display(), "AWS DynamoDB (region: us-west-2)");
    }

    #[test]
    fn test_with_table_name() {
        let schema = TableSchema::default().with_table_name("MoviesTest");
        assert_eq!(schema.table_name, "MoviesTest");
        assert_eq!(schema.partition_key, "year");
    }
}
