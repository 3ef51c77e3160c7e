//! Movies tutorial on DynamoDB: create the table, load sample data, and run
//! put/get/update/delete/query against it, or against an in-memory stand-in.

pub mod agent;
pub mod config;
pub mod decimal;
pub mod error;
pub mod expression;
pub mod loader;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod store;
pub mod tutorial;

pub use agent::DynamoAgent;
pub use config::{StoreConfig, TableSchema};
pub use decimal::Decimal;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use model::{Attributes, Record, RecordKey, Value};
pub use store::RecordStore;
