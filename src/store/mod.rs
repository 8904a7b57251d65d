//! Record store interface and its implementations.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::query::QueryDescriptor;
use crate::schema::{Generated, ModelDescriptor, Schema, UPDATED_AT};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// One row: field name to JSON value.
pub type Record = Map<String, Value>;

/// Backing store flavour. Postgres searches case-insensitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Memory,
    Postgres,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Memory => "memory",
            Dialect::Postgres => "postgres",
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Models this store can serve.
    fn schema(&self) -> &Schema;

    fn dialect(&self) -> Dialect;

    async fn find_one(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Option<Record>, AppError>;

    async fn find_all(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Vec<Record>, AppError>;

    async fn count(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError>;

    /// Insert `input`, filling defaults and generated values. Fails with
    /// Validation, UniqueConstraint, ForeignKeyConstraint or Database.
    async fn create(&self, model: &ModelDescriptor, input: Record, query: &QueryDescriptor) -> Result<Record, AppError>;

    /// Persist a loaded-and-merged row currently stored under primary key `id`.
    async fn update(&self, model: &ModelDescriptor, id: &Value, record: Record) -> Result<Record, AppError>;

    /// Delete matching rows, returning how many went.
    async fn destroy(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError>;
}

/// Keep only the model's own fields.
pub(crate) fn model_fields(model: &ModelDescriptor, input: Record) -> Record {
    input.into_iter().filter(|(k, _)| model.has_field(k)).collect()
}

pub(crate) fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Row to insert: the model's fields from `input`, plus defaults, generated
/// uuids and timestamps. Auto-increment keys are left to the store.
pub(crate) fn prepare_insert(model: &ModelDescriptor, input: Record) -> Record {
    let mut row = model_fields(model, input);
    for field in &model.fields {
        let missing = row.get(&field.name).map(Value::is_null).unwrap_or(true);
        match field.generated {
            Some(Generated::CreatedAt) | Some(Generated::UpdatedAt) => {
                row.insert(field.name.clone(), now());
            }
            Some(Generated::Uuid) if missing => {
                row.insert(field.name.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
            Some(_) => {}
            None => {
                if let (false, Some(default)) = (row.contains_key(&field.name), &field.default) {
                    row.insert(field.name.clone(), default.clone());
                }
            }
        }
    }
    row
}

/// Merge changed fields into a loaded row. Timestamps are store-owned.
pub(crate) fn merge_update(model: &ModelDescriptor, mut row: Record, changes: Record) -> Record {
    for (name, value) in model_fields(model, changes) {
        let store_owned = model
            .field(&name)
            .map(|f| matches!(f.generated, Some(Generated::CreatedAt) | Some(Generated::UpdatedAt)))
            .unwrap_or(false);
        if !store_owned {
            row.insert(name, value);
        }
    }
    if model.timestamps && model.has_field(UPDATED_AT) {
        row.insert(UPDATED_AT.to_string(), now());
    }
    row
}

/// Restrict a row to `attributes`, if given.
pub(crate) fn project(record: Record, attributes: Option<&[String]>) -> Record {
    match attributes {
        None => record,
        Some(attrs) => record.into_iter().filter(|(k, _)| attrs.iter().any(|a| a == k)).collect(),
    }
}
