//! restgen: REST CRUD routes for axum, generated from model definitions.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod naming;
pub mod query;
pub mod response;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{ControllerConfig, ControllerOptions, HandlerOptions, Hooks, Middleware};
pub use error::{AppError, ConfigError, FieldError};
pub use extractors::{JsonBody, ResourceRequest};
pub use query::{build_query, Condition, QueryDescriptor};
pub use response::format_output;
pub use routes::{create_controller, create_router, ModelRef, RouterEntry};
pub use schema::{load_from_path, FieldConfig, FieldType, ModelConfig, ModelDescriptor, OnDelete, Schema};
pub use store::{Dialect, MemoryStore, PgStore, Record, RecordStore};
