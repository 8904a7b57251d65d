//! Response envelope: results keyed by model name, pluralized for lists.

use crate::config::ControllerConfig;
use crate::naming::pluralize;
use crate::schema::ModelDescriptor;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

/// Wrap `result` as `{<name>: result}` unless nesting is disabled.
pub fn format_output(result: Value, model: &ModelDescriptor, config: &ControllerConfig) -> Value {
    if config.disable_nested_data {
        return result;
    }
    let name = config.override_output_name.as_deref().unwrap_or(&model.name);
    let key = if result.is_array() {
        pluralize(name)
    } else {
        name.to_string()
    };
    let mut envelope = Map::with_capacity(1);
    envelope.insert(key, result);
    Value::Object(envelope)
}

#[derive(Serialize)]
pub struct StatusBody {
    pub status: &'static str,
}

/// Body of a successful delete.
pub fn status_ok() -> (StatusCode, Json<StatusBody>) {
    (StatusCode::OK, Json(StatusBody { status: "ok" }))
}
