//! Record operations: store calls shaped into HTTP responses.
//! Every store failure is turned into a response by the error classifier.

use crate::error::AppError;
use crate::extractors::JsonBody;
use crate::query::QueryDescriptor;
use crate::response::{format_output, status_ok};
use crate::schema::{value_matches, ModelDescriptor};
use crate::state::ControllerState;
use crate::store::Record;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

fn respond(state: &ControllerState, status: StatusCode, result: Value) -> Response {
    (status, Json(format_output(result, &state.model, &state.config))).into_response()
}

/// The record payload of a request body: `body[model]` unless nesting is disabled.
/// A missing envelope key yields an empty record so validation names the missing fields.
pub fn input_from_body(body: JsonBody, model: &ModelDescriptor, disable_nested_data: bool) -> Result<Record, AppError> {
    let Value::Object(mut body) = body.0 else {
        return Err(AppError::BadRequest("request body must be a JSON object".into()));
    };
    if disable_nested_data {
        return Ok(body);
    }
    match body.remove(&model.name) {
        None | Some(Value::Null) => Ok(Record::new()),
        Some(Value::Object(input)) => Ok(input),
        Some(_) => Err(AppError::BadRequest(format!("'{}' must be a JSON object", model.name))),
    }
}

pub async fn find_one(state: &ControllerState, query: QueryDescriptor) -> Result<Response, AppError> {
    let row = state
        .store
        .find_one(&state.model, &query)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(respond(state, StatusCode::OK, Value::Object(row)))
}

pub async fn find_all(state: &ControllerState, query: QueryDescriptor) -> Result<Response, AppError> {
    let rows = state.store.find_all(&state.model, &query).await?;
    let rows = rows.into_iter().map(Value::Object).collect();
    Ok(respond(state, StatusCode::OK, Value::Array(rows)))
}

pub async fn create(state: &ControllerState, input: Record, query: QueryDescriptor) -> Result<Response, AppError> {
    let mut row = state.store.create(&state.model, input, &query).await?;
    state.config.hooks.run_after_create(&state.model, &mut row);
    Ok(respond(state, StatusCode::CREATED, Value::Object(row)))
}

/// Reject a body whose primary key differs from the addressed record, unless allowed.
pub fn check_primary_key_change(state: &ControllerState, id: &str, input: &Record) -> Result<(), AppError> {
    if state.config.allow_changing_primary_key {
        return Ok(());
    }
    let pk = &state.model.primary_key;
    match input.get(pk) {
        Some(value) if !value_matches(value, id) => {
            tracing::warn!(model = %state.model.name, id = %id, "rejected primary key change");
            Err(AppError::validation(pk, "cannot change record primary key"))
        }
        _ => Ok(()),
    }
}

pub async fn update(state: &ControllerState, id: &str, input: Record, query: QueryDescriptor) -> Result<Response, AppError> {
    check_primary_key_change(state, id, &input)?;

    let model = &state.model;
    let mut row = state
        .store
        .find_one(model, &query)
        .await?
        .ok_or(AppError::NotFound)?;
    let stored_key = row
        .get(&model.primary_key)
        .cloned()
        .unwrap_or_else(|| model.coerce(&model.primary_key, id));
    for (field, value) in input {
        if model.has_field(&field) {
            row.insert(field, value);
        }
    }

    state.config.hooks.run_before_update(model, &mut row);
    let mut saved = state.store.update(model, &stored_key, row).await?;
    state.config.hooks.run_after_update(model, &mut saved);
    Ok(respond(state, StatusCode::OK, Value::Object(saved)))
}

pub async fn delete(state: &ControllerState, query: QueryDescriptor) -> Result<Response, AppError> {
    let affected = state.store.destroy(&state.model, &query).await?;
    if affected != 1 {
        return Err(AppError::NotFound);
    }
    Ok(status_ok().into_response())
}
