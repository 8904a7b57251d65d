//! Route handlers for one resource: list, read, create, update, delete.

use crate::error::AppError;
use crate::extractors::body::resolve_body;
use crate::extractors::{JsonBody, ResourceRequest};
use crate::handlers::records::{self, input_from_body};
use crate::query::build_query;
use crate::state::ControllerState;
use crate::store::Record;
use axum::{body::Bytes, extract::State, response::Response, Extension};
use std::sync::Arc;

fn build(state: &ControllerState, request: &ResourceRequest) -> crate::query::QueryDescriptor {
    build_query(&request.method, request, &state.model, &state.config)
}

pub(crate) fn read_input(
    state: &ControllerState,
    parsed: Option<Extension<JsonBody>>,
    raw: &Bytes,
) -> Result<Record, AppError> {
    let body = resolve_body(parsed.map(|Extension(b)| b), raw)?;
    input_from_body(body, &state.model, state.config.disable_nested_data)
}

pub async fn list(State(state): State<Arc<ControllerState>>, request: ResourceRequest) -> Result<Response, AppError> {
    records::find_all(&state, build(&state, &request)).await
}

pub async fn read(State(state): State<Arc<ControllerState>>, request: ResourceRequest) -> Result<Response, AppError> {
    records::find_one(&state, build(&state, &request)).await
}

pub async fn create(
    State(state): State<Arc<ControllerState>>,
    request: ResourceRequest,
    parsed: Option<Extension<JsonBody>>,
    raw: Bytes,
) -> Result<Response, AppError> {
    let input = read_input(&state, parsed, &raw)?;
    records::create(&state, input, build(&state, &request)).await
}

pub async fn update(
    State(state): State<Arc<ControllerState>>,
    request: ResourceRequest,
    parsed: Option<Extension<JsonBody>>,
    raw: Bytes,
) -> Result<Response, AppError> {
    let input = read_input(&state, parsed, &raw)?;
    let id = request.id.clone().unwrap_or_default();
    records::update(&state, &id, input, build(&state, &request)).await
}

pub async fn delete(State(state): State<Arc<ControllerState>>, request: ResourceRequest) -> Result<Response, AppError> {
    records::delete(&state, build(&state, &request)).await
}
