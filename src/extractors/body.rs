//! JSON body layer: parses the request body once, ahead of caller middleware.

use crate::error::AppError;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

/// Parsed request body, stored as a request extension.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonBody(pub Value);

impl JsonBody {
    pub fn empty() -> Self {
        JsonBody(Value::Object(Map::new()))
    }
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(true)
}

/// Parse raw bytes: empty bodies become `{}`, malformed JSON is a 400.
pub fn parse_body(bytes: &[u8]) -> Result<JsonBody, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonBody::empty());
    }
    serde_json::from_slice(bytes)
        .map(JsonBody)
        .map_err(|e| AppError::BadRequest(format!("malformed JSON body: {}", e)))
}

/// Middleware: read at most `limit` bytes, parse them, attach `JsonBody`, and pass the
/// original bytes on.
pub async fn parse_json_body(State(limit): State<usize>, request: Request, next: Next) -> Response {
    if !is_json(&request) {
        let mut request = request;
        request.extensions_mut().insert(JsonBody::empty());
        return next.run(request).await;
    }
    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => return AppError::BadRequest(format!("failed to read request body: {}", e)).into_response(),
    };
    match parse_body(&bytes) {
        Ok(parsed) => {
            parts.extensions.insert(parsed);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(e) => e.into_response(),
    }
}

/// Body for a handler: the layer's parse if present, otherwise the raw bytes.
pub(crate) fn resolve_body(parsed: Option<JsonBody>, raw: &Bytes) -> Result<JsonBody, AppError> {
    match parsed {
        Some(body) => Ok(body),
        None => parse_body(raw),
    }
}
