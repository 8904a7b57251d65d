#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use restgen::{FieldConfig, FieldType, MemoryStore, ModelConfig, OnDelete, RecordStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub fn models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("author")
            .field(FieldConfig::new("name", FieldType::Text).not_null())
            .has_many("post", "authorId"),
        ModelConfig::new("post")
            .field(FieldConfig::new("title", FieldType::Text))
            .field(FieldConfig::new("authorId", FieldType::Integer).references("author", OnDelete::Restrict))
            .belongs_to("author", "authorId"),
    ]
}

pub fn store() -> Arc<dyn RecordStore> {
    Arc::new(MemoryStore::from_models(&models()).unwrap())
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Two authors, Bud (1) and Frank (2); posts 1 and 2 by Bud, post 3 by Frank.
pub async fn seed(app: &Router) {
    for name in ["Bud", "Frank"] {
        let (status, _) = send(app, "POST", "/authors", Some(json!({"author": {"name": name}}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    for (title, author) in [("first", 1), ("second", 1), ("third", 2)] {
        let (status, _) = send(
            app,
            "POST",
            "/posts",
            Some(json!({"post": {"title": title, "authorId": author}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

pub fn len(body: &Value, key: &str) -> usize {
    body[key].as_array().map(Vec::len).unwrap_or_default()
}
