//! Nested child-resource handlers. Same record operations, scoped to the parent
//! through the child's foreign key.

use crate::error::AppError;
use crate::extractors::{JsonBody, ResourceRequest};
use crate::handlers::records;
use crate::handlers::resource::read_input;
use crate::query::{build_query, Condition, QueryDescriptor};
use crate::state::ChildState;
use axum::{body::Bytes, extract::State, response::Response, Extension};
use std::sync::Arc;

impl ChildState {
    /// Build the child's query, then pin the foreign key to the parent and drop includes.
    pub fn scoped_query(&self, request: &ResourceRequest) -> QueryDescriptor {
        let model = &self.records.model;
        let mut query = build_query(&request.method, request, model, &self.records.config);
        let parent = request.parent_id.as_deref().unwrap_or_default();
        query
            .conditions
            .insert(self.foreign_key.clone(), Condition::Eq(model.coerce(&self.foreign_key, parent)));
        query.include.clear();
        query
    }
}

pub async fn list(State(child): State<Arc<ChildState>>, request: ResourceRequest) -> Result<Response, AppError> {
    let request = request.scoped_to_parent();
    records::find_all(&child.records, child.scoped_query(&request)).await
}

pub async fn read(State(child): State<Arc<ChildState>>, request: ResourceRequest) -> Result<Response, AppError> {
    let request = request.scoped_to_parent();
    records::find_one(&child.records, child.scoped_query(&request)).await
}

pub async fn create(
    State(child): State<Arc<ChildState>>,
    request: ResourceRequest,
    parsed: Option<Extension<JsonBody>>,
    raw: Bytes,
) -> Result<Response, AppError> {
    let request = request.scoped_to_parent();
    let mut input = read_input(&child.records, parsed, &raw)?;
    let parent = request.parent_id.as_deref().unwrap_or_default();
    input.insert(
        child.foreign_key.clone(),
        child.records.model.coerce(&child.foreign_key, parent),
    );
    let query = build_query(&request.method, &request, &child.records.model, &child.records.config);
    records::create(&child.records, input, query).await
}

pub async fn update(
    State(child): State<Arc<ChildState>>,
    request: ResourceRequest,
    parsed: Option<Extension<JsonBody>>,
    raw: Bytes,
) -> Result<Response, AppError> {
    let request = request.scoped_to_parent();
    let input = read_input(&child.records, parsed, &raw)?;
    let id = request.id.clone().unwrap_or_default();
    records::update(&child.records, &id, input, child.scoped_query(&request)).await
}

pub async fn delete(State(child): State<Arc<ChildState>>, request: ResourceRequest) -> Result<Response, AppError> {
    let request = request.scoped_to_parent();
    records::delete(&child.records, child.scoped_query(&request)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, ControllerOptions, Hooks};
    use crate::schema::{FieldConfig, FieldType, ModelConfig, OnDelete};
    use crate::state::ControllerState;
    use crate::store::{MemoryStore, RecordStore};
    use axum::http::Method;
    use serde_json::json;

    fn child_state(options: ControllerOptions) -> ChildState {
        let store = MemoryStore::from_models(&[
            ModelConfig::new("author").has_many("post", "authorId"),
            ModelConfig::new("post")
                .field(FieldConfig::new("authorId", FieldType::Integer).references("author", OnDelete::Cascade)),
        ])
        .unwrap();
        let model = store.schema().model("post").unwrap().clone();
        ChildState {
            records: ControllerState {
                store: Arc::new(store),
                model,
                config: ControllerConfig::reduce([&options]).for_children(),
            },
            foreign_key: "authorId".into(),
        }
    }

    fn request(uri: &str) -> ResourceRequest {
        let mut r = ResourceRequest::new(Method::GET, uri.parse().unwrap());
        r.parent_id = Some("4".into());
        r
    }

    #[test]
    fn foreign_key_is_pinned_to_parent() {
        let child = child_state(ControllerOptions::new());
        let q = child.scoped_query(&request("/4/posts?filter[authorId]=9"));
        assert_eq!(q.conditions.get("authorId"), Some(&Condition::Eq(json!(4))));
    }

    #[test]
    fn includes_never_survive() {
        let hooks = Hooks::default().before_query(|q, _| q.include.push("author".into()));
        let child = child_state(ControllerOptions::new().hooks(hooks).include_relations_in_get_all(true));
        assert!(child.scoped_query(&request("/4/posts")).include.is_empty());
    }
}
