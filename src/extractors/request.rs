//! Request view handed to the query builder and to `before_query` hooks.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query},
    http::{request::Parts, HeaderMap, Method, Uri},
};
use std::collections::HashMap;

/// Path parameter naming the addressed record (or, on child routes, the parent).
pub const ID_PARAM: &str = "id";
/// Path parameter naming the child record on nested routes.
pub const CHILD_ID_PARAM: &str = "child_id";

#[derive(Clone, Debug)]
pub struct ResourceRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Query-string pairs in the order they appeared.
    pub query: Vec<(String, String)>,
    /// Identifier of the targeted record, if the route addresses one.
    pub id: Option<String>,
    /// Parent identifier on nested child routes.
    pub parent_id: Option<String>,
    child_id: Option<String>,
}

impl ResourceRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = Query::<Vec<(String, String)>>::try_from_uri(&uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        ResourceRequest {
            method,
            uri,
            headers: HeaderMap::new(),
            query,
            id: None,
            parent_id: None,
            child_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Re-read path parameters for a nested route: `:id` is the parent, `:child_id` the record.
    pub fn scoped_to_parent(mut self) -> Self {
        self.parent_id = self.id.take();
        self.id = self.child_id.take();
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ResourceRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        let mut request = ResourceRequest::new(parts.method.clone(), parts.uri.clone());
        request.headers = parts.headers.clone();
        request.id = params.remove(ID_PARAM);
        request.child_id = params.remove(CHILD_ID_PARAM);
        Ok(request)
    }
}
