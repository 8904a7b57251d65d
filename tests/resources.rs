mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, header::CONTENT_LENGTH, Request, StatusCode},
    Router,
};
use common::{len, models, send, seed, store};
use restgen::{
    create_controller, create_router, AppError, Condition, ControllerOptions, Dialect, HandlerOptions, Hooks,
    MemoryStore, ModelDescriptor, QueryDescriptor, Record, RecordStore, RouterEntry, Schema,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn app_with(store: Arc<dyn RecordStore>, authors: ControllerOptions, posts: ControllerOptions) -> Router {
    create_router(
        store,
        [
            RouterEntry::with_options("author", authors),
            RouterEntry::with_options("post", posts),
        ],
        ControllerOptions::new(),
    )
    .unwrap()
}

fn app() -> Router {
    app_with(store(), ControllerOptions::new(), ControllerOptions::new())
}

#[tokio::test]
async fn create_then_read_round_trip() {
    let app = app();
    let (status, created) = send(&app, "POST", "/authors", Some(json!({"author": {"name": "Bud"}}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["author"]["name"], "Bud");
    let id = created["author"]["id"].clone();

    let (status, read) = send(&app, "GET", &format!("/authors/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["author"], created["author"]);
}

#[tokio::test]
async fn list_is_keyed_by_plural() {
    let app = app();
    seed(&app).await;
    let (status, body) = send(&app, "GET", "/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body, "posts"), 3);
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let app = app();
    let (status, body) = send(&app, "GET", "/authors/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"errors": [{"message": "record not found"}]}));

    let (status, _) = send(&app, "PUT", "/authors/42", Some(json!({"author": {"name": "x"}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", "/authors/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_required_field_names_it() {
    let app = app();
    let (status, body) = send(&app, "POST", "/authors", Some(json!({"author": {}}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({"errors": [{"message": "name cannot be null", "field": "name"}]})
    );

    let (status, _) = send(&app, "POST", "/authors", Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_primary_key_is_rejected() {
    let app = app();
    seed(&app).await;
    let (status, body) = send(&app, "POST", "/authors", Some(json!({"author": {"id": 1, "name": "Dup"}}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "id");
}

#[tokio::test]
async fn referenced_record_cannot_be_deleted() {
    let app = app();
    seed(&app).await;
    let (status, body) = send(&app, "DELETE", "/authors/2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"errors": [{"message": "foreign key constraint error"}]}));

    let (status, body) = send(&app, "DELETE", "/posts/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, _) = send(&app, "DELETE", "/authors/2", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/authors/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_foreign_key_on_create_is_bad_request() {
    let app = app();
    let (status, _) = send(&app, "POST", "/posts", Some(json!({"post": {"title": "x", "authorId": 9}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn largest_explicit_key_does_not_break_later_requests() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/authors",
        Some(json!({"author": {"id": i64::MAX, "name": "Bud"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"]["id"], json!(i64::MAX));

    let (status, body) = send(&app, "GET", "/authors", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body, "authors"), 1);
}

#[tokio::test]
async fn large_keys_are_not_confused() {
    let app = app();
    for (id, name) in [(9007199254740992_i64, "Bud"), (9007199254740993_i64, "Frank")] {
        let (status, _) = send(&app, "POST", "/authors", Some(json!({"author": {"id": id, "name": name}}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, body) = send(&app, "GET", "/authors/9007199254740993", None).await;
    assert_eq!(body["author"]["name"], "Frank");
}

#[tokio::test]
async fn update_merges_and_last_write_wins() {
    let app = app();
    seed(&app).await;
    let (status, body) = send(&app, "PUT", "/posts/1", Some(json!({"post": {"title": "edited"}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "edited");
    assert_eq!(body["post"]["authorId"], 1);

    send(&app, "PUT", "/posts/1", Some(json!({"post": {"title": "again"}}))).await;
    let (_, body) = send(&app, "GET", "/posts/1", None).await;
    assert_eq!(body["post"]["title"], "again");
}

#[tokio::test]
async fn limit_never_exceeds_the_ceiling() {
    let app = app_with(store(), ControllerOptions::new(), ControllerOptions::new().limit(2));
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/posts", None).await;
    assert_eq!(len(&body, "posts"), 2);
    let (_, body) = send(&app, "GET", "/posts?limit=10", None).await;
    assert_eq!(len(&body, "posts"), 2);
    let (_, body) = send(&app, "GET", "/posts?limit=1", None).await;
    assert_eq!(len(&body, "posts"), 1);
    let (_, body) = send(&app, "GET", "/posts?limit=2&offset=2", None).await;
    assert_eq!(len(&body, "posts"), 1);
}

#[tokio::test]
async fn filter_search_and_attributes() {
    let app = app();
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/posts?filter[authorId]=1", None).await;
    assert_eq!(len(&body, "posts"), 2);

    let (_, body) = send(&app, "GET", "/authors?search[name]=ran", None).await;
    assert_eq!(len(&body, "authors"), 1);
    assert_eq!(body["authors"][0]["name"], "Frank");

    let (_, body) = send(&app, "GET", "/authors?attributes=name", None).await;
    assert_eq!(body["authors"][0], json!({"name": "Bud"}));

    let (_, body) = send(&app, "GET", "/posts?filter[unknown]=1", None).await;
    assert_eq!(len(&body, "posts"), 3);
}

#[tokio::test]
async fn relationships_are_included_on_read() {
    let app = app_with(
        store(),
        ControllerOptions::new().relationships(["posts"]),
        ControllerOptions::new(),
    );
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/authors/1", None).await;
    assert_eq!(body["author"]["posts"].as_array().map(Vec::len), Some(2));

    let (_, body) = send(&app, "GET", "/authors", None).await;
    assert!(body["authors"][0].get("posts").is_none());
}

#[tokio::test]
async fn relationships_on_list_when_enabled() {
    let app = app_with(
        store(),
        ControllerOptions::new()
            .relationships(["posts"])
            .include_relations_in_get_all(true),
        ControllerOptions::new(),
    );
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/authors", None).await;
    assert_eq!(body["authors"][1]["posts"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn output_name_can_be_overridden() {
    let app = app_with(
        store(),
        ControllerOptions::new().override_output_name("writer"),
        ControllerOptions::new(),
    );
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/authors/1", None).await;
    assert_eq!(body["writer"]["name"], "Bud");
    let (_, body) = send(&app, "GET", "/authors", None).await;
    assert_eq!(len(&body, "writers"), 2);
}

#[tokio::test]
async fn nested_data_can_be_disabled() {
    let app = app_with(
        store(),
        ControllerOptions::new().disable_nested_data(true),
        ControllerOptions::new(),
    );
    let (status, body) = send(&app, "POST", "/authors", Some(json!({"name": "Bud"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Bud");
    let (_, body) = send(&app, "GET", "/authors", None).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn disabled_handlers_are_not_routed() {
    let app = app_with(
        store(),
        ControllerOptions::new().handlers(HandlerOptions::default().delete(false).put(false)),
        ControllerOptions::new(),
    );
    seed(&app).await;
    let (status, _) = send(&app, "DELETE", "/authors/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "PUT", "/authors/1", Some(json!({"author": {"name": "x"}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/authors/1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/authors")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"author\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app_with(store(), ControllerOptions::new().body_limit(16), ControllerOptions::new());
    let payload = json!({"author": {"name": "a name well past sixteen bytes"}}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/authors")
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn body_parser_can_be_disabled() {
    let app = app_with(
        store(),
        ControllerOptions::new().disable_body_parser(true),
        ControllerOptions::new(),
    );
    let (status, body) = send(&app, "POST", "/authors", Some(json!({"author": {"name": "Bud"}}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"]["name"], "Bud");
}

#[tokio::test]
async fn hooks_shape_queries_and_records() {
    let hooks = Hooks::default()
        .before_query(|query, _| query.limit = Some(1))
        .after_create(|_, row| {
            row.insert("greeting".into(), json!("hello"));
        })
        .before_update(|_, row| {
            row.insert("name".into(), json!("Renamed"));
        });
    let app = app_with(store(), ControllerOptions::new().hooks(hooks), ControllerOptions::new());

    let (_, body) = send(&app, "POST", "/authors", Some(json!({"author": {"name": "Bud"}}))).await;
    assert_eq!(body["author"]["greeting"], "hello");
    send(&app, "POST", "/authors", Some(json!({"author": {"name": "Frank"}}))).await;

    let (_, body) = send(&app, "GET", "/authors", None).await;
    assert_eq!(len(&body, "authors"), 1);

    let (_, body) = send(&app, "PUT", "/authors/1", Some(json!({"author": {"name": "Bud"}}))).await;
    assert_eq!(body["author"]["name"], "Renamed");
}

/// Counts writes so tests can prove a request never reached the store.
struct SpyStore {
    inner: MemoryStore,
    updates: AtomicUsize,
}

#[async_trait]
impl RecordStore for SpyStore {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn find_one(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Option<Record>, AppError> {
        self.inner.find_one(model, query).await
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Vec<Record>, AppError> {
        self.inner.find_all(model, query).await
    }

    async fn count(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        self.inner.count(model, query).await
    }

    async fn create(&self, model: &ModelDescriptor, input: Record, query: &QueryDescriptor) -> Result<Record, AppError> {
        self.inner.create(model, input, query).await
    }

    async fn update(&self, model: &ModelDescriptor, id: &Value, record: Record) -> Result<Record, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(model, id, record).await
    }

    async fn destroy(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        self.inner.destroy(model, query).await
    }
}

#[tokio::test]
async fn primary_key_change_never_reaches_the_store() {
    let spy = Arc::new(SpyStore {
        inner: MemoryStore::from_models(&models()).unwrap(),
        updates: AtomicUsize::new(0),
    });
    let app = app_with(spy.clone(), ControllerOptions::new(), ControllerOptions::new());
    seed(&app).await;

    let (status, body) = send(&app, "PUT", "/authors/1", Some(json!({"author": {"id": 7, "name": "x"}}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({"errors": [{"message": "cannot change record primary key", "field": "id"}]})
    );
    assert_eq!(spy.updates.load(Ordering::SeqCst), 0);

    let (status, _) = send(&app, "PUT", "/authors/1", Some(json!({"author": {"id": 1, "name": "y"}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spy.updates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn primary_key_change_when_allowed() {
    let app = app_with(
        store(),
        ControllerOptions::new().allow_changing_primary_key(true),
        ControllerOptions::new(),
    );
    send(&app, "POST", "/authors", Some(json!({"author": {"name": "Bud"}}))).await;
    let (status, body) = send(&app, "PUT", "/authors/1", Some(json!({"author": {"id": 5, "name": "Bud"}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"]["id"], 5);
    let (status, _) = send(&app, "GET", "/authors/5", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn single_controller_without_router() {
    let store = store();
    let app = Router::new().nest(
        "/writers",
        create_controller(store, "author", ControllerOptions::new()).unwrap(),
    );
    let (status, _) = send(&app, "POST", "/writers", Some(json!({"author": {"name": "Bud"}}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = send(&app, "GET", "/writers/1", None).await;
    assert_eq!(body["author"]["name"], "Bud");
}

#[test]
fn controller_rejects_unknown_model() {
    let err = create_controller(store(), "editor", ControllerOptions::new()).unwrap_err();
    assert!(err.to_string().contains("editor"));
}

#[test]
fn controller_rejects_unknown_relationship() {
    assert!(create_controller(store(), "author", ControllerOptions::new().relationships(["comments"])).is_err());
}

/// Reports the Postgres dialect over an in-memory store and keeps the last list query.
struct PostgresLike {
    inner: MemoryStore,
    last_query: Mutex<Option<QueryDescriptor>>,
}

#[async_trait]
impl RecordStore for PostgresLike {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn find_one(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Option<Record>, AppError> {
        self.inner.find_one(model, query).await
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Vec<Record>, AppError> {
        *self.last_query.lock().unwrap() = Some(query.clone());
        self.inner.find_all(model, query).await
    }

    async fn count(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        self.inner.count(model, query).await
    }

    async fn create(&self, model: &ModelDescriptor, input: Record, query: &QueryDescriptor) -> Result<Record, AppError> {
        self.inner.create(model, input, query).await
    }

    async fn update(&self, model: &ModelDescriptor, id: &Value, record: Record) -> Result<Record, AppError> {
        self.inner.update(model, id, record).await
    }

    async fn destroy(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        self.inner.destroy(model, query).await
    }
}

#[tokio::test]
async fn postgres_dialect_searches_case_insensitively() {
    let store = Arc::new(PostgresLike {
        inner: MemoryStore::from_models(&models()).unwrap(),
        last_query: Mutex::new(None),
    });
    let app = app_with(
        store.clone(),
        ControllerOptions::new().use_like(true),
        ControllerOptions::new(),
    );
    seed(&app).await;

    let (status, body) = send(&app, "GET", "/authors?search[name]=BU", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body, "authors"), 1);
    assert_eq!(body["authors"][0]["name"], "Bud");

    let query = store.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(
        query.conditions.get("name"),
        Some(&Condition::Like {
            pattern: "%BU%".into(),
            case_insensitive: true,
        })
    );
}

#[tokio::test]
async fn memory_dialect_honours_case_sensitive_search() {
    let app = app();
    seed(&app).await;
    let (_, body) = send(&app, "GET", "/authors?search[name]=BU", None).await;
    assert_eq!(len(&body, "authors"), 0);
}
