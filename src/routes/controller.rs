//! Resource controller: the route table for one model.

use crate::config::{ControllerConfig, ControllerOptions, Middleware};
use crate::error::ConfigError;
use crate::extractors::parse_json_body;
use crate::handlers::resource;
use crate::routes::children::create_children;
use crate::schema::ModelDescriptor;
use crate::state::ControllerState;
use crate::store::{Dialect, RecordStore};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state, Next},
    routing::MethodRouter,
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// A model given by name or as a descriptor from the store's schema.
#[derive(Clone, Debug)]
pub enum ModelRef {
    Name(String),
    Descriptor(Arc<ModelDescriptor>),
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        ModelRef::Name(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        ModelRef::Name(name)
    }
}

impl From<Arc<ModelDescriptor>> for ModelRef {
    fn from(model: Arc<ModelDescriptor>) -> Self {
        ModelRef::Descriptor(model)
    }
}

impl ModelRef {
    fn name(&self) -> &str {
        match self {
            ModelRef::Name(name) => name,
            ModelRef::Descriptor(model) => &model.name,
        }
    }
}

/// A model is valid iff the store's schema knows it by name.
pub(crate) fn resolve_model(store: &dyn RecordStore, model: &ModelRef) -> Result<Arc<ModelDescriptor>, ConfigError> {
    store
        .schema()
        .model(model.name())
        .cloned()
        .ok_or_else(|| ConfigError::InvalidModel(model.name().to_string()))
}

/// Responds to methods whose handler is switched off.
pub(crate) async fn handler_disabled() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Mount middleware so the first in the list runs first.
pub(crate) fn apply_middleware(mut router: Router, middleware: &[Middleware]) -> Router {
    for mw in middleware.iter().rev().cloned() {
        router = router.layer(from_fn(move |req: Request, next: Next| mw.call(req, next)));
    }
    router
}

/// Build the routes for `model` with a single option layer over the defaults.
pub fn create_controller(
    store: Arc<dyn RecordStore>,
    model: impl Into<ModelRef>,
    options: ControllerOptions,
) -> Result<Router, ConfigError> {
    let model = resolve_model(store.as_ref(), &model.into())?;
    build_controller(store, model, &[&options])
}

/// Build the routes for `model`, reducing `layers` (lowest precedence first) over the defaults.
pub(crate) fn build_controller(
    store: Arc<dyn RecordStore>,
    model: Arc<ModelDescriptor>,
    layers: &[&ControllerOptions],
) -> Result<Router, ConfigError> {
    let mut config = ControllerConfig::reduce(layers.iter().copied());
    if store.dialect() == Dialect::Postgres {
        config.use_like = false;
    }
    for name in &config.relationships {
        if model.association(name).is_none() {
            return Err(ConfigError::MissingReference {
                kind: "association",
                id: format!("{}.{}", model.name, name),
            });
        }
    }

    let handlers = config.handlers;
    let state = Arc::new(ControllerState {
        store: store.clone(),
        model: model.clone(),
        config: config.clone(),
    });

    let mut collection: MethodRouter<Arc<ControllerState>> = MethodRouter::new().fallback(handler_disabled);
    let mut member: MethodRouter<Arc<ControllerState>> = MethodRouter::new().fallback(handler_disabled);
    if handlers.get {
        collection = collection.get(resource::list);
        member = member.get(resource::read);
    }
    if handlers.post {
        collection = collection.post(resource::create);
    }
    if handlers.put {
        member = member.put(resource::update);
    }
    if handlers.delete {
        member = member.delete(resource::delete);
    }

    let mut router = Router::new();
    if handlers.get || handlers.post {
        router = router.route("/", collection);
    }
    if handlers.get || handlers.put || handlers.delete {
        router = router.route("/:id", member);
    }
    let mut router = router.with_state(state);

    if config.create_children {
        router = router.merge(create_children(store, &model, &config)?);
    }

    router = apply_middleware(router, &config.middleware);
    if !config.disable_body_parser {
        router = router
            .layer(from_fn_with_state(config.body_limit, parse_json_body))
            .layer(RequestBodyLimitLayer::new(config.body_limit));
    }

    tracing::info!(
        model = %model.name,
        get = handlers.get,
        post = handlers.post,
        put = handlers.put,
        delete = handlers.delete,
        children = config.create_children,
        "controller mounted"
    );
    Ok(router)
}
