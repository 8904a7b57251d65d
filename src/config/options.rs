//! Controller configuration: partial option layers reduced over hardcoded defaults.

use crate::config::Hooks;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// express' json parser default.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A request middleware mounted ahead of a controller's (or the router's) routes.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Request, Next) -> MiddlewareFuture + Send + Sync>);

impl Middleware {
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Middleware(Arc::new(move |req, next| Box::pin(f(req, next))))
    }

    pub(crate) fn call(&self, req: Request, next: Next) -> MiddlewareFuture {
        (self.0)(req, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Per-handler switches; unset entries fall through to the layer below.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    pub get: Option<bool>,
    pub put: Option<bool>,
    pub post: Option<bool>,
    pub delete: Option<bool>,
}

impl HandlerOptions {
    pub fn get(mut self, enabled: bool) -> Self {
        self.get = Some(enabled);
        self
    }

    pub fn put(mut self, enabled: bool) -> Self {
        self.put = Some(enabled);
        self
    }

    pub fn post(mut self, enabled: bool) -> Self {
        self.post = Some(enabled);
        self
    }

    pub fn delete(mut self, enabled: bool) -> Self {
        self.delete = Some(enabled);
        self
    }

    fn merge(&self, over: &HandlerOptions) -> HandlerOptions {
        HandlerOptions {
            get: over.get.or(self.get),
            put: over.put.or(self.put),
            post: over.post.or(self.post),
            delete: over.delete.or(self.delete),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handlers {
    pub get: bool,
    pub put: bool,
    pub post: bool,
    pub delete: bool,
}

impl Default for Handlers {
    fn default() -> Self {
        Handlers {
            get: true,
            put: true,
            post: true,
            delete: true,
        }
    }
}

/// One partial configuration layer, as supplied by a caller or a router.
#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    pub allow_changing_primary_key: Option<bool>,
    pub include_relations_in_get_all: Option<bool>,
    pub disable_body_parser: Option<bool>,
    pub disable_nested_data: Option<bool>,
    pub override_output_name: Option<String>,
    pub limit: Option<u64>,
    pub relationships: Option<Vec<String>>,
    pub create_children: Option<bool>,
    pub handlers: HandlerOptions,
    pub middleware: Vec<Middleware>,
    pub use_like: Option<bool>,
    pub body_limit: Option<usize>,
    pub hooks: Hooks,
}

impl ControllerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_changing_primary_key(mut self, allow: bool) -> Self {
        self.allow_changing_primary_key = Some(allow);
        self
    }

    pub fn include_relations_in_get_all(mut self, include: bool) -> Self {
        self.include_relations_in_get_all = Some(include);
        self
    }

    pub fn disable_body_parser(mut self, disable: bool) -> Self {
        self.disable_body_parser = Some(disable);
        self
    }

    pub fn disable_nested_data(mut self, disable: bool) -> Self {
        self.disable_nested_data = Some(disable);
        self
    }

    /// Envelope key in place of the model name. Once a lower layer sets it, a higher
    /// layer can replace it but not clear it.
    pub fn override_output_name(mut self, name: impl Into<String>) -> Self {
        self.override_output_name = Some(name.into());
        self
    }

    /// Ceiling on list results. Once a lower layer sets it, a higher layer can
    /// replace it but not clear it.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn relationships<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn create_children(mut self, create: bool) -> Self {
        self.create_children = Some(create);
        self
    }

    pub fn handlers(mut self, handlers: HandlerOptions) -> Self {
        self.handlers = self.handlers.merge(&handlers);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn use_like(mut self, use_like: bool) -> Self {
        self.use_like = Some(use_like);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = self.hooks.merge(&hooks);
        self
    }

    /// Overlay `over` on top of `self`: set fields win, handlers and hooks merge
    /// entry-by-entry, middleware lists concatenate.
    pub fn merge(&self, over: &ControllerOptions) -> ControllerOptions {
        ControllerOptions {
            allow_changing_primary_key: over.allow_changing_primary_key.or(self.allow_changing_primary_key),
            include_relations_in_get_all: over.include_relations_in_get_all.or(self.include_relations_in_get_all),
            disable_body_parser: over.disable_body_parser.or(self.disable_body_parser),
            disable_nested_data: over.disable_nested_data.or(self.disable_nested_data),
            override_output_name: over
                .override_output_name
                .clone()
                .or_else(|| self.override_output_name.clone()),
            limit: over.limit.or(self.limit),
            relationships: over.relationships.clone().or_else(|| self.relationships.clone()),
            create_children: over.create_children.or(self.create_children),
            handlers: self.handlers.merge(&over.handlers),
            middleware: self.middleware.iter().chain(over.middleware.iter()).cloned().collect(),
            use_like: over.use_like.or(self.use_like),
            body_limit: over.body_limit.or(self.body_limit),
            hooks: self.hooks.merge(&over.hooks),
        }
    }

    /// This layer without its middleware (router-wide middleware is mounted once on the router).
    pub fn without_middleware(&self) -> ControllerOptions {
        ControllerOptions {
            middleware: Vec::new(),
            ..self.clone()
        }
    }
}

/// Finalized, immutable configuration of one controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub allow_changing_primary_key: bool,
    pub include_relations_in_get_all: bool,
    pub disable_body_parser: bool,
    pub disable_nested_data: bool,
    pub override_output_name: Option<String>,
    pub limit: Option<u64>,
    pub relationships: Vec<String>,
    pub create_children: bool,
    pub handlers: Handlers,
    pub middleware: Vec<Middleware>,
    pub use_like: bool,
    pub body_limit: usize,
    pub hooks: Hooks,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            allow_changing_primary_key: false,
            include_relations_in_get_all: false,
            disable_body_parser: false,
            disable_nested_data: false,
            override_output_name: None,
            limit: None,
            relationships: Vec::new(),
            create_children: false,
            handlers: Handlers::default(),
            middleware: Vec::new(),
            use_like: true,
            body_limit: DEFAULT_BODY_LIMIT,
            hooks: Hooks::default(),
        }
    }
}

impl ControllerConfig {
    /// Fold option layers, lowest precedence first, over the defaults.
    pub fn reduce<'a, I>(layers: I) -> ControllerConfig
    where
        I: IntoIterator<Item = &'a ControllerOptions>,
    {
        let merged = layers
            .into_iter()
            .fold(ControllerOptions::default(), |acc, layer| acc.merge(layer));
        ControllerConfig::default().apply(merged)
    }

    fn apply(self, o: ControllerOptions) -> ControllerConfig {
        ControllerConfig {
            allow_changing_primary_key: o.allow_changing_primary_key.unwrap_or(self.allow_changing_primary_key),
            include_relations_in_get_all: o
                .include_relations_in_get_all
                .unwrap_or(self.include_relations_in_get_all),
            disable_body_parser: o.disable_body_parser.unwrap_or(self.disable_body_parser),
            disable_nested_data: o.disable_nested_data.unwrap_or(self.disable_nested_data),
            override_output_name: o.override_output_name.or(self.override_output_name),
            limit: o.limit.or(self.limit),
            relationships: o.relationships.unwrap_or(self.relationships),
            create_children: o.create_children.unwrap_or(self.create_children),
            handlers: Handlers {
                get: o.handlers.get.unwrap_or(self.handlers.get),
                put: o.handlers.put.unwrap_or(self.handlers.put),
                post: o.handlers.post.unwrap_or(self.handlers.post),
                delete: o.handlers.delete.unwrap_or(self.handlers.delete),
            },
            middleware: o.middleware,
            use_like: o.use_like.unwrap_or(self.use_like),
            body_limit: o.body_limit.unwrap_or(self.body_limit),
            hooks: self.hooks.merge(&o.hooks),
        }
    }

    /// Settings for nested child routes: no output-name override, no includes.
    pub fn for_children(&self) -> ControllerConfig {
        ControllerConfig {
            override_output_name: None,
            relationships: Vec::new(),
            ..self.clone()
        }
    }
}
