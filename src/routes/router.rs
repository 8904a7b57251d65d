//! Router aggregator: several controllers under one route tree.

use crate::config::ControllerOptions;
use crate::error::ConfigError;
use crate::naming::dasherize;
use crate::routes::controller::{apply_middleware, build_controller, resolve_model, ModelRef};
use crate::store::RecordStore;
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;

/// One controller to mount: a bare model, or a model with its own options.
#[derive(Clone, Debug)]
pub enum RouterEntry {
    Model(ModelRef),
    WithOptions { model: ModelRef, options: ControllerOptions },
}

impl RouterEntry {
    pub fn with_options(model: impl Into<ModelRef>, options: ControllerOptions) -> Self {
        RouterEntry::WithOptions {
            model: model.into(),
            options,
        }
    }
}

impl From<&str> for RouterEntry {
    fn from(name: &str) -> Self {
        RouterEntry::Model(name.into())
    }
}

impl From<ModelRef> for RouterEntry {
    fn from(model: ModelRef) -> Self {
        RouterEntry::Model(model)
    }
}

/// Mount each entry at `/<dasherized plural>`. Router-wide options sit between the
/// defaults and each entry's options; router-wide middleware wraps the whole tree once.
pub fn create_router<I>(
    store: Arc<dyn RecordStore>,
    entries: I,
    router_options: ControllerOptions,
) -> Result<Router, ConfigError>
where
    I: IntoIterator,
    I::Item: Into<RouterEntry>,
{
    let shared = router_options.without_middleware();
    let no_options = ControllerOptions::default();
    let mut mounted = HashSet::new();
    let mut router = Router::new();

    for entry in entries {
        let entry = entry.into();
        let (model, options) = match &entry {
            RouterEntry::Model(model) => (model, &no_options),
            RouterEntry::WithOptions { model, options } => (model, options),
        };
        let model = resolve_model(store.as_ref(), model)?;
        let path = format!("/{}", dasherize(&model.plural));
        if !mounted.insert(path.clone()) {
            return Err(ConfigError::DuplicateModel(model.name.clone()));
        }
        let controller = build_controller(store.clone(), model, &[&shared, options])?;
        tracing::info!(path = %path, "resource mounted");
        router = router.nest(&path, controller);
    }

    Ok(apply_middleware(router, &router_options.middleware))
}
