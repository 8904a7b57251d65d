//! Nested routes for one-to-many associations: `/:id/<association>[/:child_id]`.

use crate::config::ControllerConfig;
use crate::error::ConfigError;
use crate::handlers::children;
use crate::naming::dasherize;
use crate::routes::controller::handler_disabled;
use crate::schema::ModelDescriptor;
use crate::state::{ChildState, ControllerState};
use crate::store::RecordStore;
use axum::{routing::MethodRouter, Router};
use std::sync::Arc;

/// Routes for every plain has-many association of `parent`. Child routes use the
/// parent's handler switches, without output-name override or includes.
pub fn create_children(
    store: Arc<dyn RecordStore>,
    parent: &ModelDescriptor,
    config: &ControllerConfig,
) -> Result<Router, ConfigError> {
    let handlers = config.handlers;
    let child_config = config.for_children();
    let mut router = Router::new();

    for assoc in parent.associations.iter().filter(|a| a.yields_child_routes()) {
        let model = store
            .schema()
            .model(&assoc.target)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: assoc.target.clone(),
            })?;
        let state = Arc::new(ChildState {
            records: ControllerState {
                store: store.clone(),
                model,
                config: child_config.clone(),
            },
            foreign_key: assoc.foreign_key.clone(),
        });

        let mut collection: MethodRouter<Arc<ChildState>> = MethodRouter::new().fallback(handler_disabled);
        let mut member: MethodRouter<Arc<ChildState>> = MethodRouter::new().fallback(handler_disabled);
        if handlers.get {
            collection = collection.get(children::list);
            member = member.get(children::read);
        }
        if handlers.post {
            collection = collection.post(children::create);
        }
        if handlers.put {
            member = member.put(children::update);
        }
        if handlers.delete {
            member = member.delete(children::delete);
        }

        let path = format!("/:id/{}", dasherize(&assoc.name));
        let mut nested = Router::new();
        if handlers.get || handlers.post {
            nested = nested.route(&path, collection);
        }
        if handlers.get || handlers.put || handlers.delete {
            nested = nested.route(&format!("{}/:child_id", path), member);
        }
        tracing::debug!(parent = %parent.name, child = %assoc.target, path = %path, "child routes");
        router = router.merge(nested.with_state(state));
    }

    Ok(router)
}
