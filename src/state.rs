//! Per-controller state shared by every route of one resource. Immutable once built.

use crate::config::ControllerConfig;
use crate::schema::ModelDescriptor;
use crate::store::RecordStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct ControllerState {
    pub store: Arc<dyn RecordStore>,
    pub model: Arc<ModelDescriptor>,
    pub config: ControllerConfig,
}

/// State of one nested child resource: the child's controller state plus the scoping key.
#[derive(Clone)]
pub struct ChildState {
    pub records: ControllerState,
    /// Field on the child model holding the parent's key.
    pub foreign_key: String,
}
