//! Optional lifecycle listeners. Each bound hook runs at most once per request.

use crate::extractors::ResourceRequest;
use crate::query::QueryDescriptor;
use crate::schema::ModelDescriptor;
use crate::store::Record;
use std::fmt;
use std::sync::Arc;

/// Called with the finished descriptor and the request; may mutate the descriptor.
pub type BeforeQueryHook = Arc<dyn Fn(&mut QueryDescriptor, &ResourceRequest) + Send + Sync>;

/// Called with the model and the row being created or updated.
pub type RecordHook = Arc<dyn Fn(&ModelDescriptor, &mut Record) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub before_query: Option<BeforeQueryHook>,
    pub after_create: Option<RecordHook>,
    /// Runs after fields are merged into the loaded row, before it is persisted.
    pub before_update: Option<RecordHook>,
    pub after_update: Option<RecordHook>,
}

impl Hooks {
    pub fn before_query<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryDescriptor, &ResourceRequest) + Send + Sync + 'static,
    {
        self.before_query = Some(Arc::new(f));
        self
    }

    pub fn after_create<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModelDescriptor, &mut Record) + Send + Sync + 'static,
    {
        self.after_create = Some(Arc::new(f));
        self
    }

    pub fn before_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModelDescriptor, &mut Record) + Send + Sync + 'static,
    {
        self.before_update = Some(Arc::new(f));
        self
    }

    pub fn after_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModelDescriptor, &mut Record) + Send + Sync + 'static,
    {
        self.after_update = Some(Arc::new(f));
        self
    }

    /// Hook-by-hook overlay: bound hooks in `over` replace ours.
    pub fn merge(&self, over: &Hooks) -> Hooks {
        Hooks {
            before_query: over.before_query.clone().or_else(|| self.before_query.clone()),
            after_create: over.after_create.clone().or_else(|| self.after_create.clone()),
            before_update: over.before_update.clone().or_else(|| self.before_update.clone()),
            after_update: over.after_update.clone().or_else(|| self.after_update.clone()),
        }
    }

    pub(crate) fn run_before_query(&self, query: &mut QueryDescriptor, request: &ResourceRequest) {
        if let Some(hook) = &self.before_query {
            hook(query, request);
        }
    }

    pub(crate) fn run_after_create(&self, model: &ModelDescriptor, record: &mut Record) {
        if let Some(hook) = &self.after_create {
            hook(model, record);
        }
    }

    pub(crate) fn run_before_update(&self, model: &ModelDescriptor, record: &mut Record) {
        if let Some(hook) = &self.before_update {
            hook(model, record);
        }
    }

    pub(crate) fn run_after_update(&self, model: &ModelDescriptor, record: &mut Record) {
        if let Some(hook) = &self.after_update {
            hook(model, record);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_query", &self.before_query.is_some())
            .field("after_create", &self.after_create.is_some())
            .field("before_update", &self.before_update.is_some())
            .field("after_update", &self.after_update.is_some())
            .finish()
    }
}
