//! # Schema Cache
//!
//! Loaded schemas keyed by id. Safe for concurrent use: two threads loading
//! the same id may both build it, but only the first insertion is kept and
//! both callers get that one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::schema::Schema;

/// Storage for loaded schemas.
pub trait SchemaCache: Send + Sync {
    fn get(&self, id: &str) -> Option<Schema>;

    /// The cached schema for `id`, inserting `make()` if there is none.
    fn get_or_insert_with(&self, id: &str, make: &mut dyn FnMut() -> Schema) -> Schema;

    fn invalidate(&self, id: &str);

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// A process-local map behind a read-write lock.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaCache {
    entries: Arc<RwLock<HashMap<String, Schema>>>,
}

impl InMemorySchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SchemaCache for InMemorySchemaCache {
    fn get(&self, id: &str) -> Option<Schema> {
        self.entries.read().get(id).cloned()
    }

    fn get_or_insert_with(&self, id: &str, make: &mut dyn FnMut() -> Schema) -> Schema {
        if let Some(schema) = self.get(id) {
            return schema;
        }
        self.entries.write().entry(id.to_string()).or_insert_with(make).clone()
    }

    fn invalidate(&self, id: &str) {
        if self.entries.write().remove(id).is_some() {
            tracing::debug!(id, "schema evicted from cache");
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }
}
