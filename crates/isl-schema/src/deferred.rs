//! # Deferred Reference Manager
//!
//! One manager lives for exactly one top-level load. While schemas are
//! parsed it hands out reserved arena slots for references that cannot be
//! resolved yet: names declared later in the same document, and types of
//! other schemas that may themselves import this one. Once parsing is done,
//! [`DeferredReferenceManager::resolve`] points every slot at its target.
//!
//! ## State Machine
//!
//! `Open → Resolving → Closed`. References may be created while `Open` or
//! `Resolving` (loading an imported schema during resolution defers more
//! references). Every mutating call on a `Closed` manager panics, as does a
//! second or re-entrant `resolve`.
//!
//! ## Rollback
//!
//! Schemas loaded as a side effect are registered as dependents and held
//! in a staging area until the whole batch resolves. If anything fails,
//! every dependent is unloaded from the host exactly once and the staging
//! area is discarded, so no cache ever holds a schema built on a failed
//! assumption.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::config::SchemaSystemConfig;
use crate::content::SchemaContent;
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::types::{TypeArena, TypeId};

/// What the manager needs from the schema system that owns it.
pub(crate) trait SchemaHost {
    fn arena(&self) -> &Arc<TypeArena>;

    fn config(&self) -> &SchemaSystemConfig;

    /// Load `id` as part of `manager`'s batch, returning a staged or cached
    /// schema when one exists.
    fn load_schema_with(&self, manager: &mut DeferredReferenceManager<'_>, id: &str) -> Result<Schema, SchemaError>;

    /// Evict `id` from every cache.
    fn unload_schema(&self, id: &str);

    fn is_schema_loaded(&self, id: &str) -> bool;

    fn schema_content(&self, id: &str) -> Result<Arc<SchemaContent>, SchemaError>;
}

// ─── Local Scope ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    declared: IndexMap<String, TypeId>,
    imported: IndexMap<String, TypeId>,
    /// Names only visible through the legacy transitive-import mode.
    transitive: IndexMap<String, TypeId>,
    /// Open-content field names the schema header reserves for types.
    user_type_words: HashSet<String>,
}

/// The names visible inside one schema while it is being built.
#[derive(Debug, Default)]
pub(crate) struct LocalScope {
    schema_id: Option<String>,
    tables: RwLock<Tables>,
}

impl LocalScope {
    pub(crate) fn new(schema_id: Option<String>) -> Self {
        Self {
            schema_id,
            tables: RwLock::default(),
        }
    }

    pub(crate) fn schema_id(&self) -> Option<&str> {
        self.schema_id.as_deref()
    }

    /// Declared names first, then imports, then transitive imports.
    pub(crate) fn lookup(&self, name: &str) -> Option<TypeId> {
        let tables = self.tables.read();
        if let Some(id) = tables.declared.get(name).or_else(|| tables.imported.get(name)) {
            return Some(*id);
        }
        let id = tables.transitive.get(name).copied()?;
        tracing::warn!(
            schema = self.schema_id.as_deref().unwrap_or("<anonymous>"),
            "type '{name}' is only visible through a transitive import"
        );
        Some(id)
    }

    /// Whether `name` is already declared or directly imported.
    pub(crate) fn is_bound(&self, name: &str) -> bool {
        let tables = self.tables.read();
        tables.declared.contains_key(name) || tables.imported.contains_key(name)
    }

    pub(crate) fn declare(&self, name: &str, id: TypeId) {
        self.tables.write().declared.insert(name.to_string(), id);
    }

    pub(crate) fn import(&self, name: &str, id: TypeId) {
        self.tables.write().imported.insert(name.to_string(), id);
    }

    /// Expose `name` without shadowing a direct import or declaration.
    pub(crate) fn import_transitive(&self, name: &str, id: TypeId) {
        self.tables.write().transitive.entry(name.to_string()).or_insert(id);
    }

    pub(crate) fn reserve_type_words(&self, words: impl IntoIterator<Item = String>) {
        self.tables.write().user_type_words.extend(words);
    }

    pub(crate) fn is_user_type_word(&self, word: &str) -> bool {
        self.tables.read().user_type_words.contains(word)
    }

    pub(crate) fn declared(&self) -> IndexMap<String, TypeId> {
        self.tables.read().declared.clone()
    }

    pub(crate) fn imported(&self) -> IndexMap<String, TypeId> {
        self.tables.read().imported.clone()
    }

    pub(crate) fn transitive(&self) -> IndexMap<String, TypeId> {
        self.tables.read().transitive.clone()
    }

    pub(crate) fn is_declared(&self, name: &str) -> bool {
        self.tables.read().declared.contains_key(name)
    }
}

// ─── Manager ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Resolving,
    Closed,
}

#[derive(Debug)]
enum DeferredReference {
    Local {
        slot: TypeId,
        scope: Arc<LocalScope>,
        name: String,
    },
    Import {
        slot: TypeId,
        schema_id: String,
        name: String,
    },
}

pub(crate) struct DeferredReferenceManager<'h> {
    host: &'h dyn SchemaHost,
    state: State,
    pending: VecDeque<DeferredReference>,
    /// One slot per `(schema id, type name)`.
    imports: HashMap<(String, String), TypeId>,
    dependents: IndexSet<String>,
    staged: IndexMap<String, Schema>,
    loading: HashSet<String>,
}

impl<'h> DeferredReferenceManager<'h> {
    pub(crate) fn new(host: &'h dyn SchemaHost) -> Self {
        Self {
            host,
            state: State::Open,
            pending: VecDeque::new(),
            imports: HashMap::new(),
            dependents: IndexSet::new(),
            staged: IndexMap::new(),
            loading: HashSet::new(),
        }
    }

    pub(crate) fn host(&self) -> &'h dyn SchemaHost {
        self.host
    }

    fn ensure_not_closed(&self, action: &str) {
        if self.state == State::Closed {
            panic!("Cannot {action} using a closed DeferredReferenceManager");
        }
    }

    /// Reserve a slot for `name` in `scope`, resolved once every top-level
    /// declaration has been read.
    pub(crate) fn create_deferred_local_reference(
        &mut self,
        scope: &Arc<LocalScope>,
        name: &str,
    ) -> Result<TypeId, SchemaError> {
        self.ensure_not_closed("create a new reference");
        if let Some(schema_id) = scope.schema_id() {
            let content = self.host.schema_content(schema_id)?;
            if !content.declares(name) {
                return Err(SchemaError::invalid(format!(
                    "No type named '{name}' in schema {schema_id}"
                )));
            }
        }
        let slot = self.host.arena().reserve(name);
        tracing::trace!(name, ?slot, "deferred local reference");
        self.pending.push_back(DeferredReference::Local {
            slot,
            scope: Arc::clone(scope),
            name: name.to_string(),
        });
        Ok(slot)
    }

    /// Reserve a slot for type `name` of schema `schema_id`. Repeated
    /// requests for the same pair share one slot.
    pub(crate) fn create_deferred_import_reference(&mut self, schema_id: &str, name: &str) -> Result<TypeId, SchemaError> {
        self.ensure_not_closed("create a new reference");
        let key = (schema_id.to_string(), name.to_string());
        if let Some(slot) = self.imports.get(&key) {
            return Ok(*slot);
        }
        let content = self
            .host
            .schema_content(schema_id)
            .map_err(|e| unable_to_load(schema_id, &e))?;
        if !content.declares(name) {
            return Err(SchemaError::invalid(format!(
                "No type named '{name}' in schema {schema_id}"
            )));
        }
        let slot = self.host.arena().reserve(format!("{schema_id}#{name}"));
        tracing::trace!(schema_id, name, ?slot, "deferred import reference");
        self.imports.insert(key, slot);
        self.pending.push_back(DeferredReference::Import {
            slot,
            schema_id: schema_id.to_string(),
            name: name.to_string(),
        });
        Ok(slot)
    }

    /// Mark `schema_id` as depending on this batch. Schemas already loaded
    /// are not affected by its outcome and are ignored.
    pub(crate) fn register_dependent_schema(&mut self, schema_id: &str) {
        self.ensure_not_closed("register a dependent schema");
        if self.host.is_schema_loaded(schema_id) {
            return;
        }
        self.dependents.insert(schema_id.to_string());
    }

    /// Resolve every deferred reference, including those created while
    /// resolving. Always leaves the manager closed.
    ///
    /// # Panics
    ///
    /// Panics if called on a closed manager or from within `resolve`.
    pub(crate) fn resolve(&mut self) -> Result<(), SchemaError> {
        match self.state {
            State::Closed => panic!("Cannot call resolve() on a closed DeferredReferenceManager"),
            State::Resolving => panic!("resolve() is already running on this DeferredReferenceManager"),
            State::Open => {}
        }
        self.state = State::Resolving;
        tracing::debug!(pending = self.pending.len(), "resolving deferred references");
        let result = self.drain();
        if result.is_err() {
            self.rollback();
        }
        self.state = State::Closed;
        result
    }

    fn drain(&mut self) -> Result<(), SchemaError> {
        let arena = Arc::clone(self.host.arena());
        while let Some(reference) = self.pending.pop_front() {
            match reference {
                DeferredReference::Local { slot, scope, name } => {
                    let target = scope
                        .lookup(&name)
                        .ok_or_else(|| SchemaError::invalid(format!("Unable to resolve type {name}")))?;
                    tracing::trace!(name, ?slot, ?target, "resolved local reference");
                    arena.fulfil(slot, target)?;
                }
                DeferredReference::Import { slot, schema_id, name } => {
                    let host = self.host;
                    let schema = host
                        .load_schema_with(self, &schema_id)
                        .map_err(|e| unable_to_load(&schema_id, &e))?;
                    let target = schema.declared_type_id(&name).ok_or_else(|| {
                        SchemaError::invalid(format!("No type named '{name}' in schema {schema_id}"))
                    })?;
                    tracing::trace!(schema_id, name, ?slot, ?target, "resolved import reference");
                    arena.fulfil(slot, target)?;
                }
            }
        }
        Ok(())
    }

    /// Unload every dependent schema and discard staged and pending work.
    pub(crate) fn rollback(&mut self) {
        for schema_id in self.dependents.drain(..) {
            tracing::debug!(schema_id, "unloading dependent schema");
            self.host.unload_schema(&schema_id);
        }
        self.staged.clear();
        self.pending.clear();
    }

    // ─── Staging ────────────────────────────────────────────────────────

    /// Hold a parsed schema until the batch resolves.
    pub(crate) fn stage(&mut self, schema: Schema) {
        if let Some(id) = schema.id() {
            self.staged.insert(id.to_string(), schema);
        }
    }

    pub(crate) fn staged(&self, id: &str) -> Option<Schema> {
        self.staged.get(id).cloned()
    }

    /// Hand the staged schemas to the caller for publication.
    pub(crate) fn take_staged(&mut self) -> Vec<Schema> {
        self.staged.drain(..).map(|(_, schema)| schema).collect()
    }

    /// Mark `id` as being parsed. Returns `false` if it already is, which
    /// means the imports form a cycle that eager loading cannot close.
    pub(crate) fn begin_load(&mut self, id: &str) -> bool {
        self.loading.insert(id.to_string())
    }

    pub(crate) fn end_load(&mut self, id: &str) {
        self.loading.remove(id);
    }
}

fn unable_to_load(schema_id: &str, error: &SchemaError) -> SchemaError {
    SchemaError::invalid(format!("Unable to load schema '{schema_id}'; {error}"))
}
