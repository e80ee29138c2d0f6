//! # Schema System
//!
//! The entry point for hosts. A [`SchemaSystem`] owns the type arena, the
//! authority chain, the schema cache and the content cache, and builds
//! every schema through one [`DeferredReferenceManager`] per top-level call.
//!
//! ```text
//! load_schema(id)
//!   ├── cache hit ─────────────────────────────► Schema
//!   └── miss: parse id, stage it
//!         ├── resolve deferred references (may load and stage more)
//!         ├── ok:  publish every staged schema ─► Schema
//!         └── err: unload dependents, discard staging
//! ```

use std::sync::Arc;

use isl_core::{parse_all, parse_one, Value};

use crate::authority::{self, Authority};
use crate::cache::{InMemorySchemaCache, SchemaCache};
use crate::config::SchemaSystemConfig;
use crate::content::{SchemaContent, SchemaContentCache};
use crate::deferred::{DeferredReferenceManager, LocalScope, SchemaHost};
use crate::error::SchemaError;
use crate::reference::{definition, ParseContext};
use crate::schema::{parse_schema, Schema};
use crate::types::{Type, TypeArena};

/// Loads, caches and builds schemas and types.
pub struct SchemaSystem {
    arena: Arc<TypeArena>,
    authorities: Arc<Vec<Box<dyn Authority>>>,
    config: SchemaSystemConfig,
    cache: Arc<dyn SchemaCache>,
    content: SchemaContentCache,
}

impl std::fmt::Debug for SchemaSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSystem")
            .field("authorities", &self.authorities.len())
            .field("config", &self.config)
            .field("content", &self.content)
            .finish()
    }
}

/// Assembles a [`SchemaSystem`].
#[derive(Default)]
pub struct SchemaSystemBuilder {
    authorities: Vec<Box<dyn Authority>>,
    config: SchemaSystemConfig,
    cache: Option<Arc<dyn SchemaCache>>,
}

impl SchemaSystemBuilder {
    /// Append an authority. Authorities are consulted in the order added.
    pub fn with_authority(mut self, authority: impl Authority + 'static) -> Self {
        self.authorities.push(Box::new(authority));
        self
    }

    pub fn with_authorities(mut self, authorities: impl IntoIterator<Item = Box<dyn Authority>>) -> Self {
        self.authorities.extend(authorities);
        self
    }

    pub fn with_config(mut self, config: SchemaSystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `cache` instead of a fresh [`InMemorySchemaCache`].
    pub fn with_cache(mut self, cache: impl SchemaCache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn build(self) -> SchemaSystem {
        let authorities = Arc::new(self.authorities);
        let default_version = self.config.default_version;
        let loader_authorities = Arc::clone(&authorities);
        let content = SchemaContentCache::new(move |id| {
            let values = authority::resolve(&loader_authorities, id)?;
            Ok(Arc::new(SchemaContent::from_values(values, default_version)?))
        });
        SchemaSystem {
            arena: Arc::new(TypeArena::new()),
            authorities,
            config: self.config,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(InMemorySchemaCache::new())),
            content,
        }
    }
}

impl SchemaSystem {
    pub fn builder() -> SchemaSystemBuilder {
        SchemaSystemBuilder::default()
    }

    pub fn config(&self) -> &SchemaSystemConfig {
        &self.config
    }

    pub fn schema_cache(&self) -> &Arc<dyn SchemaCache> {
        &self.cache
    }

    pub fn content_cache(&self) -> &SchemaContentCache {
        &self.content
    }

    /// Load schema `id` through the cache, then the authorities.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Unresolvable`] if no authority has `id`;
    /// [`SchemaError::Parse`] or [`SchemaError::Invalid`] if it, or a
    /// schema it imports, is not a valid schema. Schemas loaded along the
    /// way are not cached when the load fails.
    pub fn load_schema(&self, id: &str) -> Result<Schema, SchemaError> {
        if let Some(schema) = self.cache.get(id) {
            tracing::debug!(id, "schema cache hit");
            return Ok(schema);
        }
        tracing::debug!(id, "loading schema");
        let mut manager = DeferredReferenceManager::new(self);
        let parsed = self.load_schema_with(&mut manager, id);
        let schema = self.complete(manager, parsed)?;
        Ok(self.cache.get_or_insert_with(id, &mut || schema.clone()))
    }

    /// Build a schema from ISL text. The result has no id and is not cached;
    /// schemas it imports are.
    pub fn new_schema(&self, text: &str) -> Result<Schema, SchemaError> {
        self.new_schema_from_values(parse_all(text)?)
    }

    pub fn new_schema_from_values(&self, values: Vec<Value>) -> Result<Schema, SchemaError> {
        let content = SchemaContent::from_values(values, self.config.default_version)?;
        let mut manager = DeferredReferenceManager::new(self);
        let parsed = parse_schema(&mut manager, None, &content);
        self.complete(manager, parsed)
    }

    /// Build an anonymous type from the ISL text of a type definition, in
    /// the default language version.
    pub fn new_type(&self, text: &str) -> Result<Type, SchemaError> {
        self.new_type_from_value(&parse_one(text)?)
    }

    pub fn new_type_from_value(&self, isl: &Value) -> Result<Type, SchemaError> {
        let scope = Arc::new(LocalScope::new(None));
        let mut manager = DeferredReferenceManager::new(self);
        let parsed = {
            let mut cx = ParseContext::new(&mut manager, scope, self.config.default_version);
            definition(isl, &mut cx, false)
        };
        let id = match parsed {
            Ok(id) => id,
            Err(e) => {
                manager.rollback();
                return Err(e);
            }
        };
        manager.resolve()?;
        self.publish(manager.take_staged());
        Ok(Type::new(&self.arena, id))
    }

    /// Evict `id` from the schema cache and the content cache.
    pub fn unload_schema(&self, id: &str) {
        self.cache.invalidate(id);
        self.content.invalidate(id);
    }

    pub fn is_schema_loaded(&self, id: &str) -> bool {
        self.cache.contains(id)
    }

    /// Resolve `manager`'s references and publish what it staged, or roll
    /// everything back if parsing or resolution failed.
    fn complete(&self, mut manager: DeferredReferenceManager<'_>, parsed: Result<Schema, SchemaError>) -> Result<Schema, SchemaError> {
        let schema = match parsed {
            Ok(schema) => schema,
            Err(e) => {
                manager.rollback();
                return Err(e);
            }
        };
        manager.resolve()?;
        self.publish(manager.take_staged());
        Ok(schema)
    }

    fn publish(&self, staged: Vec<Schema>) {
        for schema in staged {
            if let Some(id) = schema.id() {
                tracing::debug!(id, "schema cached");
                self.cache.get_or_insert_with(id, &mut || schema.clone());
            }
        }
    }

    fn parse_loaded(&self, manager: &mut DeferredReferenceManager<'_>, id: &str) -> Result<Schema, SchemaError> {
        let content = self.content.get_schema_content(id)?;
        manager.register_dependent_schema(id);
        parse_schema(manager, Some(id), &content)
    }
}

impl SchemaHost for SchemaSystem {
    fn arena(&self) -> &Arc<TypeArena> {
        &self.arena
    }

    fn config(&self) -> &SchemaSystemConfig {
        &self.config
    }

    fn load_schema_with(&self, manager: &mut DeferredReferenceManager<'_>, id: &str) -> Result<Schema, SchemaError> {
        if let Some(schema) = self.cache.get(id).or_else(|| manager.staged(id)) {
            return Ok(schema);
        }
        if !manager.begin_load(id) {
            return Err(SchemaError::invalid(format!(
                "Circular import detected while loading schema '{id}'"
            )));
        }
        let parsed = self.parse_loaded(manager, id);
        manager.end_load(id);
        let schema = parsed?;
        manager.stage(schema.clone());
        Ok(schema)
    }

    fn unload_schema(&self, id: &str) {
        SchemaSystem::unload_schema(self, id);
    }

    fn is_schema_loaded(&self, id: &str) -> bool {
        SchemaSystem::is_schema_loaded(self, id)
    }

    fn schema_content(&self, id: &str) -> Result<Arc<SchemaContent>, SchemaError> {
        self.content.get_schema_content(id)
    }
}
