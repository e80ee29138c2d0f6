//! # Schema Content Cache
//!
//! Loading a schema resolves all of its references, which may load more
//! schemas. Checking that an import names a type the target declares only
//! needs the target's top-level declarations, so those are read once per id
//! and kept here, independent of full resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use isl_core::{IonType, Value};
use parking_lot::RwLock;

use crate::config::IslVersion;
use crate::error::SchemaError;

/// The raw top-level values of one schema document and the names it declares.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContent {
    pub version: IslVersion,
    /// Names of top-level `type::` declarations in document order.
    pub declared_types: Vec<String>,
    pub values: Vec<Value>,
}

impl SchemaContent {
    /// Summarise a document. The first version marker wins; later markers
    /// are checked when the schema itself is built.
    pub fn from_values(values: Vec<Value>, default_version: IslVersion) -> Result<Self, SchemaError> {
        let mut version = None;
        for value in &values {
            let Some(text) = value.as_symbol() else { continue };
            if value.annotations().is_empty() && IslVersion::looks_like_marker(text) && version.is_none() {
                version = Some(
                    IslVersion::from_marker(text)
                        .ok_or_else(|| SchemaError::invalid(format!("Unsupported Ion Schema version: {text}")))?,
                );
            }
        }
        let declared_types = values
            .iter()
            .filter(|v| v.ion_type() == IonType::Struct && v.has_annotation("type"))
            .filter_map(|v| v.get("name").and_then(Value::as_symbol))
            .map(str::to_string)
            .collect();
        Ok(Self {
            version: version.unwrap_or(default_version),
            declared_types,
            values,
        })
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declared_types.iter().any(|t| t == name)
    }
}

type Loader = Box<dyn Fn(&str) -> Result<Arc<SchemaContent>, SchemaError> + Send + Sync>;

/// Memoizes [`SchemaContent`] by schema id.
pub struct SchemaContentCache {
    loader: Loader,
    entries: RwLock<HashMap<String, Arc<SchemaContent>>>,
}

impl fmt::Debug for SchemaContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaContentCache")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl SchemaContentCache {
    pub fn new(loader: impl Fn(&str) -> Result<Arc<SchemaContent>, SchemaError> + Send + Sync + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The content of `id`, loading it on first use. Loader errors are
    /// returned unchanged and nothing is cached for them.
    pub fn get_schema_content(&self, id: &str) -> Result<Arc<SchemaContent>, SchemaError> {
        if let Some(content) = self.entries.read().get(id) {
            return Ok(Arc::clone(content));
        }
        tracing::debug!(id, "loading schema content");
        let content = (self.loader)(id)?;
        let mut entries = self.entries.write();
        // A concurrent load may have won the race; keep the first entry.
        Ok(Arc::clone(entries.entry(id.to_string()).or_insert(content)))
    }

    pub fn does_schema_exist(&self, id: &str) -> bool {
        self.get_schema_content(id).is_ok()
    }

    pub fn does_schema_declare_type(&self, id: &str, name: &str) -> Result<bool, SchemaError> {
        Ok(self.get_schema_content(id)?.declares(name))
    }

    pub fn invalidate(&self, id: &str) {
        self.entries.write().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::parse_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn content(text: &str) -> SchemaContent {
        SchemaContent::from_values(parse_all(text).unwrap(), IslVersion::V1_0).unwrap()
    }

    #[test]
    fn test_declared_types_in_document_order() {
        let c = content("type::{ name: b } foo type::{ name: a } type::{ type: int } { name: c }");
        assert_eq!(c.declared_types, vec!["b", "a"]);
        assert!(c.declares("a"));
        assert!(!c.declares("c"));
    }

    #[test]
    fn test_version_marker() {
        assert_eq!(content("$ion_schema_2_0").version, IslVersion::V2_0);
        assert_eq!(content("type::{ name: a }").version, IslVersion::V1_0);
        let err = SchemaContent::from_values(parse_all("$ion_schema_3_0").unwrap(), IslVersion::V1_0).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported Ion Schema version: $ion_schema_3_0");
    }

    #[test]
    fn test_loads_once_until_invalidated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = SchemaContentCache::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(content("type::{ name: t }")))
        });
        assert!(cache.does_schema_declare_type("s", "t").unwrap());
        assert!(!cache.does_schema_declare_type("s", "u").unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cache.invalidate("s");
        assert!(cache.does_schema_exist("s"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_loader_errors_propagate_unchanged() {
        let cache = SchemaContentCache::new(|id| {
            Err(SchemaError::Unresolvable {
                id: id.to_string(),
                causes: vec![],
            })
        });
        let err = cache.get_schema_content("x").unwrap_err();
        assert_eq!(err, SchemaError::Unresolvable { id: "x".into(), causes: vec![] });
        assert!(!cache.does_schema_exist("x"));
    }
}
