//! # Schema
//!
//! A [`Schema`] is an immutable, cheaply cloned handle to the types one
//! document declares and imports. [`Schema::plus_type`] returns a new
//! schema and leaves the receiver untouched.
//!
//! ## Document Structure
//!
//! ```text
//! $ion_schema_2_0
//! schema_header::{ imports: [ { id: "common.isl", type: positive_int, as: count } ] }
//! type::{ name: order, fields: { quantity: count } }
//! schema_footer::{}
//! ```
//!
//! ISL 1.0 ignores unknown top-level values and types after the footer.
//! ISL 2.0 is strict about ordering and reserves snake_case names: unknown
//! reserved-looking header, footer and type fields are errors unless the
//! header lists them in `user_reserved_fields`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use isl_core::{IonType, Value};

use crate::config::IslVersion;
use crate::constraints;
use crate::content::SchemaContent;
use crate::deferred::{DeferredReferenceManager, LocalScope};
use crate::error::{ensure, SchemaError};
use crate::reference::{definition, is_reserved_word, ParseContext};
use crate::types::{Type, TypeArena, TypeId, TypeKind, TypeNode};

// ─── Public Handles ─────────────────────────────────────────────────────────

/// The types one schema takes from another.
#[derive(Clone)]
pub struct Import {
    id: String,
    arena: Arc<TypeArena>,
    types: IndexMap<String, TypeId>,
}

impl Import {
    /// Id of the imported schema.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The imported type visible under `name` (an alias if one was given).
    pub fn get_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).map(|id| Type::new(&self.arena, *id))
    }

    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.types.values().map(|id| Type::new(&self.arena, *id))
    }
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("id", &self.id)
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A loaded schema.
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

#[derive(Clone)]
struct SchemaInner {
    id: Option<String>,
    version: IslVersion,
    arena: Arc<TypeArena>,
    declared: IndexMap<String, TypeId>,
    imported: IndexMap<String, TypeId>,
    /// Legacy mode only: the imports of whole-schema imports.
    transitive: IndexMap<String, TypeId>,
    imports: IndexMap<String, Import>,
    isl: Vec<Value>,
}

impl Schema {
    /// The id this schema was loaded under; `None` for ad hoc schemas.
    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    pub fn version(&self) -> IslVersion {
        self.0.version
    }

    /// The top-level values this schema was built from.
    pub fn isl(&self) -> &[Value] {
        &self.0.isl
    }

    /// Look `name` up among declared types, then imports, then builtins.
    pub fn get_type(&self, name: &str) -> Option<Type> {
        if let Some(id) = self.type_id(name) {
            return Some(Type::new(&self.0.arena, id));
        }
        self.0.arena.builtin(name).map(|id| Type::new(&self.0.arena, id))
    }

    /// A type declared by this schema itself.
    pub fn get_declared_type(&self, name: &str) -> Option<Type> {
        self.0.declared.get(name).map(|id| Type::new(&self.0.arena, *id))
    }

    pub fn get_declared_types(&self) -> Vec<Type> {
        self.0.declared.values().map(|id| Type::new(&self.0.arena, *id)).collect()
    }

    /// Declared types in document order, then imported types.
    pub fn get_types(&self) -> Vec<Type> {
        self.0
            .declared
            .values()
            .chain(self.0.imported.values())
            .map(|id| Type::new(&self.0.arena, *id))
            .collect()
    }

    pub fn get_import(&self, id: &str) -> Option<&Import> {
        self.0.imports.get(id)
    }

    pub fn get_imports(&self) -> impl Iterator<Item = &Import> {
        self.0.imports.values()
    }

    /// A new schema with `ty` added, replacing any declared type of the same
    /// name. The result has no id and is not cached.
    ///
    /// # Errors
    ///
    /// Fails if `ty` has no `name` field or was built by another schema
    /// system.
    pub fn plus_type(&self, ty: &Type) -> Result<Schema, SchemaError> {
        ensure(Arc::ptr_eq(ty.arena(), &self.0.arena), || {
            format!("Type '{}' belongs to a different schema system", ty.name())
        })?;
        let name = ty
            .isl()
            .get("name")
            .and_then(Value::as_symbol)
            .ok_or_else(|| {
                SchemaError::invalid(format!("Top-level types of a schema must have a name: {}", ty.isl()))
            })?;
        let declaration = if ty.isl().has_annotation("type") {
            ty.isl().clone()
        } else {
            ty.isl().clone().with_annotations(["type"])
        };

        let mut isl = Vec::with_capacity(self.0.isl.len() + 1);
        let mut added = false;
        for value in &self.0.isl {
            if !added {
                if is_declaration_of(value, name) {
                    isl.push(declaration.clone());
                    added = true;
                    continue;
                }
                if value.has_annotation("schema_footer") {
                    isl.push(declaration.clone());
                    added = true;
                }
            }
            isl.push(value.clone());
        }
        if !added {
            isl.push(declaration);
        }

        let mut inner = (*self.0).clone();
        inner.id = None;
        inner.isl = isl;
        inner.declared.insert(name.to_string(), ty.id());
        Ok(Schema(Arc::new(inner)))
    }

    pub(crate) fn declared_type_id(&self, name: &str) -> Option<TypeId> {
        self.0.declared.get(name).copied()
    }

    /// A declared, imported or transitively imported type.
    pub(crate) fn type_id(&self, name: &str) -> Option<TypeId> {
        let inner = &self.0;
        if let Some(id) = inner.declared.get(name).or_else(|| inner.imported.get(name)) {
            return Some(*id);
        }
        let id = inner.transitive.get(name).copied()?;
        tracing::warn!(
            schema = inner.id.as_deref().unwrap_or("<anonymous>"),
            "type '{name}' is only visible through a transitive import"
        );
        Some(id)
    }
}

fn is_declaration_of(value: &Value, name: &str) -> bool {
    value.ion_type() == IonType::Struct
        && value.has_annotation("type")
        && value.get("name").and_then(Value::as_symbol) == Some(name)
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.0.id)
            .field("version", &self.0.version)
            .field("declared", &self.0.declared.keys().collect::<Vec<_>>())
            .field("imports", &self.0.imports.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Where a top-level value sits in the document.
enum TopLevel<'v> {
    Marker(&'v str),
    Header,
    Footer,
    Type,
    OpenContent,
}

fn classify<'v>(value: &'v Value, version: IslVersion) -> TopLevel<'v> {
    if let Some(text) = value.as_symbol() {
        if value.annotations().is_empty() && IslVersion::looks_like_marker(text) {
            return TopLevel::Marker(text);
        }
    }
    let is_struct = value.ion_type() == IonType::Struct && !value.is_null();
    match version {
        IslVersion::V1_0 => {
            if value.has_annotation("schema_header") {
                TopLevel::Header
            } else if value.has_annotation("type") && is_struct {
                TopLevel::Type
            } else if value.has_annotation("schema_footer") {
                TopLevel::Footer
            } else {
                TopLevel::OpenContent
            }
        }
        IslVersion::V2_0 => match value.annotations() {
            [only] if is_struct && only == "schema_header" => TopLevel::Header,
            [only] if is_struct && only == "schema_footer" => TopLevel::Footer,
            [only] if is_struct && only == "type" => TopLevel::Type,
            _ => TopLevel::OpenContent,
        },
    }
}

/// Whether `word` is an ISL 2.0 keyword.
fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "schema_header" | "schema_footer" | "type" | "imports" | "user_reserved_fields" | "id" | "as" | "name" | "occurs"
    ) || constraints::lookup(word, IslVersion::V2_0).is_some()
}

/// Schema-wide parse state.
struct Loader<'s> {
    id: Option<&'s str>,
    version: IslVersion,
    scope: Arc<LocalScope>,
    /// Import id to the names bound from it.
    imports: IndexMap<String, IndexMap<String, TypeId>>,
    /// Bound import name to the `(schema id, type name)` it came from.
    origins: HashMap<String, (String, String)>,
    footer_words: HashSet<String>,
}

/// Build the schema `id` from `content`, deferring every reference that
/// cannot be resolved yet to `manager`.
pub(crate) fn parse_schema(
    manager: &mut DeferredReferenceManager<'_>,
    id: Option<&str>,
    content: &SchemaContent,
) -> Result<Schema, SchemaError> {
    let version = content.version;
    let arena = Arc::clone(manager.host().arena());
    let scope = Arc::new(LocalScope::new(id.map(str::to_string)));
    let mut loader = Loader {
        id,
        version,
        scope: Arc::clone(&scope),
        imports: IndexMap::new(),
        origins: HashMap::new(),
        footer_words: HashSet::new(),
    };
    let mut cx = ParseContext::new(manager, Arc::clone(&scope), version);

    let mut found_marker = false;
    let mut found_header = false;
    let mut found_footer = false;
    let mut found_type = false;
    for value in &content.values {
        match classify(value, version) {
            TopLevel::Marker(text) => {
                ensure(text == version.marker(), || format!("Unsupported Ion Schema version: {text}"))?;
                if version == IslVersion::V2_0 {
                    ensure(!found_marker, || {
                        "Only one Ion Schema version marker is allowed in a schema document.".to_string()
                    })?;
                    ensure(!found_header && !found_type && !found_footer, || {
                        "Ion Schema version marker must come before any header, types, and footer.".to_string()
                    })?;
                }
                found_marker = true;
            }
            TopLevel::Header => {
                ensure(!found_header, || "Only one schema header is allowed in a schema document.".to_string())?;
                if version == IslVersion::V2_0 {
                    ensure(!found_type, || "Schema header must appear before any types.".to_string())?;
                }
                loader.header(value, &mut cx)?;
                found_header = true;
            }
            TopLevel::Footer => {
                ensure(found_header, || "Found a schema_footer, but not a schema_header".to_string())?;
                ensure(!found_footer, || "Only one schema footer is allowed in a schema document.".to_string())?;
                if version == IslVersion::V2_0 {
                    loader.check_footer(value)?;
                }
                found_footer = true;
            }
            TopLevel::Type => {
                if found_footer {
                    ensure(version == IslVersion::V1_0, || {
                        "Types may not occur after the schema footer.".to_string()
                    })?;
                    continue;
                }
                loader.declare(value, &mut cx)?;
                found_type = true;
            }
            TopLevel::OpenContent => {
                if version == IslVersion::V2_0 {
                    ensure(!value.annotations().iter().any(|a| is_reserved_word(a)), || {
                        format!("Illegal top-level value in schema document: {value}")
                    })?;
                }
            }
        }
    }
    ensure(found_footer || !found_header, || "Found a schema_header, but not a schema_footer".to_string())?;

    if !found_type {
        tracing::warn!(schema = id.unwrap_or("<anonymous>"), "schema declares no types");
    }
    tracing::debug!(schema = id.unwrap_or("<anonymous>"), %version, "schema parsed");

    let imports = loader
        .imports
        .into_iter()
        .map(|(import_id, types)| {
            let import = Import {
                id: import_id.clone(),
                arena: Arc::clone(&arena),
                types,
            };
            (import_id, import)
        })
        .collect();
    Ok(Schema(Arc::new(SchemaInner {
        id: id.map(str::to_string),
        version,
        arena,
        declared: scope.declared(),
        imported: scope.imported(),
        transitive: scope.transitive(),
        imports,
        isl: content.values.clone(),
    })))
}

impl Loader<'_> {
    fn declare(&mut self, value: &Value, cx: &mut ParseContext<'_, '_>) -> Result<(), SchemaError> {
        if let Some(name) = value.get("name").and_then(Value::as_symbol) {
            ensure(!self.scope.is_declared(name), || format!("Invalid duplicate type name: '{name}'"))?;
            ensure(!self.scope.is_bound(name), || format!("Duplicate type name/alias encountered: '{name}'"))?;
        }
        let id = definition(value, cx, true)?;
        if let Some(name) = value.get("name").and_then(Value::as_symbol) {
            self.scope.declare(name, id);
        }
        Ok(())
    }

    fn header(&mut self, header: &Value, cx: &mut ParseContext<'_, '_>) -> Result<(), SchemaError> {
        let Some(fields) = header.fields() else {
            return Ok(());
        };
        if self.version == IslVersion::V2_0 {
            let header_words = self.user_reserved_fields(header, fields)?;
            let unexpected: Vec<&str> = fields
                .iter()
                .map(|(name, _)| name.as_str())
                .filter(|name| {
                    is_reserved_word(name)
                        && !matches!(*name, "imports" | "user_reserved_fields")
                        && !header_words.contains(*name)
                })
                .collect();
            ensure(unexpected.is_empty(), || {
                format!("Found unexpected field names [{}] in schema header: {header}", unexpected.join(", "))
            })?;
        }

        let Some(imports) = header.get("imports") else {
            return Ok(());
        };
        let items = match imports.elements() {
            Some(items) if imports.ion_type() == IonType::List => items,
            _ => {
                ensure(self.version == IslVersion::V1_0, || {
                    format!("imports must be a list of structs: {imports}")
                })?;
                return Ok(());
            }
        };
        for import in items {
            if import.ion_type() != IonType::Struct || import.is_null() {
                ensure(self.version == IslVersion::V1_0, || {
                    format!("imports must be a list of structs: {imports}")
                })?;
                continue;
            }
            self.import(import, cx)?;
        }
        Ok(())
    }

    /// Record the header's `user_reserved_fields`, returning the header words.
    fn user_reserved_fields(&mut self, header: &Value, fields: &[(String, Value)]) -> Result<HashSet<String>, SchemaError> {
        let mut declared = fields.iter().filter(|(name, _)| name == "user_reserved_fields");
        let Some((_, reserved)) = declared.next() else {
            return Ok(HashSet::new());
        };
        ensure(declared.next().is_none(), || {
            "'user_reserved_fields' must only appear 0 or 1 times in the schema header".to_string()
        })?;
        ensure(reserved.ion_type() == IonType::Struct && !reserved.is_null(), || {
            "'user_reserved_fields' must be a non-null struct".to_string()
        })?;
        ensure(reserved.annotations().is_empty(), || {
            "'user_reserved_fields' may not have any annotations".to_string()
        })?;
        let words = |field: &str| -> Result<HashSet<String>, SchemaError> {
            let Some(list) = reserved.get(field) else {
                return Ok(HashSet::new());
            };
            let items = match list.elements() {
                Some(items) if list.ion_type() == IonType::List => items,
                _ => {
                    return Err(SchemaError::invalid(format!(
                        "list of user reserved symbols for {field} must be a list: {header}"
                    )))
                }
            };
            items
                .iter()
                .map(|item| {
                    let word = item.as_symbol().ok_or_else(|| {
                        SchemaError::invalid(format!("user reserved fields for {field} must be symbols: {item}"))
                    })?;
                    ensure(!is_keyword(word), || {
                        format!("Ion Schema 2.0 keyword '{word}' may not be declared as a user reserved field: {reserved}")
                    })?;
                    Ok(word.to_string())
                })
                .collect()
        };
        let header_words = words("schema_header")?;
        self.scope.reserve_type_words(words("type")?);
        self.footer_words = words("schema_footer")?;
        Ok(header_words)
    }

    fn check_footer(&self, footer: &Value) -> Result<(), SchemaError> {
        let unexpected: Vec<&str> = footer
            .fields()
            .unwrap_or_default()
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| is_reserved_word(name) && !self.footer_words.contains(*name))
            .collect();
        ensure(unexpected.is_empty(), || {
            format!("Found unexpected field names [{}] in schema footer: {footer}", unexpected.join(", "))
        })
    }

    fn import(&mut self, import: &Value, cx: &mut ParseContext<'_, '_>) -> Result<(), SchemaError> {
        if self.version == IslVersion::V2_0 {
            let unexpected: Vec<&str> = import
                .fields()
                .unwrap_or_default()
                .iter()
                .map(|(name, _)| name.as_str())
                .filter(|name| !matches!(*name, "id" | "type" | "as"))
                .collect();
            ensure(unexpected.is_empty(), || {
                format!("Found unexpected field names [{}] in import: {import}", unexpected.join(", "))
            })?;
        }
        let import_id = import
            .get("id")
            .and_then(Value::as_text)
            .ok_or_else(|| SchemaError::invalid(format!("Import 'id' must be text: {import}")))?;
        let type_name = import.get("type").and_then(Value::as_symbol);
        let alias = import.get("as").and_then(Value::as_symbol);
        if self.version == IslVersion::V2_0 {
            ensure(alias.is_none() || type_name.is_some(), || {
                format!("'as' only allowed when 'type' is present: {import}")
            })?;
        }
        ensure(self.id != Some(import_id), || format!("Schema can not import itself: {import}"))?;
        let legacy = self.version == IslVersion::V1_0 && cx.config().allow_transitive_imports;

        match type_name {
            Some(name) => self.import_type(import, import_id, name, alias, legacy, cx),
            None if legacy => {
                let schema = load_eagerly(import_id, cx)?;
                for (name, id) in &schema.0.declared {
                    self.bind(import_id, name, name, *id)?;
                }
                for (name, id) in schema.0.imported.iter().chain(&schema.0.transitive) {
                    self.scope.import_transitive(name, *id);
                }
                Ok(())
            }
            None => {
                let content = cx
                    .host()
                    .schema_content(import_id)
                    .map_err(|e| SchemaError::invalid(format!("Unable to load schema '{import_id}'; {e}")))?;
                for name in &content.declared_types {
                    let slot = cx.manager.create_deferred_import_reference(import_id, name)?;
                    self.bind(import_id, name, name, slot)?;
                }
                Ok(())
            }
        }
    }

    fn import_type(
        &mut self,
        import: &Value,
        import_id: &str,
        name: &str,
        alias: Option<&str>,
        legacy: bool,
        cx: &mut ParseContext<'_, '_>,
    ) -> Result<(), SchemaError> {
        let declared = cx
            .host()
            .schema_content(import_id)
            .map_err(|e| SchemaError::invalid(format!("Unable to load schema '{import_id}'; {e}")))?
            .declares(name);
        let target = if declared {
            cx.manager.create_deferred_import_reference(import_id, name)?
        } else if legacy {
            let schema = load_eagerly(import_id, cx)?;
            let id = schema.type_id(name).ok_or_else(|| {
                SchemaError::invalid(format!("Schema {import_id} doesn't contain a type named '{name}'"))
            })?;
            tracing::warn!(
                schema = self.id.unwrap_or("<anonymous>"),
                "type '{name}' is imported from {import_id}, which does not declare it"
            );
            id
        } else {
            return Err(SchemaError::invalid(format!(
                "Schema {import_id} doesn't contain a type named '{name}'"
            )));
        };
        match alias {
            Some(alias) => {
                let aliased = cx.arena().define(TypeNode {
                    name: alias.to_string(),
                    isl: import.clone(),
                    schema_id: self.id.map(str::to_string),
                    kind: TypeKind::Alias(target),
                });
                self.bind(import_id, alias, name, aliased)
            }
            None => self.bind(import_id, name, name, target),
        }
    }

    /// Make `target` visible as `name`. Importing the same type under the
    /// same name twice is a no-op.
    fn bind(&mut self, import_id: &str, name: &str, type_name: &str, target: TypeId) -> Result<(), SchemaError> {
        let origin = (import_id.to_string(), type_name.to_string());
        if let Some(existing) = self.origins.get(name) {
            ensure(*existing == origin, || {
                format!("Duplicate imported type name/alias encountered: '{name}'")
            })?;
            return Ok(());
        }
        ensure(!self.scope.is_declared(name), || {
            format!("Duplicate type name/alias encountered: '{name}'")
        })?;
        self.scope.import(name, target);
        self.origins.insert(name.to_string(), origin);
        self.imports
            .entry(import_id.to_string())
            .or_default()
            .insert(name.to_string(), target);
        Ok(())
    }
}

/// Load an imported schema now rather than deferring, for the legacy
/// transitive-import mode.
fn load_eagerly(import_id: &str, cx: &mut ParseContext<'_, '_>) -> Result<Schema, SchemaError> {
    let host = cx.host();
    host.load_schema_with(cx.manager, import_id)
        .map_err(|e| SchemaError::invalid(format!("Unable to load schema '{import_id}'; {e}")))
}
