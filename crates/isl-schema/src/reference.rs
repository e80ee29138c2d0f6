//! # Type References and Definitions
//!
//! [`type_reference`] turns the ISL found where a type is expected into a
//! [`TypeId`]. A reference is one of:
//!
//! - a builtin name, used as is;
//! - a name already in scope, wrapped so failures report the name;
//! - a name not seen yet, which becomes a deferred local reference;
//! - an inline import `{ id, type }`, which becomes a deferred import
//!   reference so that import cycles between documents resolve;
//! - an inline definition.
//!
//! `nullable::` (ISL 1.0) and `$null_or::` (ISL 2.0) wrap the result.
//!
//! [`definition`] builds the constraint list of a named or inline type.

use std::collections::HashSet;
use std::sync::Arc;

use isl_core::{Data, IonType, Value};

use crate::config::{IslVersion, SchemaSystemConfig};
use crate::constraints::{self, Constraint};
use crate::deferred::{DeferredReferenceManager, LocalScope, SchemaHost};
use crate::error::{ensure, SchemaError};
use crate::types::{Definition, NullMode, TypeArena, TypeId, TypeKind, TypeNode};

/// Everything needed to parse ISL that may name other types.
pub(crate) struct ParseContext<'a, 'h> {
    pub manager: &'a mut DeferredReferenceManager<'h>,
    pub scope: Arc<LocalScope>,
    pub version: IslVersion,
}

impl<'a, 'h> ParseContext<'a, 'h> {
    pub(crate) fn new(manager: &'a mut DeferredReferenceManager<'h>, scope: Arc<LocalScope>, version: IslVersion) -> Self {
        Self { manager, scope, version }
    }

    pub(crate) fn host(&self) -> &'h dyn SchemaHost {
        self.manager.host()
    }

    pub(crate) fn arena(&self) -> &'h Arc<TypeArena> {
        self.host().arena()
    }

    pub(crate) fn config(&self) -> &'h SchemaSystemConfig {
        self.host().config()
    }

    fn schema_id(&self) -> Option<String> {
        self.scope.schema_id().map(str::to_string)
    }
}

/// Where a reference appears, which changes what ISL 2.0 allows in it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RefOptions {
    /// The argument of `fields`, `element`, `field_names` or `annotations`:
    /// an inline definition is used directly, without a reporting wrapper.
    pub is_field: bool,
    /// An `occurs` field is permitted.
    pub variably_occurring: bool,
    /// A `distinct::` annotation is permitted.
    pub allow_distinct: bool,
}

/// Whether `word` has the shape ISL 2.0 reserves for its own keywords.
pub(crate) fn is_reserved_word(word: &str) -> bool {
    if let Some(rest) = word.strip_prefix("$ion_schema") {
        return rest.is_empty() || rest.starts_with('_');
    }
    let mut parts = word.split('_');
    let first_ok = parts.next().is_some_and(|first| {
        first.starts_with(|c: char| c.is_ascii_lowercase())
            && first.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    });
    first_ok
        && parts.all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

fn unresolvable(isl: &Value) -> SchemaError {
    SchemaError::invalid(format!("Unable to resolve type reference '{isl}'"))
}

/// Resolve the type reference `isl`.
pub(crate) fn type_reference(
    isl: &Value,
    cx: &mut ParseContext<'_, '_>,
    options: RefOptions,
) -> Result<TypeId, SchemaError> {
    if isl.is_null() {
        return Err(unresolvable(isl));
    }
    match cx.version {
        IslVersion::V1_0 => ensure(!isl.has_annotation("$null_or"), || {
            format!("'$null_or' is not supported before Ion Schema 2.0: {isl}")
        })?,
        IslVersion::V2_0 => {
            ensure(!isl.has_annotation("type"), || {
                format!("'type::' annotation not allowed on type references: {isl}")
            })?;
            let illegal: Vec<&str> = isl
                .annotations()
                .iter()
                .map(String::as_str)
                .filter(|a| *a != "$null_or" && !(options.allow_distinct && *a == "distinct"))
                .collect();
            ensure(illegal.is_empty(), || {
                format!("Illegal annotations [{}] on type reference: {isl}", illegal.join(", "))
            })?;
        }
    }

    let target = match isl.data() {
        Data::Struct(_) => struct_reference(isl, cx, options)?,
        Data::Symbol(name) => symbol_reference(name, cx)?,
        _ => return Err(unresolvable(isl)),
    };
    Ok(nullable(isl, target, cx))
}

fn symbol_reference(name: &str, cx: &mut ParseContext<'_, '_>) -> Result<TypeId, SchemaError> {
    let arena = cx.arena();
    if let Some(builtin) = arena.builtin(name) {
        return Ok(builtin);
    }
    let target = match cx.scope.lookup(name) {
        Some(id) => id,
        None => {
            let scope = Arc::clone(&cx.scope);
            cx.manager.create_deferred_local_reference(&scope, name)?
        }
    };
    Ok(arena.define(TypeNode {
        name: name.to_string(),
        isl: Value::symbol(name),
        schema_id: cx.schema_id(),
        kind: TypeKind::Reference(target),
    }))
}

fn struct_reference(isl: &Value, cx: &mut ParseContext<'_, '_>, options: RefOptions) -> Result<TypeId, SchemaError> {
    if cx.version == IslVersion::V2_0 {
        ensure(options.variably_occurring || isl.get("occurs").is_none(), || {
            format!("Variably occurring type reference not permitted: {isl}")
        })?;
        ensure(isl.get("name").is_none(), || {
            format!("Illegal 'name' field in type reference: {isl}")
        })?;
    }
    if let Some(id) = isl.get("id") {
        return inline_import(isl, id, cx);
    }

    let single_type = isl.fields().is_some_and(|f| f.len() == 1) && isl.get("type").is_some();
    let definition = definition(isl, cx, false)?;
    if options.is_field || single_type {
        return Ok(definition);
    }
    let bare = isl.without_annotations();
    Ok(cx.arena().define(TypeNode {
        name: bare.to_string(),
        isl: bare,
        schema_id: cx.schema_id(),
        kind: TypeKind::Reference(definition),
    }))
}

fn inline_import(isl: &Value, id: &Value, cx: &mut ParseContext<'_, '_>) -> Result<TypeId, SchemaError> {
    let schema_id = match id.data() {
        Data::String(s) | Data::Symbol(s) => s.as_str(),
        _ => return Err(SchemaError::invalid(format!("Import 'id' must be text: {isl}"))),
    };
    if cx.version == IslVersion::V2_0 {
        if let Some(fields) = isl.fields() {
            let unexpected: Vec<&str> = fields
                .iter()
                .map(|(name, _)| name.as_str())
                .filter(|name| !matches!(*name, "id" | "type" | "occurs"))
                .collect();
            ensure(unexpected.is_empty(), || {
                format!("Found unexpected field names [{}] in inline import: {isl}", unexpected.join(", "))
            })?;
        }
    }
    ensure(cx.scope.schema_id() != Some(schema_id), || {
        format!("A schema may not directly import itself: {isl}")
    })?;
    let name = isl
        .get("type")
        .and_then(Value::as_symbol)
        .ok_or_else(|| SchemaError::invalid(format!("Inline import requires a 'type' symbol: {isl}")))?;
    if cx.version == IslVersion::V1_0 && cx.config().allow_transitive_imports {
        let host = cx.host();
        let schema = host
            .load_schema_with(cx.manager, schema_id)
            .map_err(|e| SchemaError::invalid(format!("Unable to load schema '{schema_id}'; {e}")))?;
        return schema
            .type_id(name)
            .ok_or_else(|| SchemaError::invalid(format!("No type named '{name}' in schema {schema_id}")));
    }
    cx.manager.create_deferred_import_reference(schema_id, name)
}

fn nullable(isl: &Value, target: TypeId, cx: &ParseContext<'_, '_>) -> TypeId {
    let mode = if isl.has_annotation("nullable") && cx.version == IslVersion::V1_0 {
        NullMode::BaseKind
    } else if isl.has_annotation("$null_or") {
        NullMode::NullOnly
    } else {
        return target;
    };
    cx.arena().define(TypeNode {
        name: isl.without_annotations().to_string(),
        isl: isl.clone(),
        schema_id: cx.schema_id(),
        kind: TypeKind::Nullable { target, mode },
    })
}

// ─── Definitions ────────────────────────────────────────────────────────────

/// Build a type from the struct `isl`. A `named` type is a top-level
/// declaration and must carry a `name`.
pub(crate) fn definition(isl: &Value, cx: &mut ParseContext<'_, '_>, named: bool) -> Result<TypeId, SchemaError> {
    let fields = match isl.fields() {
        Some(fields) if isl.ion_type() == IonType::Struct => fields,
        _ => return Err(SchemaError::invalid(format!("Type definition must be a non-null struct: {isl}"))),
    };
    let name = match isl.get("name").and_then(Value::as_symbol) {
        Some(name) if named => {
            ensure(!cx.arena().is_builtin_name(name), || {
                format!("Type name '{name}' collides with a built-in type")
            })?;
            name.to_string()
        }
        Some(name) => name.to_string(),
        None if named => {
            return Err(SchemaError::invalid(format!(
                "Top-level types of a schema must have a name: {isl}"
            )))
        }
        None => isl.without_annotations().to_string(),
    };

    if cx.version == IslVersion::V2_0 {
        check_field_names(isl, fields, cx)?;
    }

    let mut constraints = Vec::with_capacity(fields.len() + 1);
    let mut seen = HashSet::new();
    for (field, arg) in fields {
        if matches!(field.as_str(), "name" | "occurs") {
            continue;
        }
        let Some(constraint) = Constraint::parse(field, arg, isl, cx)? else {
            ensure(cx.config().allow_open_content, || {
                format!("Unknown constraint '{field}' in type definition: {isl}")
            })?;
            continue;
        };
        if cx.version == IslVersion::V2_0 {
            ensure(seen.insert(constraint.name()), || {
                format!("Constraint '{field}' may only occur once in a type definition: {isl}")
            })?;
        }
        constraints.push(constraint);
    }

    if cx.version == IslVersion::V1_0 && isl.get("type").is_none() {
        let any = cx
            .arena()
            .builtin("any")
            .ok_or_else(|| SchemaError::invalid("builtin type 'any' is missing"))?;
        constraints.push(Constraint::implicit_type(any, Value::symbol("any")));
    }
    // Stable, so the remaining constraints keep their written order.
    constraints.sort_by_key(|c| !c.is_annotations());

    let null_or_type = isl.get("type").is_some_and(|t| t.has_annotation("$null_or"));
    let node = TypeNode {
        name,
        isl: isl.clone(),
        schema_id: cx.schema_id(),
        kind: TypeKind::Definition(Definition {
            constraints,
            fail_fast_annotations: cx.config().fail_fast_on_invalid_annotations,
            null_or_type,
        }),
    };
    Ok(cx.arena().define(node))
}

/// ISL 2.0 reserves snake_case field names; only keywords and user reserved
/// words may use that shape.
fn check_field_names(isl: &Value, fields: &[(String, Value)], cx: &ParseContext<'_, '_>) -> Result<(), SchemaError> {
    let unexpected: Vec<&str> = fields
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| {
            is_reserved_word(name)
                && !matches!(*name, "name" | "occurs")
                && constraints::lookup(name, IslVersion::V2_0).is_none()
                && !cx.scope.is_user_type_word(name)
        })
        .collect();
    ensure(unexpected.is_empty(), || {
        format!("Found unexpected field names [{}] in type definition: {isl}", unexpected.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SchemaSystem;
    use crate::types::Type;
    use isl_core::parse_one;

    fn build(version: IslVersion, isl: &str) -> Result<Type, SchemaError> {
        let system = SchemaSystem::builder().build();
        let mut manager = DeferredReferenceManager::new(&system);
        let scope = Arc::new(LocalScope::new(None));
        let id = {
            let mut cx = ParseContext::new(&mut manager, scope, version);
            type_reference(&parse_one(isl)?, &mut cx, RefOptions::default())?
        };
        manager.resolve()?;
        Ok(Type::new(system.arena(), id))
    }

    #[test]
    fn test_reserved_words() {
        for word in ["type", "foo_bar", "a1_b2", "$ion_schema", "$ion_schema_x"] {
            assert!(is_reserved_word(word), "{word}");
        }
        for word in ["Foo", "_foo", "foo__bar", "foo_", "1abc", "$ion_schemas", "$other"] {
            assert!(!is_reserved_word(word), "{word}");
        }
    }

    #[test]
    fn test_builtin_symbol_is_unwrapped() {
        let ty = build(IslVersion::V1_0, "int").unwrap();
        assert!(ty.is_builtin());
    }

    #[test]
    fn test_inline_reference_reports_its_definition() {
        let ty = build(IslVersion::V2_0, "{ type: int, valid_values: [1, 2] }").unwrap();
        let violations = ty.validate(&Value::int(3));
        assert_eq!(violations.violations()[0].code, "type_mismatch");
        assert_eq!(
            violations.violations()[0].message,
            "expected type {type: int, valid_values: [1, 2]}"
        );
    }

    #[test]
    fn test_single_type_struct_is_elided() {
        let ty = build(IslVersion::V2_0, "{ type: int }").unwrap();
        let violations = ty.validate(&Value::string("x"));
        assert_eq!(violations.violations()[0].message, "expected type int, found string");
    }

    #[test]
    fn test_nullable_annotations_follow_version() {
        let ty = build(IslVersion::V1_0, "nullable::int").unwrap();
        assert!(ty.is_valid(&parse_one("null.int").unwrap()));
        let ty = build(IslVersion::V2_0, "$null_or::int").unwrap();
        assert!(ty.is_valid(&parse_one("null").unwrap()));
        assert!(build(IslVersion::V2_0, "nullable::int").is_err());
        assert!(build(IslVersion::V1_0, "$null_or::int").is_err());
    }

    #[test]
    fn test_v2_reference_restrictions() {
        assert!(build(IslVersion::V2_0, "type::{ type: int }").is_err());
        assert!(build(IslVersion::V2_0, "{ name: x, type: int }").is_err());
        assert!(build(IslVersion::V2_0, "{ type: int, occurs: optional }").is_err());
        assert!(build(IslVersion::V2_0, "{ type: int, type: string }").is_err());
        assert!(build(IslVersion::V2_0, "{ type: int, made_up: 1 }").is_err());
        assert!(build(IslVersion::V2_0, "{ type: int, MadeUp: 1 }").is_ok());
        assert!(build(IslVersion::V2_0, "{ type: int, $ion_schema_x: 1 }").is_err());
    }

    #[test]
    fn test_v1_adds_implicit_any() {
        let ty = build(IslVersion::V1_0, "{ codepoint_length: 1 }").unwrap();
        assert!(ty.is_valid(&Value::string("a")));
        assert!(!ty.is_valid(&Value::null()));
        let ty = build(IslVersion::V2_0, "{ codepoint_length: 1 }").unwrap();
        let violations = ty.validate(&Value::null());
        assert_eq!(violations.violations()[0].nested.violations()[0].code, "null_value");
    }

    #[test]
    fn test_unknown_constraints_respect_open_content() {
        assert!(build(IslVersion::V1_0, "{ type: int, extra: 1 }").is_ok());
        let config = SchemaSystemConfig {
            allow_open_content: false,
            ..SchemaSystemConfig::default()
        };
        let system = SchemaSystem::builder().with_config(config).build();
        let mut manager = DeferredReferenceManager::new(&system);
        let mut cx = ParseContext::new(&mut manager, Arc::new(LocalScope::new(None)), IslVersion::V1_0);
        let err = definition(&parse_one("{ type: int, extra: 1 }").unwrap(), &mut cx, false).unwrap_err();
        assert!(err.to_string().starts_with("Unknown constraint 'extra'"));
    }

    #[test]
    fn test_unresolvable_local_name_fails_at_resolve() {
        let err = build(IslVersion::V2_0, "missing").unwrap_err();
        assert_eq!(err.to_string(), "Unable to resolve type missing");
    }

    #[test]
    fn test_non_type_values_are_rejected() {
        for bad in ["5", "\"int\"", "null.symbol", "[int]"] {
            assert!(build(IslVersion::V2_0, bad).is_err(), "{bad}");
        }
    }
}
