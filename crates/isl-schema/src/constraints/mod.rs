//! # Constraints
//!
//! Every constraint kind is decided when the type is built and stored as a
//! [`ConstraintKind`] variant; validation is a `match`. Arguments that name
//! other types hold [`TypeId`]s into the arena.
//!
//! | Module | Constraints |
//! |---|---|
//! | [`logic`] | `type`, `all_of`, `any_of`, `one_of`, `not` |
//! | [`ordered`] | `ordered_elements` |
//! | [`fields`] | `fields`, `field_names`, `content` |
//! | [`collection`] | `element`, `contains` |
//! | [`annotations`] | `annotations` (both language versions) |
//! | [`valid_values`] | `valid_values` |
//! | [`scalar`] | `container_length` and the other lengths, `precision`, `scale`, `exponent`, timestamps, `ieee754_float` |
//! | [`regex`] | `regex` |

pub(crate) mod annotations;
pub(crate) mod collection;
pub(crate) mod fields;
pub(crate) mod logic;
pub(crate) mod ordered;
pub(crate) mod regex;
pub(crate) mod scalar;
pub(crate) mod valid_values;

use isl_core::{IonType, Value};

use crate::config::IslVersion;
use crate::error::SchemaError;
use crate::reference::ParseContext;
use crate::types::{TypeArena, TypeId};
use crate::violations::{ShortCircuit, Validation, Violation, Violations};

/// One parsed constraint of a type definition.
#[derive(Debug)]
pub(crate) struct Constraint {
    name: &'static str,
    isl: Value,
    kind: ConstraintKind,
}

#[derive(Debug)]
pub(crate) enum ConstraintKind {
    Type(TypeId),
    AllOf(Vec<TypeId>),
    AnyOf(Vec<TypeId>),
    OneOf(Vec<TypeId>),
    Not(TypeId),
    OrderedElements(ordered::OrderedElements),
    Fields(fields::Fields),
    FieldNames(fields::FieldNames),
    /// `content: closed`; enforced by `fields`.
    Content,
    Element(collection::Element),
    Contains(Vec<Value>),
    Annotations(annotations::Annotations),
    ValidValues(valid_values::ValidValues),
    Length(scalar::Length),
    Precision(crate::range::IntRange),
    Exponent(scalar::Exponent),
    TimestampPrecision(crate::range::IntRange),
    TimestampOffset(Vec<Option<i32>>),
    Ieee754Float(scalar::FloatFormat),
    Regex(regex::Pattern),
}

/// Constraint names and the language versions that define them.
const CATALOG: &[(&str, bool, bool)] = &[
    // (name, in 1.0, in 2.0)
    ("all_of", true, true),
    ("annotations", true, true),
    ("any_of", true, true),
    ("byte_length", true, true),
    ("codepoint_length", true, true),
    ("container_length", true, true),
    ("contains", true, true),
    ("content", true, false),
    ("element", true, true),
    ("exponent", false, true),
    ("field_names", false, true),
    ("fields", true, true),
    ("ieee754_float", false, true),
    ("not", true, true),
    ("one_of", true, true),
    ("ordered_elements", true, true),
    ("precision", true, true),
    ("regex", true, true),
    ("scale", true, false),
    ("timestamp_offset", true, true),
    ("timestamp_precision", true, true),
    ("type", true, true),
    ("utf8_byte_length", true, true),
    ("valid_values", true, true),
];

/// The catalog entry for `name` under `version`.
pub(crate) fn lookup(name: &str, version: IslVersion) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|(n, v1, v2)| {
            *n == name
                && match version {
                    IslVersion::V1_0 => *v1,
                    IslVersion::V2_0 => *v2,
                }
        })
        .map(|(n, _, _)| *n)
}

impl Constraint {
    /// Parse the constraint `name: arg` found in `definition`. Returns `None`
    /// when `name` is not a constraint of the schema's language version.
    pub(crate) fn parse(
        name: &str,
        arg: &Value,
        definition: &Value,
        cx: &mut ParseContext<'_, '_>,
    ) -> Result<Option<Constraint>, SchemaError> {
        let Some(name) = lookup(name, cx.version) else {
            return Ok(None);
        };
        let kind = match name {
            "type" | "all_of" | "any_of" | "one_of" | "not" => logic::parse(name, arg, cx)?,
            "ordered_elements" => ConstraintKind::OrderedElements(ordered::OrderedElements::parse(arg, cx)?),
            "fields" => ConstraintKind::Fields(fields::Fields::parse(arg, definition, cx)?),
            "field_names" => ConstraintKind::FieldNames(fields::FieldNames::parse(arg, cx)?),
            "content" => fields::parse_content(arg)?,
            "element" => ConstraintKind::Element(collection::Element::parse(arg, cx)?),
            "contains" => collection::parse_contains(arg)?,
            "annotations" => ConstraintKind::Annotations(annotations::Annotations::parse(arg, cx)?),
            "valid_values" => ConstraintKind::ValidValues(valid_values::ValidValues::parse(arg)?),
            "container_length" | "byte_length" | "codepoint_length" | "utf8_byte_length" | "scale" => {
                ConstraintKind::Length(scalar::Length::parse(name, arg)?)
            }
            "precision" => scalar::parse_precision(arg)?,
            "exponent" => ConstraintKind::Exponent(scalar::Exponent::parse(arg)?),
            "timestamp_precision" => scalar::parse_timestamp_precision(arg)?,
            "timestamp_offset" => scalar::parse_timestamp_offset(arg)?,
            "ieee754_float" => ConstraintKind::Ieee754Float(scalar::FloatFormat::parse(arg)?),
            "regex" => ConstraintKind::Regex(regex::Pattern::parse(arg, cx.version)?),
            _ => return Ok(None),
        };
        Ok(Some(Constraint {
            name,
            isl: arg.clone(),
            kind,
        }))
    }

    /// A constraint synthesised rather than written, such as the implicit
    /// `type: any` of ISL 1.0.
    pub(crate) fn implicit_type(target: TypeId, isl: Value) -> Constraint {
        Constraint {
            name: "type",
            isl,
            kind: ConstraintKind::Type(target),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn isl(&self) -> &Value {
        &self.isl
    }

    pub(crate) fn is_annotations(&self) -> bool {
        matches!(self.kind, ConstraintKind::Annotations(_))
    }

    /// The argument of a `type` constraint.
    pub(crate) fn type_argument(&self) -> Option<TypeId> {
        match self.kind {
            ConstraintKind::Type(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn validate(&self, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        let isl = &self.isl;
        match &self.kind {
            ConstraintKind::Type(id) => arena.validate(*id, value, sink),
            ConstraintKind::AllOf(ids) => logic::all_of(isl, ids, arena, value, sink),
            ConstraintKind::AnyOf(ids) => logic::any_of(isl, ids, arena, value, sink),
            ConstraintKind::OneOf(ids) => logic::one_of(isl, ids, arena, value, sink),
            ConstraintKind::Not(id) => logic::not(isl, *id, arena, value, sink),
            ConstraintKind::OrderedElements(c) => c.validate(isl, arena, value, sink),
            ConstraintKind::Fields(c) => c.validate(isl, arena, value, sink),
            ConstraintKind::FieldNames(c) => c.validate(isl, arena, value, sink),
            ConstraintKind::Content => Ok(()),
            ConstraintKind::Element(c) => c.validate(isl, arena, value, sink),
            ConstraintKind::Contains(expected) => collection::contains(isl, expected, value, sink),
            ConstraintKind::Annotations(c) => c.validate(isl, arena, value, sink),
            ConstraintKind::ValidValues(c) => c.validate(isl, value, sink),
            ConstraintKind::Length(c) => c.validate(isl, value, sink),
            ConstraintKind::Precision(range) => scalar::precision(isl, range, value, sink),
            ConstraintKind::Exponent(c) => c.validate(isl, value, sink),
            ConstraintKind::TimestampPrecision(range) => scalar::timestamp_precision(isl, range, value, sink),
            ConstraintKind::TimestampOffset(offsets) => scalar::timestamp_offset(isl, offsets, value, sink),
            ConstraintKind::Ieee754Float(format) => format.validate(isl, value, sink),
            ConstraintKind::Regex(pattern) => pattern.validate(isl, value, sink),
        }
    }
}

// ─── Shared Checks ──────────────────────────────────────────────────────────

/// Gate a constraint to non-null values whose kind satisfies `kinds`.
///
/// Records `null_value` or `invalid_type` and returns `Ok(false)` when the
/// constraint does not apply.
pub(crate) fn applies(
    isl: &Value,
    value: &Value,
    kinds: impl Fn(IonType) -> bool,
    sink: &mut Violations,
) -> Result<bool, ShortCircuit> {
    if value.is_null() {
        sink.add(Violation::new(isl, "null_value", "not applicable for null values"))?;
        return Ok(false);
    }
    if !kinds(value.ion_type()) {
        sink.add(Violation::new(
            isl,
            "invalid_type",
            format!("not applicable for type {}", value.ion_type()),
        ))?;
        return Ok(false);
    }
    Ok(true)
}

/// Reject a null argument or one whose kind is not `kind`.
pub(crate) fn expect_kind<'v>(arg: &'v Value, kind: IonType, what: &str) -> Result<&'v Value, SchemaError> {
    if arg.is_null() || arg.ion_type() != kind {
        return Err(SchemaError::invalid(format!("{what} must be a non-null {kind}, found {arg}")));
    }
    Ok(arg)
}
