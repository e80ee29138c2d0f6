//! # `element`, `contains`
//!
//! Both apply to every container kind. `element` validates each member
//! against a type and, when annotated `distinct::` (ISL 2.0), also reports
//! members equal to another member. `contains` checks that each listed
//! value is present somewhere in the container.

use isl_core::Value;

use super::{applies, ConstraintKind};
use crate::config::IslVersion;
use crate::error::{ensure, SchemaError};
use crate::reference::{type_reference, ParseContext, RefOptions};
use crate::types::{TypeArena, TypeId};
use crate::violations::{Validation, Violation, ViolationChild, Violations};

/// Members of a container paired with the key used to report them.
fn members(value: &Value) -> Vec<(Key<'_>, &Value)> {
    if let Some(fields) = value.fields() {
        return fields.iter().map(|(name, v)| (Key::Field(name), v)).collect();
    }
    value
        .elements()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, v)| (Key::Index(i), v))
        .collect()
}

#[derive(Clone, Copy)]
enum Key<'a> {
    Field(&'a str),
    Index(usize),
}

impl Key<'_> {
    fn child(self, parent: &Violations, value: &Value) -> ViolationChild {
        match self {
            Key::Field(name) => ViolationChild::field(parent, name),
            Key::Index(i) => ViolationChild::index(parent, i),
        }
        .with_value(value)
    }
}

// ─── element ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct Element {
    id: TypeId,
    distinct: bool,
}

impl Element {
    pub(super) fn parse(arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        let distinct = arg.has_annotation("distinct");
        ensure(!distinct || cx.version >= IslVersion::V2_0, || {
            "The 'distinct' elements annotation is not supported before Ion Schema 2.0".to_string()
        })?;
        let options = RefOptions {
            is_field: true,
            allow_distinct: true,
            ..RefOptions::default()
        };
        Ok(Self {
            id: type_reference(arg, cx, options)?,
            distinct,
        })
    }

    pub(super) fn validate(&self, isl: &Value, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| k.is_container(), sink)? {
            return Ok(());
        }
        let members = members(value);

        let mut mismatch =
            Violation::within(sink, isl, "element_mismatch", "one or more elements don't match expectations");
        let mut duplicates =
            Violation::within(sink, isl, "element_not_distinct", "one or more elements are duplicate values");
        for (position, (key, member)) in members.iter().enumerate() {
            let mut child = key.child(&mismatch.nested, member);
            child.nested.absorb(|n| arena.validate(self.id, member, n));
            if !child.is_valid() {
                mismatch.nested.absorb(|n| n.add_child(child));
                if mismatch.nested.is_short_circuit() {
                    break;
                }
            }
            if self.distinct {
                let repeated = members
                    .iter()
                    .enumerate()
                    .any(|(other, (_, m))| other != position && *m == *member);
                if repeated {
                    let child = key.child(&duplicates.nested, member);
                    duplicates.nested.absorb(|n| n.add_child(child));
                }
            }
        }
        if !mismatch.is_valid() {
            sink.add(mismatch)?;
        }
        if !duplicates.is_valid() {
            sink.add(duplicates)?;
        }
        Ok(())
    }
}

// ─── contains ───────────────────────────────────────────────────────────────

pub(super) fn parse_contains(arg: &Value) -> Result<ConstraintKind, SchemaError> {
    let items = match arg.elements() {
        Some(items) if arg.ion_type() == isl_core::IonType::List => items,
        _ => return Err(SchemaError::invalid(format!("Expected values in a list, found: {arg}"))),
    };
    ensure(arg.annotations().is_empty(), || "List of values may not be annotated.".to_string())?;
    Ok(ConstraintKind::Contains(items.to_vec()))
}

pub(super) fn contains(isl: &Value, expected: &[Value], value: &Value, sink: &mut Violations) -> Validation {
    if !applies(isl, value, |k| k.is_container(), sink)? {
        return Ok(());
    }
    let members = members(value);
    let missing: Vec<String> = expected
        .iter()
        .filter(|e| !members.iter().any(|(_, m)| m == e))
        .map(Value::to_string)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    sink.add(Violation::new(
        isl,
        "missing_values",
        format!("missing value(s): {}", missing.join(", ")),
    ))
}
