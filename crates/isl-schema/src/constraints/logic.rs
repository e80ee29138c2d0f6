//! # Logic Constraints
//!
//! `type`, `all_of`, `any_of`, `one_of`, and `not`. Each alternative is
//! evaluated into a nested node so the outcome can be inspected; a
//! short-circuit raised inside an alternative is absorbed there.

use isl_core::{IonType, Value};

use super::ConstraintKind;
use crate::error::SchemaError;
use crate::reference::{type_reference, ParseContext, RefOptions};
use crate::types::{TypeArena, TypeId};
use crate::violations::{Validation, Violation, Violations};

pub(super) fn parse(name: &str, arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<ConstraintKind, SchemaError> {
    let list = |cx: &mut ParseContext<'_, '_>| -> Result<Vec<TypeId>, SchemaError> {
        match arg.elements() {
            Some(items) if arg.ion_type() == IonType::List => items
                .iter()
                .map(|item| type_reference(item, cx, RefOptions::default()))
                .collect(),
            _ => Err(SchemaError::invalid(format!("Expected a list, found: {arg}"))),
        }
    };
    Ok(match name {
        "type" => ConstraintKind::Type(type_reference(arg, cx, RefOptions::default())?),
        "not" => ConstraintKind::Not(type_reference(arg, cx, RefOptions::default())?),
        "all_of" => ConstraintKind::AllOf(list(cx)?),
        "any_of" => ConstraintKind::AnyOf(list(cx)?),
        _ => ConstraintKind::OneOf(list(cx)?),
    })
}

/// Validate each type into `node`, returning the ones that passed.
fn matching(ids: &[TypeId], arena: &TypeArena, value: &Value, node: &mut Violations) -> Vec<TypeId> {
    ids.iter()
        .copied()
        .filter(|id| {
            let checkpoint = node.checkpoint();
            node.absorb(|n| arena.validate(*id, value, n));
            checkpoint.is_valid(node)
        })
        .collect()
}

pub(super) fn all_of(isl: &Value, ids: &[TypeId], arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
    let mut violation = Violation::within(sink, isl, "all_types_not_matched", "");
    let count = matching(ids, arena, value, &mut violation.nested).len();
    if count == ids.len() {
        return Ok(());
    }
    violation.message = format!("value matches {count} types, expected {}", ids.len());
    sink.add(violation)
}

pub(super) fn any_of(isl: &Value, ids: &[TypeId], arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
    let mut violation = Violation::within(sink, isl, "no_types_matched", "value matches none of the types");
    for id in ids {
        let checkpoint = violation.nested.checkpoint();
        violation.nested.absorb(|n| arena.validate(*id, value, n));
        if checkpoint.is_valid(&violation.nested) {
            return Ok(());
        }
    }
    sink.add(violation)
}

pub(super) fn one_of(isl: &Value, ids: &[TypeId], arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
    let mut violation = Violation::within(sink, isl, "no_types_matched", "value matches none of the types");
    let valid = matching(ids, arena, value, &mut violation.nested);
    match valid.len() {
        1 => Ok(()),
        0 => sink.add(violation),
        n => {
            let mut violation = Violation::within(
                sink,
                isl,
                "more_than_one_type_matched",
                format!("value matches {n} types, expected 1"),
            );
            for id in valid {
                let definition = arena.node(id).isl.clone();
                let message = format!("value matches type {definition}");
                violation
                    .nested
                    .absorb(|node| node.add(Violation::new(&definition, "type_matched", message)));
            }
            sink.add(violation)
        }
    }
}

pub(super) fn not(isl: &Value, id: TypeId, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
    if arena.is_valid(id, value) {
        sink.add(Violation::new(isl, "type_matched", "value unexpectedly matches type"))
    } else {
        Ok(())
    }
}
