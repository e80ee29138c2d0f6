//! # `ordered_elements`
//!
//! Each entry is a type reference with an `occurs` range (default
//! `required`). The entries become the slots of a sequence [`Nfa`] that is
//! run over the elements of a list or s-expression.

use isl_core::{IonType, Value};

use super::applies;
use crate::error::SchemaError;
use crate::nfa::{self, Nfa, State};
use crate::range;
use crate::reference::{type_reference, ParseContext, RefOptions};
use crate::types::{TypeArena, TypeId};
use crate::violations::{Validation, Violation, Violations};

#[derive(Debug)]
pub(crate) struct OrderedElements {
    nfa: Nfa<TypeId>,
}

impl OrderedElements {
    pub(super) fn parse(arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        let items = match arg.elements() {
            Some(items) if arg.ion_type() == IonType::List && arg.annotations().is_empty() => items,
            _ => {
                return Err(SchemaError::invalid(format!(
                    "ordered_elements must be a non-null, unannotated list: {arg}"
                )))
            }
        };
        let options = RefOptions {
            variably_occurring: true,
            ..RefOptions::default()
        };
        let mut states = Vec::with_capacity(items.len());
        for item in items {
            let occurs = range::occurs(item.get("occurs"), range::required)?;
            let id = type_reference(item, cx, options)?;
            let min = occurs.min().map_or(0, |m| usize::try_from(m).unwrap_or(0));
            let max = occurs.max().map(|m| usize::try_from(m).unwrap_or(usize::MAX));
            states.push(State::new(id, min, max));
        }
        let nfa = nfa::sequence(states).map_err(|e| SchemaError::invalid(e.to_string()))?;
        Ok(Self { nfa })
    }

    pub(super) fn validate(&self, isl: &Value, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| matches!(k, IonType::List | IonType::Sexp), sink)? {
            return Ok(());
        }
        let elements = value.elements().unwrap_or_default();
        if self.nfa.matches(elements, |id, element| arena.is_valid(*id, element)) {
            Ok(())
        } else {
            sink.add(Violation::new(
                isl,
                "ordered_elements_mismatch",
                "one or more ordered elements don't match specification",
            ))
        }
    }
}
