//! # `annotations`
//!
//! ISL 1.0 takes a list of symbols. `required::`/`optional::` on the list
//! set the default for its items and may be overridden per item. An
//! `ordered::` list is matched as a sequence, with any other annotations
//! allowed between the listed ones unless the list is `closed::`.
//!
//! ISL 2.0 takes a type that the value's annotations, seen as a list of
//! symbols, must satisfy. A list annotated `closed::` and/or `required::`
//! is shorthand for `{ element: { valid_values: [...] } }` and
//! `{ contains: [...] }` respectively.

use isl_core::{IonType, Value};

use crate::config::IslVersion;
use crate::error::{ensure, SchemaError};
use crate::nfa::{self, Nfa, State};
use crate::reference::{type_reference, ParseContext, RefOptions};
use crate::types::{TypeArena, TypeId};
use crate::violations::{Validation, Violation, Violations};

#[derive(Debug)]
pub(crate) enum Annotations {
    Ordered(Nfa<Slot>),
    Unordered {
        /// `(annotation, required)` in list order.
        entries: Vec<(String, bool)>,
        closed: bool,
    },
    Typed(TypeId),
}

/// Matcher for one position of an ordered annotation list.
#[derive(Debug)]
pub(crate) enum Slot {
    Exact(String),
    Any,
}

impl Annotations {
    pub(super) fn parse(arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        match cx.version {
            IslVersion::V1_0 => Self::parse_v1(arg),
            IslVersion::V2_0 => Self::parse_v2(arg, cx),
        }
    }

    fn parse_v1(arg: &Value) -> Result<Self, SchemaError> {
        let items = match arg.elements() {
            Some(items) if arg.ion_type() == IonType::List => items,
            _ => return Err(SchemaError::invalid(format!("Expected annotations as a list, found: {arg}"))),
        };
        let required_by_default = arg.has_annotation("required");
        let closed = arg.has_annotation("closed");
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let text = item
                .as_symbol()
                .ok_or_else(|| SchemaError::invalid(format!("annotations list values must be symbols: {item}")))?;
            let required = if item.has_annotation("required") {
                true
            } else if item.has_annotation("optional") {
                false
            } else {
                required_by_default
            };
            entries.push((text.to_string(), required));
        }

        if !arg.has_annotation("ordered") {
            return Ok(Annotations::Unordered { entries, closed });
        }
        let open = || State::new(Slot::Any, 0, None);
        let mut states = Vec::new();
        for (text, required) in entries {
            if !closed {
                states.push(open());
            }
            states.push(State::new(Slot::Exact(text), usize::from(required), Some(1)));
        }
        if !closed {
            states.push(open());
        }
        let nfa = nfa::sequence(states).map_err(|e| SchemaError::invalid(e.to_string()))?;
        Ok(Annotations::Ordered(nfa))
    }

    fn parse_v2(arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        if arg.ion_type() != IonType::List {
            let options = RefOptions {
                is_field: true,
                ..RefOptions::default()
            };
            return Ok(Annotations::Typed(type_reference(arg, cx, options)?));
        }
        let Some(items) = arg.elements() else {
            return Err(SchemaError::invalid("annotations list may not be null"));
        };
        let modifiers = arg.annotations();
        ensure(
            !modifiers.is_empty() && modifiers.iter().all(|m| m == "closed" || m == "required"),
            || "annotations list must be annotated only with one or both of 'closed', 'required'".to_string(),
        )?;
        for item in items {
            ensure(item.as_symbol().is_some(), || {
                "annotations list values must be non-null symbols".to_string()
            })?;
            ensure(item.annotations().is_empty(), || {
                "annotations list values may not be annotated".to_string()
            })?;
        }

        let symbols = Value::list(items.to_vec());
        let mut fields = Vec::new();
        if arg.has_annotation("closed") {
            fields.push((
                "element",
                Value::structure(vec![("valid_values", symbols.clone())]),
            ));
        }
        if arg.has_annotation("required") {
            fields.push(("contains", symbols));
        }
        let expanded = Value::structure(fields);
        Ok(Annotations::Typed(type_reference(&expanded, cx, RefOptions::default())?))
    }

    pub(super) fn validate(&self, isl: &Value, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        let present = value.annotations();
        match self {
            Annotations::Ordered(nfa) => {
                let matched = nfa.matches(present, |slot, annotation| match slot {
                    Slot::Exact(text) => text == annotation,
                    Slot::Any => true,
                });
                if matched {
                    Ok(())
                } else {
                    sink.add(Violation::new(
                        isl,
                        "annotations_mismatch",
                        "annotations don't match expectations",
                    ))
                }
            }
            Annotations::Unordered { entries, closed } => {
                let missing: Vec<&str> = entries
                    .iter()
                    .filter(|(text, required)| *required && !value.has_annotation(text))
                    .map(|(text, _)| text.as_str())
                    .collect();
                if !missing.is_empty() {
                    sink.add(Violation::new(
                        isl,
                        "missing_annotation",
                        format!("missing annotation(s): {}", missing.join(", ")),
                    ))?;
                }
                if *closed && !present.iter().all(|a| entries.iter().any(|(text, _)| text == a)) {
                    sink.add(Violation::new(
                        isl,
                        "unexpected_annotation",
                        "found one or more unexpected annotations",
                    ))?;
                }
                Ok(())
            }
            Annotations::Typed(id) => {
                let symbols = Value::list(present.iter().map(Value::symbol).collect());
                let mut violation = Violation::within(
                    sink,
                    isl,
                    "invalid_annotations",
                    "annotations on value do not meet expectations",
                );
                violation.nested.absorb(|n| arena.validate(*id, &symbols, n));
                if violation.is_valid() {
                    Ok(())
                } else {
                    sink.add(violation)
                }
            }
        }
    }
}
