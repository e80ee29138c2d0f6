//! # `fields`, `field_names`, `content`
//!
//! `fields` maps field names to a type and an `occurs` range (default
//! `optional`). The number of times a name appears in a struct is checked
//! by running a one-slot [`Nfa`] over its values. A closed `fields`
//! (`content: closed` in ISL 1.0, `closed::` in 2.0) also rejects names it
//! does not list.

use std::collections::{BTreeMap, HashSet};

use isl_core::{IonType, Value};

use super::{applies, ConstraintKind};
use crate::config::IslVersion;
use crate::error::{ensure, SchemaError};
use crate::nfa::{self, Nfa, State};
use crate::range::{self, IntRange};
use crate::reference::{type_reference, ParseContext, RefOptions};
use crate::types::{TypeArena, TypeId};
use crate::violations::{Validation, Violation, ViolationChild, Violations};

#[derive(Debug)]
struct FieldSpec {
    name: String,
    id: TypeId,
    occurs: IntRange,
    counter: Nfa<()>,
}

#[derive(Debug)]
pub(crate) struct Fields {
    fields: Vec<FieldSpec>,
    closed: bool,
}

impl Fields {
    pub(super) fn parse(arg: &Value, definition: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        let entries = match arg.fields() {
            Some(entries) => entries,
            None => return Err(SchemaError::invalid(format!("fields must be a struct, found {arg}"))),
        };
        ensure(!entries.is_empty(), || "fields must be a non-empty struct".to_string())?;
        let closed = match cx.version {
            IslVersion::V1_0 => definition.get("content").and_then(Value::as_symbol) == Some("closed"),
            IslVersion::V2_0 => {
                let annotations = arg.annotations();
                ensure(
                    annotations.is_empty() || annotations == ["closed"],
                    || format!("Illegal annotation(s) on fields: {arg}"),
                )?;
                !annotations.is_empty()
            }
        };

        let mut seen = HashSet::new();
        let options = RefOptions {
            is_field: true,
            variably_occurring: true,
            ..RefOptions::default()
        };
        let mut fields = Vec::with_capacity(entries.len());
        for (name, spec) in entries {
            ensure(seen.insert(name.as_str()), || {
                format!("fields must not contain duplicate field names: {name}")
            })?;
            let occurs = range::occurs(spec.get("occurs"), range::optional)?;
            let id = type_reference(spec, cx, options)?;
            let min = occurs.min().map_or(0, |m| usize::try_from(m).unwrap_or(0));
            let max = occurs.max().map(|m| usize::try_from(m).unwrap_or(usize::MAX));
            let counter = nfa::sequence(vec![State::new((), min, max)])
                .map_err(|e| SchemaError::invalid(e.to_string()))?;
            fields.push(FieldSpec {
                name: name.clone(),
                id,
                occurs,
                counter,
            });
        }
        Ok(Self { fields, closed })
    }

    pub(super) fn validate(&self, isl: &Value, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| k == IonType::Struct, sink)? {
            return Ok(());
        }
        let entries = value.fields().unwrap_or_default();

        if self.closed {
            let mut unexpected =
                Violation::within(sink, isl, "unexpected_content", "found one or more unexpected fields");
            for (name, field) in entries {
                if !self.fields.iter().any(|f| &f.name == name) {
                    let child = ViolationChild::field(&unexpected.nested, name.as_str()).with_value(field);
                    unexpected.nested.absorb(|n| n.add_child(child));
                }
            }
            if !unexpected.is_valid() {
                sink.add(unexpected)?;
            }
        }

        let mut mismatch =
            Violation::within(sink, isl, "fields_mismatch", "one or more fields don't match expectations");
        for spec in &self.fields {
            let values: Vec<&Value> = entries
                .iter()
                .filter(|(name, _)| name == &spec.name)
                .map(|(_, v)| v)
                .collect();
            let mut child = ViolationChild::field(&mismatch.nested, spec.name.as_str());
            for v in &values {
                child.values.push((*v).clone());
                child.nested.absorb(|n| arena.validate(spec.id, v, n));
            }
            let events = vec![(); values.len()];
            if !spec.counter.matches(&events, |_, _| true) {
                let message = format!("expected {} occurrences, found {}", spec.occurs, values.len());
                child
                    .nested
                    .absorb(|n| n.add(Violation::new(spec.occurs.isl(), "occurs_mismatch", message)));
            }
            if !child.is_valid() {
                mismatch.nested.absorb(|n| n.add_child(child));
                if mismatch.nested.is_short_circuit() {
                    break;
                }
            }
        }
        if mismatch.is_valid() {
            Ok(())
        } else {
            sink.add(mismatch)
        }
    }
}

// ─── field_names ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct FieldNames {
    id: TypeId,
    distinct: bool,
}

impl FieldNames {
    pub(super) fn parse(arg: &Value, cx: &mut ParseContext<'_, '_>) -> Result<Self, SchemaError> {
        let options = RefOptions {
            is_field: true,
            allow_distinct: true,
            ..RefOptions::default()
        };
        Ok(Self {
            id: type_reference(arg, cx, options)?,
            distinct: arg.has_annotation("distinct"),
        })
    }

    pub(super) fn validate(&self, isl: &Value, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| k == IonType::Struct, sink)? {
            return Ok(());
        }
        let mut names: Vec<&str> = value
            .fields()
            .unwrap_or_default()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();

        let mut mismatch = Violation::within(
            sink,
            isl,
            "field_names_mismatch",
            "field names in struct do not meet expectations",
        );
        for name in &names {
            let symbol = Value::symbol(*name);
            let mut child = ViolationChild::field(&mismatch.nested, *name).with_value(&symbol);
            child.nested.absorb(|n| arena.validate(self.id, &symbol, n));
            if !child.is_valid() {
                mismatch.nested.absorb(|n| n.add_child(child));
            }
        }
        if !mismatch.is_valid() {
            sink.add(mismatch)?;
        }

        if self.distinct {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for name in &names {
                *counts.entry(*name).or_default() += 1;
            }
            let mut duplicates = Violation::within(
                sink,
                isl,
                "field_names_not_distinct",
                "one or more field names are duplicate values",
            );
            for (name, _) in counts.into_iter().filter(|(_, n)| *n > 1) {
                let child = ViolationChild::field(&duplicates.nested, name).with_value(&Value::symbol(name));
                duplicates.nested.absorb(|n| n.add_child(child));
            }
            if !duplicates.is_valid() {
                sink.add(duplicates)?;
            }
        }
        Ok(())
    }
}

// ─── content ────────────────────────────────────────────────────────────────

/// `content: closed` (ISL 1.0). The flag is read by `fields`.
pub(super) fn parse_content(arg: &Value) -> Result<ConstraintKind, SchemaError> {
    ensure(arg.as_symbol() == Some("closed"), || {
        format!("Invalid content, expected 'closed', found {arg}")
    })?;
    Ok(ConstraintKind::Content)
}
