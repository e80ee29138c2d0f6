//! # Types: Arena, Nodes, and the Public `Type` Handle
//!
//! Types refer to each other by [`TypeId`], an index into a [`TypeArena`]
//! shared by every schema of one [`SchemaSystem`](crate::SchemaSystem).
//! That makes forward, self- and mutually-recursive references plain data:
//! no reference-counted cycles, no back-pointers.
//!
//! ## Slots
//!
//! A slot is `Pending` while a deferred reference waits for resolution,
//! `Forward` once it has been pointed at its target, or `Defined`. Lookups
//! follow forwards. Reading a pending slot is a programming error (the
//! deferred reference manager guarantees every slot reachable from a
//! published schema is resolved), so it panics.
//!
//! Slots are never freed. A failed load leaves unreachable slots behind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use isl_core::{IonType, Value};
use parking_lot::RwLock;

use crate::builtin::{self, Builtin};
use crate::constraints::Constraint;
use crate::error::SchemaError;
use crate::violations::{Validation, Violation, Violations};

/// Index of a type in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

enum Slot {
    Pending(String),
    Forward(TypeId),
    Defined(Arc<TypeNode>),
}

/// Storage for every type built by one schema system.
pub struct TypeArena {
    slots: RwLock<Vec<Slot>>,
    builtins: HashMap<String, TypeId>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeArena")
            .field("slots", &self.slots.read().len())
            .finish()
    }
}

impl TypeArena {
    /// An arena pre-populated with the builtin types.
    pub fn new() -> Self {
        let mut slots = Vec::new();
        let mut builtins = HashMap::new();
        for (name, kind) in builtin::all() {
            let id = TypeId(slots.len());
            slots.push(Slot::Defined(Arc::new(TypeNode {
                isl: Value::symbol(name.as_str()),
                name: name.clone(),
                schema_id: None,
                kind: TypeKind::Builtin(kind),
            })));
            builtins.insert(name, id);
        }
        Self {
            slots: RwLock::new(slots),
            builtins,
        }
    }

    /// The builtin named `name`.
    pub(crate) fn builtin(&self, name: &str) -> Option<TypeId> {
        self.builtins.get(name).copied()
    }

    pub(crate) fn is_builtin_name(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Store a finished node.
    pub(crate) fn define(&self, node: TypeNode) -> TypeId {
        let mut slots = self.slots.write();
        slots.push(Slot::Defined(Arc::new(node)));
        TypeId(slots.len() - 1)
    }

    /// Reserve a slot for a reference that is resolved later.
    pub(crate) fn reserve(&self, label: impl Into<String>) -> TypeId {
        let mut slots = self.slots.write();
        slots.push(Slot::Pending(label.into()));
        TypeId(slots.len() - 1)
    }

    /// Point a reserved slot at its target.
    pub(crate) fn fulfil(&self, slot: TypeId, target: TypeId) -> Result<(), SchemaError> {
        let mut slots = self.slots.write();
        let mut end = target;
        while let Some(Slot::Forward(next)) = slots.get(end.0) {
            end = *next;
        }
        let label = match slots.get(slot.0) {
            Some(Slot::Pending(label)) => label.clone(),
            _ => {
                return Err(SchemaError::invalid(format!(
                    "type slot {} is not awaiting resolution",
                    slot.0
                )))
            }
        };
        if end == slot {
            return Err(SchemaError::invalid(format!(
                "type reference '{label}' resolves to itself"
            )));
        }
        slots[slot.0] = Slot::Forward(end);
        Ok(())
    }

    /// Whether `id` (after forwards) is defined.
    #[cfg(test)]
    pub(crate) fn is_resolved(&self, id: TypeId) -> bool {
        self.lookup(id).is_ok()
    }

    /// Follow forwards to the defining slot.
    pub(crate) fn canonical(&self, id: TypeId) -> TypeId {
        let slots = self.slots.read();
        let mut current = id;
        while let Some(Slot::Forward(next)) = slots.get(current.0) {
            current = *next;
        }
        current
    }

    fn lookup(&self, id: TypeId) -> Result<(TypeId, Arc<TypeNode>), String> {
        let slots = self.slots.read();
        let mut current = id;
        loop {
            match slots.get(current.0) {
                Some(Slot::Forward(next)) => current = *next,
                Some(Slot::Defined(node)) => return Ok((current, Arc::clone(node))),
                Some(Slot::Pending(label)) => return Err(label.clone()),
                None => return Err(format!("#{}", current.0)),
            }
        }
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is still pending resolution.
    pub(crate) fn node(&self, id: TypeId) -> Arc<TypeNode> {
        match self.lookup(id) {
            Ok((_, node)) => node,
            Err(label) => panic!("type reference '{label}' used before it was resolved"),
        }
    }

    // ─── Validation ─────────────────────────────────────────────────────

    /// Validate `value` against type `id`, recording into `sink`.
    pub(crate) fn validate(&self, id: TypeId, value: &Value, sink: &mut Violations) -> Validation {
        let node = self.node(id);
        match &node.kind {
            TypeKind::Builtin(builtin) => builtin.validate(&node.name, &node.isl, value, sink),
            TypeKind::Definition(definition) => definition.validate(self, value, sink),
            TypeKind::Reference(target) => {
                let mut mismatch = Violation::within(
                    sink,
                    &node.isl,
                    "type_mismatch",
                    format!("expected type {}", node.name),
                );
                mismatch
                    .nested
                    .absorb(|nested| self.validate(*target, value, nested));
                if mismatch.is_valid() {
                    Ok(())
                } else {
                    sink.add(mismatch)
                }
            }
            TypeKind::Alias(target) => self.validate(*target, value, sink),
            TypeKind::Nullable { target, mode } => {
                let accepted = value.is_null()
                    && match mode {
                        NullMode::NullOnly => value.ion_type() == IonType::Null,
                        NullMode::BaseKind => {
                            value.ion_type() == IonType::Null
                                || self.admits_kind(*target, value.ion_type(), 0)
                        }
                    };
                if accepted {
                    Ok(())
                } else {
                    self.validate(*target, value, sink)
                }
            }
        }
    }

    /// Validate with a short-circuiting sink.
    pub(crate) fn is_valid(&self, id: TypeId, value: &Value) -> bool {
        let mut sink = Violations::short_circuiting();
        self.validate(id, value, &mut sink).is_ok() && sink.is_valid()
    }

    /// Whether the builtin at the base of `id` admits `kind`.
    fn admits_kind(&self, id: TypeId, kind: IonType, depth: usize) -> bool {
        // Self-referential `type` chains have no base; cap the walk.
        if depth > 64 {
            return false;
        }
        let node = self.node(id);
        match &node.kind {
            TypeKind::Builtin(builtin) => builtin.admits_kind(kind),
            TypeKind::Definition(definition) => match definition.base_type() {
                Some(base) => self.admits_kind(base, kind, depth + 1),
                None => true,
            },
            TypeKind::Reference(target)
            | TypeKind::Alias(target)
            | TypeKind::Nullable { target, .. } => self.admits_kind(*target, kind, depth + 1),
        }
    }
}

// ─── Nodes ──────────────────────────────────────────────────────────────────

/// One type in the arena.
#[derive(Debug)]
pub(crate) struct TypeNode {
    pub name: String,
    pub isl: Value,
    pub schema_id: Option<String>,
    pub kind: TypeKind,
}

#[derive(Debug)]
pub(crate) enum TypeKind {
    Builtin(Builtin),
    /// A named or inline definition.
    Definition(Definition),
    /// A by-name or inline use; failures are wrapped in `type_mismatch`.
    Reference(TypeId),
    /// An imported type under another name.
    Alias(TypeId),
    Nullable { target: TypeId, mode: NullMode },
}

/// Which nulls a nullable wrapper accepts outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NullMode {
    /// `nullable::` (ISL 1.0): `null.null` and typed nulls of the base kinds.
    BaseKind,
    /// `$null_or::` (ISL 2.0): `null.null` only.
    NullOnly,
}

/// The ordered constraints of a named or inline type.
#[derive(Debug)]
pub(crate) struct Definition {
    /// `annotations` constraints first, then the rest in written order.
    pub constraints: Vec<Constraint>,
    /// Stop after failed `annotations` constraints.
    pub fail_fast_annotations: bool,
    /// `type` is `$null_or::`-annotated.
    pub null_or_type: bool,
}

impl Definition {
    fn base_type(&self) -> Option<TypeId> {
        self.constraints.iter().find_map(Constraint::type_argument)
    }

    fn validate(&self, arena: &TypeArena, value: &Value, sink: &mut Violations) -> Validation {
        let mut rest = self.constraints.as_slice();
        if self.fail_fast_annotations {
            let leading = rest.iter().take_while(|c| c.is_annotations()).count();
            if leading > 0 {
                let checkpoint = sink.checkpoint();
                for constraint in &rest[..leading] {
                    constraint.validate(arena, value, sink)?;
                }
                if !checkpoint.is_valid(sink) {
                    return Ok(());
                }
                rest = &rest[leading..];
            }
        }
        if self.null_or_type {
            return self.validate_null_or(arena, rest, value, sink);
        }
        for constraint in rest {
            constraint.validate(arena, value, sink)?;
        }
        Ok(())
    }

    /// Report constraints that can never accept the nulls `$null_or::` lets in.
    fn validate_null_or(
        &self,
        arena: &TypeArena,
        constraints: &[Constraint],
        value: &Value,
        sink: &mut Violations,
    ) -> Validation {
        let isl = Value::structure(
            constraints
                .iter()
                .map(|c| (c.name(), c.isl().clone()))
                .collect::<Vec<_>>(),
        );
        let mut incompatible = Violation::within(
            sink,
            &isl,
            "constraints_incompatible",
            "type cannot accept null. note: type attempts to accept null via $null_or but \
             defines one or more constraints for which null are never valid - did you mean \
             to use $null_or on the type definition itself?",
        );
        for constraint in constraints {
            let mut buffer = sink.nested();
            buffer.absorb(|b| constraint.validate(arena, value, b));
            let (violations, children) = buffer.drain();
            for violation in violations {
                if violation.code == "null_value" {
                    incompatible.nested.add(Violation::new(
                        constraint.isl(),
                        "null_value",
                        format!("constraint \"{}\" is not applicable for null values", constraint.name()),
                    ))?;
                } else {
                    sink.add(violation)?;
                }
            }
            for child in children {
                sink.add_child(child)?;
            }
        }
        if incompatible.is_valid() {
            Ok(())
        } else {
            sink.add(incompatible)
        }
    }
}

// ─── Public Handle ──────────────────────────────────────────────────────────

/// A resolved type, ready to validate values.
#[derive(Clone)]
pub struct Type {
    arena: Arc<TypeArena>,
    id: TypeId,
    node: Arc<TypeNode>,
}

impl Type {
    /// # Panics
    ///
    /// Panics if `id` is still pending resolution.
    pub(crate) fn new(arena: &Arc<TypeArena>, id: TypeId) -> Self {
        let node = arena.node(id);
        Self {
            arena: Arc::clone(arena),
            id: arena.canonical(id),
            node,
        }
    }

    pub(crate) fn id(&self) -> TypeId {
        self.id
    }

    pub(crate) fn arena(&self) -> &Arc<TypeArena> {
        &self.arena
    }

    /// The declared name, the builtin name, or the rendered inline definition.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The definition this type was built from.
    pub fn isl(&self) -> &Value {
        &self.node.isl
    }

    /// Id of the schema that declared this type, if any.
    pub fn schema_id(&self) -> Option<&str> {
        self.node.schema_id.as_deref()
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.node.kind, TypeKind::Builtin(_))
    }

    /// Validate `value`, collecting every violation.
    pub fn validate(&self, value: &Value) -> Violations {
        let mut sink = Violations::new();
        sink.absorb(|s| self.arena.validate(self.id, value, s));
        sink
    }

    /// Whether `value` is valid, stopping at the first violation.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.arena.is_valid(self.id, value)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Type {}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.node.name)
            .field("schema_id", &self.node.schema_id)
            .finish()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node.name)
    }
}
