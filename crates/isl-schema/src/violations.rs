//! # Violations: Hierarchical Validation Results
//!
//! A [`Violations`] node holds direct [`Violation`]s (constraint, code,
//! message) and [`ViolationChild`]ren keyed by field name and/or index. Both
//! kinds are themselves nodes, so the tree mirrors the shape of the invalid
//! value. A node is valid iff both lists are empty, at every depth.
//!
//! ## Short-circuit mode
//!
//! A short-circuiting node makes `add` return `Err(ShortCircuit)` right after
//! recording. Validation code propagates it with `?`, unwinding to the
//! [`Type::is_valid`](crate::Type::is_valid) entry point which turns it into
//! `false`. Nodes created with [`Violations::nested`] inherit the mode, so
//! evaluation stops at the first violation found at any depth. Code that
//! evaluates into a nested node and then inspects it (alternation, wrapping)
//! absorbs the signal with [`Violations::absorb`].

use std::fmt;

use isl_core::Value;
use serde::Serialize;

/// Control-flow marker raised by a short-circuiting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuit;

/// Outcome of one validation step.
pub type Validation = Result<(), ShortCircuit>;

/// A node in the violation tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Violations {
    #[serde(skip)]
    short_circuit: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ViolationChild>,
}

impl Violations {
    /// An empty, non-short-circuiting node.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty node that aborts evaluation on its first addition.
    pub fn short_circuiting() -> Self {
        Self {
            short_circuit: true,
            ..Self::default()
        }
    }

    /// An empty node with the same short-circuit mode as `self`.
    pub fn nested(&self) -> Self {
        Self {
            short_circuit: self.short_circuit,
            ..Self::default()
        }
    }

    /// True iff there are no violations and no children.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty() && self.children.is_empty()
    }

    pub fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn children(&self) -> &[ViolationChild] {
        &self.children
    }

    /// Record a violation.
    pub fn add(&mut self, violation: Violation) -> Validation {
        self.violations.push(violation);
        self.signal()
    }

    /// Record a child node.
    pub fn add_child(&mut self, child: ViolationChild) -> Validation {
        self.children.push(child);
        self.signal()
    }

    fn signal(&self) -> Validation {
        if self.short_circuit {
            Err(ShortCircuit)
        } else {
            Ok(())
        }
    }

    /// Run `f` against this node, absorbing a short-circuit raised inside it.
    /// The caller inspects the node afterwards.
    pub fn absorb(&mut self, f: impl FnOnce(&mut Violations) -> Validation) {
        // The marker carries no data; what was recorded is already in `self`.
        let _ = f(self);
    }

    /// Marker for "nothing added since here".
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            violations: self.violations.len(),
            children: self.children.len(),
        }
    }

    /// Move every entry out, leaving the node empty.
    pub(crate) fn drain(&mut self) -> (Vec<Violation>, Vec<ViolationChild>) {
        (
            std::mem::take(&mut self.violations),
            std::mem::take(&mut self.children),
        )
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for violation in &self.violations {
            writeln!(f, "{indent}- {}", violation.message)?;
            violation.nested.write_tree(f, depth + 1)?;
        }
        for child in &self.children {
            write!(f, "{indent}- ")?;
            if let Some(name) = &child.field_name {
                f.write_str(name)?;
            }
            if let Some(index) = child.index {
                write!(f, "[{index}]")?;
            }
            if !child.values.is_empty() {
                let joined = child
                    .values
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, ": {}", truncate(&joined, 20))?;
            }
            writeln!(f)?;
            child.nested.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Renders `Validation failed:` followed by an indented `- message` tree, or
/// nothing for a valid node.
impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return Ok(());
        }
        writeln!(f, "Validation failed:")?;
        self.write_tree(f, 0)
    }
}

/// Counts captured by [`Violations::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    violations: usize,
    children: usize,
}

impl Checkpoint {
    /// True if `node` gained no entries since this checkpoint was taken.
    pub fn is_valid(&self, node: &Violations) -> bool {
        node.violations.len() == self.violations && node.children.len() == self.children
    }
}

// ─── Violation ──────────────────────────────────────────────────────────────

/// One failed constraint, with nested detail.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Definition of the constraint that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Value>,
    /// Stable machine-readable code (`type_mismatch`, `occurs_mismatch`, ...).
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
    /// Detail beneath this violation.
    #[serde(flatten)]
    pub nested: Violations,
}

impl Violation {
    /// A violation with no nested detail.
    pub fn new(constraint: &Value, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint: Some(constraint.clone()),
            code: code.into(),
            message: message.into(),
            nested: Violations::new(),
        }
    }

    /// A violation whose nested node shares `parent`'s short-circuit mode.
    pub fn within(
        parent: &Violations,
        constraint: &Value,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            nested: parent.nested(),
            ..Self::new(constraint, code, message)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.nested.is_valid()
    }
}

/// Violations attributed to one part of a container value.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationChild {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// The offending sub-value(s).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(flatten)]
    pub nested: Violations,
}

impl ViolationChild {
    /// A child keyed by struct field name.
    pub fn field(parent: &Violations, name: impl Into<String>) -> Self {
        Self {
            field_name: Some(name.into()),
            index: None,
            values: Vec::new(),
            nested: parent.nested(),
        }
    }

    /// A child keyed by sequence position.
    pub fn index(parent: &Violations, index: usize) -> Self {
        Self {
            field_name: None,
            index: Some(index),
            values: Vec::new(),
            nested: parent.nested(),
        }
    }

    /// Attach an offending value.
    pub fn with_value(mut self, value: &Value) -> Self {
        self.values.push(value.clone());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.nested.is_valid()
    }
}
