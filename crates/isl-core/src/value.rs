//! # Values: Kinds, Annotations, and Ion Equivalence
//!
//! [`Value`] is the unit every schema operation consumes. It pairs an ordered
//! annotation list with [`Data`], the kind-tagged payload.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Serialize, Serializer};

use crate::decimal::Decimal;
use crate::timestamp::Timestamp;

// ─── Kinds ──────────────────────────────────────────────────────────────────

/// The thirteen value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Struct,
}

impl IonType {
    /// Every kind, in declaration order.
    pub const ALL: [IonType; 13] = [
        IonType::Null,
        IonType::Bool,
        IonType::Int,
        IonType::Float,
        IonType::Decimal,
        IonType::Timestamp,
        IonType::Symbol,
        IonType::String,
        IonType::Clob,
        IonType::Blob,
        IonType::List,
        IonType::Sexp,
        IonType::Struct,
    ];

    /// Lowercase name as written in `null.<name>` and in messages.
    pub fn name(self) -> &'static str {
        match self {
            IonType::Null => "null",
            IonType::Bool => "bool",
            IonType::Int => "int",
            IonType::Float => "float",
            IonType::Decimal => "decimal",
            IonType::Timestamp => "timestamp",
            IonType::Symbol => "symbol",
            IonType::String => "string",
            IonType::Clob => "clob",
            IonType::Blob => "blob",
            IonType::List => "list",
            IonType::Sexp => "sexp",
            IonType::Struct => "struct",
        }
    }

    /// Inverse of [`IonType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// `string` or `symbol`.
    pub fn is_text(self) -> bool {
        matches!(self, IonType::String | IonType::Symbol)
    }

    /// `blob` or `clob`.
    pub fn is_lob(self) -> bool {
        matches!(self, IonType::Blob | IonType::Clob)
    }

    /// `list`, `sexp`, or `struct`.
    pub fn is_container(self) -> bool {
        matches!(self, IonType::List | IonType::Sexp | IonType::Struct)
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Data ───────────────────────────────────────────────────────────────────

/// Kind-tagged payload of a value.
#[derive(Debug, Clone)]
pub enum Data {
    /// A null of the given kind; `null` is `Null(IonType::Null)`.
    Null(IonType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Timestamp(Timestamp),
    Symbol(String),
    String(String),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<Value>),
    Sexp(Vec<Value>),
    /// Fields in written order; names may repeat.
    Struct(Vec<(String, Value)>),
}

impl Data {
    /// The kind of this payload.
    pub fn ion_type(&self) -> IonType {
        match self {
            Data::Null(t) => *t,
            Data::Bool(_) => IonType::Bool,
            Data::Int(_) => IonType::Int,
            Data::Float(_) => IonType::Float,
            Data::Decimal(_) => IonType::Decimal,
            Data::Timestamp(_) => IonType::Timestamp,
            Data::Symbol(_) => IonType::Symbol,
            Data::String(_) => IonType::String,
            Data::Clob(_) => IonType::Clob,
            Data::Blob(_) => IonType::Blob,
            Data::List(_) => IonType::List,
            Data::Sexp(_) => IonType::Sexp,
            Data::Struct(_) => IonType::Struct,
        }
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Null(a), Data::Null(b)) => a == b,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Int(a), Data::Int(b)) => a == b,
            (Data::Float(a), Data::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Data::Decimal(a), Data::Decimal(b)) => a == b,
            (Data::Timestamp(a), Data::Timestamp(b)) => a == b,
            (Data::Symbol(a), Data::Symbol(b)) | (Data::String(a), Data::String(b)) => a == b,
            (Data::Clob(a), Data::Clob(b)) | (Data::Blob(a), Data::Blob(b)) => a == b,
            (Data::List(a), Data::List(b)) | (Data::Sexp(a), Data::Sexp(b)) => a == b,
            (Data::Struct(a), Data::Struct(b)) => same_fields(a, b),
            _ => false,
        }
    }
}

/// Unordered multiset comparison of struct fields.
fn same_fields(a: &[(String, Value)], b: &[(String, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|field| {
        let hit = b
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && candidate == field);
        match hit {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

// ─── Value ──────────────────────────────────────────────────────────────────

/// An annotated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    annotations: Vec<String>,
    data: Data,
}

impl Value {
    /// An unannotated value.
    pub fn new(data: Data) -> Self {
        Self {
            annotations: Vec::new(),
            data,
        }
    }

    /// Replace the annotation list.
    pub fn with_annotations<I, S>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    /// The same data with no annotations.
    pub fn without_annotations(&self) -> Value {
        Value::new(self.data.clone())
    }

    pub fn null() -> Self {
        Self::new(Data::Null(IonType::Null))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Data::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(Data::Int(value))
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Self::new(Data::Symbol(text.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(Data::String(text.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::new(Data::List(items))
    }

    pub fn structure<S: Into<String>>(fields: Vec<(S, Value)>) -> Self {
        Self::new(Data::Struct(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Annotations in written order.
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Whether `annotation` is present.
    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn ion_type(&self) -> IonType {
        self.data.ion_type()
    }

    /// True for every typed null, including `null.null`.
    pub fn is_null(&self) -> bool {
        matches!(self.data, Data::Null(_))
    }

    /// Text of a non-null string or symbol.
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            Data::Symbol(s) | Data::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a non-null symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.data {
            Data::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.data {
            Data::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Elements of a non-null list or sexp.
    pub fn elements(&self) -> Option<&[Value]> {
        match &self.data {
            Data::List(items) | Data::Sexp(items) => Some(items),
            _ => None,
        }
    }

    /// Fields of a non-null struct.
    pub fn fields(&self) -> Option<&[(String, Value)]> {
        match &self.data {
            Data::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// First field named `name`, if this is a struct.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

const KEYWORDS: [&str; 4] = ["null", "true", "false", "nan"];

/// Whether `text` can be written as a bare identifier symbol.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !KEYWORDS.contains(&text)
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{quote}")?,
            c if (c as u32) < 0x20 || c == '\u{7f}' => write!(f, "\\x{:02x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

/// Render a symbol, quoting it when it is not a plain identifier.
pub fn write_symbol(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if is_identifier(text) {
        f.write_str(text)
    } else {
        f.write_str("'")?;
        write_escaped(f, text, '\'')?;
        f.write_str("'")
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        f.write_str("nan")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "+inf" } else { "-inf" })
    } else {
        write!(f, "{value:e}")
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, items: &[Value], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Null(IonType::Null) => f.write_str("null"),
            Data::Null(t) => write!(f, "null.{t}"),
            Data::Bool(b) => write!(f, "{b}"),
            Data::Int(i) => write!(f, "{i}"),
            Data::Float(x) => write_float(f, *x),
            Data::Decimal(d) => write!(f, "{d}"),
            Data::Timestamp(t) => write!(f, "{t}"),
            Data::Symbol(s) => write_symbol(f, s),
            Data::String(s) => {
                f.write_str("\"")?;
                write_escaped(f, s, '"')?;
                f.write_str("\"")
            }
            Data::Clob(bytes) => {
                f.write_str("{{\"")?;
                for &b in bytes {
                    match b {
                        b'"' => f.write_str("\\\"")?,
                        b'\\' => f.write_str("\\\\")?,
                        0x20..=0x7e => write!(f, "{}", b as char)?,
                        _ => write!(f, "\\x{b:02x}")?,
                    }
                }
                f.write_str("\"}}")
            }
            Data::Blob(bytes) => write!(f, "{{{{{}}}}}", BASE64.encode(bytes)),
            Data::List(items) => {
                f.write_str("[")?;
                write_sequence(f, items, ", ")?;
                f.write_str("]")
            }
            Data::Sexp(items) => {
                f.write_str("(")?;
                write_sequence(f, items, " ")?;
                f.write_str(")")
            }
            Data::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_symbol(f, name)?;
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in &self.annotations {
            write_symbol(f, annotation)?;
            f.write_str("::")?;
        }
        write!(f, "{}", self.data)
    }
}

/// Values serialize as their Ion text rendering.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
