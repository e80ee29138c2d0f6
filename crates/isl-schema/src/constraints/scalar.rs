//! # Scalar Constraints
//!
//! Constraints that measure one property of a scalar (or the size of a
//! container) and compare it with a range or a set.

use std::fmt;

use isl_core::{Data, IonType, Value};

use super::{applies, expect_kind, ConstraintKind};
use crate::error::{ensure, SchemaError};
use crate::range::{self, IntRange};
use crate::violations::{Validation, Violation, Violations};

// ─── Lengths ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    ContainerLength,
    ByteLength,
    CodepointLength,
    Utf8ByteLength,
    Scale,
}

impl Measure {
    fn applies_to(self, kind: IonType) -> bool {
        match self {
            Measure::ContainerLength => kind.is_container(),
            Measure::ByteLength => kind.is_lob(),
            Measure::CodepointLength | Measure::Utf8ByteLength => kind.is_text(),
            Measure::Scale => kind == IonType::Decimal,
        }
    }

    fn of(self, value: &Value) -> Option<i64> {
        let n = match (self, value.data()) {
            (Measure::ContainerLength, Data::Struct(fields)) => fields.len(),
            (Measure::ContainerLength, Data::List(items) | Data::Sexp(items)) => items.len(),
            (Measure::ByteLength, Data::Blob(bytes) | Data::Clob(bytes)) => bytes.len(),
            (Measure::CodepointLength, Data::String(s) | Data::Symbol(s)) => s.chars().count(),
            (Measure::Utf8ByteLength, Data::String(s) | Data::Symbol(s)) => s.len(),
            (Measure::Scale, Data::Decimal(d)) => return Some(-i64::from(d.exponent())),
            _ => return None,
        };
        i64::try_from(n).ok()
    }

    /// Words used in the violation code and message.
    fn label(self) -> &'static str {
        match self {
            Measure::ContainerLength => "container length",
            Measure::ByteLength => "byte length",
            Measure::CodepointLength => "codepoint length",
            Measure::Utf8ByteLength => "utf8 byte length",
            Measure::Scale => "scale",
        }
    }
}

/// `container_length`, `byte_length`, `codepoint_length`,
/// `utf8_byte_length`, and `scale`.
#[derive(Debug)]
pub(crate) struct Length {
    measure: Measure,
    range: IntRange,
}

impl Length {
    pub(super) fn parse(name: &str, arg: &Value) -> Result<Self, SchemaError> {
        let measure = match name {
            "container_length" => Measure::ContainerLength,
            "byte_length" => Measure::ByteLength,
            "codepoint_length" => Measure::CodepointLength,
            "utf8_byte_length" => Measure::Utf8ByteLength,
            "scale" => Measure::Scale,
            other => return Err(SchemaError::invalid(format!("Unknown length constraint {other}"))),
        };
        Ok(Self {
            measure,
            range: IntRange::parse_non_negative(arg)?,
        })
    }

    pub(super) fn validate(&self, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| self.measure.applies_to(k), sink)? {
            return Ok(());
        }
        let Some(n) = self.measure.of(value) else {
            return Ok(());
        };
        if self.range.contains(n) {
            return Ok(());
        }
        let label = self.measure.label();
        sink.add(Violation::new(
            isl,
            format!("invalid_{}", label.replace(' ', "_")),
            format!("invalid {label} {n}, expected {}", self.range),
        ))
    }
}

// ─── Decimals ───────────────────────────────────────────────────────────────

pub(super) fn parse_precision(arg: &Value) -> Result<ConstraintKind, SchemaError> {
    let range = IntRange::parse_non_negative(arg)?;
    ensure(!range.contains(0), || format!("Precision must be at least 1 ({arg})"))?;
    Ok(ConstraintKind::Precision(range))
}

pub(super) fn precision(isl: &Value, range: &IntRange, value: &Value, sink: &mut Violations) -> Validation {
    if !applies(isl, value, |k| k == IonType::Decimal, sink)? {
        return Ok(());
    }
    let Data::Decimal(d) = value.data() else {
        return Ok(());
    };
    let digits = i64::from(d.precision());
    if range.contains(digits) {
        Ok(())
    } else {
        sink.add(Violation::new(
            isl,
            "invalid_precision",
            format!("invalid precision {digits}, expected {range}"),
        ))
    }
}

/// `exponent` (ISL 2.0); the range may be negative.
#[derive(Debug)]
pub(crate) struct Exponent {
    range: IntRange,
}

impl Exponent {
    pub(super) fn parse(arg: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            range: IntRange::parse(arg)?,
        })
    }

    pub(super) fn validate(&self, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| k == IonType::Decimal, sink)? {
            return Ok(());
        }
        let Data::Decimal(d) = value.data() else {
            return Ok(());
        };
        let exponent = i64::from(d.exponent());
        if self.range.contains(exponent) {
            Ok(())
        } else {
            sink.add(Violation::new(
                isl,
                "invalid_exponent",
                format!("invalid exponent {exponent}, expected {}", self.range),
            ))
        }
    }
}

// ─── Timestamps ─────────────────────────────────────────────────────────────

pub(super) fn parse_timestamp_precision(arg: &Value) -> Result<ConstraintKind, SchemaError> {
    Ok(ConstraintKind::TimestampPrecision(range::timestamp_precision_range(arg)?))
}

/// Name of a precision rank; fractional precisions without a keyword are
/// written as a digit count.
fn precision_name(rank: i64) -> String {
    let keyword = match rank {
        -4 => "year",
        -3 => "month",
        -2 => "day",
        -1 => "minute",
        0 => "second",
        3 => "millisecond",
        6 => "microsecond",
        9 => "nanosecond",
        n => return format!("{n} fractional digits"),
    };
    keyword.to_string()
}

pub(super) fn timestamp_precision(isl: &Value, range: &IntRange, value: &Value, sink: &mut Violations) -> Validation {
    if !applies(isl, value, |k| k == IonType::Timestamp, sink)? {
        return Ok(());
    }
    let Data::Timestamp(ts) = value.data() else {
        return Ok(());
    };
    let rank = range::timestamp_rank(ts);
    if range.contains(rank) {
        Ok(())
    } else {
        sink.add(Violation::new(
            isl,
            "invalid_timestamp_precision",
            format!("invalid timestamp precision {}, expected {range}", precision_name(rank)),
        ))
    }
}

/// Parse one `"[+|-]hh:mm"` offset; `-00:00` is the unknown offset.
fn parse_offset(text: &str) -> Result<Option<i32>, SchemaError> {
    let shape_ok = text.is_ascii()
        && text.len() == 6
        && text.as_bytes()[3] == b':'
        && text[1..3].bytes().all(|b| b.is_ascii_digit())
        && text[4..6].bytes().all(|b| b.is_ascii_digit());
    ensure(shape_ok, || {
        "timestamp_offset values must be of the form \"[+|-]hh:mm\"".to_string()
    })?;
    let sign = match &text[..1] {
        "+" => 1,
        "-" => -1,
        _ => return Err(SchemaError::invalid(format!("Unrecognized timestamp offset sign '{}'", &text[..1]))),
    };
    if text == "-00:00" {
        return Ok(None);
    }
    let hours: i32 = text[1..3].parse().map_err(|_| SchemaError::invalid(format!("Invalid timestamp offset {text}")))?;
    let minutes: i32 = text[4..6].parse().map_err(|_| SchemaError::invalid(format!("Invalid timestamp offset {text}")))?;
    ensure(hours < 24 && minutes < 60, || format!("Invalid timestamp offset {text}"))?;
    Ok(Some(sign * (hours * 60 + minutes)))
}

pub(super) fn parse_timestamp_offset(arg: &Value) -> Result<ConstraintKind, SchemaError> {
    let items = match arg.elements() {
        Some(items) if arg.ion_type() == IonType::List => items,
        _ => return Err(SchemaError::invalid("timestamp_offset must be a list")),
    };
    ensure(!items.is_empty(), || "timestamp_offset must contain at least one offset".to_string())?;
    let mut offsets = Vec::with_capacity(items.len());
    for item in items {
        let text = match item.data() {
            Data::String(s) => s,
            _ => return Err(SchemaError::invalid("timestamp_offset values must be strings")),
        };
        offsets.push(parse_offset(text)?);
    }
    Ok(ConstraintKind::TimestampOffset(offsets))
}

/// Offsets are written `+hh:mm` here, including UTC.
fn offset_text(offset: Option<i32>) -> String {
    match offset {
        None => "-00:00".to_string(),
        Some(m) => {
            let sign = if m < 0 { '-' } else { '+' };
            format!("{sign}{:02}:{:02}", m.abs() / 60, m.abs() % 60)
        }
    }
}

pub(super) fn timestamp_offset(isl: &Value, offsets: &[Option<i32>], value: &Value, sink: &mut Violations) -> Validation {
    if !applies(isl, value, |k| k == IonType::Timestamp, sink)? {
        return Ok(());
    }
    let Data::Timestamp(ts) = value.data() else {
        return Ok(());
    };
    let offset = ts.offset_minutes();
    if offsets.contains(&offset) {
        Ok(())
    } else {
        sink.add(Violation::new(
            isl,
            "invalid_timestamp_offset",
            format!("invalid timestamp offset {}, expected {isl}", offset_text(offset)),
        ))
    }
}

// ─── ieee754_float ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FloatFormat {
    Binary16,
    Binary32,
    Binary64,
}

impl FloatFormat {
    const NAMES: [&'static str; 3] = ["binary16", "binary32", "binary64"];

    pub(super) fn parse(arg: &Value) -> Result<Self, SchemaError> {
        let arg = expect_kind(arg, IonType::Symbol, "ieee754_float")?;
        ensure(arg.annotations().is_empty(), || "ieee754_float must not have annotations".to_string())?;
        match arg.as_symbol() {
            Some("binary16") => Ok(FloatFormat::Binary16),
            Some("binary32") => Ok(FloatFormat::Binary32),
            Some("binary64") => Ok(FloatFormat::Binary64),
            _ => Err(SchemaError::invalid(format!(
                "ieee754_float must be one of [{}]",
                Self::NAMES.join(", ")
            ))),
        }
    }

    /// Whether `v` survives a round trip through this format. Non-finite
    /// values always do.
    fn encodes(self, v: f64) -> bool {
        if !v.is_finite() {
            return true;
        }
        match self {
            FloatFormat::Binary16 => is_exact_half(v),
            #[allow(clippy::cast_possible_truncation)]
            FloatFormat::Binary32 => f64::from(v as f32) == v,
            FloatFormat::Binary64 => true,
        }
    }

    pub(super) fn validate(&self, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, |k| k == IonType::Float, sink)? {
            return Ok(());
        }
        let Data::Float(v) = value.data() else {
            return Ok(());
        };
        if self.encodes(*v) {
            Ok(())
        } else {
            sink.add(Violation::new(
                isl,
                "invalid_ieee754_float",
                format!("value cannot be losslessly represented by the IEEE-754 {self} interchange format."),
            ))
        }
    }
}

impl fmt::Display for FloatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FloatFormat::Binary16 => Self::NAMES[0],
            FloatFormat::Binary32 => Self::NAMES[1],
            FloatFormat::Binary64 => Self::NAMES[2],
        };
        f.write_str(name)
    }
}

/// A half-precision value is a multiple of the spacing between adjacent
/// halves in its binade: `2^-24` below `2^-14`, else `2^(e - 10)`.
fn is_exact_half(v: f64) -> bool {
    let magnitude = v.abs();
    if magnitude > 65504.0 {
        return false;
    }
    let interval = if magnitude < 2f64.powi(-14) {
        2f64.powi(-24)
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let e = magnitude.log2().floor() as i32;
        2f64.powi(e - 10)
    };
    v % interval == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::parse_one;

    fn ion(text: &str) -> Value {
        parse_one(text).unwrap()
    }

    fn violations(isl: &str, value: &str, run: impl Fn(&Value, &Value, &mut Violations) -> Validation) -> Violations {
        let mut sink = Violations::new();
        run(&ion(isl), &ion(value), &mut sink).unwrap();
        sink
    }

    fn length(name: &str, isl: &str, value: &str) -> Violations {
        let length = Length::parse(name, &ion(isl)).unwrap();
        violations(isl, value, |i, v, s| length.validate(i, v, s))
    }

    #[test]
    fn test_container_length_counts_members() {
        assert!(length("container_length", "2", "[1, 2]").is_valid());
        assert!(length("container_length", "2", "{a: 1, a: 2}").is_valid());
        let v = length("container_length", "range::[0, 1]", "(a b)");
        assert_eq!(v.violations()[0].code, "invalid_container_length");
        assert_eq!(v.violations()[0].message, "invalid container length 2, expected range::[0, 1]");
    }

    #[test]
    fn test_text_lengths() {
        assert!(length("codepoint_length", "3", "\"héé\"").is_valid());
        assert!(!length("utf8_byte_length", "3", "\"héé\"").is_valid());
        assert!(length("utf8_byte_length", "5", "'héé'").is_valid());
        assert_eq!(
            length("utf8_byte_length", "3", "\"héé\"").violations()[0].code,
            "invalid_utf8_byte_length"
        );
    }

    #[test]
    fn test_byte_length_and_wrong_kind() {
        assert!(length("byte_length", "3", "{{ AQID }}").is_valid());
        let v = length("byte_length", "3", "\"abc\"");
        assert_eq!(v.violations()[0].code, "invalid_type");
        let v = length("byte_length", "3", "null.blob");
        assert_eq!(v.violations()[0].code, "null_value");
    }

    #[test]
    fn test_scale() {
        assert!(length("scale", "2", "1.23").is_valid());
        assert!(!length("scale", "2", "1.2").is_valid());
    }

    #[test]
    fn test_lengths_reject_negative_ranges() {
        assert!(Length::parse("byte_length", &ion("range::[-1, 3]")).is_err());
    }

    #[test]
    fn test_precision() {
        assert!(parse_precision(&ion("range::[0, 3]")).is_err());
        let Ok(ConstraintKind::Precision(range)) = parse_precision(&ion("range::[1, 3]")) else {
            panic!("expected a precision range");
        };
        let v = violations("range::[1, 3]", "1.234", |i, v, s| precision(i, &range, v, s));
        assert_eq!(v.violations()[0].message, "invalid precision 4, expected range::[1, 3]");
        let v = violations("range::[1, 3]", "12.3", |i, v, s| precision(i, &range, v, s));
        assert!(v.is_valid());
    }

    #[test]
    fn test_exponent_allows_negative_ranges() {
        let exponent = Exponent::parse(&ion("range::[-2, 0]")).unwrap();
        let ok = violations("range::[-2, 0]", "1.23", |i, v, s| exponent.validate(i, v, s));
        assert!(ok.is_valid());
        let bad = violations("range::[-2, 0]", "1.234", |i, v, s| exponent.validate(i, v, s));
        assert_eq!(bad.violations()[0].message, "invalid exponent -3, expected range::[-2, 0]");
    }

    #[test]
    fn test_timestamp_precision() {
        let isl = "range::[second, max]";
        let Ok(ConstraintKind::TimestampPrecision(range)) = parse_timestamp_precision(&ion(isl)) else {
            panic!("expected a precision range");
        };
        let check = |value: &str| violations(isl, value, |i, v, s| timestamp_precision(i, &range, v, s));
        assert!(check("2020-01-01T00:00:00Z").is_valid());
        assert!(check("2020-01-01T00:00:00.1Z").is_valid());
        let v = check("2020-01-01T");
        assert_eq!(
            v.violations()[0].message,
            "invalid timestamp precision day, expected range::[second, max]"
        );
    }

    #[test]
    fn test_exclusive_timestamp_precision() {
        let isl = "range::[exclusive::second, millisecond]";
        let Ok(ConstraintKind::TimestampPrecision(range)) = parse_timestamp_precision(&ion(isl)) else {
            panic!("expected a precision range");
        };
        let check = |value: &str| violations(isl, value, |i, v, s| timestamp_precision(i, &range, v, s));
        assert!(!check("2020-01-01T00:00:00Z").is_valid());
        assert!(check("2020-01-01T00:00:00.12Z").is_valid());
        assert!(!check("2020-01-01T00:00:00.1234Z").is_valid());
    }

    #[test]
    fn test_timestamp_offset() {
        let isl = "[\"+00:00\", \"-00:00\", \"+05:30\"]";
        let Ok(ConstraintKind::TimestampOffset(offsets)) = parse_timestamp_offset(&ion(isl)) else {
            panic!("expected offsets");
        };
        assert_eq!(offsets, vec![Some(0), None, Some(330)]);
        let check = |value: &str| violations(isl, value, |i, v, s| timestamp_offset(i, &offsets, v, s));
        assert!(check("2020-01-01T00:00Z").is_valid());
        assert!(check("2020-01-01T00:00-00:00").is_valid());
        assert!(check("2020-01-01T00:00+05:30").is_valid());
        let v = check("2020-01-01T00:00-08:00");
        assert_eq!(v.violations()[0].code, "invalid_timestamp_offset");
        assert!(v.violations()[0].message.starts_with("invalid timestamp offset -08:00, expected"));
    }

    #[test]
    fn test_timestamp_offset_parse_errors() {
        for bad in ["\"+05:30\"", "[]", "[0]", "[\"05:30\"]", "[\"*05:30\"]", "[\"+24:00\"]", "[\"+01:60\"]"] {
            assert!(parse_timestamp_offset(&ion(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_ieee754_binary32() {
        assert!(FloatFormat::Binary32.encodes(0.5));
        assert!(!FloatFormat::Binary32.encodes(0.1));
        assert!(FloatFormat::Binary32.encodes(f64::NAN));
        assert!(FloatFormat::Binary64.encodes(0.1));
    }

    #[test]
    fn test_ieee754_binary16() {
        assert!(FloatFormat::Binary16.encodes(65504.0));
        assert!(!FloatFormat::Binary16.encodes(65505.0));
        assert!(FloatFormat::Binary16.encodes(2f64.powi(-24)));
        assert!(!FloatFormat::Binary16.encodes(2f64.powi(-25)));
        assert!(FloatFormat::Binary16.encodes(1.5));
        assert!(!FloatFormat::Binary16.encodes(1.0 + 2f64.powi(-11)));
        assert!(FloatFormat::Binary16.encodes(f64::INFINITY));
    }

    #[test]
    fn test_ieee754_violation_message() {
        let format = FloatFormat::parse(&ion("binary32")).unwrap();
        let v = violations("binary32", "0.1e0", |i, v, s| format.validate(i, v, s));
        assert_eq!(
            v.violations()[0].message,
            "value cannot be losslessly represented by the IEEE-754 binary32 interchange format."
        );
        assert!(FloatFormat::parse(&ion("binary8")).is_err());
        assert!(FloatFormat::parse(&ion("a::binary32")).is_err());
    }
}
