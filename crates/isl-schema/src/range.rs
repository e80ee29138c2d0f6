//! # Ranges
//!
//! Constraint arguments of the form `range::[lower, upper]`, where either
//! bound may be the keyword `min`/`max` and a concrete bound may carry
//! `exclusive::`. A bare value `n` is shorthand for `range::[n, n]`.
//!
//! Integer ranges are normalised to inclusive `Option<i64>` bounds. Number
//! and timestamp ranges keep [`Bound`]s, since exclusivity cannot be folded
//! into a decimal or an instant.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use isl_core::{Data, Decimal, Timestamp, TimestampPrecision, Value};

use crate::error::{ensure, SchemaError};

// ─── Bounds ─────────────────────────────────────────────────────────────────

/// One end of a range as written.
enum RawBound<'a> {
    Min,
    Max,
    Value { value: &'a Value, exclusive: bool },
}

/// Split a range argument into its two written bounds.
fn raw_bounds(isl: &Value) -> Result<(RawBound<'_>, RawBound<'_>), SchemaError> {
    ensure(!isl.is_null(), || format!("Invalid range {isl}"))?;
    let Some(items) = isl.elements().filter(|_| isl.ion_type() == isl_core::IonType::List) else {
        let exact = || RawBound::Value {
            value: isl,
            exclusive: false,
        };
        return Ok((exact(), exact()));
    };
    ensure(isl.has_annotation("range"), || {
        format!("Invalid range, missing 'range' annotation:  {isl}")
    })?;
    ensure(items.len() == 2, || {
        format!("Invalid range, size of list must be 2:  {isl}")
    })?;
    let (lo, hi) = (&items[0], &items[1]);
    ensure(!lo.is_null() && !hi.is_null(), || format!("Invalid range {isl}"))?;
    let lower = match lo.as_symbol() {
        Some("min") => RawBound::Min,
        _ => RawBound::Value {
            value: lo,
            exclusive: lo.has_annotation("exclusive"),
        },
    };
    let upper = match hi.as_symbol() {
        Some("max") => RawBound::Max,
        _ => RawBound::Value {
            value: hi,
            exclusive: hi.has_annotation("exclusive"),
        },
    };
    ensure(
        !(matches!(lower, RawBound::Min) && matches!(upper, RawBound::Max)),
        || format!("Invalid range {isl}"),
    )?;
    Ok((lower, upper))
}

// ─── Integer Ranges ─────────────────────────────────────────────────────────

/// An inclusive integer range; `None` is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IntRange {
    lower: Option<i64>,
    upper: Option<i64>,
    isl: Value,
}

impl IntRange {
    /// Parse a range of ints.
    pub fn parse(isl: &Value) -> Result<Self, SchemaError> {
        Self::parse_with(isl, "int", |v| v.as_int())
    }

    /// Parse a range of ints that may not go below zero.
    pub fn parse_non_negative(isl: &Value) -> Result<Self, SchemaError> {
        let range = Self::parse(isl)?;
        ensure(range.lower.map_or(true, |lo| lo >= 0), || {
            format!("Invalid lower bound in positive int {isl}")
        })?;
        ensure(range.upper.map_or(true, |hi| hi >= 0), || {
            format!("Invalid upper bound in positive int {isl}")
        })?;
        Ok(range)
    }

    /// Parse a range whose bounds map to integers through `to_int`.
    pub fn parse_with(
        isl: &Value,
        what: &str,
        to_int: impl Fn(&Value) -> Option<i64>,
    ) -> Result<Self, SchemaError> {
        let (lower, upper) = raw_bounds(isl)?;
        // Exclusive bounds fold into the adjacent inclusive integer.
        let step = |n: i64, exclusive: bool, by: i64| -> Result<i64, SchemaError> {
            if !exclusive {
                return Ok(n);
            }
            n.checked_add(by)
                .ok_or_else(|| SchemaError::invalid(format!("No valid values in the {what} range {isl}")))
        };
        let lower = match lower {
            RawBound::Min => None,
            RawBound::Value { value, exclusive } => {
                let n = to_int(value)
                    .ok_or_else(|| SchemaError::invalid(format!("Invalid lower bound in {what} {isl}")))?;
                Some(step(n, exclusive, 1)?)
            }
            RawBound::Max => return Err(SchemaError::invalid(format!("Invalid lower bound in {what} {isl}"))),
        };
        let upper = match upper {
            RawBound::Max => None,
            RawBound::Value { value, exclusive } => {
                let n = to_int(value)
                    .ok_or_else(|| SchemaError::invalid(format!("Invalid upper bound in {what} {isl}")))?;
                Some(step(n, exclusive, -1)?)
            }
            RawBound::Min => return Err(SchemaError::invalid(format!("Invalid upper bound in {what} {isl}"))),
        };
        if let (Some(lo), Some(hi)) = (lower, upper) {
            ensure(lo <= hi, || format!("No valid values in the {what} range {isl}"))?;
        }
        Ok(Self { lower, upper, isl: isl.clone() })
    }

    pub fn contains(&self, value: i64) -> bool {
        self.lower.map_or(true, |lo| lo <= value) && self.upper.map_or(true, |hi| value <= hi)
    }

    pub fn min(&self) -> Option<i64> {
        self.lower
    }

    pub fn max(&self) -> Option<i64> {
        self.upper
    }

    pub fn isl(&self) -> &Value {
        &self.isl
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.isl)
    }
}

// ─── Occurs ─────────────────────────────────────────────────────────────────

fn fixed(lower: i64, upper: i64) -> IntRange {
    IntRange {
        lower: Some(lower),
        upper: Some(upper),
        isl: Value::list(vec![Value::int(lower), Value::int(upper)]).with_annotations(["range"]),
    }
}

/// `optional`: zero or one occurrence.
pub(crate) fn optional() -> IntRange {
    fixed(0, 1)
}

/// `required`: exactly one occurrence.
pub(crate) fn required() -> IntRange {
    fixed(1, 1)
}

/// Parse an `occurs` argument, falling back to `default` when absent.
pub(crate) fn occurs(isl: Option<&Value>, default: fn() -> IntRange) -> Result<IntRange, SchemaError> {
    let Some(isl) = isl else {
        return Ok(default());
    };
    let range = match isl.as_symbol() {
        Some("optional") => optional(),
        Some("required") => required(),
        _ => IntRange::parse_non_negative(isl)?,
    };
    ensure(range.upper.map_or(true, |hi| hi >= 1), || {
        "Occurs must allow at least one value".to_string()
    })?;
    Ok(range)
}

// ─── Timestamp Precision ────────────────────────────────────────────────────

/// Rank of a precision keyword; fractional ranks count digits.
pub(crate) fn precision_rank(keyword: &str) -> Option<i64> {
    Some(match keyword {
        "year" => -4,
        "month" => -3,
        "day" => -2,
        "minute" => -1,
        "second" => 0,
        "millisecond" => 3,
        "microsecond" => 6,
        "nanosecond" => 9,
        _ => return None,
    })
}

/// Rank of a timestamp's written precision.
pub(crate) fn timestamp_rank(ts: &Timestamp) -> i64 {
    match ts.precision() {
        TimestampPrecision::Year => -4,
        TimestampPrecision::Month => -3,
        TimestampPrecision::Day => -2,
        TimestampPrecision::Minute => -1,
        TimestampPrecision::Second => i64::try_from(ts.fraction_digits()).unwrap_or(i64::MAX),
    }
}

/// Parse a range of precision keywords.
pub(crate) fn timestamp_precision_range(isl: &Value) -> Result<IntRange, SchemaError> {
    IntRange::parse_with(isl, "timestamp precision", |v| {
        v.as_symbol().and_then(precision_rank)
    })
}

// ─── Ordered Ranges ─────────────────────────────────────────────────────────

/// A number bound or value, compared numerically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Exact(Decimal),
    Float(f64),
}

impl Number {
    /// The numeric value of a non-null int, decimal, or float.
    pub fn of(value: &Value) -> Option<Number> {
        match value.data() {
            Data::Int(i) => Some(Number::Exact(Decimal::from_int(*i))),
            Data::Decimal(d) => Some(Number::Exact(*d)),
            Data::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Number::Exact(d) => d.to_f64(),
            Number::Float(f) => f,
        }
    }
}

/// Types that can bound an ordered range.
pub(crate) trait Ordered {
    fn compare(&self, other: &Self) -> Option<Ordering>;
}

impl Ordered for Number {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Some(a.numeric_cmp(b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl Ordered for DateTime<Utc> {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A range over an ordered domain.
#[derive(Debug, Clone)]
pub(crate) struct OrderedRange<T> {
    lower: Bound<T>,
    upper: Bound<T>,
}

impl<T: Ordered> OrderedRange<T> {
    fn parse(isl: &Value, what: &str, convert: impl Fn(&Value) -> Option<T>) -> Result<Self, SchemaError> {
        let (lower, upper) = raw_bounds(isl)?;
        let bound = |raw: RawBound<'_>| -> Result<Bound<T>, SchemaError> {
            match raw {
                RawBound::Min | RawBound::Max => Ok(Bound::Unbounded),
                RawBound::Value { value, exclusive } => {
                    let v = convert(value).ok_or_else(|| {
                        SchemaError::invalid(format!("Expected range lower/upper to be {what} (was {value})"))
                    })?;
                    Ok(if exclusive { Bound::Excluded(v) } else { Bound::Included(v) })
                }
            }
        };
        let lower = bound(lower)?;
        let upper = bound(upper)?;
        if let (Some((lo, lo_ex)), Some((hi, hi_ex))) = (value_of(&lower), value_of(&upper)) {
            match lo.compare(hi) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) if !lo_ex && !hi_ex => {}
                Some(Ordering::Equal) => return Err(SchemaError::invalid(format!("No valid values in {isl}"))),
                _ => return Err(SchemaError::invalid(format!("Lower bound must be <= upper in {isl}"))),
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, value: &T) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(lo) => matches!(lo.compare(value), Some(Ordering::Less | Ordering::Equal)),
            Bound::Excluded(lo) => matches!(lo.compare(value), Some(Ordering::Less)),
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(hi) => matches!(value.compare(hi), Some(Ordering::Less | Ordering::Equal)),
            Bound::Excluded(hi) => matches!(value.compare(hi), Some(Ordering::Less)),
        };
        above && below
    }
}

fn value_of<T>(bound: &Bound<T>) -> Option<(&T, bool)> {
    match bound {
        Bound::Included(v) => Some((v, false)),
        Bound::Excluded(v) => Some((v, true)),
        Bound::Unbounded => None,
    }
}

/// A `range::` entry of `valid_values`.
#[derive(Debug, Clone)]
pub(crate) enum ValueRange {
    Number(OrderedRange<Number>),
    Timestamp(OrderedRange<DateTime<Utc>>),
}

impl ValueRange {
    /// Parse a range whose concrete bounds are all numbers or all timestamps.
    pub fn parse(isl: &Value) -> Result<Self, SchemaError> {
        let is_timestamp = isl
            .elements()
            .is_some_and(|items| items.iter().any(|b| matches!(b.data(), Data::Timestamp(_))));
        if is_timestamp {
            OrderedRange::parse(isl, "a timestamp", |v| match v.data() {
                Data::Timestamp(ts) => Some(ts.instant()),
                _ => None,
            })
            .map(ValueRange::Timestamp)
        } else {
            OrderedRange::parse(isl, "a decimal, float, or int", |v| match Number::of(v) {
                Some(Number::Float(f)) if !f.is_finite() => None,
                n => n,
            })
            .map(ValueRange::Number)
        }
    }

    /// Whether `value` (annotations ignored) lies in the range.
    pub fn contains(&self, value: &Value) -> bool {
        match (self, value.data()) {
            (ValueRange::Timestamp(range), Data::Timestamp(ts)) => range.contains(&ts.instant()),
            (ValueRange::Number(range), _) => match Number::of(value) {
                Some(Number::Float(f)) if f.is_nan() => false,
                Some(n) => range.contains(&n),
                None => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::parse_one;

    fn ion(text: &str) -> Value {
        parse_one(text).unwrap()
    }

    #[test]
    fn test_bare_int_is_exact() {
        let r = IntRange::parse(&ion("5")).unwrap();
        assert!(r.contains(5));
        assert!(!r.contains(4));
        assert_eq!(r.to_string(), "5");
    }

    #[test]
    fn test_inclusive_and_exclusive_bounds() {
        let r = IntRange::parse(&ion("range::[exclusive::1, 5]")).unwrap();
        assert!(!r.contains(1));
        assert!(r.contains(2));
        assert!(r.contains(5));
        assert!(!r.contains(6));
    }

    #[test]
    fn test_min_max_keywords() {
        let r = IntRange::parse(&ion("range::[min, 10]")).unwrap();
        assert!(r.contains(i64::MIN));
        assert_eq!(r.min(), None);
        assert_eq!(r.max(), Some(10));
    }

    #[test]
    fn test_rejects_malformed_ranges() {
        for text in [
            "[1, 2]",
            "range::[1]",
            "range::[min, max]",
            "range::[5, 1]",
            "range::[exclusive::1, exclusive::2]",
            "range::[null.int, 2]",
            "range::[1.0, 2]",
            "null.int",
        ] {
            assert!(IntRange::parse(&ion(text)).is_err(), "{text}");
        }
    }

    #[test]
    fn test_non_negative() {
        assert!(IntRange::parse_non_negative(&ion("range::[-1, 3]")).is_err());
        assert!(IntRange::parse_non_negative(&ion("range::[0, max]")).is_ok());
    }

    #[test]
    fn test_occurs_keywords_and_default() {
        let opt = occurs(Some(&ion("optional")), required).unwrap();
        assert_eq!((opt.min(), opt.max()), (Some(0), Some(1)));
        assert_eq!(opt.to_string(), "range::[0, 1]");
        let req = occurs(None, required).unwrap();
        assert_eq!((req.min(), req.max()), (Some(1), Some(1)));
        let many = occurs(Some(&ion("range::[2, max]")), optional).unwrap();
        assert_eq!((many.min(), many.max()), (Some(2), None));
    }

    #[test]
    fn test_occurs_must_admit_one() {
        assert!(occurs(Some(&ion("0")), optional).is_err());
        assert!(occurs(Some(&ion("range::[0, 0]")), optional).is_err());
        assert!(occurs(Some(&ion("-1")), optional).is_err());
    }

    #[test]
    fn test_timestamp_precision_range() {
        let r = timestamp_precision_range(&ion("range::[day, exclusive::millisecond]")).unwrap();
        assert!(r.contains(-2));
        assert!(r.contains(2));
        assert!(!r.contains(3));
        assert!(timestamp_precision_range(&ion("range::[fortnight, second]")).is_err());
    }

    #[test]
    fn test_timestamp_rank() {
        let Data::Timestamp(ts) = ion("2020-01-01T00:00:00.123Z").data().clone() else {
            panic!("not a timestamp")
        };
        assert_eq!(timestamp_rank(&ts), 3);
        let Data::Timestamp(day) = ion("2020-01-01").data().clone() else {
            panic!("not a timestamp")
        };
        assert_eq!(timestamp_rank(&day), -2);
    }

    #[test]
    fn test_number_range_mixes_kinds() {
        let r = ValueRange::parse(&ion("range::[exclusive::0, 1.5]")).unwrap();
        assert!(!r.contains(&ion("0")));
        assert!(r.contains(&ion("0.0001")));
        assert!(r.contains(&ion("1.5e0")));
        assert!(!r.contains(&ion("2")));
        assert!(!r.contains(&ion("nan")));
        assert!(!r.contains(&ion("\"1\"")));
    }

    #[test]
    fn test_number_range_infinities() {
        let r = ValueRange::parse(&ion("range::[0, max]")).unwrap();
        assert!(r.contains(&ion("+inf")));
        assert!(!r.contains(&ion("-inf")));
        assert!(ValueRange::parse(&ion("range::[nan, 1]")).is_err());
    }

    #[test]
    fn test_timestamp_range_compares_instants() {
        let r = ValueRange::parse(&ion("range::[2020-01-01T00:00Z, max]")).unwrap();
        assert!(r.contains(&ion("2020-01-01T01:00+01:00")));
        assert!(!r.contains(&ion("2019-12-31T23:59Z")));
        assert!(!r.contains(&ion("5")));
    }

    #[test]
    fn test_ordered_range_rejects_empty() {
        assert!(ValueRange::parse(&ion("range::[exclusive::1, 1]")).is_err());
        assert!(ValueRange::parse(&ion("range::[2, 1]")).is_err());
        assert!(ValueRange::parse(&ion("range::[1, 1]")).is_ok());
    }

    #[test]
    fn test_number_range_with_extreme_exponents() {
        let r = ValueRange::parse(&ion("range::[1d-2147483647, 1d2147483647]")).unwrap();
        assert!(r.contains(&ion("5.")));
        assert!(r.contains(&ion("1d-2147483647")));
        assert!(!r.contains(&ion("0.")));
        assert!(!r.contains(&ion("-5")));
        assert!(r.contains(&ion("1e300")));
    }
}
