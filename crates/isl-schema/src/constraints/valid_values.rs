//! # `valid_values`
//!
//! Either a single `range::[...]` or a list whose items are exact values or
//! ranges. Exact values compare by data-model equality with the value's
//! annotations stripped.

use isl_core::{IonType, Value};

use crate::error::{ensure, SchemaError};
use crate::range::ValueRange;
use crate::violations::{Validation, Violation, Violations};

#[derive(Debug)]
enum Entry {
    Exact(Value),
    Range(ValueRange),
}

#[derive(Debug)]
pub(crate) struct ValidValues {
    entries: Vec<Entry>,
}

fn is_range(value: &Value) -> bool {
    value.ion_type() == IonType::List && !value.is_null() && value.has_annotation("range")
}

impl ValidValues {
    pub(super) fn parse(arg: &Value) -> Result<Self, SchemaError> {
        if is_range(arg) {
            return Ok(Self {
                entries: vec![Entry::Range(ValueRange::parse(arg)?)],
            });
        }
        let items = match arg.elements() {
            Some(items) if arg.ion_type() == IonType::List => items,
            _ => return Err(SchemaError::invalid(format!("Invalid valid_values constraint: {arg}"))),
        };
        let mut entries: Vec<Entry> = Vec::with_capacity(items.len());
        for item in items {
            if is_range(item) {
                entries.push(Entry::Range(ValueRange::parse(item)?));
                continue;
            }
            ensure(item.annotations().is_empty(), || {
                format!("Annotations ({item}) are not allowed in valid_values")
            })?;
            let duplicate = entries
                .iter()
                .any(|e| matches!(e, Entry::Exact(v) if v == item));
            if !duplicate {
                entries.push(Entry::Exact(item.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub(super) fn validate(&self, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        let bare = value.without_annotations();
        let valid = self.entries.iter().any(|entry| match entry {
            Entry::Exact(expected) => *expected == bare,
            Entry::Range(range) => range.contains(&bare),
        });
        if valid {
            Ok(())
        } else {
            sink.add(Violation::new(isl, "invalid_value", format!("invalid value {bare}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::parse_one;

    fn check(constraint: &str, value: &str) -> bool {
        let isl = parse_one(constraint).unwrap();
        let valid_values = ValidValues::parse(&isl).unwrap();
        let mut sink = Violations::new();
        valid_values.validate(&isl, &parse_one(value).unwrap(), &mut sink).unwrap();
        sink.is_valid()
    }

    #[test]
    fn test_exact_values_ignore_value_annotations() {
        assert!(check("[1, hello, \"x\"]", "a::hello"));
        assert!(!check("[1, hello]", "2"));
    }

    #[test]
    fn test_exact_values_keep_decimal_exponent() {
        assert!(check("[1.0]", "1.0"));
        assert!(!check("[1.0]", "1.00"));
        assert!(!check("[1]", "1.0"));
    }

    #[test]
    fn test_mixed_ranges_and_values() {
        assert!(check("[range::[1, 5], 10]", "3.5"));
        assert!(check("[range::[1, 5], 10]", "10"));
        assert!(!check("[range::[1, 5], 10]", "7"));
        assert!(!check("[range::[1, 5]]", "\"3\""));
    }

    #[test]
    fn test_top_level_range() {
        assert!(check("range::[2000T, 2020T]", "2010-05-01T"));
        assert!(!check("range::[2000T, 2020T]", "2021T"));
        assert!(!check("range::[2000T, 2020T]", "5"));
    }

    #[test]
    fn test_nan_is_outside_number_ranges() {
        assert!(!check("range::[0e0, 1e0]", "nan"));
    }

    #[test]
    fn test_violation_message() {
        let isl = parse_one("[1]").unwrap();
        let mut sink = Violations::new();
        ValidValues::parse(&isl)
            .unwrap()
            .validate(&isl, &parse_one("a::2").unwrap(), &mut sink)
            .unwrap();
        assert_eq!(sink.violations()[0].code, "invalid_value");
        assert_eq!(sink.violations()[0].message, "invalid value 2");
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(ValidValues::parse(&parse_one("5").unwrap()).is_err());
        assert!(ValidValues::parse(&parse_one("null.list").unwrap()).is_err());
        assert!(ValidValues::parse(&parse_one("[a::1]").unwrap()).is_err());
    }
}
