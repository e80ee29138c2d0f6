//! # Builtin Types
//!
//! The types every schema can name without declaring them: one core type
//! per kind (`int`, `string`, ...), their `$`-prefixed forms that also
//! accept typed nulls of that kind, the unions `text`, `lob`, `number`, and
//! `any`/`$any`/`nothing`.

use isl_core::{IonType, Value};

use crate::violations::{Validation, Violation, Violations};

/// What a builtin accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Builtin {
    /// `$any` (nulls allowed) or `any`.
    Any { nulls: bool },
    /// Rejects every value.
    Nothing,
    /// Values of the listed kinds; typed nulls of those kinds when `nulls`.
    Kinds { kinds: Vec<IonType>, nulls: bool },
}

/// Every builtin name with its definition.
pub(crate) fn all() -> Vec<(String, Builtin)> {
    let mut out = vec![
        ("any".to_string(), Builtin::Any { nulls: false }),
        ("$any".to_string(), Builtin::Any { nulls: true }),
        ("nothing".to_string(), Builtin::Nothing),
    ];
    let unions: [(&str, &[IonType]); 3] = [
        ("text", &[IonType::String, IonType::Symbol]),
        ("lob", &[IonType::Blob, IonType::Clob]),
        ("number", &[IonType::Decimal, IonType::Float, IonType::Int]),
    ];
    for (name, kinds) in unions {
        out.push((name.to_string(), Builtin::Kinds { kinds: kinds.to_vec(), nulls: false }));
        out.push((format!("${name}"), Builtin::Kinds { kinds: kinds.to_vec(), nulls: true }));
    }
    for kind in IonType::ALL {
        let kinds = vec![kind];
        if kind != IonType::Null {
            out.push((kind.name().to_string(), Builtin::Kinds { kinds: kinds.clone(), nulls: false }));
        }
        out.push((format!("${}", kind.name()), Builtin::Kinds { kinds, nulls: true }));
    }
    out
}

impl Builtin {
    /// Whether values of `kind` can satisfy this builtin at all.
    pub fn admits_kind(&self, kind: IonType) -> bool {
        match self {
            Builtin::Any { .. } => true,
            Builtin::Nothing => false,
            Builtin::Kinds { kinds, .. } => kinds.contains(&kind),
        }
    }

    pub fn validate(&self, name: &str, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        let found = || {
            let null = if value.is_null() { "null " } else { "" };
            format!("{null}{}", value.ion_type().name())
        };
        let ok = match self {
            Builtin::Any { nulls } => *nulls || !value.is_null(),
            Builtin::Nothing => {
                let message = format!("expected type nothing, found {}", value.ion_type().name());
                return sink.add(Violation::new(isl, "type_mismatch", message));
            }
            Builtin::Kinds { kinds, nulls } => {
                kinds.contains(&value.ion_type()) && (*nulls || !value.is_null())
            }
        };
        if ok {
            Ok(())
        } else {
            sink.add(Violation::new(
                isl,
                "type_mismatch",
                format!("expected type {name}, found {}", found()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::{parse_one, Data};

    fn builtin(name: &str) -> Builtin {
        all()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
            .unwrap()
    }

    fn accepts(name: &str, text: &str) -> bool {
        let mut sink = Violations::new();
        builtin(name)
            .validate(name, &Value::symbol(name), &parse_one(text).unwrap(), &mut sink)
            .unwrap();
        sink.is_valid()
    }

    #[test]
    fn test_names_are_unique() {
        let names: Vec<String> = all().into_iter().map(|(n, _)| n).collect();
        let mut dedup = names.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
        assert!(names.contains(&"$null".to_string()));
        assert!(!names.contains(&"null".to_string()));
    }

    #[test]
    fn test_core_types_reject_nulls() {
        assert!(accepts("int", "5"));
        assert!(!accepts("int", "null.int"));
        assert!(!accepts("int", "\"5\""));
    }

    #[test]
    fn test_dollar_types_accept_own_typed_null_only() {
        assert!(accepts("$int", "null.int"));
        assert!(accepts("$int", "5"));
        assert!(!accepts("$int", "null"));
        assert!(!accepts("$int", "null.string"));
        assert!(accepts("$null", "null"));
        assert!(!accepts("$null", "null.int"));
    }

    #[test]
    fn test_unions() {
        assert!(accepts("text", "sym"));
        assert!(accepts("text", "\"s\""));
        assert!(accepts("number", "1.5"));
        assert!(accepts("lob", "{{aGk=}}"));
        assert!(accepts("$number", "null.float"));
        assert!(!accepts("number", "null.float"));
    }

    #[test]
    fn test_any_and_nothing() {
        assert!(accepts("any", "[1]"));
        assert!(!accepts("any", "null.list"));
        assert!(accepts("$any", "null"));
        assert!(!accepts("nothing", "1"));
    }

    #[test]
    fn test_mismatch_message() {
        let mut sink = Violations::new();
        let value = Value::new(Data::Null(IonType::String));
        builtin("int")
            .validate("int", &Value::symbol("int"), &value, &mut sink)
            .unwrap();
        assert_eq!(sink.violations()[0].code, "type_mismatch");
        assert_eq!(sink.violations()[0].message, "expected type int, found null string");
    }
}
