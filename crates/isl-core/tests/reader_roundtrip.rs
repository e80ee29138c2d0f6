//! Rendering followed by reading yields an equivalent value.

use isl_core::{parse_all, parse_one, Data, Decimal, IonType, Value};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::sample::select(IonType::ALL.to_vec()).prop_map(|t| Value::new(Data::Null(t))),
        any::<bool>().prop_map(Value::bool),
        any::<i64>().prop_map(Value::int),
        (-1.0e12f64..1.0e12).prop_map(|x| Value::new(Data::Float(x))),
        (-1_000_000_000i128..1_000_000_000, -12i32..12)
            .prop_map(|(c, e)| Value::new(Data::Decimal(Decimal::new(c, e)))),
        "[a-zA-Z_][a-zA-Z0-9_ ]{0,8}".prop_map(Value::symbol),
        "\\PC{0,12}".prop_map(Value::string),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(|b| Value::new(Data::Blob(b))),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(|b| Value::new(Data::Clob(b))),
    ]
}

fn annotated(inner: impl Strategy<Value = Value>) -> impl Strategy<Value = Value> {
    (inner, prop::collection::vec("[a-z][a-z_]{0,5}", 0..3))
        .prop_map(|(v, anns)| v.with_annotations(anns))
}

fn value() -> impl Strategy<Value = Value> {
    annotated(scalar()).prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::list),
            prop::collection::vec(inner.clone(), 0..4).prop_map(|v| Value::new(Data::Sexp(v))),
            prop::collection::vec(("[a-z]{1,4}", inner), 0..4).prop_map(Value::structure),
        ]
    })
}

proptest! {
    #[test]
    fn test_rendered_values_read_back_equal(v in value()) {
        let text = v.to_string();
        let back = parse_one(&text).map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        prop_assert_eq!(back, v);
    }

    #[test]
    fn test_streams_of_values_read_back_in_order(vs in prop::collection::vec(value(), 0..5)) {
        let text = vs.iter().map(Value::to_string).collect::<Vec<_>>().join("\n");
        let back = parse_all(&text).map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        prop_assert_eq!(back, vs);
    }
}

#[test]
fn test_timestamps_round_trip() {
    for text in [
        "2007T",
        "2007-02T",
        "2007-02-23",
        "2007-02-23T12:14Z",
        "2007-02-23T12:14:33.079-08:00",
        "2007-02-23T12:14:33-00:00",
    ] {
        let v = parse_one(text).unwrap();
        assert_eq!(v.to_string(), text);
    }
}
