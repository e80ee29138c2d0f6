//! Constraint behaviour through whole schemas, and properties of the
//! validation entry points.

use isl_core::{parse_one, Data, Value};
use isl_schema::{Schema, SchemaSystem, Type};
use proptest::prelude::*;

fn schema(text: &str) -> Schema {
    SchemaSystem::builder().build().new_schema(text).unwrap()
}

fn ty(text: &str, name: &str) -> Type {
    schema(text).get_type(name).unwrap()
}

fn value(text: &str) -> Value {
    parse_one(text).unwrap()
}

fn codes(ty: &Type, text: &str) -> Vec<String> {
    ty.validate(&value(text))
        .violations()
        .iter()
        .map(|v| v.code.clone())
        .collect()
}

// ─── Sequences ──────────────────────────────────────────────────────────────

#[test]
fn test_ordered_elements_with_occurrence_ranges() {
    let pair = ty(
        "type::{ name: pair, type: list, ordered_elements: [symbol, { type: int, occurs: range::[1, 3] }] }",
        "pair",
    );
    assert!(pair.is_valid(&value("[a, 1]")));
    assert!(pair.is_valid(&value("[a, 1, 2, 3]")));
    assert!(!pair.is_valid(&value("[a]")));
    assert!(!pair.is_valid(&value("[a, 1, 2, 3, 4]")));
    assert!(!pair.is_valid(&value("[1]")));
    assert_eq!(codes(&pair, "[a]"), vec!["ordered_elements_mismatch"]);
}

#[test]
fn test_ordered_elements_skip_optional_slots() {
    let t = ty(
        "type::{ name: t, type: sexp, ordered_elements: [{ type: symbol, occurs: optional }, int, { type: string, occurs: range::[0, max] }] }",
        "t",
    );
    assert!(t.is_valid(&value("(1)")));
    assert!(t.is_valid(&value("(a 1 \"x\" \"y\")")));
    assert!(!t.is_valid(&value("(a a 1)")));
    assert!(!t.is_valid(&value("()")));
}

#[test]
fn test_v1_closed_fields_and_occurrences() {
    let person = ty(
        "type::{ name: person, type: struct, content: closed, \
                 fields: { name: { type: string, occurs: required }, age: int } }",
        "person",
    );
    assert!(person.is_valid(&value("{ name: \"ada\" }")));
    assert!(person.is_valid(&value("{ name: \"ada\", age: 36 }")));
    assert!(!person.is_valid(&value("{ name: \"a\", name: \"b\" }")));
    assert_eq!(codes(&person, "{ age: 1 }"), vec!["fields_mismatch"]);
    assert_eq!(codes(&person, "{ name: \"ada\", extra: 1 }"), vec!["unexpected_content"]);

    let violations = person.validate(&value("{ age: 1 }"));
    let child = &violations.violations()[0].nested.children()[0];
    assert_eq!(child.field_name.as_deref(), Some("name"));
    assert_eq!(child.nested.violations()[0].code, "occurs_mismatch");
}

#[test]
fn test_v2_closed_fields() {
    let t = ty("$ion_schema_2_0 type::{ name: t, type: struct, fields: closed::{ a: int } }", "t");
    assert!(t.is_valid(&value("{ a: 1 }")));
    assert!(t.is_valid(&value("{}")));
    assert!(!t.is_valid(&value("{ b: 1 }")));
}

// ─── Logic ──────────────────────────────────────────────────────────────────

#[test]
fn test_one_of_any_of_all_of_not() {
    let s = schema(
        "type::{ name: one, one_of: [int, number] } \
         type::{ name: any, any_of: [int, string] } \
         type::{ name: all, all_of: [number, { valid_values: range::[0, 10] }] } \
         type::{ name: neg, not: int }",
    );
    let one = s.get_type("one").unwrap();
    assert!(one.is_valid(&value("1.5")));
    assert_eq!(codes(&one, "1"), vec!["more_than_one_type_matched"]);
    assert_eq!(codes(&one, "x"), vec!["no_types_matched"]);

    let any = s.get_type("any").unwrap();
    assert!(any.is_valid(&value("\"s\"")));
    assert!(!any.is_valid(&value("s")));

    let all = s.get_type("all").unwrap();
    assert!(all.is_valid(&value("5")));
    assert_eq!(codes(&all, "11"), vec!["all_types_not_matched"]);

    let neg = s.get_type("neg").unwrap();
    assert!(neg.is_valid(&value("a")));
    assert_eq!(codes(&neg, "1"), vec!["type_matched"]);
}

#[test]
fn test_failed_alternatives_leave_no_trace() {
    let t = ty("type::{ name: t, type: struct, fields: { v: { any_of: [int, string] } } }", "t");
    let violations = t.validate(&value("{ v: 1 }"));
    assert!(violations.is_valid());
    assert!(violations.to_string().is_empty());
}

// ─── Collections ────────────────────────────────────────────────────────────

#[test]
fn test_element_contains_and_length() {
    let s = schema(
        "$ion_schema_2_0 \
         type::{ name: ints, type: list, element: distinct::int, container_length: range::[1, 3] } \
         type::{ name: has, type: list, contains: [a, 1] }",
    );
    let ints = s.get_type("ints").unwrap();
    assert!(ints.is_valid(&value("[1, 2]")));
    assert_eq!(codes(&ints, "[1, 1]"), vec!["element_not_distinct"]);
    assert_eq!(codes(&ints, "[1, a]"), vec!["element_mismatch"]);
    assert_eq!(codes(&ints, "[]"), vec!["invalid_container_length"]);

    let has = s.get_type("has").unwrap();
    assert!(has.is_valid(&value("[1, b, a]")));
    assert_eq!(codes(&has, "[a]"), vec!["missing_values"]);
}

#[test]
fn test_element_children_point_at_offending_positions() {
    let t = ty("type::{ name: t, type: list, element: int }", "t");
    let violations = t.validate(&value("[1, x, 3, y]"));
    let children = violations.violations()[0].nested.children();
    let indexes: Vec<Option<usize>> = children.iter().map(|c| c.index).collect();
    assert_eq!(indexes, vec![Some(1), Some(3)]);
}

// ─── Annotations and nulls ──────────────────────────────────────────────────

#[test]
fn test_v1_annotations() {
    let s = schema(
        "type::{ name: req, annotations: required::[a, b] } \
         type::{ name: ord, annotations: ordered::closed::[a, optional::b, c] }",
    );
    let req = s.get_type("req").unwrap();
    assert!(req.is_valid(&value("b::a::1")));
    assert_eq!(codes(&req, "a::1"), vec!["missing_annotation"]);

    let ord = s.get_type("ord").unwrap();
    assert!(ord.is_valid(&value("a::c::1")));
    assert!(ord.is_valid(&value("a::b::c::1")));
    assert_eq!(codes(&ord, "c::a::1"), vec!["annotations_mismatch"]);
}

#[test]
fn test_v2_annotations() {
    let t = ty("$ion_schema_2_0 type::{ name: t, annotations: closed::required::[a] }", "t");
    assert!(t.is_valid(&value("a::1")));
    assert_eq!(codes(&t, "1"), vec!["invalid_annotations"]);
    assert_eq!(codes(&t, "a::b::1"), vec!["invalid_annotations"]);
}

#[test]
fn test_nullable_and_null_or() {
    let v1 = ty("type::{ name: t, type: nullable::int }", "t");
    assert!(v1.is_valid(&value("null")));
    assert!(v1.is_valid(&value("null.int")));
    assert!(!v1.is_valid(&value("null.string")));

    let v2 = ty("$ion_schema_2_0 type::{ name: t, type: $null_or::int }", "t");
    assert!(v2.is_valid(&value("null")));
    assert!(v2.is_valid(&value("3")));
    assert!(!v2.is_valid(&value("null.int")));
}

#[test]
fn test_extreme_decimal_bounds() {
    let t = ty("type::{ name: t, valid_values: range::[1d-2147483647, 1d2147483647] }", "t");
    assert!(t.is_valid(&value("5.")));
    let violations = t.validate(&value("-1d-2000000000"));
    assert_eq!(violations.violations()[0].code, "invalid_value");
    assert!(violations.to_string().contains("invalid value -1d-2000000000"));
}

// ─── Schema values ──────────────────────────────────────────────────────────

#[test]
fn test_plus_type_shadows_without_mutating() {
    let system = SchemaSystem::builder().build();
    let original = system
        .new_schema("type::{ name: a, type: int } type::{ name: b, type: a }")
        .unwrap();
    let replacement = system.new_type("{ name: a, type: string }").unwrap();
    let updated = original.plus_type(&replacement).unwrap();

    let one = value("1");
    assert!(original.get_type("a").unwrap().is_valid(&one));
    assert!(!updated.get_type("a").unwrap().is_valid(&one));
    assert_eq!(original.get_types().len(), 2);
    assert_eq!(updated.get_types().len(), 2);
    // Types already built keep the definition they were resolved against.
    assert!(updated.get_type("b").unwrap().is_valid(&one));
}

#[test]
fn test_violations_serialize_as_a_tree() {
    let t = ty("type::{ name: t, type: struct, fields: { a: int } }", "t");
    let json = serde_json::to_value(t.validate(&value("{ a: x }"))).unwrap();
    assert_eq!(json["violations"][0]["code"], "fields_mismatch");
    assert_eq!(json["violations"][0]["children"][0]["field_name"], "a");
    assert_eq!(json["violations"][0]["children"][0]["values"][0], "x");
}

// ─── Properties ─────────────────────────────────────────────────────────────

const CATALOG: &str = "\
    type::{ name: small, type: int, valid_values: range::[-5, 5] } \
    type::{ name: words, type: list, element: { type: symbol, codepoint_length: range::[1, 3] } } \
    type::{ name: rec, type: struct, fields: { n: small, w: words, r: rec } } \
    type::{ name: seq, type: list, ordered_elements: [small, { type: string, occurs: range::[0, 2] }] } \
    type::{ name: either, one_of: [small, words, seq] } \
    type::{ name: tagged, annotations: ordered::[x, optional::y], type: $any }";

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::null()),
        (-8i64..8).prop_map(Value::int),
        "[a-d]{0,4}".prop_map(Value::symbol),
        "[a-d]{0,2}".prop_map(Value::string),
        any::<bool>().prop_map(Value::bool),
    ]
}

fn arbitrary() -> impl Strategy<Value = Value> {
    let annotated = (leaf(), prop::collection::vec(prop::sample::select(vec!["x", "y", "z"]), 0..3))
        .prop_map(|(v, anns)| v.with_annotations(anns));
    annotated.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::list),
            prop::collection::vec(inner.clone(), 0..4).prop_map(|v| Value::new(Data::Sexp(v))),
            prop::collection::vec((prop::sample::select(vec!["n", "w", "r", "q"]), inner), 0..4)
                .prop_map(Value::structure),
        ]
    })
}

proptest! {
    #[test]
    fn test_is_valid_agrees_with_validate(v in arbitrary()) {
        let schema = schema(CATALOG);
        for ty in schema.get_types() {
            prop_assert_eq!(ty.is_valid(&v), ty.validate(&v).is_valid(), "type {}, value {}", ty.name(), v);
        }
    }

    #[test]
    fn test_validation_is_repeatable(v in arbitrary()) {
        let t = schema(CATALOG).get_type("rec").unwrap();
        let first = t.validate(&v).to_string();
        prop_assert_eq!(first, t.validate(&v).to_string());
    }
}
