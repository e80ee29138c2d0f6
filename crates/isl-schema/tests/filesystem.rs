//! Schemas served from a directory tree.

use std::fs;
use std::path::Path;

use isl_core::parse_one;
use isl_schema::{FilesystemAuthority, InMemoryAuthority, SchemaError, SchemaSystem};

fn write(base: &Path, id: &str, text: &str) {
    let path = base.join(id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn system(base: &Path) -> SchemaSystem {
    SchemaSystem::builder()
        .with_authority(FilesystemAuthority::new(base).unwrap())
        .build()
}

#[test]
fn test_loads_nested_ids_and_their_imports() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "common/types.isl",
        "$ion_schema_2_0\ntype::{ name: short_text, type: string, codepoint_length: range::[1, 8] }\n",
    );
    write(
        dir.path(),
        "app/user.isl",
        r#"$ion_schema_2_0
schema_header::{ imports: [{ id: "common/types.isl", type: short_text }] }
type::{
  name: user,
  type: struct,
  fields: closed::{ name: { type: short_text, occurs: required }, age: int },
}
schema_footer::{}
"#,
    );
    let system = system(dir.path());
    let schema = system.load_schema("app/user.isl").unwrap();
    let user = schema.get_type("user").unwrap();
    assert!(user.is_valid(&parse_one("{ name: \"ada\", age: 36 }").unwrap()));
    assert!(!user.is_valid(&parse_one("{ name: \"a very long name\" }").unwrap()));
    assert!(!user.is_valid(&parse_one("{ name: \"ada\", email: \"a@b\" }").unwrap()));
    assert!(system.is_schema_loaded("common/types.isl"));
}

#[test]
fn test_missing_file_is_unresolvable() {
    let dir = tempfile::tempdir().unwrap();
    let err = system(dir.path()).load_schema("nope.isl").unwrap_err();
    assert_eq!(
        err,
        SchemaError::Unresolvable {
            id: "nope.isl".into(),
            causes: vec![],
        }
    );
}

#[test]
fn test_ids_may_not_escape_the_base_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "outside.isl", "type::{ name: o }");
    fs::create_dir(dir.path().join("schemas")).unwrap();
    let err = system(&dir.path().join("schemas"))
        .load_schema("../outside.isl")
        .unwrap_err();
    assert!(matches!(err, SchemaError::Unresolvable { .. }));
    assert!(err.to_string().contains("escapes the authority base directory"));
}

#[test]
fn test_malformed_file_reports_parse_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.isl", "type::{ name: ");
    let err = system(dir.path()).load_schema("broken.isl").unwrap_err();
    assert!(err.to_string().starts_with("Unable to resolve schema id 'broken.isl' (schema 'broken.isl' is not valid Ion"));
}

#[test]
fn test_later_authorities_fill_gaps() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "disk.isl", "type::{ name: from_disk, type: int }");
    let system = SchemaSystem::builder()
        .with_authority(FilesystemAuthority::new(dir.path()).unwrap())
        .with_authority(InMemoryAuthority::new().with_schema(
            "memory.isl",
            "schema_header::{ imports: [{ id: \"disk.isl\" }] } type::{ name: from_memory, type: from_disk } schema_footer::{}",
        ))
        .build();
    let schema = system.load_schema("memory.isl").unwrap();
    assert!(schema.get_type("from_memory").unwrap().is_valid(&parse_one("7").unwrap()));
}

#[test]
fn test_unload_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "live.isl", "type::{ name: t, type: int }");
    let system = system(dir.path());
    let value = parse_one("\"text\"").unwrap();
    assert!(!system.load_schema("live.isl").unwrap().get_type("t").unwrap().is_valid(&value));

    write(dir.path(), "live.isl", "type::{ name: t, type: string }");
    assert!(!system.load_schema("live.isl").unwrap().get_type("t").unwrap().is_valid(&value));
    system.unload_schema("live.isl");
    assert!(system.load_schema("live.isl").unwrap().get_type("t").unwrap().is_valid(&value));
}
