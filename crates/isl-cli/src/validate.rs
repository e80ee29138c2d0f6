//! # Validate Subcommand
//!
//! Validates every top-level value of an Ion data file against one type of
//! a loaded schema, reporting a violation tree per invalid value.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use isl_core::Value;
use isl_schema::{Type, Violations};

use crate::Session;

/// Report format for validation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the `isl validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema id, relative to the base directory.
    #[arg(value_name = "SCHEMA_ID")]
    pub schema_id: String,

    /// Name of the type to validate against.
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Ion text file holding the values to validate.
    #[arg(value_name = "DATA_FILE")]
    pub data: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Result of validating one top-level value.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub value: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Violations>,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 if every value is valid, 2 if any is not.
/// Unloadable schemas, unknown types and unreadable data are errors.
pub fn run_validate(args: &ValidateArgs, session: &Session) -> Result<u8> {
    let system = session.schema_system()?;
    let schema = system
        .load_schema(&args.schema_id)
        .with_context(|| format!("failed to load schema {}", args.schema_id))?;
    let ty = schema
        .get_type(&args.type_name)
        .with_context(|| format!("no type named '{}' in schema {}", args.type_name, args.schema_id))?;

    let text = fs::read_to_string(&args.data)
        .with_context(|| format!("failed to read {}", args.data.display()))?;
    let values = isl_core::parse_all(&text)
        .with_context(|| format!("{} is not valid Ion", args.data.display()))?;

    let outcomes = validate_all(&ty, &values);
    let invalid = outcomes.iter().filter(|o| !o.valid).count();
    tracing::info!(values = outcomes.len(), invalid, type_name = ty.name(), "validated data file");

    print!("{}", render(&outcomes, args.format)?);
    Ok(if invalid == 0 { 0 } else { 2 })
}

/// Validate each value in order.
pub fn validate_all(ty: &Type, values: &[Value]) -> Vec<Outcome> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let violations = ty.validate(value);
            let valid = violations.is_valid();
            Outcome {
                index,
                value: value.to_string(),
                valid,
                violations: (!valid).then_some(violations),
            }
        })
        .collect()
}

/// Render outcomes in the requested format.
pub fn render(outcomes: &[Outcome], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(outcomes)?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for outcome in outcomes {
                match &outcome.violations {
                    None => out.push_str(&format!("  PASS: [{}] {}\n", outcome.index, outcome.value)),
                    Some(violations) => {
                        out.push_str(&format!("  FAIL: [{}] {}\n", outcome.index, outcome.value));
                        for line in violations.to_string().lines() {
                            out.push_str(&format!("    {line}\n"));
                        }
                    }
                }
            }
            let passed = outcomes.iter().filter(|o| o.valid).count();
            out.push_str(&format!("Values: {}/{} valid\n", passed, outcomes.len()));
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_schema::SchemaSystem;

    const SCHEMA: &str = "type::{ name: point, type: struct, fields: { x: int, y: int } }";

    fn point() -> Type {
        SchemaSystem::builder()
            .build()
            .new_schema(SCHEMA)
            .unwrap()
            .get_type("point")
            .unwrap()
    }

    fn fixture(data: &str) -> (tempfile::TempDir, Session, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("geo.isl"), SCHEMA).unwrap();
        let data_path = dir.path().join("points.ion");
        fs::write(&data_path, data).unwrap();
        let session = Session {
            base_dir: dir.path().to_path_buf(),
            config: None,
        };
        (dir, session, data_path)
    }

    fn args(data: PathBuf, type_name: &str) -> ValidateArgs {
        ValidateArgs {
            schema_id: "geo.isl".to_string(),
            type_name: type_name.to_string(),
            data,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_validate_all_keeps_order() {
        let values = isl_core::parse_all("{ x: 1 } { x: a } { y: 2 }").unwrap();
        let valid: Vec<bool> = validate_all(&point(), &values).iter().map(|o| o.valid).collect();
        assert_eq!(valid, vec![true, false, true]);
    }

    #[test]
    fn test_text_report() {
        let values = isl_core::parse_all("{ x: 1 } { x: a }").unwrap();
        let text = render(&validate_all(&point(), &values), OutputFormat::Text).unwrap();
        assert!(text.starts_with("  PASS: [0] {x: 1}\n  FAIL: [1] {x: a}\n    Validation failed:\n"));
        assert!(text.ends_with("Values: 1/2 valid\n"));
    }

    #[test]
    fn test_json_report_omits_violations_of_valid_values() {
        let values = isl_core::parse_all("{ x: 1 } { x: a }").unwrap();
        let json = render(&validate_all(&point(), &values), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed[0].get("violations").is_none());
        assert_eq!(parsed[1]["valid"], false);
        assert_eq!(parsed[1]["violations"]["violations"][0]["code"], "fields_mismatch");
    }

    #[test]
    fn test_exit_codes() {
        let (_dir, session, data) = fixture("{ x: 1, y: 2 }");
        assert_eq!(run_validate(&args(data, "point"), &session).unwrap(), 0);

        let (_dir, session, data) = fixture("{ x: 1 } { x: \"one\" }");
        assert_eq!(run_validate(&args(data, "point"), &session).unwrap(), 2);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let (_dir, session, data) = fixture("{}");
        let err = run_validate(&args(data, "polygon"), &session).unwrap_err();
        assert!(err.to_string().contains("no type named 'polygon'"));
    }

    #[test]
    fn test_malformed_data_is_an_error() {
        let (_dir, session, data) = fixture("{ x: ");
        let err = run_validate(&args(data, "point"), &session).unwrap_err();
        assert!(err.to_string().contains("is not valid Ion"));
    }
}
