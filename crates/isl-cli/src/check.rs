//! # Check Subcommand
//!
//! Loads a schema, with its imports, and lists the types it makes visible.

use anyhow::Result;
use clap::Args;
use isl_schema::Schema;

use crate::Session;

/// Arguments for the `isl check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema id, relative to the base directory.
    #[arg(value_name = "SCHEMA_ID")]
    pub schema_id: String,
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 if the schema loads, 1 if it does not.
pub fn run_check(args: &CheckArgs, session: &Session) -> Result<u8> {
    let system = session.schema_system()?;
    match system.load_schema(&args.schema_id) {
        Ok(schema) => {
            print!("{}", summary(&schema));
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {}: {e}", args.schema_id);
            Ok(1)
        }
    }
}

fn summary(schema: &Schema) -> String {
    let declared = schema.get_declared_types();
    let mut out = format!(
        "{} (ISL {}): {} type(s)\n",
        schema.id().unwrap_or("<anonymous>"),
        schema.version(),
        declared.len()
    );
    for ty in &declared {
        out.push_str(&format!("  type {}\n", ty.name()));
    }
    for import in schema.get_imports() {
        let names: Vec<String> = import.types().map(|t| t.name().to_string()).collect();
        out.push_str(&format!("  import {} [{}]\n", import.id(), names.join(", ")));
    }
    out
}
