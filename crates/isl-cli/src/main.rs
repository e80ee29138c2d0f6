//! # isl CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use isl_cli::check::{run_check, CheckArgs};
use isl_cli::validate::{run_validate, ValidateArgs};
use isl_cli::Session;

/// Ion Schema toolchain.
///
/// Loads Ion Schema Language documents from a base directory and validates
/// Ion data against the types they define.
#[derive(Parser, Debug)]
#[command(name = "isl", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory schema ids are resolved against.
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// JSON file with schema system settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a schema and list its types.
    Check(CheckArgs),

    /// Validate the values of an Ion data file against a type.
    Validate(ValidateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let session = Session {
        base_dir: cli.base_dir,
        config: cli.config,
    };
    tracing::debug!(base_dir = %session.base_dir.display(), "isl CLI starting");

    let result = match cli.command {
        Commands::Check(args) => run_check(&args, &session),
        Commands::Validate(args) => run_validate(&args, &session),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_cli::validate::OutputFormat;

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["isl", "check", "app/user.isl"]).unwrap();
        assert_eq!(cli.base_dir, PathBuf::from("."));
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Check(args) => assert_eq!(args.schema_id, "app/user.isl"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "isl", "validate", "geo.isl", "point", "points.ion", "--format", "json", "-vv",
            "--base-dir", "schemas",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.base_dir, PathBuf::from("schemas"));
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.type_name, "point");
                assert_eq!(args.data, PathBuf::from("points.ion"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_validate_requires_data_file() {
        assert!(Cli::try_parse_from(["isl", "validate", "geo.isl", "point"]).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["isl", "validate", "a", "b", "c", "--format", "xml"]).is_err());
    }
}
