//! # isl-cli — Ion Schema Command-Line Interface
//!
//! Provides the `isl` binary: schemas are served from a base directory,
//! and data files are read as Ion text.
//!
//! ## Subcommands
//!
//! - `isl check <schema-id>`: load a schema and list the types it declares.
//! - `isl validate <schema-id> <type> <data-file>`: validate every
//!   top-level value in a data file against one type.
//!
//! ```bash
//! isl --base-dir schemas check app/user.isl
//! isl --base-dir schemas validate app/user.isl user users.ion --format json
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers here return exit codes.
//! - Handlers delegate to `isl-schema`. No schema logic lives here.

pub mod check;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use isl_schema::{FilesystemAuthority, SchemaSystem, SchemaSystemConfig};

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Session {
    /// Directory schema ids are resolved against.
    pub base_dir: PathBuf,
    /// Optional JSON file holding a [`SchemaSystemConfig`].
    pub config: Option<PathBuf>,
}

impl Session {
    /// Build a schema system backed by the session's base directory.
    pub fn schema_system(&self) -> Result<SchemaSystem> {
        let authority = FilesystemAuthority::new(&self.base_dir).with_context(|| {
            format!("schema directory {} is not usable", self.base_dir.display())
        })?;
        let config = match &self.config {
            Some(path) => load_config(path)?,
            None => SchemaSystemConfig::default(),
        };
        tracing::debug!(base = %authority.base().display(), ?config, "schema system ready");
        Ok(SchemaSystem::builder()
            .with_authority(authority)
            .with_config(config)
            .build())
    }
}

/// Read a [`SchemaSystemConfig`] from a JSON file. Missing fields take
/// their defaults.
pub fn load_config(path: &Path) -> Result<SchemaSystemConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_schema::IslVersion;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isl.json");
        fs::write(&path, r#"{ "default_version": "2.0" }"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.default_version, IslVersion::V2_0);
        assert!(config.allow_open_content);
        assert!(!config.allow_transitive_imports);
    }

    #[test]
    fn test_malformed_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isl.json");
        fs::write(&path, "{ default_version: ").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
    }

    #[test]
    fn test_missing_base_dir_is_an_error() {
        let session = Session {
            base_dir: PathBuf::from("/nonexistent/isl-schemas"),
            config: None,
        };
        assert!(session.schema_system().is_err());
    }
}
