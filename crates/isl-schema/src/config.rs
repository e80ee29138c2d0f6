//! # Configuration
//!
//! Settings for one [`SchemaSystem`](crate::SchemaSystem). Every field has a
//! default, so a host can deserialize a partial JSON object.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the schema language a document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IslVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
}

impl IslVersion {
    /// The top-level symbol that declares this version.
    pub fn marker(self) -> &'static str {
        match self {
            IslVersion::V1_0 => "$ion_schema_1_0",
            IslVersion::V2_0 => "$ion_schema_2_0",
        }
    }

    pub fn from_marker(text: &str) -> Option<Self> {
        match text {
            "$ion_schema_1_0" => Some(IslVersion::V1_0),
            "$ion_schema_2_0" => Some(IslVersion::V2_0),
            _ => None,
        }
    }

    /// Whether `text` has the shape of a version marker, supported or not.
    pub fn looks_like_marker(text: &str) -> bool {
        text.strip_prefix("$ion_schema_").is_some_and(|rest| {
            let mut parts = rest.split('_');
            let major = parts.next().unwrap_or_default();
            let minor = parts.next().unwrap_or_default();
            parts.next().is_none()
                && !major.is_empty()
                && !minor.is_empty()
                && major.bytes().chain(minor.bytes()).all(|b| b.is_ascii_digit())
        })
    }
}

impl fmt::Display for IslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IslVersion::V1_0 => "1.0",
            IslVersion::V2_0 => "2.0",
        })
    }
}

/// Behaviour switches for schema loading and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSystemConfig {
    /// Version assumed for documents without a version marker.
    pub default_version: IslVersion,
    /// Skip a type's remaining constraints once its `annotations` fail.
    pub fail_fast_on_invalid_annotations: bool,
    /// Legacy import visibility: whole-schema imports also expose the
    /// imported schema's imports.
    pub allow_transitive_imports: bool,
    /// Ignore unknown fields in type definitions.
    pub allow_open_content: bool,
}

impl Default for SchemaSystemConfig {
    fn default() -> Self {
        Self {
            default_version: IslVersion::V1_0,
            fail_fast_on_invalid_annotations: false,
            allow_transitive_imports: false,
            allow_open_content: true,
        }
    }
}
