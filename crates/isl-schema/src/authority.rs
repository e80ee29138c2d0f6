//! # Authorities
//!
//! An authority maps a schema id to the top-level values of a document. A
//! [`SchemaSystem`](crate::SchemaSystem) asks its authorities in order and
//! takes the first non-empty answer; an authority that fails is skipped and
//! its error kept for the aggregate message.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use isl_core::{parse_all, Value};

use crate::error::{AuthorityError, SchemaError};

/// A source of schema documents.
pub trait Authority: Send + Sync {
    /// The top-level values of schema `id`. An empty vector means this
    /// authority does not know the id.
    fn content(&self, id: &str) -> Result<Vec<Value>, AuthorityError>;
}

/// Reads `<base>/<id>` from disk.
#[derive(Debug, Clone)]
pub struct FilesystemAuthority {
    base: PathBuf,
}

impl FilesystemAuthority {
    /// # Errors
    ///
    /// Fails if `base` is not an existing directory.
    pub fn new(base: impl AsRef<Path>) -> io::Result<Self> {
        let base = fs::canonicalize(base.as_ref())?;
        if !base.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", base.display()),
            ));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl Authority for FilesystemAuthority {
    fn content(&self, id: &str) -> Result<Vec<Value>, AuthorityError> {
        let path = self.base.join(id);
        let path = match fs::canonicalize(&path) {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AuthorityError::Io { id: id.to_string(), source }),
        };
        if !path.starts_with(&self.base) {
            return Err(AuthorityError::PathEscape { id: id.to_string() });
        }
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|source| AuthorityError::Io {
            id: id.to_string(),
            source,
        })?;
        parse_all(&text).map_err(|source| AuthorityError::Parse {
            id: id.to_string(),
            source,
        })
    }
}

/// Schema documents held as text, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthority {
    schemas: HashMap<String, String>,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.schemas.insert(id.into(), text.into());
    }
}

impl Authority for InMemoryAuthority {
    fn content(&self, id: &str) -> Result<Vec<Value>, AuthorityError> {
        match self.schemas.get(id) {
            Some(text) => parse_all(text).map_err(|source| AuthorityError::Parse {
                id: id.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Ask each authority in turn for `id`.
pub(crate) fn resolve(authorities: &[Box<dyn Authority>], id: &str) -> Result<Vec<Value>, SchemaError> {
    let mut causes = Vec::new();
    for authority in authorities {
        match authority.content(id) {
            Ok(values) if values.is_empty() => {}
            Ok(values) => {
                if !causes.is_empty() {
                    tracing::warn!(id, failures = causes.len(), "schema found after earlier authorities failed");
                }
                return Ok(values);
            }
            Err(e) => {
                tracing::debug!(id, error = %e, "authority failed");
                causes.push(e.to_string());
            }
        }
    }
    Err(SchemaError::Unresolvable {
        id: id.to_string(),
        causes,
    })
}
