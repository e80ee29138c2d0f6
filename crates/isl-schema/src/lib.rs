//! # isl-schema — Ion Schema Engine
//!
//! Builds types from Ion Schema Language documents and validates values
//! against them. A [`SchemaSystem`] loads schemas by id through an ordered
//! chain of [`Authority`]s, resolves every type reference (forward, self,
//! cross-document and cyclic), and caches the result.
//!
//! ```text
//! SchemaSystem ──► Schema ──► Type ──► Violations
//!      │              │
//!      │              └── imports resolved through a DeferredReferenceManager
//!      └── authorities, SchemaCache, SchemaContentCache, TypeArena
//! ```
//!
//! ## Key Design Principles
//!
//! 1. **Arena, not pointers.** Types live in a [`TypeArena`](types::TypeArena)
//!    and refer to each other by index. A deferred reference is a reserved
//!    slot that resolution points at its target, so cyclic type graphs need
//!    neither `Rc` cycles nor interior mutability in the types themselves.
//!
//! 2. **Two-phase loading.** A document is read completely, deferring every
//!    reference it cannot resolve yet; only then are deferred references
//!    resolved. Schemas loaded along the way are staged and published to
//!    the cache only if the whole batch succeeds.
//!
//! 3. **Validation never errors.** Construction problems are
//!    [`SchemaError`]s. Validation outcomes are [`Violations`] trees, with an
//!    explicit short-circuit signal instead of unwinding.
//!
//! 4. **Immutable schemas.** [`Schema::plus_type`] returns a new schema that
//!    shares every unaffected type with the original.
//!
//! ## Crate Policy
//!
//! - Depends only on `isl-core` internally.
//! - No `unsafe` code.
//! - Panics are reserved for misuse of the deferred reference manager and
//!   reads of unresolved type slots.

pub mod authority;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod nfa;
pub mod schema;
pub mod system;
pub mod types;
pub mod violations;

mod builtin;
mod constraints;
mod deferred;
mod range;
mod reference;

// Re-export primary types for ergonomic imports.
pub use authority::{Authority, FilesystemAuthority, InMemoryAuthority};
pub use cache::{InMemorySchemaCache, SchemaCache};
pub use config::{IslVersion, SchemaSystemConfig};
pub use content::{SchemaContent, SchemaContentCache};
pub use error::{AuthorityError, SchemaError};
pub use schema::{Import, Schema};
pub use system::{SchemaSystem, SchemaSystemBuilder};
pub use types::Type;
pub use violations::{Checkpoint, Violation, ViolationChild, Violations};
