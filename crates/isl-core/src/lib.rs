//! # isl-core — Value Model for the ISL Engine
//!
//! This crate is the leaf of the workspace. It defines the self-describing
//! values that schemas describe and validate: every value has a kind, an
//! ordered list of annotations, and (for containers) ordered children or
//! named fields.
//!
//! ## Key Design Principles
//!
//! 1. **Data-model equality.** `Value: PartialEq` follows Ion equivalence:
//!    annotations participate, decimals keep their exponent (`1.0 != 1.00`),
//!    structs compare as unordered multisets of fields.
//!
//! 2. **Typed nulls are values.** `null.int` is `Data::Null(IonType::Int)`,
//!    not an `Option`. Constraints decide what a typed null means.
//!
//! 3. **One rendering.** `Display` produces Ion text that the reader parses
//!    back to an equal value. Violation messages and JSON output reuse it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `isl-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod decimal;
pub mod error;
pub mod reader;
pub mod timestamp;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use decimal::Decimal;
pub use error::ParseError;
pub use reader::{parse_all, parse_one};
pub use timestamp::{Timestamp, TimestampPrecision};
pub use value::{Data, IonType, Value};
