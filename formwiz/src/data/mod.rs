//! Field schema, captured values and compiled field trees.
//!
//! This module provides the data structures the engine works on:
//!
//! - [`field`] - Field definitions as read from the schema source
//! - [`capture`] - Values reported by a rendering target and the composite
//!   key wire format used for addon sub-fields
//! - [`tree`] - The compiled, ordered field tree of one step
//! - [`schema`] - Schema source parsing and integrity errors

/// Field definitions as read from the schema source.
pub mod field;

/// Captured values and the composite capture key format.
pub mod capture;

/// Compiled per-step field trees.
pub mod tree;

/// Schema source parsing and integrity errors.
pub mod schema;

pub use capture::{CaptureKey, CapturedValues};
pub use field::{AddOnGroup, FieldId, FieldSchema, FieldType, FieldValue, GroupField};
pub use schema::SchemaError;
pub use tree::{FieldKind, FieldNode, FieldTree, GroupTree};
