//! # formwiz
//!
//! A schema-driven engine for multi-step form wizards.
//!
//! formwiz compiles a flat, declarative field schema into one ordered field
//! tree per step, checks the values captured by a rendering target for
//! completeness, reshapes them (including repeating "addon" groups) into a
//! structured record and posts each step to a remote endpoint before
//! advancing to the next one.
//!
//! ## Features
//!
//! - Per-step field trees with recursive expansion of addon groups
//! - Required-field rules per field type with live error clearing
//! - Reconstruction of nested group data from composite capture keys
//! - Timeout-guarded submission over a pluggable transport
//! - Pluggable rendering targets through an event-based handle interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formwiz::{compile::compile_step, data::FieldSchema};
//!
//! let schema: Vec<FieldSchema> = serde_json::from_str(
//!     r#"[{"step": 1, "order": 1, "name": "email", "type": "email", "required": true}]"#,
//! ).unwrap();
//!
//! let tree = compile_step(&schema, 1).unwrap();
//! assert_eq!(tree.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Field schema, captured values and compiled field trees
//! - [`compile`] - Schema to field tree compiler
//! - [`validate`] - Required-field validation
//! - [`aggregate`] - Captured value reshaping
//! - [`submit`] - Timeout-guarded submission and schema fetching
//! - [`render`] - Rendering target interface
//! - [`wizard`] - The step sequencing state machine

#[macro_use]
extern crate log;

/// Field schema, captured values and compiled field trees.
pub mod data;

/// Compiles a step of the field schema into a field tree.
pub mod compile;

/// Required-field validation and live error tracking.
pub mod validate;

/// Reshapes captured values into a structured submission record.
pub mod aggregate;

/// Timeout-guarded submission pipeline and the transport interface.
pub mod submit;

/// Interface to the component that paints field trees and reports input.
pub mod render;

/// Engine configuration.
pub mod config;

/// Error types shared across the engine.
pub mod error;

/// Step sequencing state machine.
pub mod wizard;

#[cfg(test)]
mod testing;

pub use config::WizardConfig;
pub use error::WizardError;
pub use wizard::{Wizard, WizardContext, WizardEvent, WizardOutcome, WizardPhase};
