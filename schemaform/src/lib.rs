//! # schemaform
//!
//! A schema-driven dynamic form engine.
//!
//! Given a JSON Schema, a parallel UI schema, the current form data and a
//! validation error tree, `schemaform` computes everything a form renderer
//! needs: effective schemas, default values, stable field ids, per-field
//! labels and error decorations, and the state transitions of array fields.
//! The engine performs no I/O during rendering and never mutates its inputs.
//!
//! ## Features
//!
//! - `$ref`/`$defs` expansion with cycle detection, `allOf` merging and
//!   pre-fetched `$remote` fragments
//! - Conditional fields driven by a left-folded `condition` chain
//! - Default state generation that keeps existing data and stops at
//!   recursive schemas
//! - Ordinary, fixed-tuple, multi-select and file-list arrays with checked
//!   append/remove/reorder/sort actions
//! - Pluggable widgets and custom fields through a [`Registry`]
//! - JSON and TOML input files, and forms generated from Rust types via
//!   [`schemars`]
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaform::{DataPath, FormDocument, Registry, SchemaNode, array::ArrayAction};
//! use serde_json::json;
//!
//! let schema = SchemaNode::from_value(&json!({
//!     "type": "object",
//!     "properties": {
//!         "tags": {"type": "array", "items": {"type": "string", "default": "new"}}
//!     }
//! })).unwrap();
//! let mut doc = FormDocument::new(schema);
//! doc.fill_defaults().unwrap();
//!
//! let (data, _validate) = doc
//!     .apply_array_action(&DataPath::parse("tags"), ArrayAction::Append)
//!     .unwrap();
//! assert_eq!(data, json!({"tags": ["new"]}));
//!
//! let view = doc.render(&Registry::new()).unwrap().unwrap();
//! assert_eq!(view.id, "root");
//! ```

#[macro_use]
extern crate log;

/// Array field variants, capabilities and mutation actions.
pub mod array;

/// Engine configuration loaded from `.schemaform.toml`.
pub mod config;

/// Default form state generation.
pub mod defaults;

/// Field dispatcher, widget registry and the rendered field tree.
pub mod dispatcher;

/// Loading, rendering and mutating a whole form.
pub mod document;

/// Engine error type.
pub mod error;

/// Validation error trees.
pub mod error_tree;

/// Identifier trees.
pub mod ids;

/// Paths into form data.
pub mod path;

/// Effective schema resolution: references, fragments and conditions.
pub mod resolver;

/// Schema model.
///
/// Typed view of the JSON Schema subset the engine interprets; unknown keys
/// are preserved.
pub mod schema;

/// UI schema model.
pub mod ui;

pub use dispatcher::{FieldBody, FieldView, FormContext, Registry, render_field};
pub use document::{FormDocument, schema_for};
pub use error::{FormError, Result};
pub use error_tree::ErrorNode;
pub use path::DataPath;
pub use schema::SchemaNode;
pub use serde_json::Value;
pub use ui::UiSchema;
