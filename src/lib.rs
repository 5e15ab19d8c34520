//! # Schema Views
//!
//! Derived views of record schemas: filtered, overridden and re-validated
//! projections of a base schema, declared with [`ViewSpec`]s.
//!
//! A view keeps a subset of the base fields, can make fields optional, can
//! replace field types and metadata, redirects nested model references to
//! sibling views of the same name, and picks up validators scoped to it. Views
//! are reachable from the schema (`registry.view("Model", "Out")`) and from any
//! record (`record.view("Out")?.project()`).
//!
//! ## Design Principles
//!
//! - **Schemas are data**: definitions are plain values handed to a
//!   [`SchemaEngine`]; nothing is generated at run time
//! - **Explicit deferral**: unresolved references are a typed signal, resolved
//!   by an explicit [`SchemaRegistry::rebuild`]
//! - **Identity is stable**: class-level view lookups return the same `Arc`,
//!   instance-level factories are cached per record

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)] // Documentation is covered by module-level docs

/// Registry-wide configuration
pub mod config;

/// Schema engine seam and the interpreting engine
pub mod engine;

/// Error types for view operations
pub mod error;

/// Validated records and instance-level projection
pub mod record;

/// Schema and view registry
pub mod registry;

/// Materialized schemas
pub mod schema;

/// Per-schema settings
pub mod settings;

/// Type expressions, fields and schema definitions
pub mod types;

/// Validation issues
pub mod validation;

/// Validator bindings and view scoping
pub mod validator;

/// Runtime field values
pub mod value;

/// View specs, checks, rewriting and assembly
pub mod view;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use engine::{EngineError, InterpretingEngine, SchemaEngine, SchemaLookup};
pub use error::{Result, ViewError};
pub use record::{DumpOptions, Record, ViewFactory};
pub use registry::{Declared, SchemaRegistry, ViewBuild};
pub use schema::Schema;
pub use settings::{ExtraPolicy, SchemaConfig};
pub use types::{FieldDefault, FieldMeta, FieldOverride, FieldSpec, SchemaDefinition, TypeExpr};
pub use validation::{IssueKind, ValidationError, ValidationIssue};
pub use validator::{JsonMap, ValidatorBinding, resolve_scoped};
pub use value::Value;
pub use view::ViewSpec;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::error::{Result, ViewError};
    pub use crate::record::{DumpOptions, Record, ViewFactory};
    pub use crate::registry::{Declared, SchemaRegistry, ViewBuild};
    pub use crate::settings::{ExtraPolicy, SchemaConfig};
    pub use crate::types::{FieldMeta, FieldOverride, FieldSpec, SchemaDefinition, TypeExpr};
    pub use crate::validation::{IssueKind, ValidationError};
    pub use crate::validator::{JsonMap, ValidatorBinding};
    pub use crate::value::Value;
    pub use crate::view::ViewSpec;
}
