//! View derivation
//!
//! A view is a schema derived from a base schema by a declarative [`ViewSpec`]:
//! fields are selected, made optional or overridden, nested model references are
//! redirected to sibling views, and validators scoped to the view are rebound.
//!
//! - [`check`] validates a spec against the resolved base
//! - [`rewrite`] redirects nested model references
//! - [`builder`] assembles the derived definition and materializes it

pub mod builder;
pub mod check;
pub mod rewrite;
pub mod spec;

pub use builder::{ViewBuilder, view_schema_name};
pub use check::{check_include, check_spec};
pub use rewrite::{ViewLookup, rewrite};
pub use spec::ViewSpec;
