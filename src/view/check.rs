//! View spec validation
//!
//! Checks run in a fixed order so the same error surfaces first whenever a spec
//! breaks several rules: include/exclude exclusivity, disjointness of the
//! per-field sets, field existence, then the view name.

use indexmap::IndexSet;
use tracing::warn;

use super::spec::ViewSpec;
use crate::error::{Result, ViewError};
use crate::schema::Schema;

/// Validate `spec` against the resolved base schema
///
/// # Errors
///
/// Returns a configuration error describing the first rule broken
pub fn check_spec(spec: &ViewSpec, base: &Schema) -> Result<()> {
    if !spec.include.is_empty() && !spec.exclude.is_empty() {
        return Err(ViewError::include_exclude(base.name(), &spec.name));
    }

    let overridden: IndexSet<&str> = spec.fields.keys().map(String::as_str).collect();
    let optional: IndexSet<&str> = spec.optional.iter().map(String::as_str).collect();
    let not_none: IndexSet<&str> = spec.optional_not_none.iter().map(String::as_str).collect();

    let mut overlap: IndexSet<&str> = IndexSet::new();
    overlap.extend(optional.intersection(&not_none));
    overlap.extend(optional.intersection(&overridden));
    overlap.extend(not_none.intersection(&overridden));
    if !overlap.is_empty() {
        return Err(ViewError::overlapping(
            base.name(),
            &spec.name,
            overlap.into_iter().map(str::to_string).collect(),
        ));
    }

    let referenced = spec
        .optional
        .iter()
        .chain(&spec.optional_not_none)
        .chain(spec.fields.keys());
    for field in referenced {
        if !base.has_field(field) {
            return Err(ViewError::unknown_field(base.name(), &spec.name, field));
        }
    }

    if spec.name.trim().is_empty() {
        return Err(ViewError::InvalidViewName(spec.name.clone()));
    }

    Ok(())
}

/// Check include names against the base; unknown names are dropped with a
/// warning unless `strict` is set
///
/// # Errors
///
/// Returns [`ViewError::UnknownField`] for the first unknown name when `strict`
pub fn check_include(spec: &ViewSpec, base: &Schema, strict: bool) -> Result<()> {
    for field in spec.include.iter().filter(|f| !base.has_field(f)) {
        if strict {
            return Err(ViewError::unknown_field(base.name(), &spec.name, field));
        }
        warn!(
            schema = base.name(),
            view = spec.name.as_str(),
            field = field.as_str(),
            "ignoring unknown field in view include list"
        );
    }
    Ok(())
}
