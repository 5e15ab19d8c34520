//! Derived view assembly
//!
//! [`ViewBuilder`] turns a base schema and a [`ViewSpec`] into a view
//! [`SchemaDefinition`] ready for the engine to materialize. Fields are
//! processed override first, then nested references are rewritten, then
//! optionality is applied.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use super::check::{check_include, check_spec};
use super::rewrite::{ViewLookup, rewrite};
use super::spec::ViewSpec;
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::{FieldDefault, FieldSpec, SchemaDefinition, ViewTag};
use crate::validator::resolve_scoped;

/// Name of the schema derived from `base` for `view`
#[must_use]
pub fn view_schema_name(base: &str, view: &str) -> String {
    format!("{base}{view}")
}

/// Builds derived views against a registry snapshot
pub struct ViewBuilder<'a, L> {
    lookup: &'a L,
    config: &'a RegistryConfig,
}

impl<'a, L> ViewBuilder<'a, L>
where
    L: ViewLookup,
{
    /// Create a builder
    pub fn new(lookup: &'a L, config: &'a RegistryConfig) -> Self {
        Self {
            lookup,
            config,
        }
    }

    /// Structural parent of the view: the first ancestor view found on `base`,
    /// or `base` itself
    #[must_use]
    pub fn resolve_parent(&self, base: &Arc<Schema>, spec: &ViewSpec) -> Arc<Schema> {
        spec.base
            .iter()
            .find_map(|ancestor| self.lookup.find_view(base.name(), ancestor))
            .unwrap_or_else(|| Arc::clone(base))
    }

    /// Assemble the view definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the view spec does not fit the resolved base
    pub fn definition(&self, base: &Arc<Schema>, spec: &ViewSpec) -> Result<SchemaDefinition> {
        let parent = self.resolve_parent(base, spec);
        check_spec(spec, &parent)?;
        check_include(spec, &parent, self.config.strict_include)?;

        let recursive = spec.is_recursive(self.config.recursive_by_default);
        let mut fields: IndexMap<String, FieldSpec> = IndexMap::new();

        for (name, field) in parent.fields() {
            if !spec.include.is_empty() && !spec.include.contains(name) {
                continue;
            }
            if spec.exclude.contains(name) {
                continue;
            }

            let mut field = spec
                .fields
                .get(name)
                .map_or_else(|| field.clone(), |over| over.apply(field));
            if recursive {
                field.ty = rewrite(&field.ty, &spec.name, &spec.base, self.lookup);
            }
            if spec.optional.contains(name) {
                field.ty = field.ty.nullable();
                field.default = FieldDefault::Value(serde_json::Value::Null);
            } else if spec.optional_not_none.contains(name) {
                field.default = FieldDefault::Unset;
            }
            fields.insert(name.clone(), field);
        }

        let validators = resolve_scoped(base.declared_validators(), &spec.name);

        debug!(
            base = base.name(),
            parent = parent.name(),
            view = spec.name.as_str(),
            fields = fields.len(),
            validators = validators.len(),
            "assembled view definition"
        );

        Ok(SchemaDefinition {
            name: view_schema_name(base.name(), &spec.name),
            description: base.description().map(str::to_string),
            is_a: Some(parent.name().to_string()),
            fields,
            validators,
            config: spec.effective_config(),
            view: Some(ViewTag {
                view_name: spec.name.clone(),
                root: base.name().to_string(),
            }),
            views: Vec::new(),
            reapply_base_views: false,
        })
    }
}
