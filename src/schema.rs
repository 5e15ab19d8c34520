//! Materialized schemas
//!
//! A [`Schema`] is what the engine produces from a [`SchemaDefinition`]: a closed
//! field manifest with inheritance already applied, the validator lists and the
//! effective configuration. Derived views are schemas too, carrying a view tag.
//!
//! [`SchemaDefinition`]: crate::types::SchemaDefinition

use indexmap::IndexMap;
use std::sync::Arc;

use crate::settings::SchemaConfig;
use crate::types::FieldSpec;
use crate::validator::ValidatorBinding;

/// View metadata of a derived schema
#[derive(Debug, Clone)]
pub struct ViewInfo {
    /// View name
    pub name: String,
    /// Schema the view spec was applied to
    pub root: Arc<Schema>,
}

/// A finalized schema or derived view
#[derive(Debug)]
pub struct Schema {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) parent: Option<Arc<Schema>>,
    pub(crate) fields: IndexMap<String, FieldSpec>,
    pub(crate) declared_validators: Vec<ValidatorBinding>,
    pub(crate) validators: Vec<ValidatorBinding>,
    pub(crate) config: SchemaConfig,
    pub(crate) view: Option<ViewInfo>,
}

impl Schema {
    /// Schema name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Structural parent
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    /// Field manifest in order
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, FieldSpec> {
        &self.fields
    }

    /// A single field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Whether the manifest contains `name`
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Every binding declared on this schema and its ancestors, ancestors first.
    /// Includes bindings scoped to views.
    #[must_use]
    pub fn declared_validators(&self) -> &[ValidatorBinding] {
        &self.declared_validators
    }

    /// Bindings that run when this schema is constructed
    #[must_use]
    pub fn validators(&self) -> &[ValidatorBinding] {
        &self.validators
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// View name, for derived views
    #[must_use]
    pub fn view_name(&self) -> Option<&str> {
        self.view.as_ref().map(|info| info.name.as_str())
    }

    /// Schema the view spec was applied to, for derived views
    #[must_use]
    pub fn view_root(&self) -> Option<&Arc<Schema>> {
        self.view.as_ref().map(|info| &info.root)
    }

    /// Whether this schema is a derived view
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.view.is_some()
    }

    /// Names of this schema and its ancestors, nearest first
    #[must_use]
    pub fn lineage(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        let mut current = self.parent.as_ref();
        while let Some(parent) = current {
            names.push(parent.name.as_str());
            current = parent.parent.as_ref();
        }
        names
    }

    /// Whether `other` is this schema or one of its ancestors
    #[must_use]
    pub fn is_subtype_of(&self, other: &str) -> bool {
        self.lineage().contains(&other)
    }
}
