//! Declarative view specifications

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::config::yaml_from_str;
use crate::error::Result;
use crate::settings::{ExtraPolicy, SchemaConfig};
use crate::types::FieldOverride;

/// How to derive a view from a base schema
///
/// Recorded on the base schema once applied and never mutated afterwards, so it
/// can be replayed against subtypes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSpec {
    /// View name, also the suffix of the derived schema name
    pub name: String,

    /// Ancestor view names searched, in order, for the structural parent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub base: Vec<String>,

    /// Fields to keep; empty keeps all
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub include: IndexSet<String>,

    /// Fields to drop
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub exclude: IndexSet<String>,

    /// Fields made nullable with a null default
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub optional: IndexSet<String>,

    /// Fields that may be omitted but still reject an explicit null
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub optional_not_none: IndexSet<String>,

    /// Per-field type and metadata replacements
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldOverride>,

    /// Redirect nested model references to sibling views; unset uses the
    /// registry default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    /// Extra-fields policy of the derived schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraPolicy>,

    /// Additional configuration of the derived schema
    pub config: SchemaConfig,
}

impl ViewSpec {
    /// Parse a spec from `YAML`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document does not parse
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        yaml_from_str(content)
    }

    /// Spec keeping every field
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Ancestor views to derive from
    #[must_use]
    pub fn with_base<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.extend(views.into_iter().map(Into::into));
        self
    }

    /// Fields to keep
    #[must_use]
    pub fn with_include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Fields to drop
    #[must_use]
    pub fn with_exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Fields to make optional
    #[must_use]
    pub fn with_optional<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Fields that may be omitted but not nulled
    #[must_use]
    pub fn with_optional_not_none<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_not_none
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Override one field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: FieldOverride) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Set the recursive flag
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Set the extra-fields policy
    #[must_use]
    pub fn with_extra(mut self, extra: ExtraPolicy) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Set additional configuration
    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Effective recursive flag
    #[must_use]
    pub fn is_recursive(&self, default: bool) -> bool {
        self.recursive.unwrap_or(default)
    }

    /// Configuration of the derived schema, with the extra policy folded in
    #[must_use]
    pub fn effective_config(&self) -> SchemaConfig {
        let mut config = self.config.clone();
        if self.extra.is_some() {
            config.extra = self.extra;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldMeta, TypeExpr};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_yaml_spec() {
        let yaml = r"
name: Update
exclude: [id]
optional: [name]
fields:
  count:
    type: float
recursive: false
extra: forbid
";
        let spec = ViewSpec::from_yaml_str(yaml).expect("spec should parse");
        assert_eq!(spec.name, "Update");
        assert!(spec.exclude.contains("id"));
        assert!(spec.optional.contains("name"));
        assert_eq!(spec.fields["count"], FieldOverride::ty(TypeExpr::Float));
        assert!(!spec.is_recursive(true));
        assert_eq!(spec.effective_config().extra, Some(ExtraPolicy::Forbid));
    }

    #[test]
    fn test_parse_yaml_override_with_model_type() {
        let yaml = r"
name: Out
fields:
  owner:
    type:
      optional:
        model: User
    meta:
      default:
        value: []
";
        let spec = ViewSpec::from_yaml_str(yaml).expect("spec should parse");
        assert_eq!(
            spec.fields["owner"],
            FieldOverride::full(
                TypeExpr::optional(TypeExpr::model("User")),
                FieldMeta::with_default(serde_json::json!([])),
            )
        );
    }

    #[test]
    fn test_recursive_falls_back_to_default() {
        let spec = ViewSpec::new("Out");
        assert!(spec.is_recursive(true));
        assert!(!spec.is_recursive(false));
    }

    #[test]
    fn test_extra_overrides_config() {
        let spec = ViewSpec::new("Out")
            .with_config(SchemaConfig::default().with_extra(ExtraPolicy::Allow).with_frozen(true))
            .with_extra(ExtraPolicy::Forbid);
        let config = spec.effective_config();
        assert_eq!(config.extra, Some(ExtraPolicy::Forbid));
        assert_eq!(config.frozen, Some(true));
    }
}
