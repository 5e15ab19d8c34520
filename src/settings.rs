//! Per-schema settings
//!
//! Settings declared on a schema (or carried by a view spec) are layered over
//! the settings inherited from the structural parent: every field left unset
//! falls through to the parent.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Policy for input keys that are not declared fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    /// Keep undeclared keys on the record as untyped values
    Allow,
    /// Drop undeclared keys silently
    #[default]
    Ignore,
    /// Reject undeclared keys
    Forbid,
}

/// Schema-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaConfig {
    /// Handling of undeclared input keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraPolicy>,

    /// Disable lax coercion (numeric strings, integral floats, boolean strings)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Trim surrounding whitespace from string values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub str_strip_whitespace: Option<bool>,

    /// Reject field assignment after construction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,

    /// Settings not interpreted by this crate, kept for downstream consumers
    #[serde(flatten, default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, serde_json::Value>,
}

impl SchemaConfig {
    /// Layer `over` on top of `self`; set fields in `over` win
    #[must_use]
    pub fn merged(&self, over: &SchemaConfig) -> SchemaConfig {
        let mut custom = self.custom.clone();
        for (key, value) in &over.custom {
            custom.insert(key.clone(), value.clone());
        }
        SchemaConfig {
            extra: over.extra.or(self.extra),
            strict: over.strict.or(self.strict),
            str_strip_whitespace: over.str_strip_whitespace.or(self.str_strip_whitespace),
            frozen: over.frozen.or(self.frozen),
            custom,
        }
    }

    /// Set the extra-fields policy
    #[must_use]
    pub fn with_extra(mut self, extra: ExtraPolicy) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Set strict mode
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Set whitespace stripping
    #[must_use]
    pub fn with_str_strip_whitespace(mut self, strip: bool) -> Self {
        self.str_strip_whitespace = Some(strip);
        self
    }

    /// Set frozen
    #[must_use]
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = Some(frozen);
        self
    }

    /// Set a custom entry
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Effective extra policy, given a registry-wide fallback
    #[must_use]
    pub fn extra_policy(&self, fallback: ExtraPolicy) -> ExtraPolicy {
        self.extra.unwrap_or(fallback)
    }

    /// Effective strict flag
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    /// Effective whitespace stripping flag
    #[must_use]
    pub fn strips_whitespace(&self) -> bool {
        self.str_strip_whitespace.unwrap_or(false)
    }

    /// Effective frozen flag
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_prefers_override() {
        let parent = SchemaConfig::default()
            .with_strict(true)
            .with_extra(ExtraPolicy::Allow)
            .with_custom("title", json!("parent"));
        let over = SchemaConfig::default()
            .with_extra(ExtraPolicy::Forbid)
            .with_custom("title", json!("child"));

        let merged = parent.merged(&over);
        assert_eq!(merged.extra, Some(ExtraPolicy::Forbid));
        assert_eq!(merged.strict, Some(true));
        assert_eq!(merged.custom.get("title"), Some(&json!("child")));
    }

    #[test]
    fn test_deserialize_with_custom_keys() {
        let config: SchemaConfig =
            serde_yaml::from_str("extra: forbid\nfrozen: true\nalias_generator: camel\n")
                .expect("config should parse");
        assert_eq!(config.extra_policy(ExtraPolicy::Ignore), ExtraPolicy::Forbid);
        assert!(config.is_frozen());
        assert!(!config.is_strict());
        assert_eq!(config.custom.get("alias_generator"), Some(&json!("camel")));
    }
}
