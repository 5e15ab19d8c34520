//! Registry-wide configuration

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewError};
use crate::settings::ExtraPolicy;

/// Deserialize a `YAML` document, reading enum variants that carry data as
/// single-key maps (`list: {model: Sub}`) rather than `!tags`
pub(crate) fn yaml_from_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(serde_yaml::with::singleton_map_recursive::deserialize(
        serde_yaml::Deserializer::from_str(content),
    )?)
}

/// Configuration for a [`SchemaRegistry`](crate::registry::SchemaRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Recursive substitution for view specs that leave `recursive` unset
    pub recursive_by_default: bool,

    /// Reject `include` names that are not fields of the resolved base
    pub strict_include: bool,

    /// Extra-fields policy when no schema in the chain sets one
    pub default_extra: ExtraPolicy,

    /// Maximum nesting depth when constructing nested records
    pub max_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            recursive_by_default: true,
            strict_include: false,
            default_extra: ExtraPolicy::Ignore,
            max_depth: 32,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a `YAML` document
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = yaml_from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a `JSON` document
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns an error if `max_depth` is zero
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ViewError::config("max_depth must be at least 1"));
        }
        Ok(())
    }
}
