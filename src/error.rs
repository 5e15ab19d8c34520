//! Error types for view derivation and projection

use thiserror::Error;

use crate::engine::EngineError;
use crate::validation::ValidationError;

/// Main error type for schema and view operations
#[derive(Error, Debug)]
pub enum ViewError {
    /// A view spec sets both `include` and `exclude`
    #[error("view '{view}' on '{schema}': include and exclude cannot be used together")]
    IncludeExcludeConflict {
        /// Schema the view is declared on
        schema: String,
        /// View name
        view: String,
    },

    /// A field appears in more than one of `optional`, `optional_not_none` and `fields`
    #[error(
        "view '{view}' on '{schema}': field(s) {} should only be present in one of optional, optional_not_none or fields",
        fields.join(", ")
    )]
    OverlappingFields {
        /// Schema the view is declared on
        schema: String,
        /// View name
        view: String,
        /// Offending field names
        fields: Vec<String>,
    },

    /// A view spec references a field the base does not have
    #[error("view '{view}' on '{schema}': schema has no field '{field}'")]
    UnknownField {
        /// Schema the view is declared on
        schema: String,
        /// View name
        view: String,
        /// Missing field
        field: String,
    },

    /// View names must be non-empty
    #[error("invalid view name '{0}'")]
    InvalidViewName(String),

    /// Schema lookup failed
    #[error("schema '{0}' is not declared")]
    SchemaNotFound(String),

    /// View lookup failed
    #[error("schema '{schema}' has no view '{view}'")]
    ViewNotFound {
        /// Schema searched
        schema: String,
        /// View name
        view: String,
    },

    /// A schema with this name already exists
    #[error("schema '{0}' is already declared")]
    DuplicateSchema(String),

    /// Schema cannot be finalized yet
    #[error("schema '{schema}' is not finalized: unresolved reference to '{reference}'")]
    Unresolved {
        /// Schema that failed to finalize
        schema: String,
        /// Reference that could not be resolved
        reference: String,
    },

    /// Schema engine rejected a definition
    #[error("schema engine error: {0}")]
    Engine(String),

    /// Instance validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// API misuse, distinct from validation failures
    #[error("usage error: {0}")]
    Usage(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for view operations
pub type Result<T> = std::result::Result<T, ViewError>;

impl ViewError {
    /// Create an include/exclude conflict error
    #[must_use]
    pub fn include_exclude(schema: impl Into<String>, view: impl Into<String>) -> Self {
        Self::IncludeExcludeConflict {
            schema: schema.into(),
            view: view.into(),
        }
    }

    /// Create an overlapping fields error
    #[must_use]
    pub fn overlapping(
        schema: impl Into<String>,
        view: impl Into<String>,
        fields: Vec<String>,
    ) -> Self {
        Self::OverlappingFields {
            schema: schema.into(),
            view: view.into(),
            fields,
        }
    }

    /// Create an unknown field error
    #[must_use]
    pub fn unknown_field(
        schema: impl Into<String>,
        view: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::UnknownField {
            schema: schema.into(),
            view: view.into(),
            field: field.into(),
        }
    }

    /// Create a view-not-found error
    #[must_use]
    pub fn view_not_found(schema: impl Into<String>, view: impl Into<String>) -> Self {
        Self::ViewNotFound {
            schema: schema.into(),
            view: view.into(),
        }
    }

    /// Create a usage error
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is one of the fail-fast declaration errors
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::IncludeExcludeConflict { .. }
                | Self::OverlappingFields { .. }
                | Self::UnknownField { .. }
                | Self::InvalidViewName(_)
        )
    }
}

impl From<EngineError> for ViewError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unresolved { schema, reference } => Self::Unresolved { schema, reference },
            other @ EngineError::Invalid { .. } => Self::Engine(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for ViewError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
