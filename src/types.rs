//! Core type definitions for schemas, fields and type expressions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::settings::SchemaConfig;
use crate::validator::ValidatorBinding;
use crate::view::ViewSpec;

/// Declared type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    /// Any value, unchecked
    Any,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 string
    Str,
    /// Reference to a schema by name
    Model(String),
    /// Homogeneous list
    List(Box<TypeExpr>),
    /// List with duplicates removed, first occurrence kept
    Set(Box<TypeExpr>),
    /// String-keyed map with homogeneous values
    Map(Box<TypeExpr>),
    /// Fixed-arity heterogeneous sequence
    Tuple(Vec<TypeExpr>),
    /// Nullable wrapper
    Optional(Box<TypeExpr>),
    /// First matching member wins
    Union(Vec<TypeExpr>),
}

impl TypeExpr {
    /// Reference a schema by name
    pub fn model(name: impl Into<String>) -> Self {
        Self::Model(name.into())
    }

    /// List of `inner`
    #[must_use]
    pub fn list(inner: TypeExpr) -> Self {
        Self::List(Box::new(inner))
    }

    /// Set of `inner`
    #[must_use]
    pub fn set(inner: TypeExpr) -> Self {
        Self::Set(Box::new(inner))
    }

    /// String-keyed map of `inner`
    #[must_use]
    pub fn map(inner: TypeExpr) -> Self {
        Self::Map(Box::new(inner))
    }

    /// Nullable `inner`
    #[must_use]
    pub fn optional(inner: TypeExpr) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Whether an explicit null is accepted
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Any | Self::Optional(_) => true,
            Self::Union(members) => members.iter().any(TypeExpr::is_nullable),
            _ => false,
        }
    }

    /// This type, made nullable if it is not already
    #[must_use]
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            self
        } else {
            Self::optional(self)
        }
    }

    /// Names of all schemas referenced anywhere in the expression, in order
    #[must_use]
    pub fn referenced_models(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_models(&mut out);
        out
    }

    fn collect_models<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Model(name) => out.push(name.as_str()),
            Self::List(inner) | Self::Set(inner) | Self::Map(inner) | Self::Optional(inner) => {
                inner.collect_models(out);
            }
            Self::Tuple(members) | Self::Union(members) => {
                for member in members {
                    member.collect_models(out);
                }
            }
            Self::Any | Self::Bool | Self::Int | Self::Float | Self::Str => {}
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, members: &[TypeExpr]) -> fmt::Result {
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{member}")?;
            }
            Ok(())
        }

        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Model(name) => f.write_str(name),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Set(inner) => write!(f, "set[{inner}]"),
            Self::Map(inner) => write!(f, "map[str, {inner}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Tuple(members) => {
                f.write_str("tuple[")?;
                join(f, members)?;
                f.write_str("]")
            }
            Self::Union(members) => {
                f.write_str("union[")?;
                join(f, members)?;
                f.write_str("]")
            }
        }
    }
}

/// Default behaviour for a field absent from input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefault {
    /// Input must supply the field
    #[default]
    Required,
    /// Use this value; it is not type-checked
    Value(JsonValue),
    /// Field may be omitted and reads back as null, but an explicit null is still
    /// checked against the declared type
    Unset,
}

impl FieldDefault {
    /// Whether input must supply the field
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within a schema
    #[serde(default)]
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeExpr,

    /// Behaviour when absent
    #[serde(default)]
    pub default: FieldDefault,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schema that declared the field
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
}

impl FieldSpec {
    /// Required field of the given type
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            default: FieldDefault::Required,
            description: None,
            owner: String::new(),
        }
    }

    /// Set the default
    #[must_use]
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = FieldDefault::Value(default);
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether an explicit null is accepted
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.ty.is_nullable()
    }
}

/// Field metadata that a view may replace wholesale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Behaviour when absent
    #[serde(default)]
    pub default: FieldDefault,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldMeta {
    /// Metadata with a plain default value
    #[must_use]
    pub fn with_default(default: JsonValue) -> Self {
        Self {
            default: FieldDefault::Value(default),
            description: None,
        }
    }

    /// Metadata for a required field
    #[must_use]
    pub fn required() -> Self {
        Self::default()
    }
}

/// Per-field replacement in a view; absent parts are kept from the base field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOverride {
    /// Replacement type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeExpr>,

    /// Replacement metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FieldMeta>,
}

impl FieldOverride {
    /// Replace only the type
    #[must_use]
    pub fn ty(ty: TypeExpr) -> Self {
        Self {
            ty: Some(ty),
            meta: None,
        }
    }

    /// Replace only the metadata
    #[must_use]
    pub fn meta(meta: FieldMeta) -> Self {
        Self {
            ty: None,
            meta: Some(meta),
        }
    }

    /// Replace both
    #[must_use]
    pub fn full(ty: TypeExpr, meta: FieldMeta) -> Self {
        Self {
            ty: Some(ty),
            meta: Some(meta),
        }
    }

    /// Apply to a base field
    #[must_use]
    pub fn apply(&self, base: &FieldSpec) -> FieldSpec {
        let mut field = base.clone();
        if let Some(ty) = &self.ty {
            field.ty = ty.clone();
        }
        if let Some(meta) = &self.meta {
            field.default = meta.default.clone();
            field.description = meta.description.clone();
        }
        field
    }
}

/// Marks a synthesized definition as a derived view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTag {
    /// View name the definition was built for
    pub view_name: String,
    /// Schema the view spec was applied to
    pub root: String,
}

/// Declaration of a schema, consumed by the schema engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Structural parent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_a: Option<String>,

    /// Own fields, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldSpec>,

    /// Own validator bindings, in declaration order
    #[serde(skip)]
    pub validators: Vec<ValidatorBinding>,

    /// Schema configuration
    #[serde(default)]
    pub config: SchemaConfig,

    /// Present on synthesized view definitions: the field set is closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewTag>,

    /// Views applied right after declaration, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewSpec>,

    /// Rebuild views recorded on ancestors against this schema at declaration
    #[serde(default)]
    pub reapply_base_views: bool,
}

impl SchemaDefinition {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a definition from `YAML`
    ///
    /// Types and defaults carrying data are written as single-key maps, e.g.
    /// `type: {list: {model: Group}}` and `default: {value: []}`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Config`](crate::error::ViewError::Config) if the document does not parse
    pub fn from_yaml_str(content: &str) -> crate::error::Result<Self> {
        crate::config::yaml_from_str(content)
    }

    /// Set the structural parent
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.is_a = Some(parent.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required field
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: TypeExpr) -> Self {
        let name = name.into();
        self.with_field(FieldSpec::new(name, ty))
    }

    /// Add a field with a default value
    #[must_use]
    pub fn field_with_default(
        self,
        name: impl Into<String>,
        ty: TypeExpr,
        default: JsonValue,
    ) -> Self {
        self.with_field(FieldSpec::new(name, ty).with_default(default))
    }

    /// Add a fully specified field
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Add a validator binding; declaration order is kept
    #[must_use]
    pub fn validator(mut self, mut binding: ValidatorBinding) -> Self {
        binding.order = self.validators.len();
        self.validators.push(binding);
        self
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply a view right after declaration
    #[must_use]
    pub fn view(mut self, spec: ViewSpec) -> Self {
        self.views.push(spec);
        self
    }

    /// Rebuild ancestor views against this schema at declaration
    #[must_use]
    pub fn reapplying_base_views(mut self) -> Self {
        self.reapply_base_views = true;
        self
    }

    /// Fill field names from map keys and renumber validators
    pub(crate) fn normalize(&mut self) {
        for (key, field) in &mut self.fields {
            if field.name.is_empty() {
                field.name.clone_from(key);
            }
        }
        for (order, binding) in self.validators.iter_mut().enumerate() {
            binding.order = order;
        }
    }
}
