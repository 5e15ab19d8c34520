//! Schema engine seam and the interpreting reference engine
//!
//! The view machinery never type-checks values itself. It hands pure-data
//! [`SchemaDefinition`]s to a [`SchemaEngine`] to materialize, and asks the same
//! engine to construct records from raw input. [`InterpretingEngine`] is the
//! engine used by default: it interprets the field manifest and validator lists
//! of a [`Schema`] directly.

mod coerce;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::record::Record;
use crate::registry::SchemaRegistry;
use crate::schema::{Schema, ViewInfo};
use crate::types::{FieldDefault, FieldSpec, SchemaDefinition};
use crate::settings::ExtraPolicy;
use crate::validation::{IssueKind, ValidationError, ValidationIssue};
use crate::validator::{JsonMap, RecordWrapFn, ValidatorBinding, ValidatorFn};
use crate::value::Value;

/// Path used for issues raised against the whole record
pub const ROOT_PATH: &str = "$root";

/// Failures reported while materializing a definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A referenced schema is not available yet; the definition may be retried
    #[error("unresolved reference to '{reference}' in '{schema}'")]
    Unresolved {
        /// Definition being materialized
        schema: String,
        /// Name that could not be resolved
        reference: String,
    },

    /// The definition is inconsistent and will never materialize
    #[error("invalid schema '{schema}': {message}")]
    Invalid {
        /// Definition being materialized
        schema: String,
        /// What is wrong
        message: String,
    },
}

impl EngineError {
    /// Create an unresolved-reference error
    pub fn unresolved(schema: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Unresolved {
            schema: schema.into(),
            reference: reference.into(),
        }
    }

    /// Create an invalid-definition error
    pub fn invalid(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Whether retrying after more declarations could succeed
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Name resolution available to the engine while materializing
pub trait SchemaLookup {
    /// A finalized schema by name
    fn resolve(&self, name: &str) -> Option<Arc<Schema>>;

    /// Whether a schema of this name has been declared, finalized or not
    fn is_declared(&self, name: &str) -> bool;
}

/// State threaded through one construction
#[derive(Clone, Copy)]
pub struct ConstructContext<'a> {
    registry: &'a SchemaRegistry,
    depth: usize,
}

impl<'a> ConstructContext<'a> {
    /// Top-level context
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry, depth: 0 }
    }

    /// Registry records are constructed in
    #[must_use]
    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Current nesting depth
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for a nested record
    #[must_use]
    pub fn nested(&self) -> Self {
        Self {
            registry: self.registry,
            depth: self.depth + 1,
        }
    }
}

impl fmt::Debug for ConstructContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructContext")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// The schema engine capability consumed by the view machinery
pub trait SchemaEngine: Send + Sync + fmt::Debug {
    /// Turn a definition into a finalized schema
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unresolved`] when a referenced schema is not
    /// available yet, and [`EngineError::Invalid`] for inconsistent definitions
    fn materialize(
        &self,
        definition: &SchemaDefinition,
        lookup: &dyn SchemaLookup,
    ) -> Result<Schema, EngineError>;

    /// Validate raw input and construct a record
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every offending field
    fn construct(
        &self,
        schema: &Arc<Schema>,
        input: JsonMap,
        cx: ConstructContext<'_>,
    ) -> Result<Record, ValidationError>;

    /// Validate a single field value as construction would
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the field is unknown or the value is rejected
    fn validate_field(
        &self,
        schema: &Arc<Schema>,
        field: &str,
        raw: JsonValue,
        cx: ConstructContext<'_>,
    ) -> Result<Value, ValidationError>;
}

/// Engine that interprets schemas directly
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretingEngine;

impl InterpretingEngine {
    /// Create the engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run_wrapped(
        &self,
        schema: &Arc<Schema>,
        wraps: &[&RecordWrapFn],
        input: JsonMap,
        cx: ConstructContext<'_>,
    ) -> Result<Record, ValidationError> {
        match wraps.split_first() {
            None => self.construct_unwrapped(schema, input, cx),
            Some((outer, rest)) => {
                let next = |inner: JsonMap| self.run_wrapped(schema, rest, inner, cx);
                outer(input, &next)
            }
        }
    }

    fn construct_unwrapped(
        &self,
        schema: &Arc<Schema>,
        mut input: JsonMap,
        cx: ConstructContext<'_>,
    ) -> Result<Record, ValidationError> {
        for binding in schema.validators() {
            if let ValidatorFn::RecordBefore(f) = &binding.func {
                input = f(input).map_err(|err| {
                    ValidationError::single(
                        schema.name(),
                        validator_issue(ROOT_PATH, binding, &err),
                    )
                })?;
            }
        }

        let policy = schema
            .config()
            .extra_policy(cx.registry().config().default_extra);
        let mut issues = Vec::new();
        let mut values = IndexMap::with_capacity(schema.fields().len());
        let mut fields_set = IndexSet::new();

        for (name, field) in schema.fields() {
            match input.get(name) {
                Some(raw) => match self.field_value(schema, field, raw.clone(), name, cx) {
                    Ok(value) => {
                        values.insert(name.clone(), value);
                        fields_set.insert(name.clone());
                    }
                    Err(mut field_issues) => issues.append(&mut field_issues),
                },
                None => match &field.default {
                    FieldDefault::Required => issues.push(ValidationIssue::new(
                        IssueKind::Missing,
                        name.as_str(),
                        "field required",
                    )),
                    FieldDefault::Value(default) => {
                        values.insert(name.clone(), Value::from_json(default));
                    }
                    FieldDefault::Unset => {
                        values.insert(name.clone(), Value::Null);
                    }
                },
            }
        }

        for (key, raw) in &input {
            if schema.has_field(key) {
                continue;
            }
            match policy {
                ExtraPolicy::Forbid => issues.push(ValidationIssue::new(
                    IssueKind::Extra,
                    key.as_str(),
                    "extra inputs are not permitted",
                )),
                ExtraPolicy::Allow => {
                    values.insert(key.clone(), Value::from_json(raw));
                    fields_set.insert(key.clone());
                }
                ExtraPolicy::Ignore => {}
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError::new(schema.name(), issues));
        }

        let record = Record::new(Arc::clone(schema), values, fields_set, cx.registry().clone());

        for binding in schema.validators() {
            if let ValidatorFn::RecordAfter(f) = &binding.func {
                f(&record).map_err(|err| {
                    ValidationError::single(
                        schema.name(),
                        validator_issue(ROOT_PATH, binding, &err),
                    )
                })?;
            }
        }

        Ok(record)
    }

    fn field_value(
        &self,
        schema: &Arc<Schema>,
        field: &FieldSpec,
        mut raw: JsonValue,
        path: &str,
        cx: ConstructContext<'_>,
    ) -> Result<Value, Vec<ValidationIssue>> {
        let bindings: Vec<&ValidatorBinding> = schema
            .validators()
            .iter()
            .filter(|binding| binding.field.as_deref() == Some(field.name.as_str()))
            .collect();

        for binding in &bindings {
            if let ValidatorFn::FieldBefore(f) = &binding.func {
                raw = f(&raw).map_err(|err| vec![validator_issue(path, binding, &err)])?;
            }
        }

        let mut value = coerce::coerce(&field.ty, &raw, path, schema.config(), cx)?;

        for binding in &bindings {
            if let ValidatorFn::FieldAfter(f) = &binding.func {
                value = f(value).map_err(|err| vec![validator_issue(path, binding, &err)])?;
            }
        }

        Ok(value)
    }
}

fn validator_issue(path: &str, binding: &ValidatorBinding, err: &anyhow::Error) -> ValidationIssue {
    ValidationIssue::new(IssueKind::Validator, path, err.to_string()).with_rule(binding.name.as_str())
}

impl SchemaEngine for InterpretingEngine {
    fn materialize(
        &self,
        definition: &SchemaDefinition,
        lookup: &dyn SchemaLookup,
    ) -> Result<Schema, EngineError> {
        let name = definition.name.as_str();

        let parent = match definition.is_a.as_deref() {
            Some(parent) if parent == name => {
                return Err(EngineError::invalid(name, "a schema cannot extend itself"));
            }
            Some(parent) => Some(
                lookup
                    .resolve(parent)
                    .ok_or_else(|| EngineError::unresolved(name, parent))?,
            ),
            None => None,
        };

        let mut fields = match (&definition.view, &parent) {
            (None, Some(parent)) => parent.fields.clone(),
            _ => IndexMap::with_capacity(definition.fields.len()),
        };
        for (key, field) in &definition.fields {
            let mut field = field.clone();
            if field.name.is_empty() {
                field.name.clone_from(key);
            }
            if field.owner.is_empty() {
                field.owner = name.to_string();
            }
            fields.insert(key.clone(), field);
        }

        for field in fields.values() {
            for model in field.ty.referenced_models() {
                if model != name && !lookup.is_declared(model) {
                    return Err(EngineError::unresolved(name, model));
                }
            }
        }

        if definition.view.is_none() {
            for binding in &definition.validators {
                if let Some(target) = &binding.field {
                    if !fields.contains_key(target) {
                        return Err(EngineError::invalid(
                            name,
                            format!("validator '{}' targets unknown field '{target}'", binding.name),
                        ));
                    }
                }
            }
        }

        let mut declared_validators = parent
            .as_ref()
            .map(|parent| parent.declared_validators.clone())
            .unwrap_or_default();
        declared_validators.extend(definition.validators.iter().cloned());

        let mut validators = parent
            .as_ref()
            .map(|parent| parent.validators.clone())
            .unwrap_or_default();
        validators.extend(
            definition
                .validators
                .iter()
                .filter(|binding| binding.is_unscoped())
                .cloned(),
        );

        let config = parent.as_ref().map_or_else(
            || definition.config.clone(),
            |parent| parent.config.merged(&definition.config),
        );

        let view = match &definition.view {
            Some(tag) => Some(ViewInfo {
                name: tag.view_name.clone(),
                root: lookup
                    .resolve(&tag.root)
                    .ok_or_else(|| EngineError::unresolved(name, tag.root.as_str()))?,
            }),
            None => None,
        };

        Ok(Schema {
            name: name.to_string(),
            description: definition.description.clone(),
            parent,
            fields,
            declared_validators,
            validators,
            config,
            view,
        })
    }

    fn construct(
        &self,
        schema: &Arc<Schema>,
        input: JsonMap,
        cx: ConstructContext<'_>,
    ) -> Result<Record, ValidationError> {
        let max_depth = cx.registry().config().max_depth;
        if cx.depth() > max_depth {
            return Err(ValidationError::single(
                schema.name(),
                ValidationIssue::new(
                    IssueKind::Depth,
                    ROOT_PATH,
                    format!("nesting exceeds maximum depth of {max_depth}"),
                ),
            ));
        }

        let wraps: Vec<&RecordWrapFn> = schema
            .validators()
            .iter()
            .filter_map(|binding| match &binding.func {
                ValidatorFn::RecordWrap(f) => Some(&**f),
                _ => None,
            })
            .collect();

        self.run_wrapped(schema, &wraps, input, cx)
    }

    fn validate_field(
        &self,
        schema: &Arc<Schema>,
        field: &str,
        raw: JsonValue,
        cx: ConstructContext<'_>,
    ) -> Result<Value, ValidationError> {
        let spec = schema.field(field).ok_or_else(|| {
            ValidationError::single(
                schema.name(),
                ValidationIssue::new(IssueKind::Extra, field, "object has no such field"),
            )
        })?;
        self.field_value(schema, spec, raw, field, cx)
            .map_err(|issues| ValidationError::new(schema.name(), issues))
    }
}
