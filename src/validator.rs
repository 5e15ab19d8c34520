//! Validator bindings and view scoping
//!
//! A binding is declared once on a schema. Unscoped bindings belong to the
//! schema itself; scoped bindings name the views they apply to and stay
//! inert on the schema that declares them. When a view is built, the bindings
//! scoped to its name are rebound as the view's own validators.

use indexmap::IndexSet;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

use crate::record::Record;
use crate::validation::ValidationError;
use crate::value::Value;

/// Raw record input
pub type JsonMap = Map<String, JsonValue>;

/// Continuation handed to wrap validators
pub type Next<'a> = &'a dyn Fn(JsonMap) -> Result<Record, ValidationError>;

type FieldBeforeFn = dyn Fn(&JsonValue) -> anyhow::Result<JsonValue> + Send + Sync;
type FieldAfterFn = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;
type RecordBeforeFn = dyn Fn(JsonMap) -> anyhow::Result<JsonMap> + Send + Sync;
type RecordAfterFn = dyn Fn(&Record) -> anyhow::Result<()> + Send + Sync;
pub(crate) type RecordWrapFn =
    dyn Fn(JsonMap, Next<'_>) -> Result<Record, ValidationError> + Send + Sync;

/// When a field validator runs relative to type coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// On the raw input value
    Before,
    /// On the coerced value
    After,
}

/// When a record validator runs relative to field validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// On the raw input map
    Before,
    /// On the constructed record
    After,
    /// Around the whole pipeline
    Wrap,
}

/// Invocation mode of a binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorMode {
    /// Per-field validator
    Field {
        /// Target field
        field: String,
        /// Position relative to coercion
        mode: FieldMode,
    },
    /// Whole-record validator
    Record(RecordMode),
}

/// The validator callable
#[derive(Clone)]
pub enum ValidatorFn {
    /// Field pre-validation
    FieldBefore(Arc<FieldBeforeFn>),
    /// Field post-validation
    FieldAfter(Arc<FieldAfterFn>),
    /// Record pre-validation
    RecordBefore(Arc<RecordBeforeFn>),
    /// Record post-validation
    RecordAfter(Arc<RecordAfterFn>),
    /// Record wrap
    RecordWrap(Arc<RecordWrapFn>),
}

/// A validator declared on a schema
#[derive(Clone)]
pub struct ValidatorBinding {
    /// Name used in validation issues
    pub name: String,
    /// Target field for field validators
    pub field: Option<String>,
    /// Views the binding is scoped to; empty, or containing `""`, means the
    /// declaring schema itself
    pub scope: IndexSet<String>,
    /// Callable
    pub func: ValidatorFn,
    /// Declaration order within the declaring schema
    pub order: usize,
}

impl ValidatorBinding {
    fn new(name: impl Into<String>, field: Option<String>, func: ValidatorFn) -> Self {
        Self {
            name: name.into(),
            field,
            scope: IndexSet::new(),
            func,
            order: 0,
        }
    }

    /// Field validator on the raw input value
    pub fn field_before<F>(name: impl Into<String>, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&JsonValue) -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        Self::new(name, Some(field.into()), ValidatorFn::FieldBefore(Arc::new(f)))
    }

    /// Field validator on the coerced value
    pub fn field_after<F>(name: impl Into<String>, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, Some(field.into()), ValidatorFn::FieldAfter(Arc::new(f)))
    }

    /// Record validator on the raw input map
    pub fn record_before<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JsonMap) -> anyhow::Result<JsonMap> + Send + Sync + 'static,
    {
        Self::new(name, None, ValidatorFn::RecordBefore(Arc::new(f)))
    }

    /// Record validator on the constructed record
    pub fn record_after<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(name, None, ValidatorFn::RecordAfter(Arc::new(f)))
    }

    /// Record validator around the whole pipeline
    pub fn record_wrap<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JsonMap, Next<'_>) -> Result<Record, ValidationError> + Send + Sync + 'static,
    {
        Self::new(name, None, ValidatorFn::RecordWrap(Arc::new(f)))
    }

    /// Scope the binding to the given views
    ///
    /// An empty name stands for the declaring schema itself.
    #[must_use]
    pub fn scoped_to<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.extend(views.into_iter().map(Into::into));
        self
    }

    /// Whether the binding belongs to the declaring schema itself
    ///
    /// Such a binding reaches every view through the structural parent.
    #[must_use]
    pub fn is_unscoped(&self) -> bool {
        self.scope.is_empty() || self.scope.contains("")
    }

    /// Whether the binding is scoped to the named view alone, not inherited
    #[must_use]
    pub fn applies_to(&self, view: &str) -> bool {
        !self.is_unscoped() && self.scope.contains(view)
    }

    /// Invocation mode
    #[must_use]
    pub fn mode(&self) -> ValidatorMode {
        let field = || self.field.clone().unwrap_or_default();
        match &self.func {
            ValidatorFn::FieldBefore(_) => ValidatorMode::Field {
                field: field(),
                mode: FieldMode::Before,
            },
            ValidatorFn::FieldAfter(_) => ValidatorMode::Field {
                field: field(),
                mode: FieldMode::After,
            },
            ValidatorFn::RecordBefore(_) => ValidatorMode::Record(RecordMode::Before),
            ValidatorFn::RecordAfter(_) => ValidatorMode::Record(RecordMode::After),
            ValidatorFn::RecordWrap(_) => ValidatorMode::Record(RecordMode::Wrap),
        }
    }

    /// Copy of this binding as an unscoped validator of a derived schema
    #[must_use]
    pub fn rebound(&self) -> Self {
        let mut binding = self.clone();
        binding.scope.clear();
        binding
    }
}

impl fmt::Debug for ValidatorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBinding")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .field("scope", &self.scope)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Select the bindings scoped to `view`, in declaration order, rebound as the
/// view's own validators.
///
/// Unscoped bindings are never selected: a view picks them up only through its
/// structural parent.
#[must_use]
pub fn resolve_scoped(declared: &[ValidatorBinding], view: &str) -> Vec<ValidatorBinding> {
    declared
        .iter()
        .filter(|binding| binding.applies_to(view))
        .map(ValidatorBinding::rebound)
        .collect()
}
