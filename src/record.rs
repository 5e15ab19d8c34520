//! Validated records and view projection
//!
//! A [`Record`] is a shared handle to a validated instance of a schema. Cloning
//! the handle shares the instance; [`Record::ptr_eq`] compares identity while
//! `==` compares values.
//!
//! [`Record::view`] returns a [`ViewFactory`] bound to the instance. Factories
//! are cached per instance, keyed by the concrete schema, the schema owning the
//! view and the view name. Produced view records are never cached, so every
//! projection reads the instance's current values.

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::engine::ConstructContext;
use crate::error::{Result, ViewError};
use crate::registry::SchemaRegistry;
use crate::schema::Schema;
use crate::validation::{IssueKind, ValidationError, ValidationIssue};
use crate::validator::JsonMap;
use crate::value::Value;

/// Options for [`Record::dump_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Only dump fields that were explicitly set, recursively
    pub exclude_unset: bool,
}

#[derive(Debug)]
struct RecordState {
    values: IndexMap<String, Value>,
    fields_set: IndexSet<String>,
}

type FactoryKey = (String, String, String);

struct RecordInner {
    schema: Arc<Schema>,
    state: RwLock<RecordState>,
    views: DashMap<FactoryKey, Arc<ViewFactory>>,
    registry: SchemaRegistry,
}

/// A validated instance of a schema
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl Record {
    pub(crate) fn new(
        schema: Arc<Schema>,
        values: IndexMap<String, Value>,
        fields_set: IndexSet<String>,
        registry: SchemaRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                schema,
                state: RwLock::new(RecordState { values, fields_set }),
                views: DashMap::new(),
                registry,
            }),
        }
    }

    /// Schema of the instance
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    /// Current value of a field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.read().values.get(field).cloned()
    }

    /// Fields explicitly supplied at construction or assigned since
    #[must_use]
    pub fn fields_set(&self) -> IndexSet<String> {
        self.inner.state.read().fields_set.clone()
    }

    /// Whether two handles refer to the same instance
    #[must_use]
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Dump every field as `JSON`
    #[must_use]
    pub fn dump(&self) -> JsonValue {
        self.dump_with(DumpOptions::default())
    }

    /// Dump as `JSON` with options
    #[must_use]
    pub fn dump_with(&self, options: DumpOptions) -> JsonValue {
        let state = self.inner.state.read();
        JsonValue::Object(
            state
                .values
                .iter()
                .filter(|(name, _)| !options.exclude_unset || state.fields_set.contains(*name))
                .map(|(name, value)| (name.clone(), value.to_json_with(options)))
                .collect(),
        )
    }

    /// Assign a field, validating the value as construction would
    ///
    /// Record-level validators are not re-run.
    ///
    /// # Errors
    ///
    /// A validation error if the schema is frozen, the field is unknown or the
    /// value is rejected
    pub fn set(&self, field: &str, value: JsonValue) -> Result<()> {
        let schema = &self.inner.schema;
        if schema.config().is_frozen() {
            return Err(ValidationError::single(
                schema.name(),
                ValidationIssue::new(IssueKind::Frozen, field, "instance is frozen"),
            )
            .into());
        }

        let value = self.inner.registry.engine().validate_field(
            schema,
            field,
            value,
            ConstructContext::new(&self.inner.registry),
        )?;

        let mut state = self.inner.state.write();
        state.values.insert(field.to_string(), value);
        state.fields_set.insert(field.to_string());
        Ok(())
    }

    /// Factory projecting this instance into view `view`
    ///
    /// # Errors
    ///
    /// [`ViewError::ViewNotFound`] if neither the schema nor its ancestors have
    /// the view
    pub fn view(&self, view: &str) -> Result<Arc<ViewFactory>> {
        let target = self.inner.registry.view(self.inner.schema.name(), view)?;
        let owner = target
            .view_root()
            .map_or_else(|| self.inner.schema.name().to_string(), |root| root.name().to_string());
        let key = (
            self.inner.schema.name().to_string(),
            owner,
            view.to_string(),
        );

        let build = || {
            Arc::new(ViewFactory {
                source: Arc::downgrade(&self.inner),
                schema: Arc::clone(&target),
            })
        };
        let mut slot = self.inner.views.entry(key).or_insert_with(|| {
            debug!(schema = self.inner.schema.name(), view, "caching view factory");
            build()
        });
        if !Arc::ptr_eq(&slot.schema, &target) {
            debug!(schema = self.inner.schema.name(), view, "replacing stale view factory");
            *slot = build();
        }
        Ok(Arc::clone(slot.value()))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.inner.schema.name() == other.inner.schema.name()
            && self.inner.state.read().values == other.inner.state.read().values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Record")
            .field("schema", &self.inner.schema.name())
            .field("values", &state.values)
            .field("fields_set", &state.fields_set)
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        for (index, (name, value)) in state.values.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={}", value.to_json())?;
        }
        Ok(())
    }
}

/// Projection of one record into one view
pub struct ViewFactory {
    source: Weak<RecordInner>,
    schema: Arc<Schema>,
}

impl ViewFactory {
    /// View schema produced by this factory
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// View name
    #[must_use]
    pub fn view_name(&self) -> Option<&str> {
        self.schema.view_name()
    }

    /// Schema the view spec was applied to
    #[must_use]
    pub fn view_root(&self) -> Option<&Arc<Schema>> {
        self.schema.view_root()
    }

    /// Project the source record
    ///
    /// Only explicitly set fields that the view keeps are carried over; the new
    /// record goes through the view's own validation.
    ///
    /// # Errors
    ///
    /// [`ViewError::Usage`] if the source record is gone, or the view's
    /// validation error
    pub fn project(&self) -> Result<Record> {
        let source = self
            .source
            .upgrade()
            .ok_or_else(|| ViewError::usage("source record no longer exists"))?;

        let options = DumpOptions {
            exclude_unset: true,
        };
        let input: JsonMap = {
            let state = source.state.read();
            state
                .values
                .iter()
                .filter(|(name, _)| {
                    state.fields_set.contains(*name) && self.schema.has_field(name.as_str())
                })
                .map(|(name, value)| (name.clone(), value.to_json_with(options)))
                .collect()
        };

        source.registry.construct_schema(&self.schema, input)
    }

    /// Project with explicit field values, which instance-bound factories reject
    ///
    /// # Errors
    ///
    /// [`ViewError::Usage`] when `fields` is non-empty, otherwise as
    /// [`Self::project`]
    pub fn call(&self, fields: &JsonMap) -> Result<Record> {
        if !fields.is_empty() {
            let names: Vec<&str> = fields.keys().map(String::as_str).collect();
            return Err(ViewError::usage(format!(
                "view factory for '{}' takes no field arguments, got {}",
                self.schema.name(),
                names.join(", ")
            )));
        }
        self.project()
    }
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("schema", &self.schema.name())
            .field("live", &(self.source.strong_count() > 0))
            .finish()
    }
}
