//! Schema registry
//!
//! Owns every declared schema and derived view, the views attached to each
//! schema, the view specs recorded for reapplication and the deferred build
//! chains of schemas that could not be finalized yet.
//!
//! Declaration is expected to happen during a single-threaded startup phase;
//! the state lock only guards against accidental concurrent use.

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{RegistryConfig, yaml_from_str};
use crate::engine::{ConstructContext, EngineError, InterpretingEngine, SchemaEngine, SchemaLookup};
use crate::error::{Result, ViewError};
use crate::record::Record;
use crate::schema::Schema;
use crate::types::SchemaDefinition;
use crate::validator::JsonMap;
use crate::view::{ViewBuilder, ViewLookup, ViewSpec};

/// Outcome of declaring a schema
#[derive(Debug, Clone)]
pub enum Declared {
    /// The schema was materialized
    Finalized(Arc<Schema>),
    /// A referenced schema is missing; call [`SchemaRegistry::rebuild`] later
    Pending {
        /// Name that could not be resolved
        reference: String,
    },
}

impl Declared {
    /// The schema, if finalized
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::Finalized(schema) => Some(schema),
            Self::Pending { .. } => None,
        }
    }

    /// Whether finalization was deferred
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Outcome of applying a view spec
#[derive(Debug, Clone)]
pub enum ViewBuild {
    /// The view was built and attached
    Built(Arc<Schema>),
    /// The build was queued on the base's deferred chain
    Deferred,
}

impl ViewBuild {
    /// The view, if built
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::Built(schema) => Some(schema),
            Self::Deferred => None,
        }
    }

    /// Whether the build was deferred
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

#[derive(Debug)]
struct Entry {
    definition: SchemaDefinition,
    schema: Option<Arc<Schema>>,
    pending_reference: Option<String>,
    views: IndexMap<String, Arc<Schema>>,
    specs: Vec<ViewSpec>,
    deferred: Vec<ViewSpec>,
}

impl Entry {
    fn new(definition: SchemaDefinition, schema: Option<Arc<Schema>>) -> Self {
        Self {
            definition,
            schema,
            pending_reference: None,
            views: IndexMap::new(),
            specs: Vec::new(),
            deferred: Vec::new(),
        }
    }

    fn parent_name(&self) -> Option<&str> {
        match &self.schema {
            Some(schema) => schema.parent().map(|parent| parent.name()),
            None => self.definition.is_a.as_deref(),
        }
    }

    fn record_spec(&mut self, spec: ViewSpec) {
        match self.specs.iter_mut().find(|recorded| recorded.name == spec.name) {
            Some(recorded) => *recorded = spec,
            None => self.specs.push(spec),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: IndexMap<String, Entry>,
}

impl RegistryState {
    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| ViewError::SchemaNotFound(name.to_string()))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| ViewError::SchemaNotFound(name.to_string()))
    }

    /// Names of `name` and its structural ancestors, nearest first
    fn chain(&self, name: &str) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        let mut current = self.entries.get_key_value(name);
        while let Some((key, entry)) = current {
            if !seen.insert(key.as_str()) {
                break;
            }
            current = entry
                .parent_name()
                .and_then(|parent| self.entries.get_key_value(parent));
        }
        seen.into_iter().collect()
    }
}

impl SchemaLookup for RegistryState {
    fn resolve(&self, name: &str) -> Option<Arc<Schema>> {
        self.entries.get(name).and_then(|entry| entry.schema.clone())
    }

    fn is_declared(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl ViewLookup for RegistryState {
    fn find_view(&self, schema: &str, view: &str) -> Option<Arc<Schema>> {
        self.chain(schema)
            .into_iter()
            .find_map(|name| self.entries.get(name)?.views.get(view).cloned())
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    config: Option<RegistryConfig>,
    #[serde(default)]
    schemas: Vec<SchemaDefinition>,
}

struct RegistryInner {
    config: RegistryConfig,
    engine: Arc<dyn SchemaEngine>,
    state: RwLock<RegistryState>,
}

/// Registry of schemas and their views
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SchemaRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("SchemaRegistry")
            .field("config", &self.inner.config)
            .field("engine", &self.inner.engine)
            .field("schemas", &state.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaRegistry {
    /// Registry using the interpreting engine
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_engine(config, Arc::new(InterpretingEngine::new()))
    }

    /// Registry using a custom engine
    #[must_use]
    pub fn with_engine(config: RegistryConfig, engine: Arc<dyn SchemaEngine>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                engine,
                state: RwLock::new(RegistryState::default()),
            }),
        }
    }

    /// Registry configuration
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Schema engine
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn SchemaEngine> {
        &self.inner.engine
    }

    /// Declare a schema, then apply the views it carries
    ///
    /// A definition whose references cannot be resolved yet is kept as pending
    /// rather than rejected; its views are deferred until [`Self::rebuild`].
    ///
    /// # Errors
    ///
    /// Duplicate names, engine rejections and view configuration errors
    pub fn declare(&self, mut definition: SchemaDefinition) -> Result<Declared> {
        definition.normalize();
        let name = definition.name.clone();
        let views = std::mem::take(&mut definition.views);
        let reapply = definition.reapply_base_views;

        let declared = {
            let mut state = self.inner.state.write();
            if state.entries.contains_key(&name) {
                return Err(ViewError::DuplicateSchema(name));
            }

            match self.inner.engine.materialize(&definition, &*state) {
                Ok(schema) => {
                    let schema = Arc::new(schema);
                    state
                        .entries
                        .insert(name.clone(), Entry::new(definition, Some(Arc::clone(&schema))));
                    info!(schema = name.as_str(), "declared schema");
                    Declared::Finalized(schema)
                }
                Err(EngineError::Unresolved { reference, .. }) => {
                    let mut entry = Entry::new(definition, None);
                    entry.pending_reference = Some(reference.clone());
                    state.entries.insert(name.clone(), entry);
                    info!(
                        schema = name.as_str(),
                        reference = reference.as_str(),
                        "declared schema pending unresolved reference"
                    );
                    Declared::Pending { reference }
                }
                Err(err) => return Err(err.into()),
            }
        };

        if reapply {
            self.reapply_base_views(&name)?;
        }
        for spec in views {
            self.apply_view(&name, spec)?;
        }

        Ok(declared)
    }

    /// Build a registry from a YAML document
    ///
    /// The optional `config` section configures the registry; the `schemas`
    /// list is then declared in order.
    ///
    /// # Errors
    ///
    /// Parse errors, an invalid configuration and any declaration error
    pub fn from_yaml(content: &str) -> Result<Self> {
        let document: Document = yaml_from_str(content)?;
        let config = document.config.unwrap_or_default();
        config.validate()?;
        let registry = Self::new(config);
        registry.declare_all(document.schemas)?;
        Ok(registry)
    }

    /// Declare every schema of a YAML document, in order
    ///
    /// The document has a `schemas` list of definitions. A `config` section is
    /// rejected, since this registry is already configured; use
    /// [`Self::from_yaml`] instead.
    ///
    /// # Errors
    ///
    /// Parse errors, a `config` section and any declaration error
    pub fn load_yaml(&self, content: &str) -> Result<Vec<String>> {
        let document: Document = yaml_from_str(content)?;
        if document.config.is_some() {
            return Err(ViewError::config(
                "documents with a config section must be loaded with SchemaRegistry::from_yaml",
            ));
        }
        self.declare_all(document.schemas)
    }

    fn declare_all(&self, definitions: Vec<SchemaDefinition>) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(definitions.len());
        for definition in definitions {
            names.push(definition.name.clone());
            self.declare(definition)?;
        }
        Ok(names)
    }

    /// Finalized schema or view by name
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaNotFound`], or [`ViewError::Unresolved`] while pending
    pub fn schema(&self, name: &str) -> Result<Arc<Schema>> {
        let state = self.inner.state.read();
        let entry = state.entry(name)?;
        entry.schema.clone().ok_or_else(|| ViewError::Unresolved {
            schema: name.to_string(),
            reference: entry.pending_reference.clone().unwrap_or_default(),
        })
    }

    /// Whether `name` is declared and finalized
    #[must_use]
    pub fn is_finalized(&self, name: &str) -> bool {
        self.inner.state.read().resolve(name).is_some()
    }

    /// Declared schema and view names, in declaration order
    #[must_use]
    pub fn schema_names(&self) -> Vec<String> {
        self.inner.state.read().entries.keys().cloned().collect()
    }

    /// Apply a view spec to a declared schema
    ///
    /// # Errors
    ///
    /// Configuration errors from the view checks and engine failures other than
    /// an unresolved reference
    pub fn apply_view(&self, base: &str, spec: ViewSpec) -> Result<ViewBuild> {
        let mut state = self.inner.state.write();
        let entry = state.entry_mut(base)?;
        match entry.schema.clone() {
            Some(schema) => self.build_view(&mut state, &schema, spec, true),
            None => {
                info!(
                    schema = base,
                    view = spec.name.as_str(),
                    "deferring view until schema is rebuilt"
                );
                entry.deferred.push(spec);
                Ok(ViewBuild::Deferred)
            }
        }
    }

    fn build_view(
        &self,
        state: &mut RegistryState,
        base: &Arc<Schema>,
        spec: ViewSpec,
        allow_defer: bool,
    ) -> Result<ViewBuild> {
        let built = ViewBuilder::new(&*state, &self.inner.config)
            .definition(base, &spec)
            .and_then(|definition| {
                let schema = self.inner.engine.materialize(&definition, &*state)?;
                Ok((definition, schema))
            });

        let (definition, schema) = match built {
            Ok(built) => built,
            Err(ViewError::Unresolved { reference, .. }) if allow_defer => {
                info!(
                    schema = base.name(),
                    view = spec.name.as_str(),
                    reference = reference.as_str(),
                    "deferring view with unresolved reference"
                );
                state.entry_mut(base.name())?.deferred.push(spec);
                return Ok(ViewBuild::Deferred);
            }
            Err(err) => return Err(err),
        };

        let schema = Arc::new(schema);
        match state.entries.get_mut(schema.name()) {
            Some(existing)
                if existing.schema.as_ref().is_some_and(|s| {
                    s.view_name() == Some(spec.name.as_str())
                        && s.view_root().is_some_and(|root| root.name() == base.name())
                }) =>
            {
                existing.definition = definition;
                existing.schema = Some(Arc::clone(&schema));
            }
            Some(_) => return Err(ViewError::DuplicateSchema(schema.name().to_string())),
            None => {
                state.entries.insert(
                    schema.name().to_string(),
                    Entry::new(definition, Some(Arc::clone(&schema))),
                );
            }
        }

        let entry = state.entry_mut(base.name())?;
        entry.views.insert(spec.name.clone(), Arc::clone(&schema));
        info!(
            schema = base.name(),
            view = spec.name.as_str(),
            derived = schema.name(),
            "built view"
        );
        entry.record_spec(spec);
        Ok(ViewBuild::Built(schema))
    }

    /// Finalize a schema and run its deferred view builds in order
    ///
    /// An already finalized schema keeps its identity; only pending views are
    /// built.
    ///
    /// # Errors
    ///
    /// [`ViewError::Unresolved`] if the schema still cannot be finalized, and any
    /// view build error. Unresolved references are no longer deferred here.
    pub fn rebuild(&self, name: &str) -> Result<Vec<Arc<Schema>>> {
        let mut state = self.inner.state.write();

        let base = match state.entry(name)?.schema.clone() {
            Some(schema) => schema,
            None => {
                let schema = Arc::new(
                    self.inner
                        .engine
                        .materialize(&state.entry(name)?.definition, &*state)?,
                );
                let entry = state.entry_mut(name)?;
                entry.schema = Some(Arc::clone(&schema));
                entry.pending_reference = None;
                info!(schema = name, "finalized schema");
                schema
            }
        };

        let deferred = std::mem::take(&mut state.entry_mut(name)?.deferred);
        let mut built = Vec::with_capacity(deferred.len());
        let mut remaining = deferred.into_iter();
        while let Some(spec) = remaining.next() {
            match self.build_view(&mut state, &base, spec.clone(), false) {
                Ok(ViewBuild::Built(view)) => built.push(view),
                Ok(ViewBuild::Deferred) => {}
                Err(err) => {
                    let entry = state.entry_mut(name)?;
                    entry.deferred.push(spec);
                    entry.deferred.extend(remaining);
                    return Err(err);
                }
            }
        }

        debug!(schema = name, views = built.len(), "rebuilt deferred views");
        Ok(built)
    }

    /// Rebuild the view specs recorded on the nearest schema in the structural
    /// chain of `name` (itself first) against `name`
    ///
    /// # Errors
    ///
    /// Any view build error
    pub fn reapply_base_views(&self, name: &str) -> Result<Vec<ViewBuild>> {
        let specs: Vec<ViewSpec> = {
            let state = self.inner.state.read();
            state.entry(name)?;
            state
                .chain(name)
                .into_iter()
                .filter_map(|schema| state.entries.get(schema))
                .find(|entry| !entry.specs.is_empty())
                .map(|entry| entry.specs.clone())
                .unwrap_or_default()
        };

        info!(schema = name, views = specs.len(), "reapplying base views");
        specs
            .into_iter()
            .map(|spec| self.apply_view(name, spec))
            .collect()
    }

    /// View `view` of `schema`, searching the structural parent chain
    ///
    /// Returns the same `Arc` on every call.
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaNotFound`] or [`ViewError::ViewNotFound`]
    pub fn view(&self, schema: &str, view: &str) -> Result<Arc<Schema>> {
        let state = self.inner.state.read();
        state.entry(schema)?;
        state
            .find_view(schema, view)
            .ok_or_else(|| ViewError::view_not_found(schema, view))
    }

    /// Names of the views visible on `schema`, own views first
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaNotFound`]
    pub fn views_of(&self, schema: &str) -> Result<Vec<String>> {
        let state = self.inner.state.read();
        state.entry(schema)?;
        let mut names: IndexSet<String> = IndexSet::new();
        for name in state.chain(schema) {
            if let Some(entry) = state.entries.get(name) {
                names.extend(entry.views.keys().cloned());
            }
        }
        Ok(names.into_iter().collect())
    }

    /// View specs recorded on `schema`, in application order
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaNotFound`]
    pub fn view_specs(&self, schema: &str) -> Result<Vec<ViewSpec>> {
        Ok(self.inner.state.read().entry(schema)?.specs.clone())
    }

    /// Number of view builds waiting on [`Self::rebuild`]
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaNotFound`]
    pub fn deferred_views(&self, schema: &str) -> Result<usize> {
        Ok(self.inner.state.read().entry(schema)?.deferred.len())
    }

    /// Construct a record of schema `name` from a `JSON` object
    ///
    /// # Errors
    ///
    /// Lookup errors, [`ViewError::Usage`] for non-object input, and validation
    /// failures
    pub fn construct(&self, name: &str, input: JsonValue) -> Result<Record> {
        let schema = self.schema(name)?;
        match input {
            JsonValue::Object(map) => self.construct_schema(&schema, map),
            other => Err(ViewError::usage(format!(
                "records are constructed from objects, got {other}"
            ))),
        }
    }

    /// Construct a record of an already resolved schema
    ///
    /// # Errors
    ///
    /// Validation failures
    pub fn construct_schema(&self, schema: &Arc<Schema>, input: JsonMap) -> Result<Record> {
        Ok(self
            .inner
            .engine
            .construct(schema, input, ConstructContext::new(self))?)
    }
}
