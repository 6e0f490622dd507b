//! Resolved model classes and the handles used to work with them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyblok_core::{Error, FieldInfo, Result, Value, Values};
use anyblok_schema::ModelSchema;

use crate::args::Args;
use crate::chain::{
    ClassCall, ClassMethod, InitializeCall, InitializeHook, InsertCall, InsertHook,
    InstanceMethod, Layer,
};
use crate::query::Query;
use crate::record::Record;
use crate::registry::Registry;

/// The immutable result of resolving every contribution to one model name.
#[derive(Debug)]
pub struct ModelClass {
    pub(crate) name: String,
    pub(crate) table_name: Option<String>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) layers: Vec<String>,
    pub(crate) methods: BTreeMap<String, Vec<Layer<InstanceMethod>>>,
    pub(crate) class_methods: BTreeMap<String, Vec<Layer<ClassMethod>>>,
    pub(crate) insert_chain: Vec<Layer<InsertHook>>,
    pub(crate) initialize_chain: Vec<Layer<InitializeHook>>,
}

impl ModelClass {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            table_name: None,
            fields: Vec::new(),
            attributes: BTreeMap::new(),
            layers: Vec::new(),
            methods: BTreeMap::new(),
            class_methods: BTreeMap::new(),
            insert_chain: Vec::new(),
            initialize_chain: Vec::new(),
        }
    }

    /// Dotted model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name, `None` when the model has no columns.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Whether the model is storage-backed.
    pub fn is_sql(&self) -> bool {
        self.table_name.is_some()
    }

    /// Resolved columns in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// A resolved column.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary key column names.
    pub fn primary_key(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.column.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Class attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Resolved layer order, most derived first.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Layers implementing an instance method, most derived first.
    pub fn method_layers(&self, method: &str) -> Vec<&str> {
        self.methods
            .get(method)
            .map(|chain| chain.iter().map(Layer::origin).collect())
            .unwrap_or_default()
    }

    /// Whether any layer implements the instance method.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Whether any layer implements the class method.
    pub fn has_class_method(&self, method: &str) -> bool {
        self.class_methods.contains_key(method)
    }

    /// Schema handed to the materializer.
    pub fn schema(&self) -> ModelSchema {
        ModelSchema {
            name: self.name.clone(),
            table_name: self.table_name.clone(),
            fields: self.fields.clone(),
        }
    }
}

/// A resolved model bound to its registry.
///
/// Cheap to clone; every clone refers to the same resolved class.
#[derive(Clone)]
pub struct ModelHandle {
    registry: Registry,
    class: Arc<ModelClass>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.class.name)
            .field("table_name", &self.class.table_name)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    pub(crate) fn new(registry: Registry, class: Arc<ModelClass>) -> Self {
        Self { registry, class }
    }

    /// The registry the model belongs to.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The resolved class.
    pub fn class(&self) -> &ModelClass {
        &self.class
    }

    /// Dotted model name.
    pub fn name(&self) -> &str {
        &self.class.name
    }

    /// Table name, `None` when the model has no columns.
    pub fn table_name(&self) -> Option<&str> {
        self.class.table_name()
    }

    /// Whether the model is storage-backed.
    pub fn is_sql(&self) -> bool {
        self.class.is_sql()
    }

    /// Resolved columns.
    pub fn columns(&self) -> &[FieldInfo] {
        self.class.fields()
    }

    /// Class attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.class.attribute(name)
    }

    /// Resolved layer order, most derived first.
    pub fn layers(&self) -> &[String] {
        self.class.layers()
    }

    /// The table name, or `NotStorageBacked`.
    pub fn require_table(&self) -> Result<&str> {
        self.class
            .table_name()
            .ok_or_else(|| Error::NotStorageBacked(self.class.name.clone()))
    }

    /// Insert a row through the insert chain.
    #[tracing::instrument(level = "debug", skip(self, values), fields(model = %self.class.name))]
    pub fn insert(&self, values: Values) -> Result<Record> {
        let mut call = InsertCall::start(self, &self.class.insert_chain);
        call.super_call(values)
    }

    /// Insert several rows, each through the insert chain.
    pub fn multi_insert(&self, rows: impl IntoIterator<Item = Values>) -> Result<Vec<Record>> {
        rows.into_iter().map(|values| self.insert(values)).collect()
    }

    /// Store a row without running any override.
    pub(crate) fn native_insert(&self, values: Values) -> Result<Record> {
        let table = self.require_table()?;
        let row = self.registry.connection().insert(table, &values)?;
        tracing::debug!(model = %self.class.name, table, "Inserted record");
        Ok(Record::persisted(self.clone(), row))
    }

    /// Start a query on the model's table.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Call a class method.
    pub fn call(&self, method: &str, args: &Args) -> Result<Value> {
        let chain = self
            .class
            .class_methods
            .get(method)
            .map_or(&[][..], Vec::as_slice);
        let mut call = ClassCall::start(self, method, chain);
        call.super_call(args)
    }

    /// A new, non-persisted instance.
    pub fn instance(&self) -> Record {
        Record::transient(self.clone(), Values::new())
    }

    /// Run the initialise chain.
    pub(crate) fn initialize(&self) -> Result<()> {
        let mut call = InitializeCall::start(self, &self.class.initialize_chain);
        call.super_call()
    }
}
