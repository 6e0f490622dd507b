//! Class bodies: what one declaration contributes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyblok_core::{Column, FieldInfo, Result, Value, Values};

use crate::args::Args;
use crate::chain::{
    ClassCall, ClassMethod, InitializeCall, InitializeHook, InsertCall, InsertHook, InstanceCall,
    InstanceMethod,
};
use crate::record::Record;

/// Declaration category. Names are only unique within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// A concrete model, storage-backed when it has columns.
    Model,
    /// A reusable set of columns and methods.
    Mixin,
    /// A framework layer (`Base` or `SqlBase`) shared by every model.
    Core,
}

impl Category {
    /// Name used in layer descriptions and errors.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Model => "Model",
            Category::Mixin => "Mixin",
            Category::Core => "Core",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A base a declaration inherits from, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base {
    pub(crate) category: Category,
    pub(crate) name: String,
}

impl Base {
    /// Inherit a Mixin.
    pub fn mixin(name: impl Into<String>) -> Self {
        Self {
            category: Category::Mixin,
            name: name.into(),
        }
    }

    /// Inherit another Model (table inheritance by copy).
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            category: Category::Model,
            name: name.into(),
        }
    }

    /// Category of the referenced declaration.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Dotted name of the referenced declaration.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

/// The content of one declaration.
///
/// Built with chained setters:
///
/// ```
/// use anyblok_core::{Column, Value};
/// use anyblok_registry::{Base, ClassBody};
///
/// let body = ClassBody::new()
///     .inherit(Base::mixin("MixinName"))
///     .column("id", Column::integer().primary_key())
///     .method("double", |_call, args| Ok(Value::Int(args.int(0)? * 2)));
/// assert_eq!(body.columns().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ClassBody {
    pub(crate) columns: Vec<FieldInfo>,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) methods: BTreeMap<String, InstanceMethod>,
    pub(crate) class_methods: BTreeMap<String, ClassMethod>,
    pub(crate) insert: Option<InsertHook>,
    pub(crate) initialize: Option<InitializeHook>,
    pub(crate) bases: Vec<Base>,
    pub(crate) table_name: Option<String>,
}

impl ClassBody {
    /// An empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a column. Redeclaring a name inside one body replaces it.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|f| f.name == name) {
            Some(field) => field.column = column,
            None => self.columns.push(FieldInfo::new(name, column)),
        }
        self
    }

    /// Set a class attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Define an instance method.
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut InstanceCall<'_>, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Define a class method.
    #[must_use]
    pub fn class_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ClassCall<'_>, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.class_methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Override `insert`. The hook receives the values and must call
    /// `super_call` to reach the storage.
    #[must_use]
    pub fn on_insert<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut InsertCall<'_>, Values) -> Result<Record> + Send + Sync + 'static,
    {
        self.insert = Some(Arc::new(f));
        self
    }

    /// Run code once the tables exist, at the end of the registry build.
    #[must_use]
    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut InitializeCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(f));
        self
    }

    /// Add a base.
    #[must_use]
    pub fn inherit(mut self, base: Base) -> Self {
        self.bases.push(base);
        self
    }

    /// Use an explicit table name instead of the derived one.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Declared columns.
    pub fn columns(&self) -> &[FieldInfo] {
        &self.columns
    }

    /// Declared bases.
    pub fn bases(&self) -> &[Base] {
        &self.bases
    }
}

impl fmt::Debug for ClassBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBody")
            .field("columns", &self.columns)
            .field("attributes", &self.attributes)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("class_methods", &self.class_methods.keys().collect::<Vec<_>>())
            .field("insert", &self.insert.is_some())
            .field("initialize", &self.initialize.is_some())
            .field("bases", &self.bases)
            .field("table_name", &self.table_name)
            .finish()
    }
}
