//! The assembled registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyblok_core::{
    Connection, EnvironmentManager, Error, FieldInfo, Result, TableInfo, Value,
};
use anyblok_schema::{Dialect, ModelSchema, SchemaBuilder, creation_order, materialize};

use crate::config::RegistryConfig;
use crate::declarations::Declarations;
use crate::model::{ModelClass, ModelHandle};
use crate::resolve::resolve;

/// Every resolved model, bound to a storage connection.
///
/// Built once from a set of [`Declarations`] and immutable afterwards. Cheap
/// to clone and safe to share between threads.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: RegistryConfig,
    connection: Arc<dyn Connection>,
    models: BTreeMap<String, Arc<ModelClass>>,
    model_order: Vec<String>,
    mixins: BTreeMap<String, Vec<FieldInfo>>,
    tables: Vec<TableInfo>,
}

impl Registry {
    /// Build a registry with the default configuration.
    pub fn build(declarations: &Declarations, connection: Arc<dyn Connection>) -> Result<Self> {
        RegistryBuilder::new(declarations, connection).build()
    }

    /// Start configuring a build.
    pub fn builder(declarations: &Declarations, connection: Arc<dyn Connection>) -> RegistryBuilder<'_> {
        RegistryBuilder::new(declarations, connection)
    }

    /// Resolved model by dotted name.
    pub fn get(&self, name: &str) -> Result<ModelHandle> {
        self.inner
            .models
            .get(name)
            .map(|class| ModelHandle::new(self.clone(), Arc::clone(class)))
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    /// Whether a model of that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.models.contains_key(name)
    }

    /// Resolved columns of a mixin.
    pub fn mixin(&self, name: &str) -> Option<&[FieldInfo]> {
        self.inner.mixins.get(name).map(Vec::as_slice)
    }

    /// Model names below a dotted prefix, e.g. `System` gives `System.Sequence`.
    pub fn namespace(&self, prefix: &str) -> Vec<&str> {
        let prefix = format!("{}.", prefix.trim_end_matches('.'));
        self.inner
            .models
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    /// Model names in order of first registration.
    pub fn model_names(&self) -> Vec<&str> {
        self.inner.model_order.iter().map(String::as_str).collect()
    }

    /// Materialised tables, in creation order.
    pub fn tables(&self) -> &[TableInfo] {
        &self.inner.tables
    }

    /// `CREATE TABLE` statements of every table for `dialect`.
    pub fn ddl(&self, dialect: Dialect) -> Vec<String> {
        SchemaBuilder::new(dialect)
            .create_tables(&self.inner.tables)
            .build()
    }

    /// The storage connection.
    pub fn connection(&self) -> &dyn Connection {
        self.inner.connection.as_ref()
    }

    /// Build configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Database name.
    pub fn db_name(&self) -> &str {
        &self.inner.config.db_name
    }

    /// Open a transaction.
    pub fn begin(&self) -> Result<()> {
        self.inner.connection.begin()
    }

    /// Commit the open transaction, if any.
    pub fn commit(&self) -> Result<()> {
        if self.inner.connection.in_transaction() {
            self.inner.connection.commit()?;
        }
        Ok(())
    }

    /// Roll back the open transaction, if any.
    pub fn rollback(&self) -> Result<()> {
        if self.inner.connection.in_transaction() {
            self.inner.connection.rollback()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("db_name", &self.inner.config.db_name)
            .field("backend", &self.inner.connection.backend())
            .field("models", &self.inner.model_order)
            .field("mixins", &self.inner.mixins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Configures and runs a registry build.
pub struct RegistryBuilder<'d> {
    declarations: &'d Declarations,
    connection: Arc<dyn Connection>,
    config: RegistryConfig,
    environment: Option<Arc<EnvironmentManager>>,
}

impl<'d> RegistryBuilder<'d> {
    /// Build `declarations` against `connection`.
    pub fn new(declarations: &'d Declarations, connection: Arc<dyn Connection>) -> Self {
        Self {
            declarations,
            connection,
            config: RegistryConfig::default(),
            environment: None,
        }
    }

    /// Use `config`.
    #[must_use]
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish `dbname` into `environment` when the build succeeds.
    #[must_use]
    pub fn environment(mut self, environment: Arc<EnvironmentManager>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Resolve, materialise, create the tables and run the initialise hooks.
    ///
    /// Any inconsistency aborts the whole build; no partial registry is
    /// returned.
    #[tracing::instrument(level = "debug", skip(self), fields(db_name = %self.config.db_name))]
    pub fn build(self) -> Result<Registry> {
        let resolution = resolve(self.declarations)?;

        let schemas: Vec<ModelSchema> = resolution.models.iter().map(ModelClass::schema).collect();
        let tables: Vec<TableInfo> = creation_order(&materialize(&schemas)?)
            .into_iter()
            .cloned()
            .collect();

        if self.config.create_tables {
            // Check every existing table before creating anything.
            for table in &tables {
                if let Some(existing) = self.connection.table_info(&table.name) {
                    if let Some(detail) = column_drift(&existing, table) {
                        tracing::warn!(table = %table.name, %detail, "Stored table differs");
                        return Err(Error::SchemaMismatch {
                            table: table.name.clone(),
                            detail,
                        });
                    }
                }
            }

            let mut created = 0_usize;
            for table in &tables {
                if self.connection.has_table(&table.name) {
                    tracing::debug!(table = %table.name, "Table already exists");
                    continue;
                }
                self.connection.create_table(table)?;
                created += 1;
            }
            tracing::info!(
                created,
                backend = self.connection.backend(),
                "Created tables"
            );
        }

        let model_order: Vec<String> = resolution
            .models
            .iter()
            .map(|m| m.name.clone())
            .collect();
        let models = resolution
            .models
            .into_iter()
            .map(|m| (m.name.clone(), Arc::new(m)))
            .collect();

        let registry = Registry {
            inner: Arc::new(RegistryInner {
                config: self.config,
                connection: self.connection,
                models,
                model_order,
                mixins: resolution.mixins,
                tables,
            }),
        };

        if let Some(environment) = &self.environment {
            environment.set("dbname", Value::from(registry.db_name()))?;
        }

        if registry.config().run_initialize_hooks {
            for name in registry.model_names() {
                registry.get(name)?.initialize()?;
            }
        }

        tracing::info!(
            models = registry.inner.models.len(),
            tables = registry.inner.tables.len(),
            "Registry ready"
        );
        Ok(registry)
    }
}

/// First difference between the columns of a stored table and the columns
/// the registry expects, in the expected column order.
fn column_drift(stored: &TableInfo, expected: &TableInfo) -> Option<String> {
    for column in &expected.columns {
        let Some(found) = stored.column(&column.name) else {
            return Some(format!("missing column {}", column.name));
        };
        if found.sql_type != column.sql_type {
            return Some(format!(
                "column {} is {}, expected {}",
                column.name,
                found.sql_type.sql_name(),
                column.sql_type.sql_name()
            ));
        }
        if found.nullable != column.nullable || found.primary_key != column.primary_key {
            return Some(format!("column {} changed its constraints", column.name));
        }
    }
    stored
        .columns
        .iter()
        .find(|c| expected.column(&c.name).is_none())
        .map(|c| format!("unexpected column {}", c.name))
}
