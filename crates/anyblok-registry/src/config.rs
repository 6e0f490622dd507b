//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Options applied when building a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Database name, published as `dbname` in the environment.
    pub db_name: String,
    /// Create missing tables on build.
    pub create_tables: bool,
    /// Run the initialise hooks of every model on build.
    pub run_initialize_hooks: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_name: "anyblok".to_string(),
            create_tables: true,
            run_initialize_hooks: true,
        }
    }
}

impl RegistryConfig {
    /// Use another database name.
    #[must_use]
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    /// Enable or disable table creation.
    #[must_use]
    pub fn create_tables(mut self, value: bool) -> Self {
        self.create_tables = value;
        self
    }

    /// Enable or disable the initialise hooks.
    #[must_use]
    pub fn run_initialize_hooks(mut self, value: bool) -> Self {
        self.run_initialize_hooks = value;
        self
    }
}
