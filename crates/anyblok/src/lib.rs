//! AnyBlok: a model registry assembled from independently contributed bloks.
//!
//! Bloks contribute Models, Mixins and Core layers to a shared
//! [`Declarations`] set. Building a [`Registry`] resolves every contribution
//! into one class per model name, materialises the tables on a
//! [`Connection`] and exposes the models by dotted name.
//!
//! # Crates
//!
//! - `anyblok-core`: values, column descriptors, the `Connection` contract,
//!   errors and the `EnvironmentManager`.
//! - `anyblok-schema`: resolved columns to table definitions and DDL text.
//! - `anyblok-session`: the in-memory `Connection`.
//! - `anyblok-registry`: declarations, resolution, method chains and records.
//! - `anyblok-system`: the `System.Sequence` model.
//!
//! # Example
//!
//! ```ignore
//! use anyblok::prelude::*;
//!
//! let mut declarations = anyblok::declarations()?;
//! declarations.register_model(
//!     "Test",
//!     ClassBody::new()
//!         .column("id", Column::integer().primary_key())
//!         .column("name", Column::string()),
//! )?;
//!
//! let registry = anyblok::build_in_memory(&declarations)?;
//! let test = registry.get("Test")?;
//! let record = test.insert(values! { "name" => "test" })?;
//! assert_eq!(test.query().first()?, Some(record));
//! ```

use std::sync::Arc;

pub use anyblok_core::{
    Column, ColumnInfo, CompareOp, Connection, Environment, EnvironmentClass, EnvironmentError,
    EnvironmentManager, Error, FieldInfo, ForeignKeyInfo, ForeignKeyRef, Member, Predicate,
    ReferentialAction, Result, ScopedSessionFn, SequenceInfo, SqlType, TableInfo,
    ThreadEnvironment, Value, Values, values,
};
pub use anyblok_registry::{
    Args, Base, Category, ClassBody, ClassCall, Declaration, Declarations, InitializeCall,
    InsertCall, InstanceCall, ModelClass, ModelHandle, Query, Record, Registry, RegistryBuilder,
    RegistryConfig,
};
pub use anyblok_schema::{Dialect, SchemaBuilder};
pub use anyblok_session::{MemoryConfig, MemoryConnection};
pub use anyblok_system::Sequence;

/// Crate re-exports for code that needs the full module paths.
pub mod crates {
    pub use anyblok_core as core;
    pub use anyblok_registry as registry;
    pub use anyblok_schema as schema;
    pub use anyblok_session as session;
    pub use anyblok_system as system;
}

/// Everything needed to declare models and work with a registry.
pub mod prelude {
    pub use crate::{
        Args, Base, ClassBody, Column, Connection, Declarations, EnvironmentManager, Error,
        MemoryConnection, ModelHandle, Predicate, Record, Registry, RegistryConfig, Result,
        Sequence, SqlType, Value, Values, values,
    };
}

/// A declaration set holding the system models.
pub fn declarations() -> Result<Declarations> {
    let mut declarations = Declarations::new();
    anyblok_system::register(&mut declarations)?;
    Ok(declarations)
}

/// Build `declarations` on a fresh in-memory connection.
pub fn build_in_memory(declarations: &Declarations) -> Result<Registry> {
    let connection: Arc<dyn Connection> = Arc::new(MemoryConnection::new());
    tracing::debug!(declarations = declarations.len(), "Building in-memory registry");
    Registry::build(declarations, connection)
}
