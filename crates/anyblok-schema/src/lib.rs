//! Schema materialisation for AnyBlok.
//!
//! `anyblok-schema` sits between the registry and storage. It receives the
//! resolved column set of every model and produces:
//!
//! - [`TableInfo`](anyblok_core::TableInfo) definitions with foreign keys
//!   resolved by model name ([`materialize`]),
//! - a dependency ordering for table creation ([`creation_order`]),
//! - dialect specific DDL text ([`SchemaBuilder`], [`DdlGenerator`]).

pub mod ddl;
pub mod materialize;

pub use ddl::{
    DdlGenerator, Dialect, PostgresDdlGenerator, SchemaBuilder, SchemaOperation,
    SqliteDdlGenerator, column_type_sql, generate_create_table, literal_sql,
};
pub use materialize::{ModelSchema, creation_order, materialize};
