//! Core types and traits for AnyBlok.
//!
//! `anyblok-core` is the **foundation layer** of the workspace. It defines the
//! data types and the storage contract every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value`, `SqlType`, `Column` (declared columns) and
//!   `TableInfo` (materialised tables) are shared by the schema, registry and
//!   storage crates.
//! - **Contract layer**: `Connection` is what the registry is bound to; the
//!   in-memory backend in `anyblok-session` implements it.
//! - **Ambient context**: `EnvironmentManager` carries per-thread values such
//!   as the current database name.
//!
//! # Who Uses This Crate
//!
//! - `anyblok-schema` turns resolved model columns into `TableInfo` and DDL.
//! - `anyblok-registry` stores `Column` declarations and drives `Connection`.
//! - `anyblok-session` implements `Connection`.
//!
//! Most applications should use the `anyblok` facade.

pub mod column;
pub mod connection;
pub mod environment;
pub mod error;
pub mod filter;
pub mod identifiers;
pub mod table;
pub mod types;
pub mod value;

pub use column::{Column, FieldInfo, ForeignKeyRef, ReferentialAction};
pub use connection::Connection;
pub use environment::{
    Environment, EnvironmentClass, EnvironmentError, EnvironmentManager, Member,
    ScopedSessionFn, ThreadEnvironment,
};
pub use error::{Error, Result};
pub use filter::{CompareOp, Predicate, compare_values};
pub use identifiers::{quote_ident, sanitize_identifier, table_name_for};
pub use table::{ColumnInfo, ForeignKeyInfo, SequenceInfo, TableInfo};
pub use types::SqlType;
pub use value::{Value, Values};
