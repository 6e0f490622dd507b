//! Materialised table and sequence definitions.
//!
//! These are what the storage layer receives: names are already resolved to
//! tables and every foreign key points at a concrete table column.

use serde::{Deserialize, Serialize};

use crate::column::ReferentialAction;
use crate::types::SqlType;
use crate::value::Value;

/// A concrete table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Value used when an insert omits the column.
    pub default: Option<Value>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Filled from an internal counter when omitted.
    pub auto_increment: bool,
    /// UNIQUE constraint.
    pub unique: bool,
}

impl ColumnInfo {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
        }
    }
}

/// A resolved foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name, if any.
    pub name: Option<String>,
    /// Local column.
    pub column: String,
    /// Referenced table.
    pub foreign_table: String,
    /// Referenced column.
    pub foreign_column: String,
    /// ON DELETE action.
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKeyInfo {
    /// Name used for the constraint when none was given.
    pub fn effective_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}", table, self.column))
    }
}

/// A table to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Dotted name of the model that owns the table.
    pub model: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnInfo>,
    /// Primary key column names.
    pub primary_key: Vec<String>,
    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    /// Look a column up by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table declares `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Tables this one references (excluding itself).
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.foreign_table.as_str())
            .filter(move |t| *t != self.name)
    }
}

/// A named counter to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInfo {
    /// Sequence name.
    pub name: String,
    /// First value issued; storage default when `None`.
    pub start: Option<i64>,
}

impl SequenceInfo {
    /// A sequence starting at the storage default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
        }
    }

    /// A sequence whose first issued value is `start`.
    pub fn starting_at(name: impl Into<String>, start: i64) -> Self {
        Self {
            name: name.into(),
            start: Some(start),
        }
    }
}
