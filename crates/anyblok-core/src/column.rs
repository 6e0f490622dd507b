//! Column descriptors as declared in model and mixin bodies.
//!
//! A [`Column`] is pure declaration data: its foreign key names the target
//! model and column instead of pointing at them, so a column may reference a
//! model that is registered later. Resolution happens when tables are
//! materialised, after every declaration has been merged.

use serde::{Deserialize, Serialize};

use crate::types::SqlType;
use crate::value::Value;

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Raise an error if any references exist.
    #[default]
    NoAction,
    /// Same as NO ACTION.
    Restrict,
    /// Delete/update referencing rows.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their defaults.
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// A foreign key reference by declared model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Dotted name of the target model (e.g. `"System.Sequence"`).
    pub model: String,
    /// Target column name.
    pub column: String,
    /// ON DELETE action.
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKeyRef {
    /// `model.column` form used in messages.
    pub fn target(&self) -> String {
        format!("{}.{}", self.model, self.column)
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether NULL is allowed. Defaults to `true`.
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    pub primary_key: bool,
    /// Explicit auto-increment flag; `None` lets the materializer decide.
    pub auto_increment: Option<bool>,
    /// UNIQUE constraint.
    pub unique: bool,
    /// Value used when an insert omits the column.
    pub default: Option<Value>,
    /// Foreign key reference, resolved by name.
    pub foreign_key: Option<ForeignKeyRef>,
}

impl Column {
    /// Create a nullable, non-key column of the given type.
    pub const fn new(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            nullable: true,
            primary_key: false,
            auto_increment: None,
            unique: false,
            default: None,
            foreign_key: None,
        }
    }

    /// `Integer` column.
    pub const fn integer() -> Self {
        Self::new(SqlType::Integer)
    }

    /// `BigInteger` column.
    pub const fn big_integer() -> Self {
        Self::new(SqlType::BigInteger)
    }

    /// `SmallInteger` column.
    pub const fn small_integer() -> Self {
        Self::new(SqlType::SmallInteger)
    }

    /// `Boolean` column.
    pub const fn boolean() -> Self {
        Self::new(SqlType::Boolean)
    }

    /// Unbounded `String` column.
    pub const fn string() -> Self {
        Self::new(SqlType::String { length: None })
    }

    /// `String` column bounded to `length` characters.
    pub const fn string_of(length: u32) -> Self {
        Self::new(SqlType::String {
            length: Some(length),
        })
    }

    /// `Text` column.
    pub const fn text() -> Self {
        Self::new(SqlType::Text)
    }

    /// `Float` column.
    pub const fn float() -> Self {
        Self::new(SqlType::Float)
    }

    /// `Decimal(precision, scale)` column.
    pub const fn decimal(precision: u8, scale: u8) -> Self {
        Self::new(SqlType::Decimal { precision, scale })
    }

    /// `Date` column.
    pub const fn date() -> Self {
        Self::new(SqlType::Date)
    }

    /// `DateTime` column.
    pub const fn datetime() -> Self {
        Self::new(SqlType::DateTime)
    }

    /// `Json` column.
    pub const fn json() -> Self {
        Self::new(SqlType::Json)
    }

    /// `LargeBinary` column.
    pub const fn binary() -> Self {
        Self::new(SqlType::LargeBinary)
    }

    /// Mark as primary key. Primary keys are never nullable.
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Force the auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = Some(value);
        self
    }

    /// Add a UNIQUE constraint.
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set default value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Reference `model.column`; the model may be declared later.
    pub fn foreign_key(mut self, model: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            model: model.into(),
            column: column.into(),
            on_delete: None,
        });
        self
    }

    /// Set ON DELETE action for foreign key.
    ///
    /// This is only meaningful when `foreign_key` is also set.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.foreign_key.as_mut() {
            fk.on_delete = Some(action);
        }
        self
    }

    /// Describe a flag difference that forbids redeclaring `self` as `other`.
    ///
    /// Type changes are allowed; `nullable` and `primary_key` must match.
    pub fn incompatibility_with(&self, other: &Column) -> Option<String> {
        if self.primary_key != other.primary_key {
            return Some(format!(
                "primary_key changes from {} to {}",
                self.primary_key, other.primary_key
            ));
        }
        if self.nullable != other.nullable {
            return Some(format!(
                "nullable changes from {} to {}",
                self.nullable, other.nullable
            ));
        }
        None
    }
}

/// A named column of a resolved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Column name.
    pub name: String,
    /// Declaration that won for this name.
    pub column: Column,
}

impl FieldInfo {
    /// Pair a name with its column.
    pub fn new(name: impl Into<String>, column: Column) -> Self {
        Self {
            name: name.into(),
            column,
        }
    }
}
