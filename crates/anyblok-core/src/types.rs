//! SQL column types and value compatibility.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The storage type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// 16-bit integer.
    SmallInteger,
    /// Boolean.
    Boolean,
    /// Variable length string, optionally bounded.
    String { length: Option<u32> },
    /// Unbounded text.
    Text,
    /// Floating point.
    Float,
    /// Exact decimal.
    Decimal { precision: u8, scale: u8 },
    /// Calendar date (ISO-8601 text).
    Date,
    /// Date and time (ISO-8601 text).
    DateTime,
    /// JSON document.
    Json,
    /// Binary blob.
    LargeBinary,
}

impl SqlType {
    /// Generic SQL name of the type.
    #[must_use]
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInteger => "BIGINT".to_string(),
            SqlType::SmallInteger => "SMALLINT".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::String { length: Some(n) } => format!("VARCHAR({})", n),
            SqlType::String { length: None } => "VARCHAR".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Date => "DATE".to_string(),
            SqlType::DateTime => "TIMESTAMP".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::LargeBinary => "BLOB".to_string(),
        }
    }

    /// True for every integer width.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::Integer | SqlType::BigInteger | SqlType::SmallInteger
        )
    }

    /// Whether a value may be stored in a column of this type.
    ///
    /// `Null` is always accepted here; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (t, Value::Int(i)) if t.is_integer() => self.int_in_range(*i),
            (SqlType::Boolean, Value::Bool(_)) => true,
            (SqlType::String { length }, Value::Text(s)) => {
                length.is_none_or(|n| s.chars().count() <= n as usize)
            }
            (SqlType::Text | SqlType::Date | SqlType::DateTime, Value::Text(_)) => true,
            (SqlType::Float, Value::Double(_) | Value::Int(_)) => true,
            (SqlType::Decimal { .. }, Value::Decimal(_) | Value::Int(_) | Value::Double(_)) => {
                true
            }
            (SqlType::Json, _) => true,
            (SqlType::LargeBinary, Value::Bytes(_)) => true,
            _ => false,
        }
    }

    /// Normalize an accepted value to the canonical stored representation.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (SqlType::Float, Value::Int(i)) => Value::Double(i as f64),
            (SqlType::Decimal { .. }, Value::Int(i)) => Value::Decimal(i.to_string()),
            (SqlType::Decimal { .. }, Value::Double(d)) => Value::Decimal(d.to_string()),
            (_, v) => v,
        }
    }

    fn int_in_range(&self, i: i64) -> bool {
        match self {
            SqlType::SmallInteger => i16::try_from(i).is_ok(),
            SqlType::Integer => i32::try_from(i).is_ok(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_names() {
        assert_eq!(SqlType::Integer.sql_name(), "INTEGER");
        assert_eq!(SqlType::String { length: Some(64) }.sql_name(), "VARCHAR(64)");
        assert_eq!(
            SqlType::Decimal {
                precision: 10,
                scale: 2
            }
            .sql_name(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn test_accepts() {
        assert!(SqlType::Integer.accepts(&Value::Int(1)));
        assert!(!SqlType::Integer.accepts(&Value::Text("1".into())));
        assert!(!SqlType::Integer.accepts(&Value::Int(i64::from(i32::MAX) + 1)));
        assert!(SqlType::BigInteger.accepts(&Value::Int(i64::from(i32::MAX) + 1)));
        assert!(SqlType::String { length: None }.accepts(&Value::Text("x".into())));
        assert!(!SqlType::String { length: Some(2) }.accepts(&Value::Text("xyz".into())));
        assert!(SqlType::Text.accepts(&Value::Null));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(SqlType::Float.coerce(Value::Int(2)), Value::Double(2.0));
        assert_eq!(
            SqlType::Decimal {
                precision: 4,
                scale: 0
            }
            .coerce(Value::Int(3)),
            Value::Decimal("3".into())
        );
    }
}
