//! Error types shared by every AnyBlok crate.

use std::error::Error as StdError;
use std::fmt;

use crate::environment::EnvironmentError;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Build errors abort registry initialisation as a whole; storage errors are
/// returned unchanged to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The environment manager rejected an operation.
    Environment(EnvironmentError),
    /// A declared dotted name or identifier is malformed.
    InvalidName { name: String, reason: &'static str },
    /// A declaration references a base that was never registered.
    UnknownBase { declared_in: String, base: String },
    /// The cross-name inheritance graph contains a cycle.
    CyclicInheritance { names: Vec<String> },
    /// No consistent layer order exists for a declaration's bases.
    InconsistentHierarchy { name: String },
    /// A column was redeclared with a different `nullable`/`primary_key` flag.
    IncompatibleRedeclaration {
        model: String,
        column: String,
        detail: String,
    },
    /// A foreign key target could not be resolved at materialisation time.
    UnresolvedForeignKey {
        model: String,
        column: String,
        target: String,
        reason: &'static str,
    },
    /// Two models materialise to the same table name.
    DuplicateTable { table: String, models: Vec<String> },
    /// An existing table no longer matches its resolved definition.
    SchemaMismatch { table: String, detail: String },
    /// No model of that name exists in the registry.
    UnknownModel(String),
    /// No layer of the resolution order implements the method.
    MethodNotFound { model: String, method: String },
    /// A storage operation was attempted on a model without a table.
    NotStorageBacked(String),
    /// A method received an argument it cannot use.
    InvalidArgument(String),
    /// A value does not fit the column type.
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        found: &'static str,
    },
    /// A NOT NULL column received no value.
    NotNullViolation { table: String, column: String },
    /// A primary key or unique column received a duplicate value.
    UniqueViolation {
        table: String,
        column: String,
        value: String,
    },
    /// A foreign key value references no existing row.
    ForeignKeyViolation {
        table: String,
        column: String,
        target: String,
    },
    /// The table does not exist in storage.
    NoSuchTable(String),
    /// The stored row behind a record is gone.
    NoSuchRow { table: String, key: String },
    /// The table already exists in storage.
    TableExists(String),
    /// A sequence of that name already exists.
    SequenceExists(String),
    /// The sequence was never created.
    NoSuchSequence(String),
    /// Invalid transaction state transition.
    Transaction(&'static str),
    /// Free-form error raised by user-declared methods.
    Custom(String),
}

impl Error {
    /// Create a free-form error.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// True for errors raised while resolving declarations.
    pub const fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidName { .. }
                | Error::UnknownBase { .. }
                | Error::CyclicInheritance { .. }
                | Error::InconsistentHierarchy { .. }
                | Error::IncompatibleRedeclaration { .. }
                | Error::UnresolvedForeignKey { .. }
                | Error::DuplicateTable { .. }
                | Error::SchemaMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Environment(err) => write!(f, "environment error: {}", err),
            Error::InvalidName { name, reason } => {
                write!(f, "invalid name {:?}: {}", name, reason)
            }
            Error::UnknownBase { declared_in, base } => {
                write!(f, "{} inherits unknown declaration {}", declared_in, base)
            }
            Error::CyclicInheritance { names } => {
                write!(f, "cyclic inheritance between: {}", names.join(", "))
            }
            Error::InconsistentHierarchy { name } => {
                write!(f, "cannot linearise the bases of {}", name)
            }
            Error::IncompatibleRedeclaration {
                model,
                column,
                detail,
            } => write!(
                f,
                "incompatible redeclaration of {}.{}: {}",
                model, column, detail
            ),
            Error::UnresolvedForeignKey {
                model,
                column,
                target,
                reason,
            } => write!(
                f,
                "foreign key {}.{} -> {} cannot be resolved: {}",
                model, column, target, reason
            ),
            Error::DuplicateTable { table, models } => write!(
                f,
                "table {} is claimed by several models: {}",
                table,
                models.join(", ")
            ),
            Error::SchemaMismatch { table, detail } => {
                write!(f, "existing table {} differs from its model: {}", table, detail)
            }
            Error::UnknownModel(name) => write!(f, "unknown model: {}", name),
            Error::MethodNotFound { model, method } => {
                write!(f, "{} has no method {:?} further down its layers", model, method)
            }
            Error::NotStorageBacked(name) => write!(f, "model {} has no table", name),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::TypeMismatch {
                table,
                column,
                expected,
                found,
            } => write!(
                f,
                "{}.{} expects {}, got {}",
                table, column, expected, found
            ),
            Error::NotNullViolation { table, column } => {
                write!(f, "{}.{} must not be null", table, column)
            }
            Error::UniqueViolation {
                table,
                column,
                value,
            } => write!(f, "duplicate value {} for {}.{}", value, table, column),
            Error::ForeignKeyViolation {
                table,
                column,
                target,
            } => write!(
                f,
                "{}.{} references a missing row in {}",
                table, column, target
            ),
            Error::NoSuchTable(name) => write!(f, "no such table: {}", name),
            Error::NoSuchRow { table, key } => write!(f, "no row of {} matches {}", table, key),
            Error::TableExists(name) => write!(f, "table already exists: {}", name),
            Error::SequenceExists(name) => write!(f, "sequence already exists: {}", name),
            Error::NoSuchSequence(name) => write!(f, "no such sequence: {}", name),
            Error::Transaction(msg) => write!(f, "transaction error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Environment(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EnvironmentError> for Error {
    fn from(err: EnvironmentError) -> Self {
        Error::Environment(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_cycle() {
        let err = Error::CyclicInheritance {
            names: vec!["Model.A".into(), "Model.B".into()],
        };
        assert_eq!(err.to_string(), "cyclic inheritance between: Model.A, Model.B");
        assert!(err.is_build_error());
    }

    #[test]
    fn test_duplicate_table_is_build_error() {
        let err = Error::DuplicateTable {
            table: "test_one".into(),
            models: vec!["Model.Test.One".into(), "Model.Test_One".into()],
        };
        assert_eq!(
            err.to_string(),
            "table test_one is claimed by several models: Model.Test.One, Model.Test_One"
        );
        assert!(err.is_build_error());
        assert!(!Error::NoSuchRow {
            table: "test".into(),
            key: "id=1".into()
        }
        .is_build_error());
    }

    #[test]
    fn test_environment_source() {
        let err = Error::from(EnvironmentError::NoEnvironment);
        assert!(err.source().is_some());
        assert!(!err.is_build_error());
    }
}
