//! DDL generation for the materialised schema.
//!
//! Each dialect implements [`DdlGenerator`], turning [`SchemaOperation`]s into
//! SQL statements. The registry never executes these itself; they are what a
//! SQL-backed connection would run to create the same schema the in-memory
//! backend holds.

mod postgres;
mod sqlite;

pub use postgres::PostgresDdlGenerator;
pub use sqlite::SqliteDdlGenerator;

use anyblok_core::{ColumnInfo, SequenceInfo, SqlType, TableInfo, Value, quote_ident};
use serde::{Deserialize, Serialize};

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// SQLite 3.
    #[default]
    Sqlite,
    /// PostgreSQL.
    Postgres,
}

impl Dialect {
    /// Generator for this dialect.
    pub fn generator(self) -> Box<dyn DdlGenerator> {
        match self {
            Dialect::Sqlite => Box::new(SqliteDdlGenerator),
            Dialect::Postgres => Box::new(PostgresDdlGenerator),
        }
    }
}

/// One schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaOperation {
    /// Create a table with its constraints.
    CreateTable(TableInfo),
    /// Drop a table.
    DropTable(String),
    /// Create a named counter.
    CreateSequence(SequenceInfo),
    /// Drop a named counter.
    DropSequence(String),
}

impl SchemaOperation {
    /// The operation undoing this one.
    pub fn inverse(&self) -> SchemaOperation {
        match self {
            SchemaOperation::CreateTable(table) => SchemaOperation::DropTable(table.name.clone()),
            SchemaOperation::CreateSequence(seq) => SchemaOperation::DropSequence(seq.name.clone()),
            SchemaOperation::DropTable(name) => SchemaOperation::DropTable(name.clone()),
            SchemaOperation::DropSequence(name) => SchemaOperation::DropSequence(name.clone()),
        }
    }
}

/// Generates DDL statements for one dialect.
pub trait DdlGenerator {
    /// Dialect name.
    fn dialect(&self) -> &'static str;

    /// Statements for a single operation.
    fn generate(&self, op: &SchemaOperation) -> Vec<String>;

    /// Statements for several operations, in order.
    fn generate_all(&self, ops: &[SchemaOperation]) -> Vec<String> {
        ops.iter().flat_map(|op| self.generate(op)).collect()
    }

    /// Statements undoing `ops`, last operation first.
    ///
    /// Drop operations cannot be reversed and are skipped.
    fn generate_rollback(&self, ops: &[SchemaOperation]) -> Vec<String> {
        ops.iter()
            .rev()
            .filter(|op| {
                matches!(
                    op,
                    SchemaOperation::CreateTable(_) | SchemaOperation::CreateSequence(_)
                )
            })
            .flat_map(|op| self.generate(&op.inverse()))
            .collect()
    }
}

/// Column type name in a dialect.
pub fn column_type_sql(sql_type: SqlType, dialect: Dialect) -> String {
    match (dialect, sql_type) {
        (Dialect::Sqlite, SqlType::Integer | SqlType::BigInteger | SqlType::SmallInteger) => {
            "INTEGER".to_string()
        }
        (Dialect::Sqlite, SqlType::Boolean) => "INTEGER".to_string(),
        (Dialect::Sqlite, SqlType::Float) => "REAL".to_string(),
        (Dialect::Sqlite, SqlType::Json) => "TEXT".to_string(),
        (Dialect::Sqlite, SqlType::LargeBinary) => "BLOB".to_string(),
        (Dialect::Postgres, SqlType::Float) => "DOUBLE PRECISION".to_string(),
        (Dialect::Postgres, SqlType::DateTime) => "TIMESTAMP".to_string(),
        (Dialect::Postgres, SqlType::Json) => "JSONB".to_string(),
        (Dialect::Postgres, SqlType::LargeBinary) => "BYTEA".to_string(),
        (_, other) => other.sql_name(),
    }
}

/// SQL literal for a default value.
pub fn literal_sql(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => match dialect {
            Dialect::Sqlite => if *b { "1" } else { "0" }.to_string(),
            Dialect::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
        },
        Value::Int(i) => i.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Decimal(d) => d.clone(),
        Value::Text(s) => quote_string(s),
        Value::Json(j) => quote_string(&j.to_string()),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            match dialect {
                Dialect::Sqlite => format!("X'{hex}'"),
                Dialect::Postgres => format!("'\\x{hex}'"),
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Column definition without table level constraints.
fn column_definition(column: &ColumnInfo, dialect: Dialect, inline_pk: bool) -> String {
    let mut def = quote_ident(&column.name);
    def.push(' ');

    match dialect {
        Dialect::Postgres if column.auto_increment => {
            def.push_str(if column.sql_type == SqlType::BigInteger {
                "BIGSERIAL"
            } else {
                "SERIAL"
            });
        }
        _ => def.push_str(&column_type_sql(column.sql_type, dialect)),
    }

    if inline_pk {
        def.push_str(" PRIMARY KEY");
        if dialect == Dialect::Sqlite && column.auto_increment {
            def.push_str(" AUTOINCREMENT");
        }
    } else if !column.nullable {
        def.push_str(" NOT NULL");
    }

    if column.unique && !column.primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&literal_sql(default, dialect));
    }

    def
}

/// `CREATE TABLE` statement with primary key and foreign key constraints.
pub fn generate_create_table(table: &TableInfo, dialect: Dialect) -> String {
    let inline_pk = table.primary_key.len() == 1;

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_definition(c, dialect, inline_pk && c.primary_key))
        .collect();

    if table.primary_key.len() > 1 {
        let cols: Vec<String> = table.primary_key.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    for fk in &table.foreign_keys {
        let mut constraint = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            quote_ident(&fk.effective_name(&table.name)),
            quote_ident(&fk.column),
            quote_ident(&fk.foreign_table),
            quote_ident(&fk.foreign_column),
        );
        if let Some(action) = fk.on_delete {
            constraint.push_str(" ON DELETE ");
            constraint.push_str(action.as_sql());
        }
        parts.push(constraint);
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quote_ident(&table.name),
        parts.join(",\n  ")
    )
}

/// `DROP TABLE` statement.
pub fn generate_drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(name))
}

/// Accumulates schema operations and renders them for one dialect.
///
/// # Example
///
/// ```
/// use anyblok_core::{ColumnInfo, SqlType, TableInfo};
/// use anyblok_schema::{Dialect, SchemaBuilder};
///
/// let table = TableInfo {
///     name: "test".to_string(),
///     model: "Test".to_string(),
///     columns: vec![ColumnInfo::new("name", SqlType::Text)],
///     primary_key: vec![],
///     foreign_keys: vec![],
/// };
/// let statements = SchemaBuilder::new(Dialect::Sqlite).create_table(&table).build();
/// assert_eq!(statements.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    dialect: Dialect,
    operations: Vec<SchemaOperation>,
}

impl SchemaBuilder {
    /// Create a builder for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            operations: Vec::new(),
        }
    }

    /// Queue a table creation.
    #[must_use]
    pub fn create_table(mut self, table: &TableInfo) -> Self {
        self.operations
            .push(SchemaOperation::CreateTable(table.clone()));
        self
    }

    /// Queue several tables, referenced tables first.
    #[must_use]
    pub fn create_tables(mut self, tables: &[TableInfo]) -> Self {
        for table in crate::creation_order(tables) {
            self.operations
                .push(SchemaOperation::CreateTable(table.clone()));
        }
        self
    }

    /// Queue a sequence creation.
    #[must_use]
    pub fn create_sequence(mut self, sequence: &SequenceInfo) -> Self {
        self.operations
            .push(SchemaOperation::CreateSequence(sequence.clone()));
        self
    }

    /// Queued operations.
    pub fn operations(&self) -> &[SchemaOperation] {
        &self.operations
    }

    /// Render every queued operation.
    pub fn build(&self) -> Vec<String> {
        self.dialect.generator().generate_all(&self.operations)
    }

    /// Render the statements undoing every queued operation.
    pub fn build_rollback(&self) -> Vec<String> {
        self.dialect.generator().generate_rollback(&self.operations)
    }
}
