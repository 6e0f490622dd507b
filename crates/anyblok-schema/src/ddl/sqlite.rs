//! SQLite DDL generator.
//!
//! SQLite has no sequence objects; a named counter is a one-row table holding
//! the last issued value.

use anyblok_core::{SequenceInfo, quote_ident};

use super::{DdlGenerator, Dialect, SchemaOperation, generate_create_table, generate_drop_table};

/// DDL generator for SQLite.
pub struct SqliteDdlGenerator;

impl DdlGenerator for SqliteDdlGenerator {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn generate(&self, op: &SchemaOperation) -> Vec<String> {
        tracing::debug!(dialect = "sqlite", op = ?op, "Generating DDL");

        let statements = match op {
            SchemaOperation::CreateTable(table) => {
                vec![generate_create_table(table, Dialect::Sqlite)]
            }
            SchemaOperation::DropTable(name) | SchemaOperation::DropSequence(name) => {
                vec![generate_drop_table(name)]
            }
            SchemaOperation::CreateSequence(sequence) => sqlite_create_sequence(sequence),
        };

        for stmt in &statements {
            tracing::trace!(sql = %stmt, "Generated SQLite DDL statement");
        }

        statements
    }
}

fn sqlite_create_sequence(sequence: &SequenceInfo) -> Vec<String> {
    let name = quote_ident(&sequence.name);
    let last = sequence.start.unwrap_or(1) - 1;
    vec![
        format!("CREATE TABLE IF NOT EXISTS {name} (\"value\" INTEGER NOT NULL)"),
        format!("INSERT INTO {name} (\"value\") VALUES ({last})"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyblok_core::{ColumnInfo, SqlType, TableInfo};

    fn make_column(name: &str, sql_type: SqlType, nullable: bool) -> ColumnInfo {
        ColumnInfo {
            nullable,
            ..ColumnInfo::new(name, sql_type)
        }
    }

    fn make_table(name: &str, columns: Vec<ColumnInfo>) -> TableInfo {
        TableInfo {
            name: name.to_string(),
            model: name.to_string(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn test_create_table() {
        let ddl = SqliteDdlGenerator;
        let table = make_table(
            "system_sequence",
            vec![
                make_column("code", SqlType::String { length: None }, false),
                make_column("flag", SqlType::Boolean, true),
            ],
        );
        let stmts = ddl.generate(&SchemaOperation::CreateTable(table));

        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("CREATE TABLE IF NOT EXISTS \"system_sequence\""));
        assert!(stmts[0].contains("\"code\" VARCHAR NOT NULL"));
        assert!(stmts[0].contains("\"flag\" INTEGER"));
    }

    #[test]
    fn test_create_sequence_emulated_by_table() {
        let ddl = SqliteDdlGenerator;
        let stmts = ddl.generate(&SchemaOperation::CreateSequence(
            SequenceInfo::starting_at("system_sequence_1", 10),
        ));

        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE TABLE IF NOT EXISTS \"system_sequence_1\""));
        assert_eq!(
            stmts[1],
            "INSERT INTO \"system_sequence_1\" (\"value\") VALUES (9)"
        );
    }

    #[test]
    fn test_drop_sequence() {
        let ddl = SqliteDdlGenerator;
        let stmts = ddl.generate(&SchemaOperation::DropSequence("seq".to_string()));
        assert_eq!(stmts, vec!["DROP TABLE IF EXISTS \"seq\"".to_string()]);
    }

    #[test]
    fn test_dialect() {
        let ddl = SqliteDdlGenerator;
        assert_eq!(ddl.dialect(), "sqlite");
    }

    #[test]
    fn test_generate_all() {
        let ddl = SqliteDdlGenerator;
        let ops = vec![
            SchemaOperation::CreateTable(make_table(
                "test",
                vec![make_column("id", SqlType::Integer, false)],
            )),
            SchemaOperation::CreateSequence(SequenceInfo::new("test_seq")),
        ];
        assert_eq!(ddl.generate_all(&ops).len(), 3);
    }
}
