//! PostgreSQL DDL generator.

use anyblok_core::{SequenceInfo, quote_ident};

use super::{DdlGenerator, Dialect, SchemaOperation, generate_create_table, generate_drop_table};

/// DDL generator for PostgreSQL.
pub struct PostgresDdlGenerator;

impl DdlGenerator for PostgresDdlGenerator {
    fn dialect(&self) -> &'static str {
        "postgres"
    }

    fn generate(&self, op: &SchemaOperation) -> Vec<String> {
        tracing::debug!(dialect = "postgres", op = ?op, "Generating DDL");

        let statements = match op {
            SchemaOperation::CreateTable(table) => {
                vec![generate_create_table(table, Dialect::Postgres)]
            }
            SchemaOperation::DropTable(name) => vec![generate_drop_table(name)],
            SchemaOperation::CreateSequence(sequence) => vec![postgres_create_sequence(sequence)],
            SchemaOperation::DropSequence(name) => {
                vec![format!("DROP SEQUENCE IF EXISTS {}", quote_ident(name))]
            }
        };

        for stmt in &statements {
            tracing::trace!(sql = %stmt, "Generated PostgreSQL DDL statement");
        }

        statements
    }
}

fn postgres_create_sequence(sequence: &SequenceInfo) -> String {
    match sequence.start {
        Some(start) => format!(
            "CREATE SEQUENCE IF NOT EXISTS {} START WITH {} MINVALUE {}",
            quote_ident(&sequence.name),
            start,
            start.min(1)
        ),
        None => format!("CREATE SEQUENCE IF NOT EXISTS {}", quote_ident(&sequence.name)),
    }
}
