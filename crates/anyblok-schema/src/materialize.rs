//! Column/field materializer.
//!
//! Turns the resolved column sets of every storage-backed model into
//! [`TableInfo`] definitions. Foreign keys are declared by model name and are
//! resolved here, against the complete set of models, so a model may reference
//! another one that was registered after it.

use std::collections::{HashMap, HashSet};

use anyblok_core::{
    ColumnInfo, Error, FieldInfo, ForeignKeyInfo, ForeignKeyRef, Result, TableInfo,
};
use serde::{Deserialize, Serialize};

/// The resolved schema of one model, as handed over by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Dotted model name.
    pub name: String,
    /// Table name; `None` for models without storage.
    pub table_name: Option<String>,
    /// Resolved columns in declaration order.
    pub fields: Vec<FieldInfo>,
}

impl ModelSchema {
    /// Look a field up by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Build one table per storage-backed model.
///
/// Every model gets its own copy of its columns; mixins shared by several
/// models never share column definitions.
#[tracing::instrument(level = "debug", skip(models), fields(models = models.len()))]
pub fn materialize(models: &[ModelSchema]) -> Result<Vec<TableInfo>> {
    let by_name: HashMap<&str, &ModelSchema> =
        models.iter().map(|m| (m.name.as_str(), m)).collect();

    let mut owners: HashMap<&str, &str> = HashMap::new();
    let mut tables = Vec::new();
    for model in models {
        let Some(table_name) = model.table_name.as_deref() else {
            continue;
        };
        if model.fields.is_empty() {
            continue;
        }
        if let Some(owner) = owners.insert(table_name, model.name.as_str()) {
            return Err(Error::DuplicateTable {
                table: table_name.to_string(),
                models: vec![owner.to_string(), model.name.clone()],
            });
        }
        tables.push(materialize_model(model, table_name, &by_name)?);
    }

    tracing::info!(tables = tables.len(), "Materialized tables");
    Ok(tables)
}

fn materialize_model(
    model: &ModelSchema,
    table_name: &str,
    by_name: &HashMap<&str, &ModelSchema>,
) -> Result<TableInfo> {
    let primary_key: Vec<String> = model
        .fields
        .iter()
        .filter(|f| f.column.primary_key)
        .map(|f| f.name.clone())
        .collect();

    let mut columns = Vec::with_capacity(model.fields.len());
    let mut foreign_keys = Vec::new();

    for field in &model.fields {
        let column = &field.column;
        let implicit_serial = primary_key.len() == 1
            && column.primary_key
            && column.sql_type.is_integer()
            && column.foreign_key.is_none();

        columns.push(ColumnInfo {
            name: field.name.clone(),
            sql_type: column.sql_type,
            nullable: column.nullable && !column.primary_key,
            default: column.default.clone(),
            primary_key: column.primary_key,
            auto_increment: column.auto_increment.unwrap_or(implicit_serial),
            unique: column.unique,
        });

        if let Some(fk) = &column.foreign_key {
            foreign_keys.push(resolve_foreign_key(model, field, fk, by_name)?);
        }
    }

    tracing::debug!(
        model = %model.name,
        table = table_name,
        columns = columns.len(),
        foreign_keys = foreign_keys.len(),
        "Materialized model"
    );

    Ok(TableInfo {
        name: table_name.to_string(),
        model: model.name.clone(),
        columns,
        primary_key,
        foreign_keys,
    })
}

fn resolve_foreign_key(
    model: &ModelSchema,
    field: &FieldInfo,
    fk: &ForeignKeyRef,
    by_name: &HashMap<&str, &ModelSchema>,
) -> Result<ForeignKeyInfo> {
    let unresolved = |reason: &'static str| Error::UnresolvedForeignKey {
        model: model.name.clone(),
        column: field.name.clone(),
        target: fk.target(),
        reason,
    };

    let target = by_name
        .get(fk.model.as_str())
        .ok_or_else(|| unresolved("no model of that name"))?;
    let target_table = target
        .table_name
        .as_deref()
        .filter(|_| !target.fields.is_empty())
        .ok_or_else(|| unresolved("target model has no table"))?;
    let target_field = target
        .field(&fk.column)
        .ok_or_else(|| unresolved("target model has no such column"))?;

    if !target_field.column.primary_key && !target_field.column.unique {
        tracing::warn!(
            model = %model.name,
            column = %field.name,
            target = %fk.target(),
            "Foreign key targets a column that is neither primary key nor unique"
        );
    }

    Ok(ForeignKeyInfo {
        name: None,
        column: field.name.clone(),
        foreign_table: target_table.to_string(),
        foreign_column: fk.column.clone(),
        on_delete: fk.on_delete,
    })
}

/// Order tables so that every referenced table comes before its referrers.
///
/// Self references are ignored. Tables caught in a reference cycle keep their
/// original relative order.
pub fn creation_order(tables: &[TableInfo]) -> Vec<&TableInfo> {
    let by_name: HashMap<&str, &TableInfo> = tables.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut ordered = Vec::with_capacity(tables.len());
    let mut done: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        table: &'a TableInfo,
        by_name: &HashMap<&str, &'a TableInfo>,
        done: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        ordered: &mut Vec<&'a TableInfo>,
    ) {
        if done.contains(table.name.as_str()) {
            return;
        }
        if !visiting.insert(table.name.as_str()) {
            tracing::warn!(table = %table.name, "Foreign key cycle, keeping declaration order");
            return;
        }
        for referenced in table.referenced_tables() {
            if let Some(dep) = by_name.get(referenced) {
                visit(dep, by_name, done, visiting, ordered);
            }
        }
        visiting.remove(table.name.as_str());
        if done.insert(table.name.as_str()) {
            ordered.push(table);
        }
    }

    for table in tables {
        visit(table, &by_name, &mut done, &mut visiting, &mut ordered);
    }
    ordered
}
