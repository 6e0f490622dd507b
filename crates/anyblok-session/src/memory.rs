//! In-memory [`Connection`] implementation.
//!
//! Rows live in insertion order inside per-table vectors guarded by a single
//! mutex. Transactions snapshot the table data on `begin` and restore it on
//! `rollback`. Sequences live outside the snapshot, so values issued inside a
//! rolled back transaction are never handed out again.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyblok_core::{
    ColumnInfo, Connection, Error, Predicate, Result, SequenceInfo, TableInfo, Value, Values,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Behaviour switches for [`MemoryConnection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Reject inserts and updates whose foreign key values reference no row.
    pub enforce_foreign_keys: bool,
    /// First value of a sequence created without an explicit start.
    pub default_sequence_start: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enforce_foreign_keys: true,
            default_sequence_start: 1,
        }
    }
}

const NULL: &Value = &Value::Null;

// ============================================================================
// Storage State
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryTable {
    info: TableInfo,
    rows: Vec<Values>,
    next_serial: i64,
}

impl MemoryTable {
    fn new(info: TableInfo) -> Self {
        Self {
            info,
            rows: Vec::new(),
            next_serial: 1,
        }
    }

    fn column(&self, name: &str) -> Result<&ColumnInfo> {
        self.info.column(name).ok_or_else(|| {
            Error::invalid_argument(format!(
                "table {} has no column {}",
                self.info.name, name
            ))
        })
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    sequences: BTreeMap<String, i64>,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
}

impl State {
    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A storage connection keeping everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    config: MemoryConfig,
    state: Mutex<State>,
}

impl MemoryConnection {
    /// Create an empty connection with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty connection with the given configuration.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Names of every table, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Coerce and type-check one value against its column.
    fn checked_value(table: &str, column: &ColumnInfo, value: Value) -> Result<Value> {
        if !column.sql_type.accepts(&value) {
            return Err(Error::TypeMismatch {
                table: table.to_string(),
                column: column.name.clone(),
                expected: column.sql_type.sql_name(),
                found: value.kind(),
            });
        }
        let value = column.sql_type.coerce(value);
        if value.is_null() && !column.nullable {
            return Err(Error::NotNullViolation {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        Ok(value)
    }

    /// Check primary key and unique constraints of `row` against `others`.
    fn check_unique<'a>(
        info: &TableInfo,
        row: &Values,
        others: impl Iterator<Item = &'a Values> + Clone,
    ) -> Result<()> {
        let violation = |column: &str, value: &Value| Error::UniqueViolation {
            table: info.name.clone(),
            column: column.to_string(),
            value: value.to_string(),
        };

        if !info.primary_key.is_empty() {
            let key: Vec<&Value> = info
                .primary_key
                .iter()
                .map(|c| row.get(c).unwrap_or(NULL))
                .collect();
            let clash = others.clone().any(|other| {
                info.primary_key
                    .iter()
                    .zip(&key)
                    .all(|(c, v)| other.get(c).unwrap_or(NULL) == *v)
            });
            if clash {
                let shown = info.primary_key.join(", ");
                let value = if key.len() == 1 {
                    key[0].clone()
                } else {
                    Value::Text(
                        key.iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    )
                };
                return Err(violation(&shown, &value));
            }
        }

        for column in info.columns.iter().filter(|c| c.unique && !c.primary_key) {
            let Some(value) = row.get(&column.name).filter(|v| !v.is_null()) else {
                continue;
            };
            if others
                .clone()
                .any(|other| other.get(&column.name) == Some(value))
            {
                return Err(violation(&column.name, value));
            }
        }
        Ok(())
    }

    /// Check every non-null foreign key value of `row` references a row.
    fn check_foreign_keys(&self, state: &State, info: &TableInfo, row: &Values) -> Result<()> {
        if !self.config.enforce_foreign_keys {
            return Ok(());
        }
        for fk in &info.foreign_keys {
            let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let references = |r: &Values| r.get(&fk.foreign_column) == Some(value);
            let found = match state.tables.get(&fk.foreign_table) {
                // Self references may point at the row itself.
                Some(t) if fk.foreign_table == info.name => {
                    references(row) || t.rows.iter().any(references)
                }
                Some(t) => t.rows.iter().any(references),
                None => false,
            };
            if !found {
                return Err(Error::ForeignKeyViolation {
                    table: info.name.clone(),
                    column: fk.column.clone(),
                    target: format!("{}.{}", fk.foreign_table, fk.foreign_column),
                });
            }
        }
        Ok(())
    }
}

fn matches_all(filter: &[Predicate], row: &Values) -> bool {
    filter.iter().all(|p| p.matches(row))
}

impl Connection for MemoryConnection {
    fn backend(&self) -> &'static str {
        "memory"
    }

    #[tracing::instrument(level = "debug", skip(self, table), fields(table = %table.name))]
    fn create_table(&self, table: &TableInfo) -> Result<()> {
        let mut state = self.lock();
        if state.tables.contains_key(&table.name) {
            return Err(Error::TableExists(table.name.clone()));
        }
        state
            .tables
            .insert(table.name.clone(), MemoryTable::new(table.clone()));
        tracing::debug!(columns = table.columns.len(), "Created table");
        Ok(())
    }

    fn table_info(&self, name: &str) -> Option<TableInfo> {
        self.lock().tables.get(name).map(|t| t.info.clone())
    }

    fn has_table(&self, name: &str) -> bool {
        self.lock().tables.contains_key(name)
    }

    #[tracing::instrument(level = "debug", skip(self, sequence), fields(sequence = %sequence.name))]
    fn create_sequence(&self, sequence: &SequenceInfo) -> Result<()> {
        let mut state = self.lock();
        if state.sequences.contains_key(&sequence.name) {
            return Err(Error::SequenceExists(sequence.name.clone()));
        }
        let start = sequence.start.unwrap_or(self.config.default_sequence_start);
        state.sequences.insert(sequence.name.clone(), start);
        tracing::debug!(start, "Created sequence");
        Ok(())
    }

    fn has_sequence(&self, name: &str) -> bool {
        self.lock().sequences.contains_key(name)
    }

    fn next_value(&self, sequence: &str) -> Result<i64> {
        let mut state = self.lock();
        let next = state
            .sequences
            .get_mut(sequence)
            .ok_or_else(|| Error::NoSuchSequence(sequence.to_string()))?;
        let value = *next;
        *next += 1;
        tracing::trace!(sequence, value, "Issued sequence value");
        Ok(value)
    }

    #[tracing::instrument(level = "debug", skip(self, values))]
    fn insert(&self, table: &str, values: &Values) -> Result<Values> {
        let mut state = self.lock();
        let stored = state.table(table)?;

        for name in values.keys() {
            stored.column(name)?;
        }

        let mut row = Values::new();
        let mut next_serial = stored.next_serial;
        for column in &stored.info.columns {
            let mut value = values
                .get(&column.name)
                .cloned()
                .or_else(|| column.default.clone())
                .unwrap_or_default();
            if column.auto_increment && value.is_null() {
                value = Value::Int(next_serial);
            }
            let value = Self::checked_value(table, column, value)?;
            if column.auto_increment {
                if let Some(i) = value.as_i64() {
                    next_serial = next_serial.max(i + 1);
                }
            }
            row.insert(column.name.clone(), value);
        }

        Self::check_unique(&stored.info, &row, stored.rows.iter())?;
        let info = stored.info.clone();
        self.check_foreign_keys(&state, &info, &row)?;

        let stored = state.table_mut(table)?;
        stored.next_serial = next_serial;
        stored.rows.push(row.clone());
        tracing::trace!(rows = stored.rows.len(), "Inserted row");
        Ok(row)
    }

    #[tracing::instrument(level = "debug", skip(self, filter, changes))]
    fn update(&self, table: &str, filter: &[Predicate], changes: &Values) -> Result<u64> {
        let mut state = self.lock();
        let stored = state.table(table)?;

        let mut checked = Values::new();
        for (name, value) in changes {
            let column = stored.column(name)?;
            checked.insert(name.clone(), Self::checked_value(table, column, value.clone())?);
        }

        let mut rows = stored.rows.clone();
        let mut touched = Vec::new();
        for (idx, row) in rows.iter_mut().enumerate() {
            if matches_all(filter, row) {
                row.extend(checked.iter().map(|(k, v)| (k.clone(), v.clone())));
                touched.push(idx);
            }
        }

        let info = stored.info.clone();
        for &idx in &touched {
            let others = rows
                .iter()
                .enumerate()
                .filter(move |(i, _)| *i != idx)
                .map(|(_, r)| r);
            Self::check_unique(&info, &rows[idx], others)?;
            self.check_foreign_keys(&state, &info, &rows[idx])?;
        }

        state.table_mut(table)?.rows = rows;
        tracing::trace!(updated = touched.len(), "Updated rows");
        Ok(touched.len() as u64)
    }

    fn select(
        &self,
        table: &str,
        filter: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<Values>> {
        let state = self.lock();
        let stored = state.table(table)?;
        for predicate in filter {
            stored.column(&predicate.column)?;
        }
        Ok(stored
            .rows
            .iter()
            .filter(|row| matches_all(filter, row))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn count(&self, table: &str, filter: &[Predicate]) -> Result<u64> {
        let state = self.lock();
        let stored = state.table(table)?;
        for predicate in filter {
            stored.column(&predicate.column)?;
        }
        Ok(stored
            .rows
            .iter()
            .filter(|row| matches_all(filter, row))
            .count() as u64)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn begin(&self) -> Result<()> {
        let mut state = self.lock();
        if state.snapshot.is_some() {
            return Err(Error::Transaction("transaction already open"));
        }
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn commit(&self) -> Result<()> {
        let mut state = self.lock();
        if state.snapshot.take().is_none() {
            return Err(Error::Transaction("no open transaction"));
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn rollback(&self) -> Result<()> {
        let mut state = self.lock();
        let snapshot = state
            .snapshot
            .take()
            .ok_or(Error::Transaction("no open transaction"))?;
        state.tables = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.lock().snapshot.is_some()
    }
}
