//! The storage contract the registry is bound to.
//!
//! The registry only ever talks to storage through [`Connection`]: it creates
//! the materialised tables and sequences, advances named counters, and runs
//! simple CRUD and filtered reads. Operations are synchronous and either run
//! to completion or fail immediately.

use crate::error::Result;
use crate::filter::Predicate;
use crate::table::{SequenceInfo, TableInfo};
use crate::value::Values;

/// A storage connection.
///
/// Implementations must make [`Connection::next_value`] atomic: concurrent
/// callers never observe the same value twice for one sequence.
pub trait Connection: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Create a table. Fails with `TableExists` if it is already there.
    fn create_table(&self, table: &TableInfo) -> Result<()>;

    /// Whether a table of that name exists.
    fn has_table(&self, name: &str) -> bool;

    /// The stored definition of a table, if it exists.
    fn table_info(&self, name: &str) -> Option<TableInfo>;

    /// Create a named counter. Fails with `SequenceExists` on collision.
    fn create_sequence(&self, sequence: &SequenceInfo) -> Result<()>;

    /// Whether a sequence of that name exists.
    fn has_sequence(&self, name: &str) -> bool;

    /// Advance a counter and return the issued value.
    fn next_value(&self, sequence: &str) -> Result<i64>;

    /// Insert a row; returns the stored row including generated values.
    fn insert(&self, table: &str, values: &Values) -> Result<Values>;

    /// Apply `changes` to rows matching `filter`; returns the affected count.
    fn update(&self, table: &str, filter: &[Predicate], changes: &Values) -> Result<u64>;

    /// Read rows matching every predicate, in insertion order.
    fn select(&self, table: &str, filter: &[Predicate], limit: Option<usize>)
    -> Result<Vec<Values>>;

    /// Count rows matching every predicate.
    fn count(&self, table: &str, filter: &[Predicate]) -> Result<u64>;

    /// Start a transaction.
    fn begin(&self) -> Result<()>;

    /// Make the current transaction durable.
    fn commit(&self) -> Result<()>;

    /// Discard the current transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;
}
