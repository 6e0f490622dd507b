//! Filtered reads on a model's table.

use anyblok_core::{Predicate, Result, Values};

use crate::model::ModelHandle;
use crate::record::Record;

/// A query on one model. Predicates are combined with AND.
///
/// ```ignore
/// let first = registry.get("Test")?.query().filter_by(values! { "code" => "SO" }).first()?;
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    model: ModelHandle,
    filters: Vec<Predicate>,
    limit: Option<usize>,
}

impl Query {
    pub(crate) fn new(model: ModelHandle) -> Self {
        Self {
            model,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Add one equality predicate per entry.
    #[must_use]
    pub fn filter_by(mut self, values: &Values) -> Self {
        self.filters.extend(Predicate::all_eq(values));
        self
    }

    /// Return at most `n` records.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Current predicates.
    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    /// Number of matching rows.
    pub fn count(&self) -> Result<u64> {
        let table = self.model.require_table()?;
        self.model
            .registry()
            .connection()
            .count(table, &self.filters)
    }

    /// First matching record, in insertion order.
    pub fn first(&self) -> Result<Option<Record>> {
        Ok(self.fetch(Some(1))?.into_iter().next())
    }

    /// Every matching record.
    pub fn all(&self) -> Result<Vec<Record>> {
        self.fetch(self.limit)
    }

    fn fetch(&self, limit: Option<usize>) -> Result<Vec<Record>> {
        let table = self.model.require_table()?;
        let rows = self
            .model
            .registry()
            .connection()
            .select(table, &self.filters, limit)?;
        tracing::trace!(model = %self.model.name(), rows = rows.len(), "Fetched rows");
        Ok(rows
            .into_iter()
            .map(|row| Record::persisted(self.model.clone(), row))
            .collect())
    }
}
