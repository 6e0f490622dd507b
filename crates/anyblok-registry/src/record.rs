//! Model instances.

use anyblok_core::{Error, Predicate, Result, Value, Values};

use crate::args::Args;
use crate::chain::InstanceCall;
use crate::model::ModelHandle;

/// An instance of a resolved model.
///
/// Equality compares the model name and the values, so a record read back
/// from storage equals the record returned by `insert`.
#[derive(Debug, Clone)]
pub struct Record {
    model: ModelHandle,
    values: Values,
    persisted: bool,
}

impl Record {
    pub(crate) fn persisted(model: ModelHandle, values: Values) -> Self {
        Self {
            model,
            values,
            persisted: true,
        }
    }

    pub(crate) fn transient(model: ModelHandle, values: Values) -> Self {
        Self {
            model,
            values,
            persisted: false,
        }
    }

    /// The record's model.
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Dotted name of the record's model.
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Value of a column; `None` when the record does not carry it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Every value of the record.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Consume the record, keeping its values.
    pub fn into_values(self) -> Values {
        self.values
    }

    /// Whether the record was read from or written to storage.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Call an instance method.
    pub fn call(&mut self, method: &str, args: &Args) -> Result<Value> {
        let model = self.model.clone();
        let chain = model
            .class()
            .methods
            .get(method)
            .map_or(&[][..], Vec::as_slice);
        let mut call = InstanceCall::start(self, method, chain);
        call.super_call(args)
    }

    /// Write `changes` and refresh the record from storage.
    ///
    /// Non-persisted records are only updated in memory.
    #[tracing::instrument(level = "debug", skip(self, changes), fields(model = %self.model.name()))]
    pub fn update(&mut self, changes: Values) -> Result<()> {
        for name in changes.keys() {
            if self.model.class().field(name).is_none() {
                return Err(Error::invalid_argument(format!(
                    "{} has no column {}",
                    self.model.name(),
                    name
                )));
            }
        }

        if !self.persisted {
            self.values.extend(changes);
            return Ok(());
        }

        let table = self.model.require_table()?;
        let filter = self.primary_key_filter()?;
        let connection = self.model.registry().connection();
        let updated = connection.update(table, &filter, &changes)?;
        tracing::debug!(updated, "Updated record");
        if updated == 0 {
            return Err(self.missing_row(table));
        }

        self.values.extend(changes);
        self.refresh()
    }

    /// Reload the values from storage using the primary key.
    ///
    /// Fails with `NoSuchRow` when the stored row is gone, for instance after
    /// the transaction that inserted it was rolled back.
    pub fn refresh(&mut self) -> Result<()> {
        let table = self.model.require_table()?;
        let filter = self.primary_key_filter()?;
        let rows = self
            .model
            .registry()
            .connection()
            .select(table, &filter, Some(1))?;
        let Some(row) = rows.into_iter().next() else {
            return Err(self.missing_row(table));
        };
        self.values = row;
        self.persisted = true;
        Ok(())
    }

    fn missing_row(&self, table: &str) -> Error {
        let key = self
            .model
            .class()
            .primary_key()
            .into_iter()
            .map(|c| format!("{}={}", c, self.values.get(c).cloned().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(", ");
        Error::NoSuchRow {
            table: table.to_string(),
            key,
        }
    }

    /// Equality predicates on the primary key columns.
    fn primary_key_filter(&self) -> Result<Vec<Predicate>> {
        let pk = self.model.class().primary_key();
        if pk.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{} has no primary key",
                self.model.name()
            )));
        }
        Ok(pk
            .into_iter()
            .map(|c| Predicate::eq(c, self.values.get(c).cloned().unwrap_or_default()))
            .collect())
    }

    /// Plain JSON object of the values.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.values == other.values
    }
}
