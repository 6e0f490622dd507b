//! `System.Sequence`: persisted named counters with formatted output.
//!
//! Each row owns one storage counter (`seq_name`). Inserting a row provisions
//! its counter; `nextval` advances it, mirrors the issued value into `number`
//! and returns `prefix_number_suffix`.

use anyblok_core::{Column, Error, Result, SequenceInfo, Value, Values, values};
use anyblok_registry::{Args, ClassBody, Declarations, ModelHandle, Record, Registry};

/// Dotted name of the model.
pub const MODEL_NAME: &str = "System.Sequence";

/// Class attribute holding the name of the counter used to mint row counters.
pub const SEQ_NAME_ATTRIBUTE: &str = "cls_seq_name";

/// Default value of [`SEQ_NAME_ATTRIBUTE`].
pub const NAMING_SEQUENCE: &str = "system_sequence_seq_name";

/// Register `System.Sequence`.
pub fn register(declarations: &mut Declarations) -> Result<()> {
    declarations.register_model(MODEL_NAME, body())?;
    Ok(())
}

fn body() -> ClassBody {
    ClassBody::new()
        .attribute(SEQ_NAME_ATTRIBUTE, NAMING_SEQUENCE)
        .column("id", Column::integer().primary_key())
        .column("code", Column::string().nullable(false))
        .column("suffix", Column::string())
        .column("number", Column::integer().nullable(false))
        .column("prefix", Column::string())
        .column("seq_name", Column::string().nullable(false))
        .on_initialize(|call| {
            call.super_call()?;
            let name = naming_sequence(call.model())?;
            let connection = call.registry().connection();
            if !connection.has_sequence(&name) {
                connection.create_sequence(&SequenceInfo::new(name))?;
            }
            Ok(())
        })
        .on_insert(|call, values| {
            let values = create_sequence(call.model(), values)?;
            call.super_call(values)
        })
        .class_method("create_sequence", |call, args| {
            let values = create_sequence(call.model(), args.named_values().clone())?;
            Ok(Value::Json(values_to_json(&values)))
        })
        .method("nextval", |call, _| nextval(call.record_mut()))
        .class_method("nextval_by", |call, args| {
            nextval_by(call.model(), args.named_values())
        })
}

fn naming_sequence(model: &ModelHandle) -> Result<String> {
    model
        .attribute(SEQ_NAME_ATTRIBUTE)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_argument(format!("{} is not set", SEQ_NAME_ATTRIBUTE)))
}

fn values_to_json(values: &Values) -> serde_json::Value {
    serde_json::Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Provision the counter of a row about to be inserted.
///
/// A supplied `seq_name` is reused, the counter being created only when it
/// does not exist yet. Otherwise a name is minted from the table name and the
/// naming counter. A supplied `number` seeds the new counter; without one the
/// counter starts at its default and `number` is set to 0.
pub fn create_sequence(model: &ModelHandle, mut values: Values) -> Result<Values> {
    let connection = model.registry().connection();

    let supplied = values
        .get("seq_name")
        .filter(|v| !v.is_null())
        .map(|v| v.to_string());
    let (seq_name, reuse) = match supplied {
        Some(name) => (name, true),
        None => {
            let id = connection.next_value(&naming_sequence(model)?)?;
            let name = format!("{}_{}", model.require_table()?, id);
            values.insert("seq_name".to_string(), Value::from(name.clone()));
            (name, false)
        }
    };

    if reuse && connection.has_sequence(&seq_name) {
        tracing::debug!(seq_name = %seq_name, "Reusing sequence");
        values.entry("number".to_string()).or_insert(Value::Int(0));
        return Ok(values);
    }

    let sequence = match values.get("number").and_then(Value::as_i64) {
        Some(start) => SequenceInfo::starting_at(seq_name, start),
        None => {
            values.insert("number".to_string(), Value::Int(0));
            SequenceInfo::new(seq_name)
        }
    };
    connection.create_sequence(&sequence)?;
    tracing::debug!(seq_name = %sequence.name, start = ?sequence.start, "Created sequence");
    Ok(values)
}

/// Advance the row's counter, store the value in `number` and format it.
pub fn nextval(record: &mut Record) -> Result<Value> {
    let seq_name = record
        .get("seq_name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("sequence row has no seq_name"))?
        .to_string();
    let number = record
        .model()
        .registry()
        .connection()
        .next_value(&seq_name)?;
    record.update(values! { "number" => number })?;

    let part = |name: &str| {
        record
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let mut out = String::new();
    if let Some(prefix) = part("prefix") {
        out.push_str(prefix);
        out.push('_');
    }
    out.push_str(&number.to_string());
    if let Some(suffix) = part("suffix") {
        out.push('_');
        out.push_str(suffix);
    }
    Ok(Value::Text(out))
}

/// Next value of the first row matching every filter; `Null` when none does.
pub fn nextval_by(model: &ModelHandle, filters: &Values) -> Result<Value> {
    match model.query().filter_by(filters).first()? {
        Some(mut record) => record.call("nextval", &Args::new()),
        None => {
            tracing::debug!(filters = ?filters, "No sequence matches");
            Ok(Value::Null)
        }
    }
}

/// Typed access to `System.Sequence`.
#[derive(Debug, Clone)]
pub struct Sequence {
    model: ModelHandle,
}

impl Sequence {
    /// Look the model up in `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            model: registry.get(MODEL_NAME)?,
        })
    }

    /// The underlying model.
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Insert a sequence row, provisioning its counter.
    pub fn insert(&self, values: Values) -> Result<Record> {
        self.model.insert(values)
    }

    /// Next formatted value of `record`.
    pub fn nextval(record: &mut Record) -> Result<String> {
        match record.call("nextval", &Args::new())? {
            Value::Text(s) => Ok(s),
            other => Err(Error::custom(format!(
                "nextval returned {} instead of text",
                other.kind()
            ))),
        }
    }

    /// Next formatted value of the first row matching `filters`.
    pub fn nextval_by(&self, filters: Values) -> Result<Option<String>> {
        match self.model.call("nextval_by", &Args::named(filters))? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(Error::custom(format!(
                "nextval_by returned {} instead of text",
                other.kind()
            ))),
        }
    }
}
