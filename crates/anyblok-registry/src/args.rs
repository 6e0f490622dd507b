//! Method call arguments.

use anyblok_core::{Error, Result, Value, Values};

/// Positional and named arguments of a dynamic method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Values,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments only.
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            named: Values::new(),
        }
    }

    /// Named arguments only.
    pub fn named(values: Values) -> Self {
        Self {
            positional: Vec::new(),
            named: values,
        }
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Named argument.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Every named argument.
    pub fn named_values(&self) -> &Values {
        &self.named
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Whether no argument at all was given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Positional integer argument.
    pub fn int(&self, index: usize) -> Result<i64> {
        self.get(index).and_then(Value::as_i64).ok_or_else(|| {
            Error::invalid_argument(format!("expected an integer at position {}", index))
        })
    }

    /// Positional string argument.
    pub fn str(&self, index: usize) -> Result<&str> {
        self.get(index).and_then(Value::as_str).ok_or_else(|| {
            Error::invalid_argument(format!("expected a string at position {}", index))
        })
    }
}

impl From<Values> for Args {
    fn from(values: Values) -> Self {
        Self::named(values)
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::positional(values)
    }
}
