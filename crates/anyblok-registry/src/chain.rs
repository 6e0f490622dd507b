//! Method chains and call contexts.
//!
//! Every method of a resolved model owns an explicit list of the layers that
//! implement it, most derived first. A call starts at the head of the list;
//! `super_call` hands control to the next layer. Instance and class methods
//! fail with `MethodNotFound` once the list is exhausted, while the insert and
//! initialise chains end in the native implementation.

use std::fmt;
use std::sync::Arc;

use anyblok_core::{Error, Result, Value, Values};

use crate::args::Args;
use crate::model::ModelHandle;
use crate::record::Record;
use crate::registry::Registry;

/// Instance method implementation.
pub type InstanceMethod =
    Arc<dyn Fn(&mut InstanceCall<'_>, &Args) -> Result<Value> + Send + Sync>;

/// Class method implementation.
pub type ClassMethod = Arc<dyn Fn(&mut ClassCall<'_>, &Args) -> Result<Value> + Send + Sync>;

/// Insert override.
pub type InsertHook = Arc<dyn Fn(&mut InsertCall<'_>, Values) -> Result<Record> + Send + Sync>;

/// Initialise hook, run once per model after the tables exist.
pub type InitializeHook = Arc<dyn Fn(&mut InitializeCall<'_>) -> Result<()> + Send + Sync>;

/// One implementation of a method, tagged with the layer it comes from.
#[derive(Clone)]
pub struct Layer<F> {
    pub(crate) origin: String,
    pub(crate) func: F,
}

impl<F> Layer<F> {
    pub(crate) fn new(origin: impl Into<String>, func: F) -> Self {
        Self {
            origin: origin.into(),
            func,
        }
    }

    /// Description of the contributing layer, e.g. `Model.Test#1`.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl<F> fmt::Debug for Layer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Layer").field(&self.origin).finish()
    }
}

// ============================================================================
// Instance Methods
// ============================================================================

/// Context of an instance method call.
pub struct InstanceCall<'a> {
    record: &'a mut Record,
    method: &'a str,
    rest: &'a [Layer<InstanceMethod>],
}

impl<'a> InstanceCall<'a> {
    pub(crate) fn start(
        record: &'a mut Record,
        method: &'a str,
        chain: &'a [Layer<InstanceMethod>],
    ) -> Self {
        Self {
            record,
            method,
            rest: chain,
        }
    }

    /// The record the method was called on.
    pub fn record(&self) -> &Record {
        &*self.record
    }

    /// Mutable access to the record.
    pub fn record_mut(&mut self) -> &mut Record {
        &mut *self.record
    }

    /// The record's model.
    pub fn model(&self) -> &ModelHandle {
        self.record.model()
    }

    /// The registry the model belongs to.
    pub fn registry(&self) -> &Registry {
        self.record.model().registry()
    }

    /// Name of the method being called.
    pub fn method(&self) -> &str {
        self.method
    }

    /// Call the next layer implementing this method.
    pub fn super_call(&mut self, args: &Args) -> Result<Value> {
        let Some((layer, rest)) = self.rest.split_first() else {
            return Err(Error::MethodNotFound {
                model: self.record.model().name().to_string(),
                method: self.method.to_string(),
            });
        };
        tracing::trace!(method = self.method, layer = %layer.origin, "Instance method layer");
        let mut next = InstanceCall {
            record: &mut *self.record,
            method: self.method,
            rest,
        };
        (layer.func)(&mut next, args)
    }
}

// ============================================================================
// Class Methods
// ============================================================================

/// Context of a class method call.
pub struct ClassCall<'a> {
    model: &'a ModelHandle,
    method: &'a str,
    rest: &'a [Layer<ClassMethod>],
}

impl<'a> ClassCall<'a> {
    pub(crate) fn start(
        model: &'a ModelHandle,
        method: &'a str,
        chain: &'a [Layer<ClassMethod>],
    ) -> Self {
        Self {
            model,
            method,
            rest: chain,
        }
    }

    /// The model the method was called on.
    pub fn model(&self) -> &ModelHandle {
        self.model
    }

    /// The registry the model belongs to.
    pub fn registry(&self) -> &Registry {
        self.model.registry()
    }

    /// Name of the method being called.
    pub fn method(&self) -> &str {
        self.method
    }

    /// Call the next layer implementing this method.
    pub fn super_call(&mut self, args: &Args) -> Result<Value> {
        let Some((layer, rest)) = self.rest.split_first() else {
            return Err(Error::MethodNotFound {
                model: self.model.name().to_string(),
                method: self.method.to_string(),
            });
        };
        tracing::trace!(method = self.method, layer = %layer.origin, "Class method layer");
        let mut next = ClassCall {
            model: self.model,
            method: self.method,
            rest,
        };
        (layer.func)(&mut next, args)
    }
}

// ============================================================================
// Insert
// ============================================================================

/// Context of an `insert` override.
pub struct InsertCall<'a> {
    model: &'a ModelHandle,
    rest: &'a [Layer<InsertHook>],
}

impl<'a> InsertCall<'a> {
    pub(crate) fn start(model: &'a ModelHandle, chain: &'a [Layer<InsertHook>]) -> Self {
        Self { model, rest: chain }
    }

    /// The model being inserted into.
    pub fn model(&self) -> &ModelHandle {
        self.model
    }

    /// The registry the model belongs to.
    pub fn registry(&self) -> &Registry {
        self.model.registry()
    }

    /// Call the next override, or store the row when none is left.
    pub fn super_call(&mut self, values: Values) -> Result<Record> {
        let Some((layer, rest)) = self.rest.split_first() else {
            return self.model.native_insert(values);
        };
        tracing::trace!(model = %self.model.name(), layer = %layer.origin, "Insert layer");
        let mut next = InsertCall {
            model: self.model,
            rest,
        };
        (layer.func)(&mut next, values)
    }
}

// ============================================================================
// Initialise
// ============================================================================

/// Context of an initialise hook.
pub struct InitializeCall<'a> {
    model: &'a ModelHandle,
    rest: &'a [Layer<InitializeHook>],
}

impl<'a> InitializeCall<'a> {
    pub(crate) fn start(model: &'a ModelHandle, chain: &'a [Layer<InitializeHook>]) -> Self {
        Self { model, rest: chain }
    }

    /// The model being initialised.
    pub fn model(&self) -> &ModelHandle {
        self.model
    }

    /// The registry the model belongs to.
    pub fn registry(&self) -> &Registry {
        self.model.registry()
    }

    /// Call the next hook; the native initialisation does nothing.
    pub fn super_call(&mut self) -> Result<()> {
        let Some((layer, rest)) = self.rest.split_first() else {
            return Ok(());
        };
        tracing::trace!(model = %self.model.name(), layer = %layer.origin, "Initialize layer");
        let mut next = InitializeCall {
            model: self.model,
            rest,
        };
        (layer.func)(&mut next)
    }
}
