//! The host-facing callable wrapper.
//!
//! A callable holds only a weak reference to its linked artifact; the
//! in-memory cache owns the strong one. When the cache evicts the artifact,
//! the next invocation transparently re-resolves through the evaluator
//! (recompiling if needed) - callers never observe a cache miss.

use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;

use palisade_core::value::{EvalError, Value};
use palisade_vm::{LinkedArtifact, Vm};

use crate::evaluator::Shared;
use crate::expression_def::ExpressionDef;
use crate::Error;

/// Named free-variable values for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    values: IndexMap<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// A compiled expression, invocable any number of times.
#[derive(Debug, Clone)]
pub struct Callable {
    inner: Arc<CallableInner>,
}

#[derive(Debug)]
struct CallableInner {
    def: Arc<ExpressionDef>,
    shared: Weak<Shared>,
    slot: Mutex<Weak<LinkedArtifact>>,
}

impl Callable {
    pub(crate) fn new(def: Arc<ExpressionDef>, shared: Weak<Shared>) -> Self {
        Self {
            inner: Arc::new(CallableInner {
                def,
                shared,
                slot: Mutex::new(Weak::new()),
            }),
        }
    }

    pub(crate) fn attach(&self, artifact: &Arc<LinkedArtifact>) {
        *self.inner.slot.lock().unwrap() = Arc::downgrade(artifact);
    }

    pub fn def(&self) -> &ExpressionDef {
        &self.inner.def
    }

    /// Whether two callables are the same cached wrapper.
    pub fn same_as(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Evaluate against a context.
    pub fn eval(&self, ctx: &Value) -> Result<Value, Error> {
        self.eval_with(ctx, &Vars::default())
    }

    /// Evaluate with free-variable values.
    pub fn eval_with(&self, ctx: &Value, vars: &Vars) -> Result<Value, Error> {
        let (shared, artifact) = self.resolve()?;
        let values = self.var_values(&artifact, vars)?;
        Vm::new(&artifact, ctx, shared.limits())
            .with_vars(&values)
            .run()
            .map_err(Error::Eval)
    }

    /// Invoke a setter artifact: write `value` through the target field.
    pub fn set(&self, ctx: &Value, value: Value) -> Result<(), Error> {
        self.set_with(ctx, value, &Vars::default())
    }

    pub fn set_with(&self, ctx: &Value, value: Value, vars: &Vars) -> Result<(), Error> {
        let (shared, artifact) = self.resolve()?;
        if !artifact.module().setter {
            return Err(Error::Eval(EvalError::host(
                "callable is not a setter expression",
            )));
        }
        let values = self.var_values(&artifact, vars)?;
        Vm::new(&artifact, ctx, shared.limits())
            .with_vars(&values)
            .with_set_val(value)
            .run()
            .map(|_| ())
            .map_err(Error::Eval)
    }

    fn var_values(&self, artifact: &LinkedArtifact, vars: &Vars) -> Result<Vec<Value>, Error> {
        artifact
            .module()
            .vars
            .iter()
            .map(|name| {
                vars.get(name)
                    .cloned()
                    .ok_or_else(|| Error::Eval(EvalError::MissingVariable(name.clone())))
            })
            .collect()
    }

    /// Upgrade the weak artifact reference, re-resolving through the
    /// evaluator when it has died.
    fn resolve(&self) -> Result<(Arc<Shared>, Arc<LinkedArtifact>), Error> {
        let shared = self.inner.shared.upgrade().ok_or(Error::EvaluatorGone)?;
        if let Some(artifact) = self.inner.slot.lock().unwrap().upgrade() {
            return Ok((shared, artifact));
        }
        let entry = shared.resolve(&self.inner.def)?;
        *self.inner.slot.lock().unwrap() = Arc::downgrade(&entry.artifact);
        Ok((shared, entry.artifact))
    }
}
