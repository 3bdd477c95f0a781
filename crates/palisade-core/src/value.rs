//! Runtime values and the host-object trait.

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Errors produced while evaluating a compiled expression.
///
/// Errors raised by host-supplied implementations pass through unchanged as
/// [`EvalError::Host`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("execution limit exceeded")]
    FuelExhausted,

    #[error("value stack limit exceeded")]
    StackOverflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("expected {expected}, got {actual}")]
    Kind {
        expected: &'static str,
        actual: String,
    },

    #[error("field `{field}` is not readable on `{type_name}`")]
    FieldNotReadable { type_name: String, field: String },

    #[error("field `{field}` is not settable on `{type_name}`")]
    FieldNotSettable { type_name: String, field: String },

    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("variable `{0}` was not supplied")]
    MissingVariable(String),

    #[error("string index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{0}")]
    Host(String),
}

impl EvalError {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

/// A host-supplied runtime object.
///
/// Field mutation goes through `set`; hosts that want settable fields use
/// interior mutability. Object equality is pointer equality.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn get(&self, field: &str) -> Option<Value>;

    fn set(&self, field: &str, value: Value) -> Result<(), EvalError> {
        let _ = value;
        Err(EvalError::FieldNotSettable {
            type_name: self.type_name().to_owned(),
            field: field.to_owned(),
        })
    }

    fn display(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
    Unit,
    Obj(Arc<dyn HostObject>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn obj(o: impl HostObject + 'static) -> Self {
        Value::Obj(Arc::new(o))
    }

    /// The nominal type name of the value, as diagnostics print it.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Bool(_) => "Bool",
            Value::Unit => "Unit",
            Value::Obj(o) => o.type_name(),
        }
    }

    /// String form used by template concatenation.
    pub fn display_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Unit => "()".to_owned(),
            Value::Obj(o) => o.display(),
        }
    }

    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(other.kind_error("Int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, EvalError> {
        match self {
            Value::Float(n) => Ok(*n),
            other => Err(other.kind_error("Float")),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.kind_error("Str")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.kind_error("Bool")),
        }
    }

    pub fn as_obj(&self) -> Result<&Arc<dyn HostObject>, EvalError> {
        match self {
            Value::Obj(o) => Ok(o),
            other => Err(other.kind_error("object")),
        }
    }

    fn kind_error(&self, expected: &'static str) -> EvalError {
        EvalError::Kind {
            expected,
            actual: self.type_name().to_owned(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            (Value::Obj(a), Value::Obj(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s.as_str()))
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Unit
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Unit => serializer.serialize_unit(),
            Value::Obj(o) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(o.type_name(), &o.display())?;
                map.end()
            }
        }
    }
}
