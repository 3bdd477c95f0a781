//! Shared fixtures for the integration tests.
#![allow(dead_code)] // not every test binary uses every fixture

use std::sync::{Arc, Mutex};

use palisade_lib::{
    Acl, EvalError, ExpressionProfile, HostObject, TypeDef, TypeRegistry, TypeRep, Value,
};

/// Builtins plus an `Order` context object with settable fields.
pub fn registry() -> TypeRegistry {
    let mut reg = TypeRegistry::with_builtins();
    reg.register(
        TypeDef::new("Order")
            .field("note", TypeRep::str())
            .field("amount", TypeRep::int()),
    );
    reg
}

pub fn permissive() -> Arc<ExpressionProfile> {
    let acl = Acl::builder()
        .allow(|p| p.on("Any").all_members())
        .build()
        .unwrap();
    Arc::new(ExpressionProfile::builder("permissive").acl(acl).build())
}

pub fn profile_allowing(
    entries: impl FnOnce(palisade_lib::PatternSet) -> palisade_lib::PatternSet,
) -> Arc<ExpressionProfile> {
    let acl = Acl::builder().allow(entries).build().unwrap();
    Arc::new(ExpressionProfile::builder("scoped").acl(acl).build())
}

/// A mutable order object for context tests.
#[derive(Debug)]
pub struct Order {
    pub note: Mutex<String>,
    pub amount: Mutex<i64>,
}

impl Order {
    pub fn value(note: &str, amount: i64) -> Value {
        Value::obj(Order {
            note: Mutex::new(note.to_owned()),
            amount: Mutex::new(amount),
        })
    }
}

impl HostObject for Order {
    fn type_name(&self) -> &str {
        "Order"
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "note" => Some(Value::str(self.note.lock().unwrap().clone())),
            "amount" => Some(Value::Int(*self.amount.lock().unwrap())),
            _ => None,
        }
    }

    fn set(&self, field: &str, value: Value) -> Result<(), EvalError> {
        match field {
            "note" => {
                *self.note.lock().unwrap() = value.as_str()?.to_owned();
                Ok(())
            }
            "amount" => {
                *self.amount.lock().unwrap() = value.as_int()?;
                Ok(())
            }
            _ => Err(EvalError::FieldNotSettable {
                type_name: "Order".to_owned(),
                field: field.to_owned(),
            }),
        }
    }
}
