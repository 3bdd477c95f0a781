//! Shared helpers for compiler tests.

use std::sync::Arc;

use indexmap::IndexMap;

use palisade_bytecode::Module;
use palisade_core::acl::Acl;
use palisade_core::profile::ExpressionProfile;
use palisade_core::registry::{TypeDef, TypeRegistry};
use palisade_core::types::TypeRep;
use palisade_core::value::Value;

use crate::session::{CompileSession, ExprRequest};
use crate::template::PosMap;
use crate::{CompileError, DiagnosticReport};

/// Builtins plus a small host domain: an `Order` context with a settable
/// note, a `User` with a field and a method, and a `math` module.
pub fn registry() -> TypeRegistry {
    let mut reg = TypeRegistry::with_builtins();
    reg.register(
        TypeDef::new("User")
            .field("name", TypeRep::str())
            .method("greet", &[("who", TypeRep::str())], TypeRep::str(), |a| {
                Ok(Value::str(format!("hi {}", a[1].as_str()?)))
            }),
    );
    reg.register(
        TypeDef::new("Order")
            .field("note", TypeRep::str())
            .field("amount", TypeRep::int())
            .method("owner", &[], TypeRep::named("User"), |_| {
                Err(palisade_core::value::EvalError::host("not evaluated in tests"))
            }),
    );
    reg.register(
        TypeDef::module("math")
            .static_method("abs", &[("n", TypeRep::int())], TypeRep::int(), |a| {
                Ok(Value::Int(a[0].as_int()?.abs()))
            })
            .static_value("zero", TypeRep::int(), Value::Int(0)),
    );
    reg
}

/// A profile that allows everything on every type; for pipeline tests that
/// are not about the ACL.
pub fn permissive_profile() -> ExpressionProfile {
    let acl = Acl::builder()
        .allow(|p| p.on("Any").all_members())
        .allow(|p| p.statics_of("math").member("abs").member("zero"))
        .build()
        .unwrap();
    ExpressionProfile::builder("permissive").acl(acl).build()
}

pub fn compile_with(
    profile: &ExpressionProfile,
    expression: &str,
    context_type: &str,
    result_type: &str,
) -> Result<Module, CompileError> {
    compile_full(profile, expression, context_type, result_type, &IndexMap::new(), false)
}

pub fn compile_full(
    profile: &ExpressionProfile,
    expression: &str,
    context_type: &str,
    result_type: &str,
    variable_types: &IndexMap<String, String>,
    setter: bool,
) -> Result<Module, CompileError> {
    let mut session = CompileSession::new(Arc::new(registry()));
    let pos_map = PosMap::identity();
    session.compile(&ExprRequest {
        profile,
        expression,
        setter,
        context_type,
        result_type,
        variable_types,
        unit_name: "_pexpr_test",
        original: expression,
        pos_map: &pos_map,
    })
}

/// Compile and expect rejection; returns the remapped report.
pub fn expect_rejected(
    profile: &ExpressionProfile,
    expression: &str,
    context_type: &str,
    result_type: &str,
) -> DiagnosticReport {
    match compile_with(profile, expression, context_type, result_type) {
        Err(CompileError::Rejected(report)) => report,
        Ok(_) => panic!("expected rejection for {expression:?}"),
        Err(other) => panic!("expected Rejected, got {other:?}"),
    }
}
