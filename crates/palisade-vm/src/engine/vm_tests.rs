use std::sync::Mutex;

use palisade_bytecode::{Binding, Const, Instr, Module, SignatureRecord};
use palisade_core::registry::{TypeDef, TypeRegistry};
use palisade_core::types::TypeRep;
use palisade_core::value::{EvalError, HostObject, Value};

use crate::engine::{FuelLimits, Vm};
use crate::link::LinkedArtifact;

fn empty_module(code: Vec<Instr>) -> Module {
    Module {
        unit_name: "_pexpr_vm_test".to_owned(),
        context_type: "Unit".to_owned(),
        result_type: "Any".to_owned(),
        setter: false,
        vars: vec![],
        consts: vec![],
        symbols: vec![],
        bindings: vec![],
        code,
    }
}

fn run(module: Module, reg: &TypeRegistry) -> Result<Value, EvalError> {
    let linked = LinkedArtifact::link(module, reg).expect("link");
    Vm::new(&linked, &Value::Unit, FuelLimits::default()).run()
}

#[test]
fn constants_and_return() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![Instr::Const(0), Instr::Ret]);
    module.consts = vec![Const::Int(42)];
    assert_eq!(run(module, &reg).unwrap(), Value::Int(42));
}

#[test]
fn method_call_through_registry() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![
        Instr::Const(0),
        Instr::Const(1),
        Instr::CallMethod { sym: 0, argc: 1 },
        Instr::Ret,
    ]);
    module.consts = vec![Const::Int(2), Const::Int(3)];
    module.symbols = vec![SignatureRecord::new("Int.+", "Int.+(Int): Int", "Int(i64)i64")];
    assert_eq!(run(module, &reg).unwrap(), Value::Int(5));
}

#[test]
fn concat_uses_display_form() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![
        Instr::Const(0),
        Instr::Const(1),
        Instr::Const(2),
        Instr::Concat(3),
        Instr::Ret,
    ]);
    module.consts = vec![
        Const::Str("x=".to_owned()),
        Const::Int(3),
        Const::Bool(true),
    ];
    assert_eq!(run(module, &reg).unwrap(), Value::str("x=3true"));
}

#[test]
fn jump_if_false_selects_branch() {
    let reg = TypeRegistry::with_builtins();
    // if false { 1 } else { 2 }
    let mut module = empty_module(vec![
        Instr::Const(0),
        Instr::JumpIfFalse(4),
        Instr::Const(1),
        Instr::Jump(5),
        Instr::Const(2),
        Instr::Ret,
    ]);
    module.consts = vec![Const::Bool(false), Const::Int(1), Const::Int(2)];
    assert_eq!(run(module, &reg).unwrap(), Value::Int(2));
}

#[test]
fn bindings_run_before_main_code() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![
        Instr::LoadBind(0),
        Instr::LoadBind(0),
        Instr::CallMethod { sym: 0, argc: 1 },
        Instr::Ret,
    ]);
    module.consts = vec![Const::Int(21)];
    module.symbols = vec![SignatureRecord::new("Int.+", "Int.+(Int): Int", "Int(i64)i64")];
    module.bindings = vec![Binding {
        name: "half".to_owned(),
        ty: "Int".to_owned(),
        code: vec![Instr::Const(0), Instr::Ret],
    }];
    assert_eq!(run(module, &reg).unwrap(), Value::Int(42));
}

#[test]
fn missing_variable_reports_name() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![Instr::LoadVar(0), Instr::Ret]);
    module.vars = vec!["amount".to_owned()];
    let err = run(module, &reg).unwrap_err();
    assert!(matches!(err, EvalError::MissingVariable(name) if name == "amount"));
}

#[test]
fn variables_are_positional() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![Instr::LoadVar(0), Instr::Ret]);
    module.vars = vec!["amount".to_owned()];
    let linked = LinkedArtifact::link(module, &reg).unwrap();
    let vars = [Value::Int(7)];
    let result = Vm::new(&linked, &Value::Unit, FuelLimits::default())
        .with_vars(&vars)
        .run()
        .unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn infinite_loop_exhausts_fuel() {
    let reg = TypeRegistry::with_builtins();
    let module = empty_module(vec![Instr::Jump(0)]);
    let linked = LinkedArtifact::link(module, &reg).unwrap();
    let err = Vm::new(&linked, &Value::Unit, FuelLimits::new().exec_fuel(100))
        .run()
        .unwrap_err();
    assert!(matches!(err, EvalError::FuelExhausted));
}

#[test]
fn stack_limit_enforced() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![Instr::Const(0), Instr::Dup, Instr::Jump(1)]);
    module.consts = vec![Const::Int(1)];
    let linked = LinkedArtifact::link(module, &reg).unwrap();
    let err = Vm::new(&linked, &Value::Unit, FuelLimits::new().stack_limit(8))
        .run()
        .unwrap_err();
    assert!(matches!(err, EvalError::StackOverflow));
}

#[derive(Debug)]
struct Counter {
    count: Mutex<i64>,
}

impl HostObject for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn get(&self, field: &str) -> Option<Value> {
        (field == "count").then(|| Value::Int(*self.count.lock().unwrap()))
    }

    fn set(&self, field: &str, value: Value) -> Result<(), EvalError> {
        if field != "count" {
            return Err(EvalError::FieldNotSettable {
                type_name: "Counter".to_owned(),
                field: field.to_owned(),
            });
        }
        *self.count.lock().unwrap() = value.as_int()?;
        Ok(())
    }
}

fn counter_registry() -> TypeRegistry {
    let mut reg = TypeRegistry::with_builtins();
    reg.register(TypeDef::new("Counter").field("count", TypeRep::int()));
    reg
}

#[test]
fn get_and_set_object_field() {
    let reg = counter_registry();
    let field_sym = SignatureRecord::new("Counter.count", "Counter.count: Int", "Counter.count:i64");

    let mut getter = empty_module(vec![Instr::LoadCtx, Instr::GetField(0), Instr::Ret]);
    getter.symbols = vec![field_sym.clone()];
    let getter = LinkedArtifact::link(getter, &reg).unwrap();

    let mut setter = empty_module(vec![
        Instr::LoadCtx,
        Instr::LoadSetVal,
        Instr::SetField(0),
        Instr::Ret,
    ]);
    setter.setter = true;
    setter.symbols = vec![field_sym];
    let setter = LinkedArtifact::link(setter, &reg).unwrap();

    let ctx = Value::obj(Counter {
        count: Mutex::new(1),
    });

    let before = Vm::new(&getter, &ctx, FuelLimits::default()).run().unwrap();
    assert_eq!(before, Value::Int(1));

    let unit = Vm::new(&setter, &ctx, FuelLimits::default())
        .with_set_val(Value::Int(9))
        .run()
        .unwrap();
    assert_eq!(unit, Value::Unit);

    let after = Vm::new(&getter, &ctx, FuelLimits::default()).run().unwrap();
    assert_eq!(after, Value::Int(9));
}

#[test]
fn host_errors_pass_through() {
    let reg = TypeRegistry::with_builtins();
    let mut module = empty_module(vec![
        Instr::Const(0),
        Instr::Const(1),
        Instr::CallMethod { sym: 0, argc: 1 },
        Instr::Ret,
    ]);
    module.consts = vec![Const::Int(1), Const::Int(0)];
    module.symbols = vec![SignatureRecord::new("Int./", "Int./(Int): Int", "Int(i64)i64")];
    let err = run(module, &reg).unwrap_err();
    assert!(matches!(err, EvalError::DivisionByZero));
}
