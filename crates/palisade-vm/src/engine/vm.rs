//! The stack VM.
//!
//! Binding chunks run first, in order, each result landing in its binding
//! slot; then the main code runs. All limits are enforced per evaluation.

use palisade_bytecode::{Const, Instr};
use palisade_core::value::{EvalError, Value};

use crate::link::{LinkedArtifact, Slot};

/// Runtime limits for one evaluation.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum instructions executed (default: 1,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum value-stack depth (default: 1,024).
    pub(crate) stack_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            stack_limit: 1024,
        }
    }
}

impl FuelLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    pub fn stack_limit(mut self, limit: u32) -> Self {
        self.stack_limit = limit;
        self
    }
}

/// One evaluation of a linked artifact.
pub struct Vm<'a> {
    linked: &'a LinkedArtifact,
    ctx: &'a Value,
    vars: &'a [Value],
    set_val: Option<Value>,
    binds: Vec<Value>,
    stack: Vec<Value>,
    fuel: u32,
    limits: FuelLimits,
}

impl<'a> Vm<'a> {
    pub fn new(linked: &'a LinkedArtifact, ctx: &'a Value, limits: FuelLimits) -> Self {
        Self {
            linked,
            ctx,
            vars: &[],
            set_val: None,
            binds: Vec::with_capacity(linked.module().bindings.len()),
            stack: Vec::with_capacity(16),
            fuel: limits.exec_fuel,
            limits,
        }
    }

    /// Free-variable values, positionally matching the module's `vars`.
    pub fn with_vars(mut self, vars: &'a [Value]) -> Self {
        self.vars = vars;
        self
    }

    /// The incoming value for a setter artifact.
    pub fn with_set_val(mut self, value: Value) -> Self {
        self.set_val = Some(value);
        self
    }

    pub fn run(mut self) -> Result<Value, EvalError> {
        let module = self.linked.module();
        for binding in &module.bindings {
            let value = self.exec(&binding.code)?;
            self.binds.push(value);
        }
        self.exec(&module.code)
    }

    fn exec(&mut self, code: &'a [Instr]) -> Result<Value, EvalError> {
        let mut ip = 0usize;
        loop {
            if self.fuel == 0 {
                return Err(EvalError::FuelExhausted);
            }
            self.fuel -= 1;

            let Some(instr) = code.get(ip) else {
                return Err(EvalError::host("execution ran off the end of a chunk"));
            };
            ip += 1;

            match *instr {
                Instr::Const(idx) => {
                    let value = self
                        .linked
                        .module()
                        .consts
                        .get(idx as usize)
                        .map(const_value)
                        .ok_or_else(|| EvalError::host("invalid constant index"))?;
                    self.push(value)?;
                }
                Instr::LoadCtx => {
                    let ctx = self.ctx.clone();
                    self.push(ctx)?;
                }
                Instr::LoadVar(slot) => {
                    let value = self.vars.get(slot as usize).cloned().ok_or_else(|| {
                        let name = self
                            .linked
                            .module()
                            .vars
                            .get(slot as usize)
                            .cloned()
                            .unwrap_or_else(|| format!("#{slot}"));
                        EvalError::MissingVariable(name)
                    })?;
                    self.push(value)?;
                }
                Instr::LoadBind(slot) => {
                    let value = self
                        .binds
                        .get(slot as usize)
                        .cloned()
                        .ok_or_else(|| EvalError::host("invalid binding slot"))?;
                    self.push(value)?;
                }
                Instr::LoadSetVal => {
                    let value = self
                        .set_val
                        .clone()
                        .ok_or_else(|| EvalError::host("not a setter invocation"))?;
                    self.push(value)?;
                }
                Instr::GetField(sym) => {
                    let qualifier = self.pop()?;
                    let value = match self.slot(sym)? {
                        Slot::Field(name) => {
                            let obj = qualifier.as_obj()?;
                            obj.get(name).ok_or_else(|| EvalError::FieldNotReadable {
                                type_name: obj.type_name().to_owned(),
                                field: name.clone(),
                            })?
                        }
                        Slot::Native(f) => f(&[qualifier])?,
                    };
                    self.push(value)?;
                }
                Instr::SetField(sym) => {
                    let value = self.pop()?;
                    let qualifier = self.pop()?;
                    match self.slot(sym)? {
                        Slot::Field(name) => qualifier.as_obj()?.set(name, value)?,
                        Slot::Native(_) => {
                            return Err(EvalError::host("symbol is not a settable field"));
                        }
                    }
                    self.push(Value::Unit)?;
                }
                Instr::CallMethod { sym, argc } => {
                    let args = self.pop_call_args(1 + argc as usize)?;
                    self.dispatch(sym, &args)?;
                }
                Instr::CallStatic { sym, argc } | Instr::Construct { sym, argc } => {
                    let args = self.pop_call_args(argc as usize)?;
                    self.dispatch(sym, &args)?;
                }
                Instr::Convert(sym) => {
                    let value = self.pop()?;
                    self.dispatch(sym, &[value])?;
                }
                Instr::Concat(n) => {
                    let parts = self.pop_call_args(n as usize)?;
                    let mut out = String::new();
                    for part in &parts {
                        out.push_str(&part.display_string());
                    }
                    self.push(Value::str(out))?;
                }
                Instr::Jump(target) => ip = target as usize,
                Instr::JumpIfFalse(target) => {
                    if !self.pop()?.as_bool()? {
                        ip = target as usize;
                    }
                }
                Instr::Dup => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| EvalError::host("stack underflow"))?;
                    self.push(top)?;
                }
                Instr::Pop => {
                    self.pop()?;
                }
                Instr::Ret => return self.pop(),
            }
        }
    }

    fn dispatch(&mut self, sym: u16, args: &[Value]) -> Result<(), EvalError> {
        let result = match self.slot(sym)? {
            Slot::Native(f) => f(args)?,
            Slot::Field(name) => {
                return Err(EvalError::host(format!("field `{name}` is not callable")));
            }
        };
        self.push(result)
    }

    fn slot(&self, sym: u16) -> Result<&'a Slot, EvalError> {
        self.linked
            .slot(sym)
            .ok_or_else(|| EvalError::host("invalid symbol index"))
    }

    /// Pop `n` values pushed left-to-right, returning them in push order.
    fn pop_call_args(&mut self, n: usize) -> Result<Vec<Value>, EvalError> {
        if self.stack.len() < n {
            return Err(EvalError::host("stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn push(&mut self, value: Value) -> Result<(), EvalError> {
        if self.stack.len() as u32 >= self.limits.stack_limit {
            return Err(EvalError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, EvalError> {
        self.stack
            .pop()
            .ok_or_else(|| EvalError::host("stack underflow"))
    }
}

fn const_value(c: &Const) -> Value {
    match c {
        Const::Int(n) => Value::Int(*n),
        Const::Float(n) => Value::Float(*n),
        Const::Str(s) => Value::str(s),
        Const::Bool(b) => Value::Bool(*b),
        Const::Unit => Value::Unit,
    }
}
