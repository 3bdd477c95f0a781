//! Stack-machine instruction set.
//!
//! Operands index into the module tables: `Const` into the constant pool,
//! symbol operands into the signature-record table, `LoadVar`/`LoadBind`
//! into the variable and binding slot arrays. Jump targets are absolute
//! instruction indices within the current chunk.

/// One instruction. Method calls pop the receiver plus `argc` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Instr {
    /// Push a constant-pool value.
    Const(u16),
    /// Push the context value.
    LoadCtx,
    /// Push a free-variable slot.
    LoadVar(u16),
    /// Push a header/utility binding slot.
    LoadBind(u16),
    /// Push the incoming value of a setter invocation.
    LoadSetVal,
    /// Pop the qualifier, push the named field (symbol operand).
    GetField(u16),
    /// Pop value then qualifier, write the named field, push unit.
    SetField(u16),
    /// Pop `argc` arguments then the receiver, call, push the result.
    CallMethod { sym: u16, argc: u8 },
    /// Pop `argc` arguments, call a static, push the result.
    CallStatic { sym: u16, argc: u8 },
    /// Pop `argc` arguments, construct, push the instance.
    Construct { sym: u16, argc: u8 },
    /// Pop a value, apply the conversion symbol, push the result.
    Convert(u16),
    /// Pop `n` values, concatenate their display forms, push a string.
    Concat(u8),
    Jump(u16),
    /// Pop a boolean; jump when false.
    JumpIfFalse(u16),
    Dup,
    Pop,
    Ret,
}
