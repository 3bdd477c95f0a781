//! Human-readable module listing for debugging and the CLI `dump` command.

use std::fmt::Write as _;

use crate::instr::Instr;
use crate::module::{Const, Module};

/// Render a module as an indented text listing.
pub fn dump(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {}", module.unit_name);
    let _ = writeln!(
        out,
        "  context: {}  result: {}{}",
        module.context_type,
        module.result_type,
        if module.setter { "  (setter)" } else { "" }
    );

    if !module.vars.is_empty() {
        let _ = writeln!(out, "  vars: {}", module.vars.join(", "));
    }

    if !module.consts.is_empty() {
        let _ = writeln!(out, "  consts:");
        for (i, c) in module.consts.iter().enumerate() {
            let _ = writeln!(out, "    [{i}] {}", const_text(c));
        }
    }

    if !module.symbols.is_empty() {
        let _ = writeln!(out, "  symbols:");
        for (i, s) in module.symbols.iter().enumerate() {
            let _ = writeln!(out, "    [{i}] {}", s.typed);
        }
    }

    for binding in &module.bindings {
        let _ = writeln!(out, "  bind {}: {}", binding.name, binding.ty);
        dump_code(&mut out, &binding.code);
    }

    let _ = writeln!(out, "  code:");
    dump_code(&mut out, &module.code);
    out
}

fn dump_code(out: &mut String, code: &[Instr]) {
    for (i, instr) in code.iter().enumerate() {
        let _ = writeln!(out, "    {i:>4}  {}", instr_text(instr));
    }
}

fn const_text(c: &Const) -> String {
    match c {
        Const::Int(n) => format!("int {n}"),
        Const::Float(n) => format!("float {n}"),
        Const::Str(s) => format!("str {s:?}"),
        Const::Bool(b) => format!("bool {b}"),
        Const::Unit => "unit".to_owned(),
    }
}

fn instr_text(instr: &Instr) -> String {
    match instr {
        Instr::Const(idx) => format!("const {idx}"),
        Instr::LoadCtx => "load_ctx".to_owned(),
        Instr::LoadVar(slot) => format!("load_var {slot}"),
        Instr::LoadBind(slot) => format!("load_bind {slot}"),
        Instr::LoadSetVal => "load_set_val".to_owned(),
        Instr::GetField(sym) => format!("get_field sym={sym}"),
        Instr::SetField(sym) => format!("set_field sym={sym}"),
        Instr::CallMethod { sym, argc } => format!("call_method sym={sym} argc={argc}"),
        Instr::CallStatic { sym, argc } => format!("call_static sym={sym} argc={argc}"),
        Instr::Construct { sym, argc } => format!("construct sym={sym} argc={argc}"),
        Instr::Convert(sym) => format!("convert sym={sym}"),
        Instr::Concat(n) => format!("concat {n}"),
        Instr::Jump(target) => format!("jump {target}"),
        Instr::JumpIfFalse(target) => format!("jump_if_false {target}"),
        Instr::Dup => "dup".to_owned(),
        Instr::Pop => "pop".to_owned(),
        Instr::Ret => "ret".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig::SignatureRecord;

    #[test]
    fn dump_lists_sections() {
        let module = Module {
            unit_name: "_pexpr_test".to_owned(),
            context_type: "Unit".to_owned(),
            result_type: "Int".to_owned(),
            setter: false,
            vars: vec![],
            consts: vec![Const::Int(5)],
            symbols: vec![SignatureRecord::new("Str.len", "Str.len(): Int", "Str()i64")],
            bindings: vec![],
            code: vec![Instr::Const(0), Instr::Ret],
        };
        let text = dump(&module);
        assert!(text.contains("module _pexpr_test"));
        assert!(text.contains("[0] int 5"));
        assert!(text.contains("Str.len(): Int"));
        assert!(text.contains("const 0"));
        assert!(text.contains("ret"));
    }
}
