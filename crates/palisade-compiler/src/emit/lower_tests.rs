use palisade_bytecode::{Const, Instr};

use crate::test_utils::{compile_with, permissive_profile};

#[test]
fn dump_listing_is_stable() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "1 + 2", "Unit", "Int").unwrap();
    insta::assert_snapshot!(palisade_bytecode::dump::dump(&module), @r"
    module _pexpr_test
      context: Unit  result: Int
      consts:
        [0] int 1
        [1] int 2
      symbols:
        [0] Int.+(Int): Int
      code:
           0  const 0
           1  const 1
           2  call_method sym=0 argc=1
           3  ret
    ");
}

#[test]
fn literal_call_sequence() {
    let profile = permissive_profile();
    let module = compile_with(&profile, r#""hello".len"#, "Unit", "Int").unwrap();
    let len_sym = module
        .symbols
        .iter()
        .position(|s| s.fq == "Str.len")
        .unwrap() as u16;
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::CallMethod {
                sym: len_sym,
                argc: 0
            },
            Instr::Ret,
        ]
    );
    assert_eq!(module.consts, vec![Const::Str("hello".to_owned())]);
}

#[test]
fn binary_operator_is_a_method_call() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "2 + 3", "Unit", "Int").unwrap();
    let plus = module
        .symbols
        .iter()
        .position(|s| s.fq == "Int.+")
        .unwrap() as u16;
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::Const(1),
            Instr::CallMethod { sym: plus, argc: 1 },
            Instr::Ret,
        ]
    );
}

#[test]
fn constants_deduplicate() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "1 + 1", "Unit", "Int").unwrap();
    assert_eq!(module.consts, vec![Const::Int(1)]);
    assert_eq!(module.code[0], Instr::Const(0));
    assert_eq!(module.code[1], Instr::Const(0));
}

#[test]
fn if_lowering_uses_jumps() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "if (true) 1 else 2", "Unit", "Int").unwrap();
    // cond, jump-if-false to else, then, jump to end, else.
    assert_eq!(module.code[0], Instr::Const(0));
    assert_eq!(module.code[1], Instr::JumpIfFalse(4));
    assert_eq!(module.code[2], Instr::Const(1));
    assert_eq!(module.code[3], Instr::Jump(5));
    assert_eq!(module.code[4], Instr::Const(2));
    assert_eq!(module.code[5], Instr::Ret);
}

#[test]
fn and_short_circuits() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "true && false", "Unit", "Bool").unwrap();
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::Dup,
            Instr::JumpIfFalse(5),
            Instr::Pop,
            Instr::Const(1),
            Instr::Ret,
        ]
    );
    // No Bool.&& symbol in the table: it compiles to jumps.
    assert!(module.symbols.iter().all(|s| s.fq != "Bool.&&"));
}

#[test]
fn or_short_circuits() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "false || true", "Unit", "Bool").unwrap();
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::Dup,
            Instr::JumpIfFalse(4),
            Instr::Jump(6),
            Instr::Pop,
            Instr::Const(1),
            Instr::Ret,
        ]
    );
}

#[test]
fn concat_lowering() {
    let profile = permissive_profile();
    let module = compile_with(&profile, r#""x=" ++ 3"#, "Unit", "Str").unwrap();
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::Const(1),
            Instr::Concat(2),
            Instr::Ret,
        ]
    );
    assert!(module.symbols.is_empty());
}

#[test]
fn blocks_pop_intermediate_values() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "{ 1; 2; 3 }", "Unit", "Int").unwrap();
    assert_eq!(
        module.code,
        vec![
            Instr::Const(0),
            Instr::Pop,
            Instr::Const(1),
            Instr::Pop,
            Instr::Const(2),
            Instr::Ret,
        ]
    );
}

#[test]
fn context_field_reads_through_ctx() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "amount", "Order", "Int").unwrap();
    let sym = module
        .symbols
        .iter()
        .position(|s| s.fq == "Order.amount")
        .unwrap() as u16;
    assert_eq!(
        module.code,
        vec![Instr::LoadCtx, Instr::GetField(sym), Instr::Ret]
    );
}

#[test]
fn setter_writes_through_set_field() {
    use indexmap::IndexMap;

    let profile = permissive_profile();
    let module = crate::test_utils::compile_full(
        &profile,
        "this.note",
        "Order",
        "Str",
        &IndexMap::new(),
        true,
    )
    .unwrap();
    let sym = module
        .symbols
        .iter()
        .position(|s| s.fq == "Order.note")
        .unwrap() as u16;
    assert!(module.setter);
    assert_eq!(
        module.code,
        vec![
            Instr::LoadCtx,
            Instr::LoadSetVal,
            Instr::SetField(sym),
            Instr::Ret,
        ]
    );
}

#[test]
fn unary_minus_is_neg() {
    let profile = permissive_profile();
    let module = compile_with(&profile, "-(1 + 2)", "Unit", "Int").unwrap();
    assert!(module.symbols.iter().any(|s| s.fq == "Int.neg"));
    assert_eq!(module.code.last(), Some(&Instr::Ret));
    assert_eq!(
        module.code[module.code.len() - 2],
        Instr::CallMethod {
            sym: module
                .symbols
                .iter()
                .position(|s| s.fq == "Int.neg")
                .unwrap() as u16,
            argc: 0
        }
    );
}
