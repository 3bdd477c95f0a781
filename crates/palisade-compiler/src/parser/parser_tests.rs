use super::ast::Expr;
use super::cst::SyntaxKind;
use super::parse;

fn expr(source: &str) -> Expr {
    let res = parse(source);
    assert!(
        !res.diagnostics.has_errors(),
        "unexpected parse errors for {source:?}: {}",
        res.diagnostics.printer().source(source).render()
    );
    res.root.expr().expect("root expression")
}

#[test]
fn literal_kinds() {
    assert!(matches!(expr("42"), Expr::Lit(_)));
    assert!(matches!(expr("3.14"), Expr::Lit(_)));
    assert!(matches!(expr(r#""hi""#), Expr::Lit(_)));
    assert!(matches!(expr("true"), Expr::Lit(_)));
    assert!(matches!(expr("()"), Expr::Lit(_)));
}

#[test]
fn select_chain_nests_left() {
    let Expr::Select(outer) = expr("a.b.c") else {
        panic!("expected select");
    };
    assert_eq!(outer.name_token().unwrap().text(), "c");
    let Some(Expr::Select(inner)) = outer.qualifier() else {
        panic!("expected inner select");
    };
    assert_eq!(inner.name_token().unwrap().text(), "b");
    assert!(matches!(inner.qualifier(), Some(Expr::Ident(_))));
}

#[test]
fn call_with_arguments() {
    let Expr::Call(call) = expr("user.greet(\"bob\", 1 + 2)") else {
        panic!("expected call");
    };
    assert!(matches!(call.callee(), Some(Expr::Select(_))));
    let args: Vec<_> = call.args().collect();
    assert_eq!(args.len(), 2);
    assert!(matches!(args[1], Expr::Binary(_)));
}

#[test]
fn precedence_mul_over_add() {
    let Expr::Binary(add) = expr("1 + 2 * 3") else {
        panic!("expected binary");
    };
    assert_eq!(add.op_token().unwrap().kind(), SyntaxKind::Plus);
    assert!(matches!(add.lhs(), Some(Expr::Lit(_))));
    let Some(Expr::Binary(mul)) = add.rhs() else {
        panic!("expected mul on the right");
    };
    assert_eq!(mul.op_token().unwrap().kind(), SyntaxKind::Star);
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    let Expr::Binary(cmp) = expr("1 + 2 < 3 * 4") else {
        panic!("expected comparison");
    };
    assert_eq!(cmp.op_token().unwrap().kind(), SyntaxKind::Lt);
    assert!(matches!(cmp.lhs(), Some(Expr::Binary(_))));
    assert!(matches!(cmp.rhs(), Some(Expr::Binary(_))));
}

#[test]
fn logical_operators_bind_loosest() {
    let Expr::Binary(or) = expr("a < 1 || b < 2 && c") else {
        panic!("expected ||");
    };
    assert_eq!(or.op_token().unwrap().kind(), SyntaxKind::PipePipe);
    let Some(Expr::Binary(and)) = or.rhs() else {
        panic!("expected && on the right");
    };
    assert_eq!(and.op_token().unwrap().kind(), SyntaxKind::AmpAmp);
}

#[test]
fn concat_between_comparisons_and_additive() {
    let Expr::Concat(concat) = expr(r#""x=" ++ 1 + 2"#) else {
        panic!("expected concat");
    };
    assert!(matches!(concat.lhs(), Some(Expr::Lit(_))));
    assert!(matches!(concat.rhs(), Some(Expr::Binary(_))));
}

#[test]
fn unary_and_postfix() {
    let Expr::Unary(neg) = expr("-a.b") else {
        panic!("expected unary");
    };
    assert_eq!(neg.op_token().unwrap().kind(), SyntaxKind::Minus);
    assert!(matches!(neg.operand(), Some(Expr::Select(_))));
}

#[test]
fn if_expression_parts() {
    let Expr::If(node) = expr("if (a < b) 1 else 2") else {
        panic!("expected if");
    };
    assert!(matches!(node.cond(), Some(Expr::Binary(_))));
    assert!(matches!(node.then_branch(), Some(Expr::Lit(_))));
    assert!(matches!(node.else_branch(), Some(Expr::Lit(_))));
}

#[test]
fn block_expressions() {
    let Expr::Block(block) = expr("{ 1; 2; 3 }") else {
        panic!("expected block");
    };
    assert_eq!(block.exprs().count(), 3);
}

#[test]
fn ascription() {
    let Expr::Ascribe(node) = expr("x :: Vec[Int]") else {
        panic!("expected ascription");
    };
    assert!(matches!(node.expr(), Some(Expr::Ident(_))));
    assert_eq!(node.ty().unwrap().text(), "Vec[Int]");
}

#[test]
fn let_defs_then_expression() {
    let res = parse("let a = 1\nlet b = a + 1\nb * 2");
    assert!(!res.diagnostics.has_errors());
    let lets: Vec<_> = res.root.lets().collect();
    assert_eq!(lets.len(), 2);
    assert_eq!(lets[0].name_token().unwrap().text(), "a");
    assert_eq!(lets[1].name_token().unwrap().text(), "b");
    assert!(matches!(res.root.expr(), Some(Expr::Binary(_))));
}

#[test]
fn missing_member_name_recovers() {
    let res = parse("a.");
    assert!(res.diagnostics.has_errors());
    // Still produces a select with a qualifier for the completer.
    let Some(Expr::Select(select)) = res.root.expr() else {
        panic!("expected select node");
    };
    assert!(select.qualifier().is_some());
    assert!(select.name_token().is_none());
}

#[test]
fn unbalanced_paren_reports() {
    let res = parse("(1 + 2");
    assert!(res.diagnostics.has_errors());
}

#[test]
fn trailing_garbage_reports() {
    let res = parse("1 + 2 )");
    assert!(res.diagnostics.has_errors());
}

#[test]
fn empty_input_reports_expected_expression() {
    let res = parse("");
    assert!(res.diagnostics.has_errors());
    assert!(res.root.expr().is_none());
}
