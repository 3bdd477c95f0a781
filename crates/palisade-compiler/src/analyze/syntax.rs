//! Syntax-policy validation.
//!
//! Walks the user-expression region of the tree and reports every node
//! whose shape the profile does not permit. Runs before typing so shape
//! errors surface even when typing would also fail.

use rowan::TextSize;

use palisade_core::profile::{SyntaxPolicy, SyntaxShape};

use crate::diagnostics::Diagnostics;
use crate::parser::cst::{SyntaxKind, SyntaxNode};

fn shape_of(kind: SyntaxKind) -> Option<SyntaxShape> {
    Some(match kind {
        SyntaxKind::LitExpr => SyntaxShape::Literal,
        SyntaxKind::IdentExpr => SyntaxShape::Ident,
        SyntaxKind::ThisExpr => SyntaxShape::This,
        SyntaxKind::SelectExpr => SyntaxShape::Select,
        SyntaxKind::CallExpr => SyntaxShape::Call,
        SyntaxKind::BinaryExpr => SyntaxShape::Binary,
        SyntaxKind::UnaryExpr => SyntaxShape::Unary,
        SyntaxKind::ConcatExpr => SyntaxShape::Concat,
        SyntaxKind::IfExpr => SyntaxShape::If,
        SyntaxKind::BlockExpr => SyntaxShape::Block,
        SyntaxKind::ParenExpr => SyntaxShape::Paren,
        SyntaxKind::AscribeExpr => SyntaxShape::Ascribe,
        SyntaxKind::LetDef => SyntaxShape::Let,
        _ => return None,
    })
}

fn shape_label(shape: SyntaxShape) -> &'static str {
    match shape {
        SyntaxShape::Literal => "literals",
        SyntaxShape::Ident => "identifiers",
        SyntaxShape::This => "`this`",
        SyntaxShape::Select => "member selection",
        SyntaxShape::Call => "calls",
        SyntaxShape::Binary => "operators",
        SyntaxShape::Unary => "unary operators",
        SyntaxShape::Concat => "string concatenation",
        SyntaxShape::If => "`if` expressions",
        SyntaxShape::Block => "blocks",
        SyntaxShape::Paren => "parentheses",
        SyntaxShape::Ascribe => "type ascription",
        SyntaxShape::Let => "definitions",
    }
}

/// Validate every node starting at or after `from_offset` against the
/// policy.
pub fn validate_syntax(
    node: &SyntaxNode,
    policy: &SyntaxPolicy,
    from_offset: TextSize,
    diag: &mut Diagnostics,
) {
    for descendant in node.descendants() {
        if descendant.text_range().start() < from_offset {
            continue;
        }
        let Some(shape) = shape_of(descendant.kind()) else {
            continue;
        };
        if !policy.allows(shape) {
            diag.error(
                format!(
                    "{} are not permitted in this profile",
                    shape_label(shape)
                ),
                descendant.text_range(),
            )
            .emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use palisade_core::profile::SyntaxPolicy;

    fn errors_for(source: &str, policy: SyntaxPolicy) -> Vec<String> {
        let res = parse(source);
        let mut diag = Diagnostics::new();
        validate_syntax(res.root.as_cst(), &policy, 0.into(), &mut diag);
        diag.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn default_policy_accepts_ordinary_expressions() {
        let errors = errors_for(
            "if (a < 2) \"x\" ++ this.name else b.c(1)",
            SyntaxPolicy::default_policy(),
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn definitions_rejected_by_default() {
        let errors = errors_for("let x = 1\nx", SyntaxPolicy::default_policy());
        assert_eq!(errors, vec!["definitions are not permitted in this profile"]);
    }

    #[test]
    fn forbidden_shape_reported() {
        let policy = SyntaxPolicy::default_policy().forbid(SyntaxShape::If);
        let errors = errors_for("if (true) 1 else 2", policy);
        assert_eq!(errors, vec!["`if` expressions are not permitted in this profile"]);
    }

    #[test]
    fn nodes_before_offset_are_exempt() {
        let source = "let x = 1\nx + 1";
        let res = parse(source);
        let mut diag = Diagnostics::new();
        let offset = (source.find("x +").unwrap() as u32).into();
        validate_syntax(
            res.root.as_cst(),
            &SyntaxPolicy::default_policy(),
            offset,
            &mut diag,
        );
        assert!(diag.is_empty());
    }
}
