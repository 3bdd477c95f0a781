//! Typed AST wrappers over CST nodes.
//!
//! Each struct wraps a `SyntaxNode` and provides typed accessors. Cast is
//! infallible for the correct `SyntaxKind` - validation happens elsewhere.

use super::cst::{SyntaxKind, SyntaxNode, SyntaxToken};

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl $name {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                (node.kind() == SyntaxKind::$kind).then(|| Self(node))
            }

            pub fn as_cst(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

ast_node!(Root, Root);
ast_node!(LetDef, LetDef);
ast_node!(LitExpr, LitExpr);
ast_node!(IdentExpr, IdentExpr);
ast_node!(ThisExpr, ThisExpr);
ast_node!(SelectExpr, SelectExpr);
ast_node!(CallExpr, CallExpr);
ast_node!(ArgList, ArgList);
ast_node!(BinaryExpr, BinaryExpr);
ast_node!(UnaryExpr, UnaryExpr);
ast_node!(ConcatExpr, ConcatExpr);
ast_node!(IfExpr, IfExpr);
ast_node!(BlockExpr, BlockExpr);
ast_node!(ParenExpr, ParenExpr);
ast_node!(AscribeExpr, AscribeExpr);
ast_node!(TypeName, TypeName);

/// Expression: any node that produces a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Lit(LitExpr),
    Ident(IdentExpr),
    This(ThisExpr),
    Select(SelectExpr),
    Call(CallExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Concat(ConcatExpr),
    If(IfExpr),
    Block(BlockExpr),
    Paren(ParenExpr),
    Ascribe(AscribeExpr),
}

impl Expr {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::LitExpr => LitExpr::cast(node).map(Expr::Lit),
            SyntaxKind::IdentExpr => IdentExpr::cast(node).map(Expr::Ident),
            SyntaxKind::ThisExpr => ThisExpr::cast(node).map(Expr::This),
            SyntaxKind::SelectExpr => SelectExpr::cast(node).map(Expr::Select),
            SyntaxKind::CallExpr => CallExpr::cast(node).map(Expr::Call),
            SyntaxKind::BinaryExpr => BinaryExpr::cast(node).map(Expr::Binary),
            SyntaxKind::UnaryExpr => UnaryExpr::cast(node).map(Expr::Unary),
            SyntaxKind::ConcatExpr => ConcatExpr::cast(node).map(Expr::Concat),
            SyntaxKind::IfExpr => IfExpr::cast(node).map(Expr::If),
            SyntaxKind::BlockExpr => BlockExpr::cast(node).map(Expr::Block),
            SyntaxKind::ParenExpr => ParenExpr::cast(node).map(Expr::Paren),
            SyntaxKind::AscribeExpr => AscribeExpr::cast(node).map(Expr::Ascribe),
            _ => None,
        }
    }

    pub fn as_cst(&self) -> &SyntaxNode {
        match self {
            Expr::Lit(n) => n.as_cst(),
            Expr::Ident(n) => n.as_cst(),
            Expr::This(n) => n.as_cst(),
            Expr::Select(n) => n.as_cst(),
            Expr::Call(n) => n.as_cst(),
            Expr::Binary(n) => n.as_cst(),
            Expr::Unary(n) => n.as_cst(),
            Expr::Concat(n) => n.as_cst(),
            Expr::If(n) => n.as_cst(),
            Expr::Block(n) => n.as_cst(),
            Expr::Paren(n) => n.as_cst(),
            Expr::Ascribe(n) => n.as_cst(),
        }
    }
}

fn first_token(node: &SyntaxNode, pred: fn(SyntaxKind) -> bool) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| pred(t.kind()))
}

impl Root {
    pub fn lets(&self) -> impl Iterator<Item = LetDef> + '_ {
        self.0.children().filter_map(LetDef::cast)
    }

    pub fn expr(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

impl LetDef {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| k == SyntaxKind::Ident)
    }

    pub fn body(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

impl LitExpr {
    /// The literal token, if any; `()` unit literals carry none.
    pub fn token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| {
            matches!(
                k,
                SyntaxKind::IntLit
                    | SyntaxKind::FloatLit
                    | SyntaxKind::StringLit
                    | SyntaxKind::KwTrue
                    | SyntaxKind::KwFalse
            )
        })
    }
}

impl IdentExpr {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| k == SyntaxKind::Ident)
    }

    pub fn name(&self) -> Option<String> {
        self.name_token().map(|t| t.text().to_owned())
    }
}

impl SelectExpr {
    pub fn qualifier(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn dot_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| k == SyntaxKind::Dot)
    }

    /// The member name after the dot; missing on broken selects.
    pub fn name_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| k == SyntaxKind::Ident)
    }
}

impl CallExpr {
    pub fn callee(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn arg_list(&self) -> Option<ArgList> {
        self.0.children().find_map(ArgList::cast)
    }

    pub fn args(&self) -> impl Iterator<Item = Expr> + '_ {
        self.arg_list()
            .into_iter()
            .flat_map(|list| list.exprs().collect::<Vec<_>>())
    }
}

impl ArgList {
    pub fn exprs(&self) -> impl Iterator<Item = Expr> + '_ {
        self.0.children().filter_map(Expr::cast)
    }
}

impl BinaryExpr {
    pub fn op_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| {
            matches!(
                k,
                SyntaxKind::Plus
                    | SyntaxKind::Minus
                    | SyntaxKind::Star
                    | SyntaxKind::Slash
                    | SyntaxKind::Percent
                    | SyntaxKind::EqEq
                    | SyntaxKind::BangEq
                    | SyntaxKind::Lt
                    | SyntaxKind::LtEq
                    | SyntaxKind::Gt
                    | SyntaxKind::GtEq
                    | SyntaxKind::AmpAmp
                    | SyntaxKind::PipePipe
            )
        })
    }

    pub fn lhs(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn rhs(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).nth(1)
    }
}

impl UnaryExpr {
    pub fn op_token(&self) -> Option<SyntaxToken> {
        first_token(&self.0, |k| {
            matches!(k, SyntaxKind::Minus | SyntaxKind::Bang)
        })
    }

    pub fn operand(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

impl ConcatExpr {
    pub fn lhs(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn rhs(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).nth(1)
    }
}

impl IfExpr {
    pub fn cond(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn then_branch(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).nth(1)
    }

    pub fn else_branch(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).nth(2)
    }
}

impl BlockExpr {
    pub fn exprs(&self) -> impl Iterator<Item = Expr> + '_ {
        self.0.children().filter_map(Expr::cast)
    }
}

impl ParenExpr {
    pub fn inner(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

impl AscribeExpr {
    pub fn expr(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn ty(&self) -> Option<TypeName> {
        self.0.children().find_map(TypeName::cast)
    }
}

impl TypeName {
    /// The textual type, ready for `TypeRep::parse`.
    pub fn text(&self) -> String {
        self.0.text().to_string()
    }
}
