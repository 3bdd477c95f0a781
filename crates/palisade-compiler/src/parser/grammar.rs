//! Grammar productions for the expression language.
//!
//! Precedence, loosest first: ascription (`::`), `||`, `&&`, equality,
//! comparison, concatenation (`++`), additive, multiplicative, unary,
//! postfix (select / call), primary.

use super::core::Parser;
use super::cst::token_sets::{ADD_OPS, CMP_OPS, EQ_OPS, EXPR_FIRST, LIT_TOKENS, MUL_OPS};
use super::cst::{SyntaxKind, TokenSet};

impl Parser<'_> {
    pub(super) fn parse_root(&mut self) {
        self.start_node(SyntaxKind::Root);

        while self.peek() == SyntaxKind::KwLet {
            self.parse_let_def();
        }

        if EXPR_FIRST.contains(self.peek()) {
            self.parse_expr();
        } else if self.eof() {
            if !self.defs_only {
                self.error("expected expression");
            }
        } else {
            self.error_and_bump("expected expression");
            // Retry once after the bad token, then give up.
            if EXPR_FIRST.contains(self.peek()) {
                self.parse_expr();
            }
        }

        if !self.eof() && self.peek() != SyntaxKind::Error {
            self.error("unexpected input after expression");
        }
        self.consume_rest_as_error();

        self.eat_trivia();
        self.finish_node();
    }

    /// `let name = expr`
    fn parse_let_def(&mut self) {
        self.start_node(SyntaxKind::LetDef);
        self.bump(); // `let`
        self.expect(SyntaxKind::Ident, "binding name");
        self.expect(SyntaxKind::Eq, "`=`");
        if EXPR_FIRST.contains(self.peek()) {
            self.parse_expr();
        } else {
            self.error("expected expression after `=`");
        }
        self.finish_node();
    }

    pub(super) fn parse_expr(&mut self) {
        if !self.enter_recursion() {
            self.consume_rest_as_error();
            return;
        }
        self.parse_ascribe();
        self.exit_recursion();
    }

    /// `expr :: Type`
    fn parse_ascribe(&mut self) {
        let checkpoint = self.checkpoint();
        self.parse_or();
        while self.peek() == SyntaxKind::ColonColon {
            self.start_node_at(checkpoint, SyntaxKind::AscribeExpr);
            self.bump();
            self.parse_type_name();
            self.finish_node();
        }
    }

    fn parse_or(&mut self) {
        self.parse_bin_level(
            TokenSet::new(&[SyntaxKind::PipePipe]),
            SyntaxKind::BinaryExpr,
            Self::parse_and,
        );
    }

    fn parse_and(&mut self) {
        self.parse_bin_level(
            TokenSet::new(&[SyntaxKind::AmpAmp]),
            SyntaxKind::BinaryExpr,
            Self::parse_eq,
        );
    }

    fn parse_eq(&mut self) {
        self.parse_bin_level(EQ_OPS, SyntaxKind::BinaryExpr, Self::parse_cmp);
    }

    fn parse_cmp(&mut self) {
        self.parse_bin_level(CMP_OPS, SyntaxKind::BinaryExpr, Self::parse_concat);
    }

    fn parse_concat(&mut self) {
        self.parse_bin_level(
            TokenSet::new(&[SyntaxKind::PlusPlus]),
            SyntaxKind::ConcatExpr,
            Self::parse_add,
        );
    }

    fn parse_add(&mut self) {
        self.parse_bin_level(ADD_OPS, SyntaxKind::BinaryExpr, Self::parse_mul);
    }

    fn parse_mul(&mut self) {
        self.parse_bin_level(MUL_OPS, SyntaxKind::BinaryExpr, Self::parse_unary);
    }

    /// Left-associative binary level: wrap at a checkpoint on each operator.
    fn parse_bin_level(&mut self, ops: TokenSet, node: SyntaxKind, next: fn(&mut Self)) {
        let checkpoint = self.checkpoint();
        next(self);
        while ops.contains(self.peek()) {
            self.start_node_at(checkpoint, node);
            self.bump();
            if EXPR_FIRST.contains(self.peek()) {
                next(self);
            } else {
                self.error("expected operand");
            }
            self.finish_node();
        }
    }

    fn parse_unary(&mut self) {
        if matches!(self.peek(), SyntaxKind::Minus | SyntaxKind::Bang) {
            if !self.enter_recursion() {
                self.consume_rest_as_error();
                return;
            }
            self.start_node(SyntaxKind::UnaryExpr);
            self.bump();
            self.parse_unary();
            self.finish_node();
            self.exit_recursion();
        } else {
            self.parse_postfix();
        }
    }

    /// Postfix chains: `.name` selects and `(args)` calls.
    fn parse_postfix(&mut self) {
        let checkpoint = self.checkpoint();
        self.parse_primary();
        loop {
            match self.peek() {
                SyntaxKind::Dot => {
                    self.start_node_at(checkpoint, SyntaxKind::SelectExpr);
                    self.bump();
                    if !self.eat(SyntaxKind::Ident) {
                        self.error("expected member name after `.`");
                    }
                    self.finish_node();
                }
                SyntaxKind::ParenOpen => {
                    self.start_node_at(checkpoint, SyntaxKind::CallExpr);
                    self.parse_arg_list();
                    self.finish_node();
                }
                _ => break,
            }
        }
    }

    fn parse_arg_list(&mut self) {
        self.start_node(SyntaxKind::ArgList);
        self.bump(); // `(`
        if self.peek() != SyntaxKind::ParenClose {
            loop {
                if EXPR_FIRST.contains(self.peek()) {
                    self.parse_expr();
                } else {
                    self.error("expected argument");
                    break;
                }
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
        }
        self.expect(SyntaxKind::ParenClose, "`)`");
        self.finish_node();
    }

    fn parse_primary(&mut self) {
        if !self.enter_recursion() {
            self.consume_rest_as_error();
            return;
        }
        match self.peek() {
            kind if LIT_TOKENS.contains(kind) => {
                self.start_node(SyntaxKind::LitExpr);
                self.bump();
                self.finish_node();
            }
            SyntaxKind::KwThis => {
                self.start_node(SyntaxKind::ThisExpr);
                self.bump();
                self.finish_node();
            }
            SyntaxKind::Ident => {
                self.start_node(SyntaxKind::IdentExpr);
                self.bump();
                self.finish_node();
            }
            SyntaxKind::KwIf => self.parse_if(),
            SyntaxKind::BraceOpen => self.parse_block(),
            SyntaxKind::ParenOpen => {
                if self.peek_nth(1) == SyntaxKind::ParenClose {
                    // Unit literal `()`.
                    self.start_node(SyntaxKind::LitExpr);
                    self.bump();
                    self.bump();
                    self.finish_node();
                } else {
                    self.start_node(SyntaxKind::ParenExpr);
                    self.bump();
                    self.parse_expr();
                    self.expect(SyntaxKind::ParenClose, "`)`");
                    self.finish_node();
                }
            }
            _ => self.error_and_bump("expected expression"),
        }
        self.exit_recursion();
    }

    /// `if (cond) then else alt`
    fn parse_if(&mut self) {
        self.start_node(SyntaxKind::IfExpr);
        self.bump(); // `if`
        self.expect(SyntaxKind::ParenOpen, "`(` after `if`");
        if EXPR_FIRST.contains(self.peek()) {
            self.parse_expr();
        } else {
            self.error("expected condition");
        }
        self.expect(SyntaxKind::ParenClose, "`)`");
        if EXPR_FIRST.contains(self.peek()) {
            self.parse_expr();
        } else {
            self.error("expected expression");
        }
        if self.expect(SyntaxKind::KwElse, "`else`") {
            if EXPR_FIRST.contains(self.peek()) {
                self.parse_expr();
            } else {
                self.error("expected expression after `else`");
            }
        }
        self.finish_node();
    }

    /// `{ e1; e2; … }`
    fn parse_block(&mut self) {
        self.start_node(SyntaxKind::BlockExpr);
        self.bump(); // `{`
        if self.peek() == SyntaxKind::BraceClose {
            self.error("empty block");
            self.bump();
            self.finish_node();
            return;
        }
        loop {
            if EXPR_FIRST.contains(self.peek()) {
                self.parse_expr();
            } else {
                self.error("expected expression in block");
                break;
            }
            if !self.eat(SyntaxKind::Semi) {
                break;
            }
            // Trailing semicolon.
            if self.peek() == SyntaxKind::BraceClose {
                break;
            }
        }
        self.expect(SyntaxKind::BraceClose, "`}`");
        self.finish_node();
    }

    /// One `TypeName` node covering the whole textual type, brackets
    /// included.
    fn parse_type_name(&mut self) {
        self.start_node(SyntaxKind::TypeName);
        self.type_name_tokens();
        self.finish_node();
    }

    fn type_name_tokens(&mut self) {
        if !self.expect(SyntaxKind::Ident, "type name") {
            return;
        }
        if self.peek() == SyntaxKind::BracketOpen {
            if !self.enter_recursion() {
                return;
            }
            self.bump();
            loop {
                self.type_name_tokens();
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            self.expect(SyntaxKind::BracketClose, "`]`");
            self.exit_recursion();
        }
    }
}
