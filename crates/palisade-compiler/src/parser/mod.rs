//! Lexer, CST, parser, and typed AST for the expression language.

pub mod ast;
pub mod cst;
pub mod grammar;
mod core;
pub mod lexer;

#[cfg(test)]
mod parser_tests;

pub use ast::{Expr, Root};
pub use self::core::{ParseResult, Parser};
pub use cst::{ExprLang, SyntaxKind, SyntaxNode, SyntaxToken, TokenSet};
pub use lexer::{Token, lex, token_text};

/// Lex and parse source into a CST root plus diagnostics.
pub fn parse(source: &str) -> ParseResult {
    Parser::new(source, lex(source)).parse()
}

/// Parse a definitions-only source (a profile utilities block).
pub fn parse_defs(source: &str) -> ParseResult {
    Parser::new(source, lex(source)).defs_only().parse()
}
