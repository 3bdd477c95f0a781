//! Lexer for the expression language.
//!
//! Produces span-based tokens without storing text - text is sliced from
//! source only when needed. Consecutive error characters coalesce into
//! single `Garbage` tokens to keep the stream manageable for bad input.

use logos::Logos;
use rowan::TextRange;
use std::ops::Range;

use super::cst::SyntaxKind;

/// Zero-copy token: kind + span, text retrieved via [`token_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: TextRange,
}

impl Token {
    #[inline]
    pub fn new(kind: SyntaxKind, span: TextRange) -> Self {
        Self { kind, span }
    }
}

fn range_to_text_range(range: Range<usize>) -> TextRange {
    TextRange::new((range.start as u32).into(), (range.end as u32).into())
}

/// Tokenize source into span-based tokens.
pub fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = SyntaxKind::lexer(source);
    let mut error_start: Option<usize> = None;

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                if let Some(start) = error_start.take() {
                    let end = lexer.span().start;
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..end),
                    ));
                }
                tokens.push(Token::new(kind, range_to_text_range(lexer.span())));
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..source.len()),
                    ));
                }
                break;
            }
        }
    }

    tokens
}

/// The text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'s>(source: &'s str, token: &Token) -> &'s str {
    &source[std::ops::Range::<usize>::from(token.span)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use SyntaxKind::*;

    fn kinds(source: &str) -> Vec<SyntaxKind> {
        lex(source)
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds(r#"1 + 2.5 * "x""#),
            vec![IntLit, Plus, FloatLit, Star, StringLit]
        );
    }

    #[test]
    fn two_char_operators_win() {
        assert_eq!(kinds("a == b != c <= d >= e"), vec![
            Ident, EqEq, Ident, BangEq, Ident, LtEq, Ident, GtEq, Ident
        ]);
        assert_eq!(kinds("a ++ b + c"), vec![Ident, PlusPlus, Ident, Plus, Ident]);
        assert_eq!(kinds("x :: Int"), vec![Ident, ColonColon, Ident]);
    }

    #[test]
    fn keywords_versus_idents() {
        assert_eq!(kinds("if iffy this thistle"), vec![
            KwIf, Ident, KwThis, Ident
        ]);
        assert_eq!(kinds("let letter"), vec![KwLet, Ident]);
    }

    #[test]
    fn int_select_is_not_a_float() {
        assert_eq!(kinds("3.to_float"), vec![IntLit, Dot, Ident]);
        assert_eq!(kinds("3.14"), vec![FloatLit]);
    }

    #[test]
    fn garbage_coalesces() {
        let tokens = lex("a ## b");
        let garbage: Vec<_> = tokens.iter().filter(|t| t.kind == Garbage).collect();
        assert_eq!(garbage.len(), 1);
        assert_eq!(garbage[0].span, TextRange::new(2.into(), 4.into()));
    }

    #[test]
    fn comments_are_trivia() {
        let tokens = lex("1 // trailing\n2");
        assert!(tokens.iter().any(|t| t.kind == LineComment));
        assert_eq!(kinds("1 // trailing\n2"), vec![IntLit, IntLit]);
    }

    #[test]
    fn string_with_escapes() {
        assert_eq!(kinds(r#""a\"b" + x"#), vec![StringLit, Plus, Ident]);
    }
}
