//! Syntax kinds for the expression language.
//!
//! `SyntaxKind` serves dual roles: token kinds (from the lexer) and node
//! kinds (from the parser). Logos derives token recognition; node kinds
//! carry no token/regex attributes. `ExprLang` implements Rowan's
//! `Language` trait for tree construction.

use logos::Logos;
use rowan::Language;

/// All token and node kinds. Tokens first, then nodes, then `__LAST`.
/// `#[repr(u16)]` enables the transmute in `kind_from_raw`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    #[token("(")]
    ParenOpen = 0,

    #[token(")")]
    ParenClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token(",")]
    Comma,

    #[token(";")]
    Semi,

    #[token(".")]
    Dot,

    /// `::` type ascription. Declared before single tokens it prefixes.
    #[token("::")]
    ColonColon,

    /// `++` template concatenation.
    #[token("++")]
    PlusPlus,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,

    #[token("!=")]
    BangEq,

    #[token("<=")]
    LtEq,

    #[token("<")]
    Lt,

    #[token(">=")]
    GtEq,

    #[token(">")]
    Gt,

    #[token("&&")]
    AmpAmp,

    #[token("||")]
    PipePipe,

    #[token("!")]
    Bang,

    #[token("=")]
    Eq,

    #[token("if")]
    KwIf,

    #[token("else")]
    KwElse,

    #[token("true")]
    KwTrue,

    #[token("false")]
    KwFalse,

    #[token("this")]
    KwThis,

    #[token("let")]
    KwLet,

    /// Declared before `IntLit`; longest-match keeps `3.f` an int select.
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLit,

    #[regex(r"[0-9]+")]
    IntLit,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    StringLit,

    /// Keywords are declared as tokens, so they take precedence.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[ \t]+")]
    Whitespace,

    #[token("\n")]
    #[token("\r\n")]
    Newline,

    #[regex(r"//[^\n]*", allow_greedy = true)]
    LineComment,

    /// Coalesced unrecognized characters.
    Garbage,
    Error,

    // --- Node kinds (non-terminals) ---
    Root,
    LetDef,
    LitExpr,
    IdentExpr,
    ThisExpr,
    SelectExpr,
    CallExpr,
    ArgList,
    BinaryExpr,
    UnaryExpr,
    ConcatExpr,
    IfExpr,
    BlockExpr,
    ParenExpr,
    AscribeExpr,
    TypeName,

    // Must be last - bounds check for `kind_from_raw`.
    #[doc(hidden)]
    __LAST,
}

use SyntaxKind::*;

impl SyntaxKind {
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(self, Whitespace | Newline | LineComment)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Error | Garbage)
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    #[inline]
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

/// Language tag for Rowan's tree types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExprLang {}

impl Language for ExprLang {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 < __LAST as u16);
        // SAFETY: the value is in bounds and SyntaxKind is repr(u16).
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<ExprLang>;
pub type SyntaxToken = rowan::SyntaxToken<ExprLang>;
pub type SyntaxElement = rowan::NodeOrToken<SyntaxNode, SyntaxToken>;

/// 64-bit bitset of `SyntaxKind`s for O(1) membership testing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    /// Panics at compile time if any kind's discriminant >= 64.
    #[inline]
    pub const fn new(kinds: &[SyntaxKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            let kind = kinds[i] as u16;
            assert!(kind < 64, "SyntaxKind value exceeds TokenSet capacity");
            bits |= 1 << kind;
            i += 1;
        }
        TokenSet(bits)
    }

    #[inline]
    pub const fn contains(&self, kind: SyntaxKind) -> bool {
        let kind = kind as u16;
        if kind >= 64 {
            return false;
        }
        self.0 & (1 << kind) != 0
    }

    #[inline]
    pub const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }
}

/// Pre-defined token sets for the parser.
pub mod token_sets {
    use super::*;

    /// FIRST set of expressions.
    pub const EXPR_FIRST: TokenSet = TokenSet::new(&[
        ParenOpen,
        BraceOpen,
        Minus,
        Bang,
        KwIf,
        KwTrue,
        KwFalse,
        KwThis,
        FloatLit,
        IntLit,
        StringLit,
        Ident,
    ]);

    pub const MUL_OPS: TokenSet = TokenSet::new(&[Star, Slash, Percent]);
    pub const ADD_OPS: TokenSet = TokenSet::new(&[Plus, Minus]);
    pub const CMP_OPS: TokenSet = TokenSet::new(&[Lt, LtEq, Gt, GtEq]);
    pub const EQ_OPS: TokenSet = TokenSet::new(&[EqEq, BangEq]);

    pub const LIT_TOKENS: TokenSet =
        TokenSet::new(&[IntLit, FloatLit, StringLit, KwTrue, KwFalse]);
}
