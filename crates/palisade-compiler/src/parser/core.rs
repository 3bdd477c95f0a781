//! Parser state machine and low-level operations.
//!
//! Trivia tokens (whitespace, comments) are buffered and flushed as leading
//! trivia when starting a node, giving predictable trivia attachment
//! without backtracking.

use rowan::{Checkpoint, GreenNode, TextRange, TextSize};

use super::ast::Root;
use super::cst::{SyntaxKind, SyntaxNode};
use super::lexer::{Token, token_text};
use crate::diagnostics::Diagnostics;

/// Recursion guard for deeply nested input.
const MAX_DEPTH: u32 = 512;

#[derive(Debug)]
pub struct ParseResult {
    pub root: Root,
    pub diagnostics: Diagnostics,
}

pub struct Parser<'src> {
    pub(super) source: &'src str,
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    trivia_buffer: Vec<Token>,
    builder: rowan::GreenNodeBuilder<'static>,
    pub(super) diagnostics: Diagnostics,
    pub(super) defs_only: bool,
    depth: u32,
    depth_exceeded: bool,
    last_diagnostic_pos: Option<TextSize>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            trivia_buffer: Vec::with_capacity(4),
            builder: rowan::GreenNodeBuilder::new(),
            diagnostics: Diagnostics::new(),
            defs_only: false,
            depth: 0,
            depth_exceeded: false,
            last_diagnostic_pos: None,
        }
    }

    /// Accept sources that are only `let` definitions (utility blocks).
    pub fn defs_only(mut self) -> Self {
        self.defs_only = true;
        self
    }

    pub fn parse(mut self) -> ParseResult {
        self.parse_root();
        let (green, diagnostics) = self.finish();
        let root = Root::cast(SyntaxNode::new_root(green)).expect("parser always produces Root");
        ParseResult { root, diagnostics }
    }

    fn finish(mut self) -> (GreenNode, Diagnostics) {
        self.drain_trivia();
        (self.builder.finish(), self.diagnostics)
    }

    /// Returns `Error` at EOF (acts as sentinel).
    pub(super) fn current(&self) -> SyntaxKind {
        self.nth(0)
    }

    pub(super) fn nth(&self, lookahead: usize) -> SyntaxKind {
        self.tokens
            .get(self.pos + lookahead)
            .map_or(SyntaxKind::Error, |t| t.kind)
    }

    pub(super) fn current_span(&self) -> TextRange {
        self.tokens
            .get(self.pos)
            .map_or_else(|| TextRange::empty(self.eof_offset()), |t| t.span)
    }

    pub(super) fn eof_offset(&self) -> TextSize {
        TextSize::from(self.source.len() as u32)
    }

    pub(super) fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(super) fn peek(&mut self) -> SyntaxKind {
        self.skip_trivia_to_buffer();
        self.current()
    }

    /// LL(k) lookahead past trivia.
    pub(super) fn peek_nth(&mut self, n: usize) -> SyntaxKind {
        self.skip_trivia_to_buffer();
        let mut count = 0;
        let mut pos = self.pos;
        while pos < self.tokens.len() {
            let kind = self.tokens[pos].kind;
            if !kind.is_trivia() {
                if count == n {
                    return kind;
                }
                count += 1;
            }
            pos += 1;
        }
        SyntaxKind::Error
    }

    fn skip_trivia_to_buffer(&mut self) {
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind.is_trivia() {
            self.trivia_buffer.push(self.tokens[self.pos]);
            self.pos += 1;
        }
    }

    fn drain_trivia(&mut self) {
        for token in self.trivia_buffer.drain(..) {
            let text = token_text(self.source, &token);
            self.builder.token(token.kind.into(), text);
        }
    }

    pub(super) fn eat_trivia(&mut self) {
        self.skip_trivia_to_buffer();
        self.drain_trivia();
    }

    pub(super) fn start_node(&mut self, kind: SyntaxKind) {
        self.drain_trivia();
        self.builder.start_node(kind.into());
    }

    /// Wrap previously-parsed content using a checkpoint.
    pub(super) fn start_node_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.builder.start_node_at(checkpoint, kind.into());
    }

    pub(super) fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    pub(super) fn checkpoint(&mut self) -> Checkpoint {
        self.drain_trivia();
        self.builder.checkpoint()
    }

    pub(super) fn bump(&mut self) {
        assert!(!self.eof(), "bump called at EOF");
        let token = self.tokens[self.pos];
        let text = token_text(self.source, &token);
        self.builder.token(token.kind.into(), text);
        self.pos += 1;
    }

    pub(super) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// On mismatch: emit a diagnostic but don't consume, so the parent can
    /// recover.
    pub(super) fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error(format!("expected {what}"));
        false
    }

    pub(super) fn error(&mut self, message: impl Into<String>) {
        let range = self.current_span();
        let pos = range.start();
        if self.last_diagnostic_pos == Some(pos) {
            return;
        }
        self.last_diagnostic_pos = Some(pos);
        self.diagnostics.error(message, range).emit();
    }

    pub(super) fn error_and_bump(&mut self, message: &str) {
        self.error(message);
        if !self.eof() {
            self.start_node(SyntaxKind::Error);
            self.bump();
            self.finish_node();
        }
    }

    /// Consume everything to EOF into an Error node.
    pub(super) fn consume_rest_as_error(&mut self) {
        self.skip_trivia_to_buffer();
        if self.eof() {
            return;
        }
        self.start_node(SyntaxKind::Error);
        while !self.eof() {
            self.bump();
            self.skip_trivia_to_buffer();
        }
        self.finish_node();
    }

    pub(super) fn enter_recursion(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            if !self.depth_exceeded {
                self.depth_exceeded = true;
                self.error("expression nested too deeply");
            }
            return false;
        }
        self.depth += 1;
        true
    }

    pub(super) fn exit_recursion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
