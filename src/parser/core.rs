//! Parser state and the token cursor the grammar rules drive.
//!
//! The token stream always ends in exactly one `Eof`; the cursor parks on
//! it instead of running past the end, so `peek` never fails.

use tracing::debug;

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// A saved cursor position, handed back to [`Parser::rewind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint(usize);

/// Recursive-descent parser for brisk.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::eof(end.end, end.line.max(1), end.column + end.len()));
        }
        Self { tokens, current: 0 }
    }

    /// Parse a complete program.
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut decls = Vec::new();
        while !self.is_at_end() {
            decls.push(self.declaration()?);
        }

        debug!(count = decls.len(), "parsed declarations");
        Ok(Program::new(decls))
    }

    // ===== Cursor =====

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.current].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.current].span
    }

    /// Span of the last consumed token, or of the first token before any.
    pub(crate) fn previous_span(&self) -> Span {
        self.tokens[self.current.saturating_sub(1)].span
    }

    pub(crate) fn is_at_end(&self) -> bool {
        *self.peek_kind() == TokenKind::Eof
    }

    /// Consume the current token and return its span.
    pub(crate) fn bump(&mut self) -> Span {
        let span = self.current_span();
        if !self.is_at_end() {
            self.current += 1;
        }
        span
    }

    /// True when the current token has the same kind as `kind`, ignoring
    /// any literal payload.
    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    /// True on the tokens that close a statement list.
    pub(crate) fn at_block_end(&self) -> bool {
        self.is_at_end() || self.at(&TokenKind::End) || self.at(&TokenKind::Else)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        let found = self.at(kind);
        if found {
            self.bump();
        }
        found
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.current)
    }

    pub(crate) fn rewind(&mut self, checkpoint: Checkpoint) {
        self.current = checkpoint.0;
    }

    // ===== Diagnostics =====

    /// Consume `kind`, or fail naming the construct that needed it.
    pub(crate) fn expect(&mut self, kind: &TokenKind, context: &str) -> ParseResult<Span> {
        if self.at(kind) && !self.is_at_end() {
            return Ok(self.bump());
        }
        Err(self.unexpected(format!("'{}' {}", kind, context)))
    }

    /// Consume an identifier; `role` says what the name is for.
    pub(crate) fn expect_identifier(&mut self, role: &str) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.peek_kind() {
            let name = name.clone();
            self.bump();
            return Ok(name);
        }
        Err(self.unexpected(format!("{} (an identifier)", role)))
    }

    pub(crate) fn found(&self) -> String {
        self.peek_kind().to_string()
    }

    fn unexpected(&self, expected: String) -> ParserError {
        ParserError::unexpected_token(expected, self.found(), self.current_span())
    }
}
