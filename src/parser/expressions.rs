//! Expression parsing: one function per precedence level.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::Level;

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        if let Some(assignment) = self.assignment()? {
            return Ok(assignment);
        }
        self.binary(Level::Or)
    }

    /// Speculative: IDENT followed by an assignment operator. Rewinds on a
    /// shape mismatch.
    fn assignment(&mut self) -> ParseResult<Option<Expr>> {
        let checkpoint = self.checkpoint();

        if let TokenKind::Identifier(name) = self.peek_kind() {
            let target = name.clone();
            let start_span = self.bump();

            if let Some(op) = assign_op(self.peek_kind()) {
                self.bump();
                let value = self.expression()?;
                let span = start_span.merge(&value.span);
                return Ok(Some(Expr::new(
                    ExprKind::Assign {
                        target,
                        op,
                        value: Box::new(value),
                    },
                    span,
                )));
            }
        }

        self.rewind(checkpoint);
        Ok(None)
    }

    /// level -> next (op level)?
    ///
    /// Right-associative; no node is built when the operator is absent.
    fn binary(&mut self, level: Level) -> ParseResult<Expr> {
        if level == Level::Unary {
            return self.unary();
        }

        let left = self.binary(level.next())?;
        let Some(op) = level.operator(self.peek_kind()) else {
            return Ok(left);
        };
        self.bump();

        let right = self.binary(level)?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.primary(),
        };
        let start_span = self.bump();

        let operand = self.unary()?;
        let span = start_span.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();

        let kind = match self.peek_kind() {
            TokenKind::IntLiteral(n) => ExprKind::IntLiteral(*n),
            TokenKind::FloatLiteral(n) => ExprKind::FloatLiteral(*n),
            TokenKind::StringLiteral(s) => ExprKind::StringLiteral(s.clone()),
            TokenKind::True => ExprKind::IntLiteral(1),
            TokenKind::False => ExprKind::IntLiteral(0),
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.bump();
                if self.at(&TokenKind::LeftParen) {
                    return self.call(name, start_span);
                }
                return Ok(Expr::new(ExprKind::Variable(name), start_span));
            }
            TokenKind::LeftParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect(&TokenKind::RightParen, "to close the grouping")?;
                return Ok(inner);
            }
            other => {
                return Err(ParserError::expected_expression(
                    format!("{}", other),
                    start_span,
                ))
            }
        };

        self.bump();
        Ok(Expr::new(kind, start_span))
    }

    /// IDENT ( expression, ... )
    fn call(&mut self, callee: String, start_span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen, "before the call arguments")?;

        let mut arguments = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "after the call arguments")?;

        Ok(Expr::new(
            ExprKind::Call { callee, arguments },
            start_span.merge(&self.previous_span()),
        ))
    }
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    match kind {
        TokenKind::Equal => Some(AssignOp::Assign),
        TokenKind::PlusEqual => Some(AssignOp::Add),
        TokenKind::MinusEqual => Some(AssignOp::Subtract),
        TokenKind::StarEqual => Some(AssignOp::Multiply),
        TokenKind::SlashEqual => Some(AssignOp::Divide),
        TokenKind::PercentEqual => Some(AssignOp::Modulo),
        _ => None,
    }
}
