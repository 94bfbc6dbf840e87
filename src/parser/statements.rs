//! Statement parsing: var, if, match, while, blocks and return.

use crate::ast::*;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    /// Parse statements up to (not including) `end` or `else`.
    pub(crate) fn statement_list(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.at_block_end() {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    /// begin ... end
    pub(crate) fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::Begin, "to open a block")?;
        let statements = self.statement_list()?;
        self.expect(&TokenKind::End, "to close a block")?;
        Ok(statements)
    }

    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        if self.at(&TokenKind::Var) {
            self.var_statement()
        } else if self.at(&TokenKind::If) {
            self.if_statement()
        } else if self.at(&TokenKind::Match) {
            self.match_statement()
        } else if self.at(&TokenKind::While) {
            self.while_statement()
        } else if self.at(&TokenKind::Begin) {
            self.block_statement()
        } else if self.at(&TokenKind::Return) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn var_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        let decl = self.var_declaration()?;
        Ok(Stmt::new(
            StmtKind::Var(decl),
            start_span.merge(&self.previous_span()),
        ))
    }

    /// The inner `if` of an `else if` chain consumes the closing `end`.
    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::If, "to start an if statement")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::Then, "after the if condition")?;
        let then_branch = self.statement_list()?;

        let else_branch = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                Some(Box::new(self.if_statement()?))
            } else {
                let else_span = self.current_span();
                let statements = self.statement_list()?;
                self.expect(&TokenKind::End, "to close the else branch")?;
                Some(Box::new(Stmt::new(
                    StmtKind::Block(statements),
                    else_span.merge(&self.previous_span()),
                )))
            }
        } else {
            self.expect(&TokenKind::End, "to close the if statement")?;
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            start_span.merge(&self.previous_span()),
        ))
    }

    /// match ?(expression) begin (expression then ... end)+ end
    fn match_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Match, "to start a match statement")?;

        let scrutinee = if self.at(&TokenKind::Begin) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Begin, "before the match arms")?;

        let mut arms = Vec::new();
        loop {
            let arm_span = self.current_span();
            let pattern = self.expression()?;
            self.expect(&TokenKind::Then, "after the match pattern")?;
            let body = self.statement_list()?;
            self.expect(&TokenKind::End, "to close the match arm")?;
            arms.push(MatchArm {
                pattern,
                body,
                span: arm_span.merge(&self.previous_span()),
            });

            if self.at(&TokenKind::End) || self.is_at_end() {
                break;
            }
        }
        self.expect(&TokenKind::End, "to close the match statement")?;

        Ok(Stmt::new(
            StmtKind::Match { scrutinee, arms },
            start_span.merge(&self.previous_span()),
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::While, "to start a while loop")?;
        let condition = self.expression()?;
        let body = self.block()?;

        Ok(Stmt::new(
            StmtKind::While { condition, body },
            start_span.merge(&self.previous_span()),
        ))
    }

    fn block_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        let statements = self.block()?;
        Ok(Stmt::new(
            StmtKind::Block(statements),
            start_span.merge(&self.previous_span()),
        ))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Return, "to start a return statement")?;

        let value = if self.at_block_end() {
            None
        } else {
            Some(self.expression()?)
        };

        Ok(Stmt::new(
            StmtKind::Return(value),
            start_span.merge(&self.previous_span()),
        ))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
