//! Declaration parsing: functions, variables and types.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    /// Only functions and variables may appear at the top level.
    pub(crate) fn declaration(&mut self) -> ParseResult<Decl> {
        let start_span = self.current_span();
        let kind = if self.at(&TokenKind::Fun) {
            DeclKind::Function(self.function_declaration()?)
        } else if self.at(&TokenKind::Var) {
            DeclKind::Var(self.var_declaration()?)
        } else {
            return Err(ParserError::expected_declaration(self.found(), start_span));
        };

        Ok(Decl::new(kind, start_span.merge(&self.previous_span())))
    }

    /// fun IDENT ( type IDENT, ... ) -> type begin ... end
    fn function_declaration(&mut self) -> ParseResult<FunctionDecl> {
        self.expect(&TokenKind::Fun, "to start a function")?;
        let name = self.expect_identifier("function name")?;

        self.expect(&TokenKind::LeftParen, "before the parameter list")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                let param_span = self.current_span();
                let ty = self.parse_type()?;
                let param_name = self.expect_identifier("parameter name")?;
                params.push(Param {
                    name: param_name,
                    ty,
                    span: param_span.merge(&self.previous_span()),
                });

                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "after the parameter list")?;

        self.expect(&TokenKind::Arrow, "before the return type")?;
        let return_type = self.parse_type()?;
        let body = self.block()?;

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    /// var IDENT : type ( = expression )?
    pub(crate) fn var_declaration(&mut self) -> ParseResult<VarDecl> {
        self.expect(&TokenKind::Var, "to start a variable")?;
        let name = self.expect_identifier("variable name")?;
        self.expect(&TokenKind::Colon, "before the variable type")?;
        let ty = self.parse_type()?;

        let initializer = if self.eat(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(VarDecl {
            name,
            ty,
            initializer,
        })
    }

    pub(crate) fn parse_type(&mut self) -> ParseResult<Type> {
        match Type::from_token(self.peek_kind()) {
            Some(ty) => {
                self.bump();
                Ok(ty)
            }
            None => Err(ParserError::expected_type(self.found(), self.current_span())),
        }
    }
}
