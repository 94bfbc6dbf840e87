//! Binary operator precedence levels.

use crate::ast::BinaryOp;
use crate::lexer::TokenKind;

/// Precedence levels from loosest to tightest binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Or,       // ||
    And,      // &&
    BitOr,    // |
    BitXor,   // ^
    BitAnd,   // &
    Compare,  // == !=
    Relation, // < <= > >=
    Shift,    // << >>
    Term,     // + -
    Factor,   // * / %
    Unary,    // ! ~ -
}

impl Level {
    pub fn next(self) -> Level {
        match self {
            Level::Or => Level::And,
            Level::And => Level::BitOr,
            Level::BitOr => Level::BitXor,
            Level::BitXor => Level::BitAnd,
            Level::BitAnd => Level::Compare,
            Level::Compare => Level::Relation,
            Level::Relation => Level::Shift,
            Level::Shift => Level::Term,
            Level::Term => Level::Factor,
            Level::Factor => Level::Unary,
            Level::Unary => Level::Unary,
        }
    }

    /// The binary operator `kind` denotes at this level, if any.
    pub fn operator(self, kind: &TokenKind) -> Option<BinaryOp> {
        let op = match (self, kind) {
            (Level::Or, TokenKind::OrOr) => BinaryOp::Or,
            (Level::And, TokenKind::AndAnd) => BinaryOp::And,
            (Level::BitOr, TokenKind::Pipe) => BinaryOp::BitOr,
            (Level::BitXor, TokenKind::Caret) => BinaryOp::BitXor,
            (Level::BitAnd, TokenKind::Ampersand) => BinaryOp::BitAnd,
            (Level::Compare, TokenKind::EqualEqual) => BinaryOp::Equal,
            (Level::Compare, TokenKind::BangEqual) => BinaryOp::NotEqual,
            (Level::Relation, TokenKind::Less) => BinaryOp::Less,
            (Level::Relation, TokenKind::LessEqual) => BinaryOp::LessEqual,
            (Level::Relation, TokenKind::Greater) => BinaryOp::Greater,
            (Level::Relation, TokenKind::GreaterEqual) => BinaryOp::GreaterEqual,
            (Level::Shift, TokenKind::ShiftLeft) => BinaryOp::ShiftLeft,
            (Level::Shift, TokenKind::ShiftRight) => BinaryOp::ShiftRight,
            (Level::Term, TokenKind::Plus) => BinaryOp::Add,
            (Level::Term, TokenKind::Minus) => BinaryOp::Subtract,
            (Level::Factor, TokenKind::Star) => BinaryOp::Multiply,
            (Level::Factor, TokenKind::Slash) => BinaryOp::Divide,
            (Level::Factor, TokenKind::Percent) => BinaryOp::Modulo,
            _ => return None,
        };
        Some(op)
    }
}
