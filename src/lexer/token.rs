//! Token definitions for the brisk lexer.

use std::fmt;

use crate::span::Span;

/// All token kinds in brisk.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(u64),
    FloatLiteral(f64),
    StringLiteral(String),

    Identifier(String),

    // Type keywords
    Unit,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,

    // Keywords
    Var,
    Fun,
    While,
    If,
    Then,
    Else,
    Match,
    Return,
    Begin,
    End,
    True,
    False,

    // Operators
    Equal,
    EqualEqual,
    Plus,
    PlusEqual,
    Minus,
    MinusEqual,
    Arrow, // ->
    Star,
    StarEqual,
    Slash,
    SlashEqual,
    Percent,
    PercentEqual,
    Bang,
    BangEqual,
    Greater,
    GreaterEqual,
    ShiftRight,
    Less,
    LessEqual,
    ShiftLeft,
    Ampersand,
    AndAnd,
    Pipe,
    OrOr,
    Caret,
    Tilde,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Colon,

    Eof,
}

impl TokenKind {
    /// Check if this identifier is a keyword and return the corresponding kind.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        match ident {
            "unit" => Some(TokenKind::Unit),
            "i8" => Some(TokenKind::I8),
            "u8" => Some(TokenKind::U8),
            "i16" => Some(TokenKind::I16),
            "u16" => Some(TokenKind::U16),
            "i32" => Some(TokenKind::I32),
            "u32" => Some(TokenKind::U32),
            "i64" => Some(TokenKind::I64),
            "u64" => Some(TokenKind::U64),
            "f32" => Some(TokenKind::F32),
            "f64" => Some(TokenKind::F64),
            "var" => Some(TokenKind::Var),
            "fun" => Some(TokenKind::Fun),
            "while" => Some(TokenKind::While),
            "if" => Some(TokenKind::If),
            "then" => Some(TokenKind::Then),
            "else" => Some(TokenKind::Else),
            "match" => Some(TokenKind::Match),
            "return" => Some(TokenKind::Return),
            "begin" => Some(TokenKind::Begin),
            "end" => Some(TokenKind::End),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Unit
                | TokenKind::I8
                | TokenKind::U8
                | TokenKind::I16
                | TokenKind::U16
                | TokenKind::I32
                | TokenKind::U32
                | TokenKind::I64
                | TokenKind::U64
                | TokenKind::F32
                | TokenKind::F64
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLiteral(n) => write!(f, "{}", n),
            TokenKind::FloatLiteral(n) => write!(f, "{}", n),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s.escape_default()),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Unit => write!(f, "unit"),
            TokenKind::I8 => write!(f, "i8"),
            TokenKind::U8 => write!(f, "u8"),
            TokenKind::I16 => write!(f, "i16"),
            TokenKind::U16 => write!(f, "u16"),
            TokenKind::I32 => write!(f, "i32"),
            TokenKind::U32 => write!(f, "u32"),
            TokenKind::I64 => write!(f, "i64"),
            TokenKind::U64 => write!(f, "u64"),
            TokenKind::F32 => write!(f, "f32"),
            TokenKind::F64 => write!(f, "f64"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::Fun => write!(f, "fun"),
            TokenKind::While => write!(f, "while"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Then => write!(f, "then"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Match => write!(f, "match"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Begin => write!(f, "begin"),
            TokenKind::End => write!(f, "end"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::PlusEqual => write!(f, "+="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::MinusEqual => write!(f, "-="),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::StarEqual => write!(f, "*="),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::SlashEqual => write!(f, "/="),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::PercentEqual => write!(f, "%="),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::BangEqual => write!(f, "!="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::ShiftRight => write!(f, ">>"),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::ShiftLeft => write!(f, "<<"),
            TokenKind::Ampersand => write!(f, "&"),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Tilde => write!(f, "~"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(position, position, line, column),
        }
    }
}
