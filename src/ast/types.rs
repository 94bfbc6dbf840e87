//! Declared types.

use std::fmt;

use crate::lexer::TokenKind;

/// One of the eleven builtin types. Every expression resolves to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    /// No value. Only valid as a function return type.
    #[default]
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
}

impl Type {
    /// Width of a value of this type, in bytes.
    pub fn size(self) -> usize {
        match self {
            Type::Unit => 0,
            Type::I8 | Type::U8 => 1,
            Type::I16 | Type::U16 => 2,
            Type::I32 | Type::U32 | Type::F32 => 4,
            Type::I64 | Type::U64 | Type::F64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_unit() && !self.is_float()
    }

    pub fn is_unit(self) -> bool {
        self == Type::Unit
    }

    /// Map a type keyword token to its type.
    pub fn from_token(kind: &TokenKind) -> Option<Type> {
        match kind {
            TokenKind::Unit => Some(Type::Unit),
            TokenKind::I8 => Some(Type::I8),
            TokenKind::U8 => Some(Type::U8),
            TokenKind::I16 => Some(Type::I16),
            TokenKind::U16 => Some(Type::U16),
            TokenKind::I32 => Some(Type::I32),
            TokenKind::U32 => Some(Type::U32),
            TokenKind::I64 => Some(Type::I64),
            TokenKind::U64 => Some(Type::U64),
            TokenKind::F32 => Some(Type::F32),
            TokenKind::F64 => Some(Type::F64),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Unit => "unit",
            Type::I8 => "i8",
            Type::U8 => "u8",
            Type::I16 => "i16",
            Type::U16 => "u16",
            Type::I32 => "i32",
            Type::U32 => "u32",
            Type::I64 => "i64",
            Type::U64 => "u64",
            Type::F32 => "f32",
            Type::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}
