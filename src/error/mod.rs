//! Error types for every stage of the pipeline.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_escape(c: char, span: Span) -> Self {
        Self::InvalidEscape(c, span)
    }

    pub fn invalid_number(s: impl Into<String>, span: Span) -> Self {
        Self::InvalidNumber(s.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Expected declaration ('fun' or 'var'), found '{0}' at {1}")]
    ExpectedDeclaration(String, Span),

    #[error("Expected type, found '{0}' at {1}")]
    ExpectedType(String, Span),

    #[error("Expected expression, found '{0}' at {1}")]
    ExpectedExpression(String, Span),
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn expected_declaration(found: impl Into<String>, span: Span) -> Self {
        Self::ExpectedDeclaration(found.into(), span)
    }

    pub fn expected_type(found: impl Into<String>, span: Span) -> Self {
        Self::ExpectedType(found.into(), span)
    }

    pub fn expected_expression(found: impl Into<String>, span: Span) -> Self {
        Self::ExpectedExpression(found.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::ExpectedDeclaration(_, span) => *span,
            Self::ExpectedType(_, span) => *span,
            Self::ExpectedExpression(_, span) => *span,
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Undeclared identifier '{0}' at {1}")]
    Undeclared(String, Span),

    #[error("'{0}' is a function, not a variable at {1}")]
    NotAVariable(String, Span),

    #[error("'{0}' is not a function at {1}")]
    NotAFunction(String, Span),

    #[error("Function '{0}' is already declared at {1}")]
    DuplicateFunction(String, Span),

    #[error("Wrong number of arguments to '{name}': expected {expected}, got {got} at {span}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Unsupported cast from {from} to {to} at {span}")]
    UnsupportedCast {
        from: String,
        to: String,
        span: Span,
    },

    #[error("{0} at {1}")]
    UnitValue(String, Span),

    #[error("Floating-point arithmetic is not supported at {0}")]
    FloatArithmetic(Span),

    #[error("{0} at {1}")]
    InvalidReturn(String, Span),

    #[error("{message} at {span}")]
    Unsupported { message: String, span: Span },
}

impl CompileError {
    pub fn undeclared(name: impl Into<String>, span: Span) -> Self {
        Self::Undeclared(name.into(), span)
    }

    pub fn not_a_variable(name: impl Into<String>, span: Span) -> Self {
        Self::NotAVariable(name.into(), span)
    }

    pub fn not_a_function(name: impl Into<String>, span: Span) -> Self {
        Self::NotAFunction(name.into(), span)
    }

    pub fn duplicate_function(name: impl Into<String>, span: Span) -> Self {
        Self::DuplicateFunction(name.into(), span)
    }

    pub fn wrong_arity(name: impl Into<String>, expected: usize, got: usize, span: Span) -> Self {
        Self::WrongArity {
            name: name.into(),
            expected,
            got,
            span,
        }
    }

    pub fn unsupported_cast(from: impl ToString, to: impl ToString, span: Span) -> Self {
        Self::UnsupportedCast {
            from: from.to_string(),
            to: to.to_string(),
            span,
        }
    }

    pub fn unit_value(message: impl Into<String>, span: Span) -> Self {
        Self::UnitValue(message.into(), span)
    }

    pub fn float_arithmetic(span: Span) -> Self {
        Self::FloatArithmetic(span)
    }

    pub fn invalid_return(message: impl Into<String>, span: Span) -> Self {
        Self::InvalidReturn(message.into(), span)
    }

    pub fn unsupported(message: impl Into<String>, span: Span) -> Self {
        Self::Unsupported {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Undeclared(_, span) => *span,
            Self::NotAVariable(_, span) => *span,
            Self::NotAFunction(_, span) => *span,
            Self::DuplicateFunction(_, span) => *span,
            Self::WrongArity { span, .. } => *span,
            Self::UnsupportedCast { span, .. } => *span,
            Self::UnitValue(_, span) => *span,
            Self::FloatArithmetic(span) => *span,
            Self::InvalidReturn(_, span) => *span,
            Self::Unsupported { span, .. } => *span,
        }
    }
}

/// Runtime faults. Each one ends the current run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Stack underflow at ip {0:#x}")]
    StackUnderflow(usize),

    #[error("Stack overflow: {requested} bytes exceeds the {limit} byte limit at ip {ip:#x}")]
    StackOverflow {
        requested: usize,
        limit: usize,
        ip: usize,
    },

    #[error("Invalid system call {index} at ip {ip:#x}")]
    InvalidSysCall { index: u8, ip: usize },

    #[error("Unknown opcode {opcode:#04x} at ip {ip:#x}")]
    UnknownOpcode { opcode: u8, ip: usize },

    #[error("Instruction pointer {0:#x} is outside the program")]
    IpOutOfBounds(usize),

    #[error("Division by zero at ip {0:#x}")]
    DivisionByZero(usize),

    #[error("No entry function named '{0}'")]
    MissingEntry(String),

    #[error("Call depth exceeded {limit} frames at ip {ip:#x}")]
    CallDepthExceeded { limit: usize, ip: usize },

    #[error("Frame offset {offset:+} is outside the stack at ip {ip:#x}")]
    FrameOutOfBounds { offset: i64, ip: usize },

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn stack_overflow(requested: usize, limit: usize, ip: usize) -> Self {
        Self::StackOverflow {
            requested,
            limit,
            ip,
        }
    }

    pub fn invalid_sys_call(index: u8, ip: usize) -> Self {
        Self::InvalidSysCall { index, ip }
    }

    pub fn unknown_opcode(opcode: u8, ip: usize) -> Self {
        Self::UnknownOpcode { opcode, ip }
    }

    pub fn missing_entry(name: impl Into<String>) -> Self {
        Self::MissingEntry(name.into())
    }

    pub fn frame_out_of_bounds(offset: i64, ip: usize) -> Self {
        Self::FrameOutOfBounds { offset, ip }
    }

    /// The instruction pointer the fault was raised at, when known.
    pub fn ip(&self) -> Option<usize> {
        match self {
            Self::StackUnderflow(ip) => Some(*ip),
            Self::StackOverflow { ip, .. } => Some(*ip),
            Self::InvalidSysCall { ip, .. } => Some(*ip),
            Self::UnknownOpcode { ip, .. } => Some(*ip),
            Self::IpOutOfBounds(ip) => Some(*ip),
            Self::DivisionByZero(ip) => Some(*ip),
            Self::CallDepthExceeded { ip, .. } => Some(*ip),
            Self::FrameOutOfBounds { ip, .. } => Some(*ip),
            Self::MissingEntry(_) | Self::Io(_) => None,
        }
    }
}

/// A unified error type for all stages.
#[derive(Debug, Error)]
pub enum BriskError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BriskError {
    /// Short name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lexer(_) => "lex",
            Self::Parser(_) => "parse",
            Self::Compile(_) => "compile",
            Self::Runtime(_) => "runtime",
            Self::Io(_) => "io",
        }
    }

    /// Source location of the error, for the stages that have one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer(e) => Some(e.span()),
            Self::Parser(e) => Some(e.span()),
            Self::Compile(e) => Some(e.span()),
            Self::Runtime(_) | Self::Io(_) => None,
        }
    }
}
