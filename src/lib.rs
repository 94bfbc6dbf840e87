//! brisk: a small statically typed language compiled to bytecode.
//!
//! Source text goes through four stages, each consuming the previous one's
//! output in full:
//!
//! - **Lexer**: `lexer::Scanner` turns source into tokens
//! - **Parser**: `parser::Parser` builds the AST
//! - **Compiler**: `bytecode::Compiler` resolves names, lays out frames and
//!   selects width-specialized instructions in a single pass
//! - **VM**: `bytecode::Vm` executes the result on an accumulator machine

#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

use std::io::Write;

use error::BriskError;

/// Lex source code into tokens.
pub fn tokenize(source: &str) -> Result<Vec<lexer::Token>, BriskError> {
    Ok(lexer::Scanner::new(source).scan_tokens()?)
}

/// Parse source code into an AST without compiling.
pub fn parse(source: &str) -> Result<ast::Program, BriskError> {
    let tokens = tokenize(source)?;
    let program = parser::Parser::new(tokens).parse()?;
    Ok(program)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, BriskError> {
    let program = parse(source)?;
    let mut compiler = bytecode::Compiler::new();
    Ok(compiler.compile(&program)?)
}

/// Run a program's `main` function, printing to stdout.
pub fn run(source: &str) -> Result<u64, BriskError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_output(source, &mut out)
}

/// Run a program's `main` function, printing to `out`.
pub fn run_with_output<W: Write>(source: &str, out: &mut W) -> Result<u64, BriskError> {
    run_function(source, bytecode::vm::DEFAULT_ENTRY, out)
}

/// Run the named function of a program, printing to `out`.
pub fn run_function<W: Write>(source: &str, name: &str, out: &mut W) -> Result<u64, BriskError> {
    let program = compile(source)?;
    let mut vm = bytecode::Vm::new(&program, bytecode::VmOptions::default(), out);
    Ok(vm.run_function(name)?)
}
