//! Bytecode compiler and virtual machine for brisk.
//!
//! # Architecture
//!
//! - `instruction`: width-specialized opcodes and system calls
//! - `chunk`: the instruction stream and the function table
//! - `scope`: lexical scopes and frame offsets used during compilation
//! - `compiler`: type-directed translation from AST to bytecode
//! - `vm`: accumulator-based stack machine executing bytecode
//! - `disassembler`: debug output for bytecode inspection

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod scope;
pub mod vm;


pub use chunk::{Bytecode, Chunk, FunctionInfo};
pub use compiler::{CompileResult, Compiler};
pub use disassembler::{disassemble, disassemble_instruction, Disassembly};
pub use instruction::{OpCode, SysCall, Width};
pub use vm::{Vm, VmOptions, VmResult};
