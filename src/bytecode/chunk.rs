//! Instruction stream and compiled program layout.

use crate::ast::Type;
use crate::bytecode::instruction::{OpCode, SysCall, Width};

/// An append-only stream of encoded instructions.
///
/// Immediates are big-endian. Placeholders are written like any other
/// operand and filled in later by index with `patch_u64`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// The bytecode instructions.
    pub code: Vec<u8>,
    /// Source line for each byte of `code`.
    pub lines: Vec<usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write_byte(op as u8, line);
    }

    /// Write the `width` member of a width-specialized group.
    pub fn write_sized(&mut self, base: OpCode, width: Width, line: usize) {
        self.write_byte(base as u8 + width.index(), line);
    }

    pub fn write_byte(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_u64(&mut self, value: u64, line: usize) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    pub fn write_i64(&mut self, value: i64, line: usize) {
        self.write_u64(value as u64, line);
    }

    /// Write the low `width` bytes of `value`.
    pub fn write_imm(&mut self, value: u64, width: Width, line: usize) {
        let bytes = value.to_be_bytes();
        for byte in &bytes[8 - width.bytes()..] {
            self.write_byte(*byte, line);
        }
    }

    pub fn write_sys(&mut self, call: SysCall, line: usize) {
        self.write_op(OpCode::Sys, line);
        self.write_byte(call as u8, line);
    }

    /// Write an 8-byte placeholder and return its index for `patch_u64`.
    pub fn write_placeholder(&mut self, line: usize) -> usize {
        let index = self.len();
        self.write_u64(0, line);
        index
    }

    /// Overwrite the 8 bytes at `index`.
    pub fn patch_u64(&mut self, index: usize, value: u64) {
        self.code[index..index + 8].copy_from_slice(&value.to_be_bytes());
    }

    pub fn read_u64(&self, index: usize) -> Option<u64> {
        let bytes = self.code.get(index..index + 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(u64::from_be_bytes(buf))
    }

    /// Read a big-endian immediate of `width` bytes.
    pub fn read_imm(&self, index: usize, width: Width) -> Option<u64> {
        let bytes = self.code.get(index..index + width.bytes())?;
        Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }

    /// Get the line number at a given offset.
    pub fn get_line(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }
}

/// A function table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    /// Byte offset of the first instruction.
    pub offset: usize,
    /// Length of the function's code in bytes.
    pub len: usize,
    /// Bytes reserved by the prologue for locals.
    pub frame_size: usize,
    pub params: Vec<Type>,
    pub return_type: Type,
}

/// A compiled program: one instruction stream plus its function table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub chunk: Chunk,
    pub functions: Vec<FunctionInfo>,
}

impl Bytecode {
    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }
}
