//! Bytecode disassembler for debugging.

use std::fmt::{self, Write};

use crate::bytecode::chunk::{Bytecode, Chunk, FunctionInfo};
use crate::bytecode::instruction::{OpCode, SysCall};

/// Disassemble every function of a compiled program.
pub fn disassemble(bytecode: &Bytecode) -> String {
    Disassembly(bytecode).to_string()
}

/// Display adapter over a compiled program.
pub struct Disassembly<'a>(pub &'a Bytecode);

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.0.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write_function(f, &self.0.chunk, function)?;
        }
        Ok(())
    }
}

fn write_function(out: &mut impl Write, chunk: &Chunk, function: &FunctionInfo) -> fmt::Result {
    writeln!(
        out,
        "== {} ({:#06x}, {}, frame {}) ==",
        function.name, function.offset, function.len, function.frame_size
    )?;

    let end = (function.offset + function.len).min(chunk.len());
    let mut offset = function.offset;
    while offset < end {
        offset = write_instruction(out, chunk, offset)?;
    }
    Ok(())
}

/// Disassemble a single instruction and return the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let next = write_instruction(&mut output, chunk, offset).unwrap_or(offset + 1);
    (output, next)
}

fn write_instruction(out: &mut impl Write, chunk: &Chunk, offset: usize) -> Result<usize, fmt::Error> {
    write!(out, "{:04}  ", offset)?;

    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        write!(out, "    |  ")?;
    } else {
        write!(out, "{:>4}|  ", line)?;
    }

    let Some(&byte) = chunk.code.get(offset) else {
        writeln!(out, ".end")?;
        return Ok(offset + 1);
    };
    let Some(op) = OpCode::from_u8(byte) else {
        writeln!(out, ".byte {:#04x}", byte)?;
        return Ok(offset + 1);
    };

    let operand = offset + 1;
    let next = operand + op.operand_len();
    if next > chunk.len() {
        writeln!(out, ".byte {:#04x}  ; truncated {}", byte, op)?;
        return Ok(offset + 1);
    }

    let word = || chunk.read_u64(operand).unwrap_or(0);
    match op.split() {
        (OpCode::MovAOffset8, _) => writeln!(out, "{} a, {:+}", op, word() as i64)?,
        (OpCode::MovOffsetA8, _) => writeln!(out, "{} {:+}, a", op, word() as i64)?,
        (OpCode::MovImm8, Some(width)) => {
            let value = chunk.read_imm(operand, width).unwrap_or(0);
            writeln!(out, "{} a, {}", op, value)?
        }
        (OpCode::AddSp, _) => writeln!(out, "{} {}", op, word() as i64)?,
        (OpCode::Jz8, _) | (OpCode::Jmp, _) | (OpCode::Call, _) => {
            writeln!(out, "{} {:#06x}", op, word())?
        }
        (OpCode::Sys, _) => {
            let index = chunk.code[operand];
            match SysCall::from_u8(index) {
                Some(call) => writeln!(out, "{} {}", op, call.name())?,
                None => writeln!(out, "{} {:#04x}", op, index)?,
            }
        }
        _ => writeln!(out, "{}", op)?,
    }

    Ok(next)
}
