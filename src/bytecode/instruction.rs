//! Bytecode instruction definitions for the brisk VM.
//!
//! Width-specialized instructions come in groups of four consecutive opcodes
//! (8, 16, 32 and 64 bit). The compiler selects a physical encoding with
//! `base as u8 + width.index()`, so every group must stay contiguous and
//! start at its 8-bit variant. A byte that lands outside the table would
//! decode as a different instruction and corrupt control flow.

use std::fmt;

/// Operand width of a width-specialized instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}

impl Width {
    pub const ALL: [Width; 4] = [Width::Byte, Width::Word, Width::Dword, Width::Qword];

    /// Width for a value of `size` bytes.
    pub fn from_size(size: usize) -> Option<Width> {
        match size {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            4 => Some(Width::Dword),
            8 => Some(Width::Qword),
            _ => None,
        }
    }

    /// log2 of the width in bytes; the offset from a group's base opcode.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn bytes(self) -> usize {
        1 << self.index()
    }

    pub fn bits(self) -> u32 {
        8 << self.index()
    }

    /// The next width up, if any.
    pub fn wider(self) -> Option<Width> {
        match self {
            Width::Byte => Some(Width::Word),
            Width::Word => Some(Width::Dword),
            Width::Dword => Some(Width::Qword),
            Width::Qword => None,
        }
    }

    /// All-ones value of this width.
    pub fn mask(self) -> u64 {
        match self {
            Width::Qword => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// Interpret the low bits of `value` as a two's-complement number.
    pub fn sign_extend(self, value: u64) -> i64 {
        let shift = 64 - self.bits();
        ((value << shift) as i64) >> shift
    }

    /// Mnemonic suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Width::Byte => "b",
            Width::Word => "w",
            Width::Dword => "dw",
            Width::Qword => "qw",
        }
    }
}

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Data movement ============
    /// a <- [bp + offset]: MOV_A_OFFSET <offset:i64>
    MovAOffset8 = 0,
    MovAOffset16,
    MovAOffset32,
    MovAOffset64,
    /// [bp + offset] <- a: MOV_OFFSET_A <offset:i64>
    MovOffsetA8,
    MovOffsetA16,
    MovOffsetA32,
    MovOffsetA64,
    /// a <- imm: MOV_IMM <imm:width>
    MovImm8,
    MovImm16,
    MovImm32,
    MovImm64,

    // ============ Accumulator ============
    /// Two's complement negation
    Sign8,
    Sign16,
    Sign32,
    Sign64,
    /// Zero extension by one width step
    Zext8To16,
    Zext16To32,
    Zext32To64,
    /// Sign extension by one width step
    Sext8To16,
    Sext16To32,
    Sext32To64,
    /// Logical not: 1 when zero, else 0
    Neg8,
    Neg16,
    Neg32,
    Neg64,
    /// Bitwise not
    Bneg8,
    Bneg16,
    Bneg32,
    Bneg64,

    // ============ Frames & stack ============
    /// Push bp, bp <- top of stack
    Enter,
    /// Drop the frame, restore bp
    Leave,
    /// Shrink the stack by a signed amount: ADD_SP <amount:i64>
    AddSp,
    /// Push the low bytes of a
    Push8,
    Push16,
    Push32,
    Push64,

    // ============ Arithmetic (pop left, a is right) ============
    Add8,
    Add16,
    Add32,
    Add64,
    Sub8,
    Sub16,
    Sub32,
    Sub64,
    Mul8,
    Mul16,
    Mul32,
    Mul64,
    Div8,
    Div16,
    Div32,
    Div64,
    Idiv8,
    Idiv16,
    Idiv32,
    Idiv64,
    Mod8,
    Mod16,
    Mod32,
    Mod64,
    Imod8,
    Imod16,
    Imod32,
    Imod64,
    Shl8,
    Shl16,
    Shl32,
    Shl64,
    Shr8,
    Shr16,
    Shr32,
    Shr64,
    Sar8,
    Sar16,
    Sar32,
    Sar64,

    // ============ Comparison ============
    /// Unsigned compare, sets flags
    Cmp8,
    Cmp16,
    Cmp32,
    Cmp64,
    /// Signed compare, sets flags
    Icmp8,
    Icmp16,
    Icmp32,
    Icmp64,
    /// a <- flag
    SetLt,
    SetGt,
    SetLe,
    SetGe,
    SetEq,
    SetNeq,

    // ============ Bitwise & logical ============
    Band8,
    Band16,
    Band32,
    Band64,
    Bxor8,
    Bxor16,
    Bxor32,
    Bxor64,
    Bor8,
    Bor16,
    Bor32,
    Bor64,
    And8,
    And16,
    And32,
    And64,
    Or8,
    Or16,
    Or32,
    Or64,

    // ============ Control flow ============
    /// Jump when the low bytes of a are zero: JZ <address:u64>
    Jz8,
    Jz16,
    Jz32,
    Jz64,
    /// JMP <address:u64>
    Jmp,
    /// CALL <address:u64>
    Call,
    Ret,
    /// SYS <index:u8>
    Sys,
    Halt,
}

/// Base opcodes of every width-specialized group.
const SIZED_GROUPS: [OpCode; 25] = [
    OpCode::MovAOffset8,
    OpCode::MovOffsetA8,
    OpCode::MovImm8,
    OpCode::Sign8,
    OpCode::Neg8,
    OpCode::Bneg8,
    OpCode::Push8,
    OpCode::Add8,
    OpCode::Sub8,
    OpCode::Mul8,
    OpCode::Div8,
    OpCode::Idiv8,
    OpCode::Mod8,
    OpCode::Imod8,
    OpCode::Shl8,
    OpCode::Shr8,
    OpCode::Sar8,
    OpCode::Cmp8,
    OpCode::Icmp8,
    OpCode::Band8,
    OpCode::Bxor8,
    OpCode::Bor8,
    OpCode::And8,
    OpCode::Or8,
    OpCode::Jz8,
];

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::Halt as u8 {
            // SAFETY: OpCode is repr(u8) with contiguous discriminants from 0
            // to Halt.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }

    /// The physical opcode of a width-specialized group at `width`.
    pub fn sized(base: OpCode, width: Width) -> Option<OpCode> {
        if !base.is_group_base() {
            return None;
        }
        OpCode::from_u8(base as u8 + width.index())
    }

    fn is_group_base(self) -> bool {
        SIZED_GROUPS.contains(&self)
    }

    /// Split into the group's base opcode and width. Opcodes outside any
    /// group return themselves with no width.
    pub fn split(self) -> (OpCode, Option<Width>) {
        let byte = self as u8;
        for base in SIZED_GROUPS {
            let start = base as u8;
            if (start..start + 4).contains(&byte) {
                return (base, Some(Width::ALL[(byte - start) as usize]));
            }
        }
        (self, None)
    }

    /// Width of a width-specialized opcode; full width for the rest.
    pub fn width(self) -> Width {
        self.split().1.unwrap_or(Width::Qword)
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> usize {
        match self.split() {
            (OpCode::MovAOffset8 | OpCode::MovOffsetA8 | OpCode::Jz8, _) => 8,
            (OpCode::MovImm8, Some(width)) => width.bytes(),
            (OpCode::AddSp | OpCode::Jmp | OpCode::Call, None) => 8,
            (OpCode::Sys, None) => 1,
            _ => 0,
        }
    }

    /// Mnemonic without the width suffix.
    pub fn name(self) -> &'static str {
        match self.split().0 {
            OpCode::MovAOffset8 | OpCode::MovOffsetA8 | OpCode::MovImm8 => "mov",
            OpCode::Sign8 => "sign",
            OpCode::Zext8To16 => "zext.8.16",
            OpCode::Zext16To32 => "zext.16.32",
            OpCode::Zext32To64 => "zext.32.64",
            OpCode::Sext8To16 => "sext.8.16",
            OpCode::Sext16To32 => "sext.16.32",
            OpCode::Sext32To64 => "sext.32.64",
            OpCode::Neg8 => "neg",
            OpCode::Bneg8 => "bneg",
            OpCode::Enter => "enter",
            OpCode::Leave => "leave",
            OpCode::AddSp => "add.sp",
            OpCode::Push8 => "push",
            OpCode::Add8 => "add",
            OpCode::Sub8 => "sub",
            OpCode::Mul8 => "mul",
            OpCode::Div8 => "div",
            OpCode::Idiv8 => "idiv",
            OpCode::Mod8 => "mod",
            OpCode::Imod8 => "imod",
            OpCode::Shl8 => "shl",
            OpCode::Shr8 => "shr",
            OpCode::Sar8 => "sar",
            OpCode::Cmp8 => "cmp",
            OpCode::Icmp8 => "icmp",
            OpCode::SetLt => "setlt",
            OpCode::SetGt => "setgt",
            OpCode::SetLe => "setle",
            OpCode::SetGe => "setge",
            OpCode::SetEq => "seteq",
            OpCode::SetNeq => "setneq",
            OpCode::Band8 => "band",
            OpCode::Bxor8 => "bxor",
            OpCode::Bor8 => "bor",
            OpCode::And8 => "and",
            OpCode::Or8 => "or",
            OpCode::Jz8 => "jz",
            OpCode::Jmp => "jmp",
            OpCode::Call => "call",
            OpCode::Ret => "ret",
            OpCode::Sys => "sys",
            OpCode::Halt => "halt",
            _ => "?",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.split() {
            (_, Some(width)) => write!(f, "{}.{}", self.name(), width.suffix()),
            (_, None) => write!(f, "{}", self.name()),
        }
    }
}

/// Built-in system functions reachable through `sys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SysCall {
    /// Write the low byte of a
    Putc = 0,
    /// Print a as a signed decimal followed by a newline
    PrintI8,
    PrintI16,
    PrintI32,
    PrintI64,
    /// Print a as an unsigned decimal followed by a newline
    PrintU8,
    PrintU16,
    PrintU32,
    PrintU64,
}

impl SysCall {
    pub fn from_u8(index: u8) -> Option<SysCall> {
        let call = match index {
            0 => SysCall::Putc,
            1 => SysCall::PrintI8,
            2 => SysCall::PrintI16,
            3 => SysCall::PrintI32,
            4 => SysCall::PrintI64,
            5 => SysCall::PrintU8,
            6 => SysCall::PrintU16,
            7 => SysCall::PrintU32,
            8 => SysCall::PrintU64,
            _ => return None,
        };
        Some(call)
    }

    /// The print call for an integer of `width`.
    pub fn print(width: Width, signed: bool) -> SysCall {
        match (signed, width) {
            (true, Width::Byte) => SysCall::PrintI8,
            (true, Width::Word) => SysCall::PrintI16,
            (true, Width::Dword) => SysCall::PrintI32,
            (true, Width::Qword) => SysCall::PrintI64,
            (false, Width::Byte) => SysCall::PrintU8,
            (false, Width::Word) => SysCall::PrintU16,
            (false, Width::Dword) => SysCall::PrintU32,
            (false, Width::Qword) => SysCall::PrintU64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SysCall::Putc => "PUTC",
            SysCall::PrintI8 => "PRINT_I8",
            SysCall::PrintI16 => "PRINT_I16",
            SysCall::PrintI32 => "PRINT_I32",
            SysCall::PrintI64 => "PRINT_I64",
            SysCall::PrintU8 => "PRINT_U8",
            SysCall::PrintU16 => "PRINT_U16",
            SysCall::PrintU32 => "PRINT_U32",
            SysCall::PrintU64 => "PRINT_U64",
        }
    }
}
