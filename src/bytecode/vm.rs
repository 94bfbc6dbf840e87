//! Stack-based virtual machine for executing bytecode.
//!
//! The machine has one 64-bit accumulator, comparison flags, and a byte
//! stack that grows upward in memory. Frame offsets are relative to the base
//! pointer: a slot at offset `o` of `w` bytes occupies
//! `[bp - o - w, bp - o)`, so locals (negative offsets) sit above the saved
//! base pointer and parameters (positive offsets) below it, where the caller
//! pushed them. Return addresses live on a separate call stack.

use std::io::Write;

use tracing::{debug, trace};

use crate::bytecode::chunk::Bytecode;
use crate::bytecode::instruction::{OpCode, SysCall, Width};
use crate::error::RuntimeError;

/// Maximum stack size in bytes.
pub const STACK_MAX: usize = 1 << 20;
/// Maximum call depth.
pub const FRAMES_MAX: usize = 1024;
/// Function run by `Vm::run` unless configured otherwise.
pub const DEFAULT_ENTRY: &str = "main";

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// Limits and entry point for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    pub entry: String,
    pub max_stack: usize,
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            max_stack: STACK_MAX,
            max_call_depth: FRAMES_MAX,
        }
    }
}

/// Set by `cmp`/`icmp`, read by the `set*` instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    eq: bool,
    gt: bool,
    lt: bool,
}

/// The virtual machine. Each instance owns its registers and stack, so the
/// same bytecode can be run by several VMs.
pub struct Vm<'a, W: Write> {
    bytecode: &'a Bytecode,
    options: VmOptions,
    out: W,
    acc: u64,
    ip: usize,
    /// Address of the instruction being executed, for fault reports.
    op_ip: usize,
    bp: usize,
    stack: Vec<u8>,
    return_addresses: Vec<usize>,
    flags: Flags,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn new(bytecode: &'a Bytecode, options: VmOptions, out: W) -> Self {
        Self {
            bytecode,
            options,
            out,
            acc: 0,
            ip: 0,
            op_ip: 0,
            bp: 0,
            stack: Vec::new(),
            return_addresses: Vec::new(),
            flags: Flags::default(),
        }
    }

    /// Run the configured entry function and return the final accumulator.
    pub fn run(&mut self) -> VmResult<u64> {
        let entry = self.options.entry.clone();
        self.run_function(&entry)
    }

    /// Run the named function from a clean machine state.
    pub fn run_function(&mut self, name: &str) -> VmResult<u64> {
        let function = self
            .bytecode
            .function(name)
            .ok_or_else(|| RuntimeError::missing_entry(name))?;

        self.acc = 0;
        self.ip = function.offset;
        self.op_ip = function.offset;
        self.bp = 0;
        self.stack.clear();
        self.return_addresses.clear();
        self.flags = Flags::default();

        debug!(entry = name, offset = function.offset, "starting run");
        let result = self.execute();
        self.out.flush()?;
        let result = result?;
        debug!(result, "run finished");
        Ok(result)
    }

    /// Bytes currently on the stack.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn execute(&mut self) -> VmResult<u64> {
        loop {
            self.op_ip = self.ip;
            let byte = self.read_u8()?;
            let op = OpCode::from_u8(byte)
                .ok_or_else(|| RuntimeError::unknown_opcode(byte, self.op_ip))?;
            let width = op.width();

            match op {
                // ===== Data movement =====
                OpCode::MovAOffset8
                | OpCode::MovAOffset16
                | OpCode::MovAOffset32
                | OpCode::MovAOffset64 => {
                    let offset = self.read_i64()?;
                    let start = self.slot(offset, width)?;
                    self.acc = load(&self.stack[start..start + width.bytes()]);
                }
                OpCode::MovOffsetA8
                | OpCode::MovOffsetA16
                | OpCode::MovOffsetA32
                | OpCode::MovOffsetA64 => {
                    let offset = self.read_i64()?;
                    let start = self.slot(offset, width)?;
                    let bytes = self.acc.to_le_bytes();
                    self.stack[start..start + width.bytes()]
                        .copy_from_slice(&bytes[..width.bytes()]);
                }
                OpCode::MovImm8 | OpCode::MovImm16 | OpCode::MovImm32 | OpCode::MovImm64 => {
                    self.acc = self.read_imm(width)?;
                }

                // ===== Accumulator =====
                OpCode::Sign8 | OpCode::Sign16 | OpCode::Sign32 | OpCode::Sign64 => {
                    self.acc = self.acc.wrapping_neg() & width.mask();
                }
                OpCode::Zext8To16 => self.acc &= Width::Byte.mask(),
                OpCode::Zext16To32 => self.acc &= Width::Word.mask(),
                OpCode::Zext32To64 => self.acc &= Width::Dword.mask(),
                OpCode::Sext8To16 => {
                    self.acc = Width::Byte.sign_extend(self.acc) as u64 & Width::Word.mask();
                }
                OpCode::Sext16To32 => {
                    self.acc = Width::Word.sign_extend(self.acc) as u64 & Width::Dword.mask();
                }
                OpCode::Sext32To64 => {
                    self.acc = Width::Dword.sign_extend(self.acc) as u64;
                }
                OpCode::Neg8 | OpCode::Neg16 | OpCode::Neg32 | OpCode::Neg64 => {
                    self.acc = (self.acc & width.mask() == 0) as u64;
                }
                OpCode::Bneg8 | OpCode::Bneg16 | OpCode::Bneg32 | OpCode::Bneg64 => {
                    self.acc = !self.acc & width.mask();
                }

                // ===== Frames & stack =====
                OpCode::Enter => {
                    self.push(self.bp as u64, Width::Qword)?;
                    self.bp = self.stack.len();
                }
                OpCode::Leave => {
                    if self.bp > self.stack.len() {
                        return Err(RuntimeError::StackUnderflow(self.op_ip));
                    }
                    self.stack.truncate(self.bp);
                    self.bp = self.pop(Width::Qword)? as usize;
                }
                OpCode::AddSp => {
                    let amount = self.read_i64()?;
                    self.adjust_stack(amount)?;
                }
                OpCode::Push8 | OpCode::Push16 | OpCode::Push32 | OpCode::Push64 => {
                    self.push(self.acc, width)?;
                }

                // ===== Arithmetic =====
                OpCode::Add8 | OpCode::Add16 | OpCode::Add32 | OpCode::Add64 => {
                    self.binary(width, |a, b| Some(a.wrapping_add(b)))?;
                }
                OpCode::Sub8 | OpCode::Sub16 | OpCode::Sub32 | OpCode::Sub64 => {
                    self.binary(width, |a, b| Some(a.wrapping_sub(b)))?;
                }
                OpCode::Mul8 | OpCode::Mul16 | OpCode::Mul32 | OpCode::Mul64 => {
                    self.binary(width, |a, b| Some(a.wrapping_mul(b)))?;
                }
                OpCode::Div8 | OpCode::Div16 | OpCode::Div32 | OpCode::Div64 => {
                    self.binary(width, |a, b| a.checked_div(b))?;
                }
                OpCode::Idiv8 | OpCode::Idiv16 | OpCode::Idiv32 | OpCode::Idiv64 => {
                    self.binary(width, |a, b| {
                        signed_op(width, a, b, |x, y| (y != 0).then(|| x.wrapping_div(y)))
                    })?;
                }
                OpCode::Mod8 | OpCode::Mod16 | OpCode::Mod32 | OpCode::Mod64 => {
                    self.binary(width, |a, b| a.checked_rem(b))?;
                }
                OpCode::Imod8 | OpCode::Imod16 | OpCode::Imod32 | OpCode::Imod64 => {
                    self.binary(width, |a, b| {
                        signed_op(width, a, b, |x, y| (y != 0).then(|| x.wrapping_rem(y)))
                    })?;
                }
                OpCode::Shl8 | OpCode::Shl16 | OpCode::Shl32 | OpCode::Shl64 => {
                    self.binary(width, |a, b| {
                        Some(if b >= width.bits() as u64 { 0 } else { a << b })
                    })?;
                }
                OpCode::Shr8 | OpCode::Shr16 | OpCode::Shr32 | OpCode::Shr64 => {
                    self.binary(width, |a, b| {
                        Some(if b >= width.bits() as u64 { 0 } else { a >> b })
                    })?;
                }
                OpCode::Sar8 | OpCode::Sar16 | OpCode::Sar32 | OpCode::Sar64 => {
                    self.binary(width, |a, b| {
                        let shift = b.min(width.bits() as u64 - 1);
                        Some((width.sign_extend(a) >> shift) as u64)
                    })?;
                }

                // ===== Comparison =====
                OpCode::Cmp8 | OpCode::Cmp16 | OpCode::Cmp32 | OpCode::Cmp64 => {
                    let right = self.acc & width.mask();
                    let left = self.pop(width)?;
                    self.set_flags(left.cmp(&right));
                }
                OpCode::Icmp8 | OpCode::Icmp16 | OpCode::Icmp32 | OpCode::Icmp64 => {
                    let right = width.sign_extend(self.acc);
                    let left = width.sign_extend(self.pop(width)?);
                    self.set_flags(left.cmp(&right));
                }
                OpCode::SetLt => self.acc = self.flags.lt as u64,
                OpCode::SetGt => self.acc = self.flags.gt as u64,
                OpCode::SetLe => self.acc = (self.flags.lt || self.flags.eq) as u64,
                OpCode::SetGe => self.acc = (self.flags.gt || self.flags.eq) as u64,
                OpCode::SetEq => self.acc = self.flags.eq as u64,
                OpCode::SetNeq => self.acc = !self.flags.eq as u64,

                // ===== Bitwise & logical =====
                OpCode::Band8 | OpCode::Band16 | OpCode::Band32 | OpCode::Band64 => {
                    self.binary(width, |a, b| Some(a & b))?;
                }
                OpCode::Bxor8 | OpCode::Bxor16 | OpCode::Bxor32 | OpCode::Bxor64 => {
                    self.binary(width, |a, b| Some(a ^ b))?;
                }
                OpCode::Bor8 | OpCode::Bor16 | OpCode::Bor32 | OpCode::Bor64 => {
                    self.binary(width, |a, b| Some(a | b))?;
                }
                OpCode::And8 | OpCode::And16 | OpCode::And32 | OpCode::And64 => {
                    self.binary(width, |a, b| Some((a != 0 && b != 0) as u64))?;
                }
                OpCode::Or8 | OpCode::Or16 | OpCode::Or32 | OpCode::Or64 => {
                    self.binary(width, |a, b| Some((a != 0 || b != 0) as u64))?;
                }

                // ===== Control flow =====
                OpCode::Jz8 | OpCode::Jz16 | OpCode::Jz32 | OpCode::Jz64 => {
                    let target = self.read_u64()?;
                    if self.acc & width.mask() == 0 {
                        self.jump(target)?;
                    }
                }
                OpCode::Jmp => {
                    let target = self.read_u64()?;
                    self.jump(target)?;
                }
                OpCode::Call => {
                    let target = self.read_u64()?;
                    if self.return_addresses.len() >= self.options.max_call_depth {
                        return Err(RuntimeError::CallDepthExceeded {
                            limit: self.options.max_call_depth,
                            ip: self.op_ip,
                        });
                    }
                    trace!(address = target, depth = self.return_addresses.len(), "call");
                    self.return_addresses.push(self.ip);
                    self.jump(target)?;
                }
                OpCode::Ret => match self.return_addresses.pop() {
                    Some(address) => {
                        trace!(address, "ret");
                        self.ip = address;
                    }
                    None => return Ok(self.acc),
                },
                OpCode::Sys => {
                    let index = self.read_u8()?;
                    let call = SysCall::from_u8(index)
                        .ok_or_else(|| RuntimeError::invalid_sys_call(index, self.op_ip))?;
                    self.sys(call)?;
                }
                OpCode::Halt => return Ok(self.acc),
            }
        }
    }

    fn sys(&mut self, call: SysCall) -> VmResult<()> {
        let acc = self.acc;
        match call {
            SysCall::Putc => self.out.write_all(&[acc as u8])?,
            SysCall::PrintI8 => writeln!(self.out, "{}", Width::Byte.sign_extend(acc))?,
            SysCall::PrintI16 => writeln!(self.out, "{}", Width::Word.sign_extend(acc))?,
            SysCall::PrintI32 => writeln!(self.out, "{}", Width::Dword.sign_extend(acc))?,
            SysCall::PrintI64 => writeln!(self.out, "{}", acc as i64)?,
            SysCall::PrintU8 => writeln!(self.out, "{}", acc & Width::Byte.mask())?,
            SysCall::PrintU16 => writeln!(self.out, "{}", acc & Width::Word.mask())?,
            SysCall::PrintU32 => writeln!(self.out, "{}", acc & Width::Dword.mask())?,
            SysCall::PrintU64 => writeln!(self.out, "{}", acc)?,
        }
        Ok(())
    }

    /// Pop the left operand, combine with the accumulator as the right one.
    /// `None` from `f` means division by zero.
    fn binary(&mut self, width: Width, f: impl FnOnce(u64, u64) -> Option<u64>) -> VmResult<()> {
        let right = self.acc & width.mask();
        let left = self.pop(width)?;
        let result = f(left, right).ok_or(RuntimeError::DivisionByZero(self.op_ip))?;
        self.acc = result & width.mask();
        Ok(())
    }

    fn set_flags(&mut self, ordering: std::cmp::Ordering) {
        self.flags = Flags {
            eq: ordering.is_eq(),
            gt: ordering.is_gt(),
            lt: ordering.is_lt(),
        };
    }

    // ===== Stack =====

    fn push(&mut self, value: u64, width: Width) -> VmResult<()> {
        let requested = self.stack.len() + width.bytes();
        if requested > self.options.max_stack {
            return Err(RuntimeError::stack_overflow(
                requested,
                self.options.max_stack,
                self.op_ip,
            ));
        }
        self.stack
            .extend_from_slice(&value.to_le_bytes()[..width.bytes()]);
        Ok(())
    }

    fn pop(&mut self, width: Width) -> VmResult<u64> {
        let len = self.stack.len();
        let start = len
            .checked_sub(width.bytes())
            .ok_or(RuntimeError::StackUnderflow(self.op_ip))?;
        let value = load(&self.stack[start..]);
        self.stack.truncate(start);
        Ok(value)
    }

    /// `add.sp`: shrink by a positive amount, grow (zero-filled) by a
    /// negative one.
    fn adjust_stack(&mut self, amount: i64) -> VmResult<()> {
        let new_len = self.stack.len() as i64 - amount;
        if new_len < 0 {
            return Err(RuntimeError::StackUnderflow(self.op_ip));
        }
        let new_len = new_len as usize;
        if new_len > self.options.max_stack {
            return Err(RuntimeError::stack_overflow(
                new_len,
                self.options.max_stack,
                self.op_ip,
            ));
        }
        self.stack.resize(new_len, 0);
        Ok(())
    }

    /// Start index of the frame slot at `offset`.
    fn slot(&self, offset: i64, width: Width) -> VmResult<usize> {
        let start = self.bp as i64 - offset - width.bytes() as i64;
        if start < 0 || start as usize + width.bytes() > self.stack.len() {
            return Err(RuntimeError::frame_out_of_bounds(offset, self.op_ip));
        }
        Ok(start as usize)
    }

    // ===== Instruction stream =====

    fn read_u8(&mut self) -> VmResult<u8> {
        let byte = *self
            .bytecode
            .chunk
            .code
            .get(self.ip)
            .ok_or(RuntimeError::IpOutOfBounds(self.ip))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u64(&mut self) -> VmResult<u64> {
        let value = self
            .bytecode
            .chunk
            .read_u64(self.ip)
            .ok_or(RuntimeError::IpOutOfBounds(self.ip))?;
        self.ip += 8;
        Ok(value)
    }

    fn read_i64(&mut self) -> VmResult<i64> {
        self.read_u64().map(|v| v as i64)
    }

    fn read_imm(&mut self, width: Width) -> VmResult<u64> {
        let value = self
            .bytecode
            .chunk
            .read_imm(self.ip, width)
            .ok_or(RuntimeError::IpOutOfBounds(self.ip))?;
        self.ip += width.bytes();
        Ok(value)
    }

    fn jump(&mut self, target: u64) -> VmResult<()> {
        self.ip = usize::try_from(target).map_err(|_| RuntimeError::IpOutOfBounds(usize::MAX))?;
        Ok(())
    }
}

/// Little-endian load, zero-extended.
fn load(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64)
}

/// Apply `f` to both operands interpreted as signed values of `width`.
fn signed_op(
    width: Width,
    a: u64,
    b: u64,
    f: impl FnOnce(i64, i64) -> Option<i64>,
) -> Option<u64> {
    f(width.sign_extend(a), width.sign_extend(b)).map(|v| v as u64)
}
