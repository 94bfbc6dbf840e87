//! Bytecode compiler: type-directed code generation from the AST.
//!
//! Type resolution, frame layout and emission happen in a single walk. Every
//! expression is emitted against an expected type: `Type::Unit` on entry asks
//! the emitter to infer one and write it back, any other type asks for a
//! value of exactly that type.

use tracing::{debug, trace};

use crate::ast::{
    AssignOp, BinaryOp, Decl, DeclKind, Expr, ExprKind, FunctionDecl, MatchArm, Program, Stmt,
    StmtKind, Type, UnaryOp, VarDecl,
};
use crate::bytecode::chunk::{Bytecode, FunctionInfo};
use crate::bytecode::instruction::{OpCode, SysCall, Width};
use crate::bytecode::scope::{Local, ScopeChain};
use crate::error::CompileError;
use crate::span::Span;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Builtin used when no function of that name is declared.
const PRINT: &str = "print";

/// The saved base pointer sits between the frame base and the parameters.
const PARAM_BASE: i64 = 8;

/// Type an expression has on its own, before any expected type applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Natural {
    /// Comparison results fit any integer type.
    Flexible,
    /// An integer literal, possibly under a unary minus.
    Literal { value: u64, negated: bool },
    Fixed(Type),
}

impl Natural {
    /// The wider of two natural types. A literal takes its partner's type
    /// when it fits and widens the pair otherwise.
    fn combine(self, other: Natural) -> Natural {
        match (self, other) {
            (Natural::Flexible, n) | (n, Natural::Flexible) => n,
            (literal @ Natural::Literal { .. }, Natural::Fixed(ty))
            | (Natural::Fixed(ty), literal @ Natural::Literal { .. }) => {
                let own = literal.resolve();
                if !ty.is_integer() || literal.fits(ty) {
                    Natural::Fixed(ty)
                } else {
                    Natural::Fixed(own)
                }
            }
            (a @ Natural::Literal { .. }, b @ Natural::Literal { .. }) => {
                if b.resolve().size() > a.resolve().size() {
                    b
                } else {
                    a
                }
            }
            (Natural::Fixed(a), Natural::Fixed(b)) if b.size() > a.size() => Natural::Fixed(b),
            (fixed, _) => fixed,
        }
    }

    fn fits(self, ty: Type) -> bool {
        match self {
            Natural::Literal { value, negated } => literal_fits(value, negated, ty),
            _ => true,
        }
    }

    fn resolve(self) -> Type {
        match self {
            Natural::Flexible => Type::I32,
            Natural::Literal { value, negated } => literal_type(value, negated),
            Natural::Fixed(ty) => ty,
        }
    }
}

/// The narrowest of `i32`, `i64` and `u64` that holds the literal.
fn literal_type(value: u64, negated: bool) -> Type {
    if literal_fits(value, negated, Type::I32) {
        Type::I32
    } else if literal_fits(value, negated, Type::I64) {
        Type::I64
    } else {
        Type::U64
    }
}

/// Signed types take one extra magnitude under a minus sign, so `-128`
/// fits `i8` while `128` does not. Unsigned types wrap a negated literal.
fn literal_fits(value: u64, negated: bool, ty: Type) -> bool {
    let Some(width) = Width::from_size(ty.size()) else {
        return false;
    };
    if ty.is_float() {
        return true;
    }
    if ty.is_signed() {
        let max = width.mask() >> 1;
        value <= max + u64::from(negated)
    } else {
        value <= width.mask()
    }
}

/// The bytecode compiler.
pub struct Compiler {
    bytecode: Bytecode,
    scopes: ScopeChain,
    /// Lowest frame offset handed out in the current function.
    frame_offset: i64,
    /// Return type of the current function.
    return_type: Type,
}

impl Compiler {
    /// Create a new compiler.
    pub fn new() -> Self {
        Self {
            bytecode: Bytecode::default(),
            scopes: ScopeChain::new(),
            frame_offset: 0,
            return_type: Type::Unit,
        }
    }

    /// Compile a whole program. The compiler starts from a clean state on
    /// every call, so one instance can compile many programs.
    pub fn compile(&mut self, program: &Program) -> CompileResult<Bytecode> {
        self.bytecode = Bytecode::default();
        self.scopes = ScopeChain::new();
        self.frame_offset = 0;
        self.return_type = Type::Unit;

        for decl in &program.decls {
            self.compile_decl(decl)?;
        }

        debug!(
            functions = self.bytecode.functions.len(),
            bytes = self.bytecode.chunk.len(),
            "compiled program"
        );
        Ok(std::mem::take(&mut self.bytecode))
    }

    fn compile_decl(&mut self, decl: &Decl) -> CompileResult<()> {
        match &decl.kind {
            DeclKind::Function(function) => self.compile_function(function, decl.span),
            DeclKind::Var(var) => Err(CompileError::unsupported(
                format!("global variables are not supported (declaring '{}')", var.name),
                decl.span,
            )),
        }
    }

    // ===== Functions =====

    fn compile_function(&mut self, function: &FunctionDecl, span: Span) -> CompileResult<()> {
        if self.scopes.lookup_current(&function.name).is_some() {
            return Err(CompileError::duplicate_function(&function.name, span));
        }

        let line = span.line;
        let address = self.bytecode.chunk.len();
        let params: Vec<Type> = function.params.iter().map(|p| p.ty).collect();

        // Declared before the body so the function can call itself.
        self.scopes.declare(Local::function(
            &function.name,
            params.clone(),
            function.return_type,
            address,
        ));

        self.frame_offset = 0;
        self.return_type = function.return_type;

        self.scopes.push();
        let mut offset = PARAM_BASE;
        for param in &function.params {
            if param.ty.is_unit() {
                return Err(CompileError::unit_value(
                    format!("parameter '{}' cannot have type unit", param.name),
                    param.span,
                ));
            }
            self.scopes
                .declare(Local::variable(&param.name, param.ty, offset));
            offset += param.ty.size() as i64;
        }

        self.emit_op(OpCode::Enter, line);
        self.emit_op(OpCode::AddSp, line);
        let frame_hole = self.bytecode.chunk.write_placeholder(line);

        self.compile_block(&function.body)?;
        self.scopes.pop();

        self.emit_imm(0, Width::Qword, line);
        self.emit_op(OpCode::Leave, line);
        self.emit_op(OpCode::Ret, line);

        self.bytecode
            .chunk
            .patch_u64(frame_hole, self.frame_offset as u64);

        let info = FunctionInfo {
            name: function.name.clone(),
            offset: address,
            len: self.bytecode.chunk.len() - address,
            frame_size: self.frame_offset.unsigned_abs() as usize,
            params,
            return_type: function.return_type,
        };
        trace!(
            name = %info.name,
            offset = info.offset,
            len = info.len,
            frame = info.frame_size,
            "compiled function"
        );
        self.bytecode.functions.push(info);
        Ok(())
    }

    /// Reserve frame space for a value of `ty` and return its offset.
    fn allocate(&mut self, ty: Type) -> i64 {
        self.frame_offset -= ty.size() as i64;
        self.frame_offset
    }

    // ===== Statements =====

    fn compile_block(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        self.scopes.push();
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Var(var) => self.compile_var(var, stmt.span),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.compile_if(condition, then_branch, else_branch.as_deref(), stmt.span),
            StmtKind::Match { scrutinee, arms } => {
                self.compile_match(scrutinee.as_ref(), arms, stmt.span)
            }
            StmtKind::While { condition, body } => {
                self.compile_while(condition, body, stmt.span)
            }
            StmtKind::Block(statements) => self.compile_block(statements),
            StmtKind::Return(value) => self.compile_return(value.as_ref(), stmt.span),
            StmtKind::Expression(expr) => {
                let mut ty = Type::Unit;
                self.emit_expr(expr, &mut ty)
            }
        }
    }

    fn compile_var(&mut self, var: &VarDecl, span: Span) -> CompileResult<()> {
        if var.ty.is_unit() {
            return Err(CompileError::unit_value(
                format!("variable '{}' cannot have type unit", var.name),
                span,
            ));
        }

        match &var.initializer {
            Some(initializer) => {
                let mut ty = var.ty;
                self.emit_expr(initializer, &mut ty)?;
            }
            None => self.emit_imm(0, Width::Qword, span.line),
        }

        let offset = self.allocate(var.ty);
        self.emit_store(offset, var.ty, span)?;
        self.scopes
            .declare(Local::variable(&var.name, var.ty, offset));
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        let width = self.compile_condition(condition)?;
        let else_jump = self.emit_jz(width, span.line);

        self.compile_block(then_branch)?;

        match else_branch {
            Some(else_branch) => {
                let end_jump = self.emit_jump(span.line);
                self.patch_jump(else_jump);
                self.compile_statement(else_branch)?;
                self.patch_jump(end_jump);
            }
            None => self.patch_jump(else_jump),
        }
        Ok(())
    }

    fn compile_while(&mut self, condition: &Expr, body: &[Stmt], span: Span) -> CompileResult<()> {
        let loop_start = self.bytecode.chunk.len();
        let width = self.compile_condition(condition)?;
        let exit_jump = self.emit_jz(width, span.line);

        self.compile_block(body)?;
        self.emit_loop(loop_start, span.line);

        self.patch_jump(exit_jump);
        Ok(())
    }

    /// Arms are tried in order; the first match runs and control leaves the
    /// statement. With a scrutinee, each arm pattern is compared for
    /// equality against it; without one, each pattern is a condition.
    fn compile_match(
        &mut self,
        scrutinee: Option<&Expr>,
        arms: &[MatchArm],
        span: Span,
    ) -> CompileResult<()> {
        let mut end_jumps = Vec::with_capacity(arms.len());

        match scrutinee {
            Some(scrutinee) => {
                let mut ty = Type::Unit;
                self.emit_expr(scrutinee, &mut ty)?;
                if ty.is_float() {
                    return Err(CompileError::float_arithmetic(scrutinee.span));
                }
                let width = Self::width_of(ty, scrutinee.span)?;

                // Evaluated once into a hidden slot.
                let slot = self.allocate(ty);
                self.emit_store(slot, ty, span)?;

                for arm in arms {
                    let line = arm.span.line;
                    self.emit_load(slot, ty, arm.span)?;
                    self.emit_push(width, line);
                    let mut pattern_ty = ty;
                    self.emit_expr(&arm.pattern, &mut pattern_ty)?;
                    self.bytecode.chunk.write_sized(OpCode::Cmp8, width, line);
                    self.emit_op(OpCode::SetEq, line);

                    let next_arm = self.emit_jz(width, line);
                    self.compile_block(&arm.body)?;
                    end_jumps.push(self.emit_jump(line));
                    self.patch_jump(next_arm);
                }
            }
            None => {
                for arm in arms {
                    let width = self.compile_condition(&arm.pattern)?;
                    let next_arm = self.emit_jz(width, arm.span.line);
                    self.compile_block(&arm.body)?;
                    end_jumps.push(self.emit_jump(arm.span.line));
                    self.patch_jump(next_arm);
                }
            }
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&Expr>, span: Span) -> CompileResult<()> {
        match (value, self.return_type) {
            (Some(value), Type::Unit) => {
                return Err(CompileError::invalid_return(
                    "cannot return a value from a function returning unit",
                    value.span,
                ));
            }
            (None, Type::Unit) => self.emit_imm(0, Width::Qword, span.line),
            (None, return_type) => {
                return Err(CompileError::invalid_return(
                    format!("missing return value of type {}", return_type),
                    span,
                ));
            }
            (Some(value), return_type) => {
                let mut ty = return_type;
                self.emit_expr(value, &mut ty)?;
            }
        }

        self.emit_op(OpCode::Leave, span.line);
        self.emit_op(OpCode::Ret, span.line);
        Ok(())
    }

    /// Emit a branch condition and return the width `jz` should test.
    fn compile_condition(&mut self, condition: &Expr) -> CompileResult<Width> {
        let mut ty = Type::Unit;
        self.emit_expr(condition, &mut ty)?;
        if ty.is_float() {
            return Err(CompileError::unsupported(
                "conditions must be integers",
                condition.span,
            ));
        }
        Self::width_of(ty, condition.span)
    }

    // ===== Expressions =====

    /// Emit `expr` into the accumulator. See the module docs for `expected`.
    pub(crate) fn emit_expr(&mut self, expr: &Expr, expected: &mut Type) -> CompileResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLiteral(value) => self.emit_int_literal(*value, false, expected, span),
            ExprKind::FloatLiteral(value) => self.emit_float_literal(*value, expected, span),
            ExprKind::StringLiteral(_) => Err(CompileError::unsupported(
                "string literals are only supported as print arguments",
                span,
            )),
            ExprKind::Variable(name) => {
                let (ty, offset) = self.resolve_variable(name, span)?;
                self.emit_load(offset, ty, span)?;
                self.coerce(ty, expected, span)
            }
            ExprKind::Assign { target, op, value } => {
                self.emit_assign(target, *op, value, expected, span)
            }
            ExprKind::Binary { left, op, right } if op.is_comparison() => {
                self.emit_comparison(left, *op, right, expected, span)
            }
            ExprKind::Binary { left, op, right } => {
                self.emit_binary(left, *op, right, expected, span)
            }
            ExprKind::Unary { op, operand } => self.emit_unary(*op, operand, expected, span),
            ExprKind::Call { callee, arguments } => {
                self.emit_call(callee, arguments, expected, span)
            }
        }
    }

    fn emit_int_literal(
        &mut self,
        value: u64,
        negated: bool,
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        if expected.is_unit() {
            *expected = literal_type(value, negated);
        }

        let ty = *expected;
        let width = Self::width_of(ty, span)?;
        let bits = match ty {
            Type::F32 => (value as f32).to_bits() as u64,
            Type::F64 => (value as f64).to_bits(),
            _ if !literal_fits(value, negated, ty) => {
                let sign = if negated { "-" } else { "" };
                return Err(CompileError::unsupported(
                    format!("integer literal {}{} does not fit in {}", sign, value, ty),
                    span,
                ));
            }
            _ => value,
        };

        self.emit_imm(bits, width, span.line);
        Ok(())
    }

    fn emit_float_literal(&mut self, value: f64, expected: &mut Type, span: Span) -> CompileResult<()> {
        if expected.is_unit() {
            *expected = Type::F32;
        }

        match *expected {
            Type::F32 => self.emit_imm((value as f32).to_bits() as u64, Width::Dword, span.line),
            Type::F64 => self.emit_imm(value.to_bits(), Width::Qword, span.line),
            other => return Err(CompileError::unsupported_cast(Type::F32, other, span)),
        }
        Ok(())
    }

    fn emit_assign(
        &mut self,
        target: &str,
        op: AssignOp,
        value: &Expr,
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        let (ty, offset) = self.resolve_variable(target, span)?;

        match op.binary_op() {
            None => {
                let mut value_ty = ty;
                self.emit_expr(value, &mut value_ty)?;
            }
            Some(binary) => {
                if ty.is_float() {
                    return Err(CompileError::float_arithmetic(span));
                }
                let width = Self::width_of(ty, span)?;
                self.emit_load(offset, ty, span)?;
                self.emit_push(width, span.line);
                let mut value_ty = ty;
                self.emit_expr(value, &mut value_ty)?;
                self.bytecode
                    .chunk
                    .write_sized(binary_opcode(binary, ty.is_signed()), width, span.line);
            }
        }

        self.emit_store(offset, ty, span)?;
        self.coerce(ty, expected, span)
    }

    fn emit_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        let ty = if expected.is_unit() {
            self.natural(left).combine(self.natural(right)).resolve()
        } else {
            *expected
        };
        if ty.is_float() {
            return Err(CompileError::float_arithmetic(span));
        }

        let width = self.emit_operands(left, right, ty, span)?;
        self.bytecode
            .chunk
            .write_sized(binary_opcode(op, ty.is_signed()), width, span.line);
        *expected = ty;
        Ok(())
    }

    /// Operands are compared at their own common type; the 0/1 result is
    /// valid at any integer width.
    fn emit_comparison(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        let ty = self.natural(left).combine(self.natural(right)).resolve();
        if ty.is_float() {
            return Err(CompileError::float_arithmetic(span));
        }
        if expected.is_float() {
            return Err(CompileError::unsupported_cast(ty, *expected, span));
        }

        let width = self.emit_operands(left, right, ty, span)?;
        self.bytecode
            .chunk
            .write_sized(binary_opcode(op, ty.is_signed()), width, span.line);
        self.emit_op(set_opcode(op), span.line);

        if expected.is_unit() {
            *expected = ty;
        }
        Ok(())
    }

    /// left; push; right. Both at `ty`.
    fn emit_operands(
        &mut self,
        left: &Expr,
        right: &Expr,
        ty: Type,
        span: Span,
    ) -> CompileResult<Width> {
        let width = Self::width_of(ty, span)?;

        let mut left_ty = ty;
        self.emit_expr(left, &mut left_ty)?;
        self.emit_push(width, span.line);

        let mut right_ty = ty;
        self.emit_expr(right, &mut right_ty)?;
        Ok(width)
    }

    fn emit_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        let negated_literal = match (&operand.kind, op) {
            (ExprKind::IntLiteral(value), UnaryOp::Negate) => Some(*value),
            _ => None,
        };
        let ty = match (*expected, negated_literal) {
            (Type::Unit, Some(value)) => literal_type(value, true),
            (Type::Unit, None) => self.natural(operand).resolve(),
            (ty, _) => ty,
        };
        if ty.is_float() {
            return Err(CompileError::float_arithmetic(span));
        }
        let width = Self::width_of(ty, span)?;

        let mut operand_ty = ty;
        match negated_literal {
            Some(value) => self.emit_int_literal(value, true, &mut operand_ty, operand.span)?,
            None => self.emit_expr(operand, &mut operand_ty)?,
        }

        let base = match op {
            UnaryOp::Negate => OpCode::Sign8,
            UnaryOp::Not => OpCode::Neg8,
            UnaryOp::BitNot => OpCode::Bneg8,
        };
        self.bytecode.chunk.write_sized(base, width, span.line);
        *expected = ty;
        Ok(())
    }

    /// Arguments are pushed last to first so the first parameter ends up
    /// nearest the frame base.
    fn emit_call(
        &mut self,
        callee: &str,
        arguments: &[Expr],
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        let function = match self.scopes.lookup(callee) {
            Some(local) if local.is_function() => local.clone(),
            Some(_) => return Err(CompileError::not_a_function(callee, span)),
            None if callee == PRINT => return self.emit_print(arguments, expected, span),
            None => return Err(CompileError::undeclared(callee, span)),
        };

        if arguments.len() != function.params.len() {
            return Err(CompileError::wrong_arity(
                callee,
                function.params.len(),
                arguments.len(),
                span,
            ));
        }

        let mut pushed = 0;
        for (argument, param_ty) in arguments.iter().zip(&function.params).rev() {
            let mut ty = *param_ty;
            self.emit_expr(argument, &mut ty)?;
            let width = Self::width_of(*param_ty, argument.span)?;
            self.emit_push(width, span.line);
            pushed += width.bytes();
        }

        self.emit_op(OpCode::Call, span.line);
        self.bytecode
            .chunk
            .write_u64(function.address as u64, span.line);
        if pushed > 0 {
            self.emit_op(OpCode::AddSp, span.line);
            self.bytecode.chunk.write_i64(pushed as i64, span.line);
        }

        if function.ty.is_unit() {
            if !expected.is_unit() {
                return Err(CompileError::unit_value(
                    format!("'{}' returns unit and has no value", callee),
                    span,
                ));
            }
            return Ok(());
        }
        self.coerce(function.ty, expected, span)
    }

    /// `print("text")` writes each byte; `print(n)` writes an integer and a
    /// newline.
    fn emit_print(
        &mut self,
        arguments: &[Expr],
        expected: &mut Type,
        span: Span,
    ) -> CompileResult<()> {
        if arguments.len() != 1 {
            return Err(CompileError::wrong_arity(PRINT, 1, arguments.len(), span));
        }
        if !expected.is_unit() {
            return Err(CompileError::unit_value(
                "'print' returns unit and has no value",
                span,
            ));
        }

        let argument = &arguments[0];
        if let ExprKind::StringLiteral(text) = &argument.kind {
            for byte in text.bytes() {
                self.emit_imm(byte as u64, Width::Byte, span.line);
                self.bytecode.chunk.write_sys(SysCall::Putc, span.line);
            }
            return Ok(());
        }

        let mut ty = Type::Unit;
        self.emit_expr(argument, &mut ty)?;
        if ty.is_float() {
            return Err(CompileError::unsupported(
                "printing floating-point values is not supported",
                argument.span,
            ));
        }
        let width = Self::width_of(ty, argument.span)?;
        self.bytecode
            .chunk
            .write_sys(SysCall::print(width, ty.is_signed()), span.line);
        Ok(())
    }

    /// Infer into `expected`, or cast `from` to it.
    fn coerce(&mut self, from: Type, expected: &mut Type, span: Span) -> CompileResult<()> {
        if expected.is_unit() {
            *expected = from;
            Ok(())
        } else {
            self.emit_cast(from, *expected, span)
        }
    }

    /// Widening integer casts only, one width step at a time. Sign extension
    /// is used when both types are signed.
    pub(crate) fn emit_cast(&mut self, from: Type, to: Type, span: Span) -> CompileResult<()> {
        if from == to {
            return Ok(());
        }
        let unsupported = || CompileError::unsupported_cast(from, to, span);
        if !from.is_integer() || !to.is_integer() || from.size() > to.size() {
            return Err(unsupported());
        }

        let signed = from.is_signed() && to.is_signed();
        let target = Self::width_of(to, span)?;
        let mut step = Self::width_of(from, span)?;
        while step < target {
            let op = match (step, signed) {
                (Width::Byte, false) => OpCode::Zext8To16,
                (Width::Word, false) => OpCode::Zext16To32,
                (Width::Dword, false) => OpCode::Zext32To64,
                (Width::Byte, true) => OpCode::Sext8To16,
                (Width::Word, true) => OpCode::Sext16To32,
                (Width::Dword, true) => OpCode::Sext32To64,
                (Width::Qword, _) => return Err(unsupported()),
            };
            self.emit_op(op, span.line);
            step = step.wider().ok_or_else(unsupported)?;
        }
        Ok(())
    }

    fn natural(&self, expr: &Expr) -> Natural {
        let variable = |name: &str| match self.scopes.lookup(name) {
            Some(local) if !local.is_function() => Natural::Fixed(local.ty),
            _ => Natural::Flexible,
        };

        match &expr.kind {
            ExprKind::IntLiteral(value) => Natural::Literal {
                value: *value,
                negated: false,
            },
            ExprKind::StringLiteral(_) => Natural::Flexible,
            ExprKind::FloatLiteral(_) => Natural::Fixed(Type::F32),
            ExprKind::Variable(name) => variable(name),
            ExprKind::Assign { target, .. } => variable(target),
            ExprKind::Call { callee, .. } => match self.scopes.lookup(callee) {
                Some(local) if local.is_function() => Natural::Fixed(local.ty),
                None if callee == PRINT => Natural::Fixed(Type::Unit),
                _ => Natural::Flexible,
            },
            ExprKind::Unary {
                op: UnaryOp::Negate,
                operand,
            } => match (&operand.kind, self.natural(operand)) {
                (ExprKind::IntLiteral(_), Natural::Literal { value, .. }) => {
                    Natural::Literal {
                        value,
                        negated: true,
                    }
                }
                (_, natural) => natural,
            },
            ExprKind::Unary { operand, .. } => self.natural(operand),
            ExprKind::Binary { op, .. } if op.is_comparison() => Natural::Flexible,
            ExprKind::Binary { left, right, .. } => {
                self.natural(left).combine(self.natural(right))
            }
        }
    }

    fn resolve_variable(&self, name: &str, span: Span) -> CompileResult<(Type, i64)> {
        match self.scopes.lookup(name) {
            None => Err(CompileError::undeclared(name, span)),
            Some(local) if local.is_function() => Err(CompileError::not_a_variable(name, span)),
            Some(local) => Ok((local.ty, local.offset)),
        }
    }

    // ===== Emission helpers =====

    fn width_of(ty: Type, span: Span) -> CompileResult<Width> {
        Width::from_size(ty.size())
            .ok_or_else(|| CompileError::unit_value("a unit value cannot be used here", span))
    }

    fn emit_op(&mut self, op: OpCode, line: usize) {
        self.bytecode.chunk.write_op(op, line);
    }

    fn emit_imm(&mut self, value: u64, width: Width, line: usize) {
        self.bytecode.chunk.write_sized(OpCode::MovImm8, width, line);
        self.bytecode.chunk.write_imm(value, width, line);
    }

    fn emit_push(&mut self, width: Width, line: usize) {
        self.bytecode.chunk.write_sized(OpCode::Push8, width, line);
    }

    fn emit_load(&mut self, offset: i64, ty: Type, span: Span) -> CompileResult<()> {
        let width = Self::width_of(ty, span)?;
        self.bytecode
            .chunk
            .write_sized(OpCode::MovAOffset8, width, span.line);
        self.bytecode.chunk.write_i64(offset, span.line);
        Ok(())
    }

    fn emit_store(&mut self, offset: i64, ty: Type, span: Span) -> CompileResult<()> {
        let width = Self::width_of(ty, span)?;
        self.bytecode
            .chunk
            .write_sized(OpCode::MovOffsetA8, width, span.line);
        self.bytecode.chunk.write_i64(offset, span.line);
        Ok(())
    }

    fn emit_jz(&mut self, width: Width, line: usize) -> usize {
        self.bytecode.chunk.write_sized(OpCode::Jz8, width, line);
        self.bytecode.chunk.write_placeholder(line)
    }

    fn emit_jump(&mut self, line: usize) -> usize {
        self.emit_op(OpCode::Jmp, line);
        self.bytecode.chunk.write_placeholder(line)
    }

    /// Point a forward jump at the current end of the stream.
    fn patch_jump(&mut self, hole: usize) {
        let target = self.bytecode.chunk.len() as u64;
        self.bytecode.chunk.patch_u64(hole, target);
    }

    fn emit_loop(&mut self, loop_start: usize, line: usize) {
        self.emit_op(OpCode::Jmp, line);
        self.bytecode.chunk.write_u64(loop_start as u64, line);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Base opcode for a binary operator; signedness picks the division, modulo,
/// right shift and compare variants.
fn binary_opcode(op: BinaryOp, signed: bool) -> OpCode {
    match (op, signed) {
        (BinaryOp::Add, _) => OpCode::Add8,
        (BinaryOp::Subtract, _) => OpCode::Sub8,
        (BinaryOp::Multiply, _) => OpCode::Mul8,
        (BinaryOp::Divide, false) => OpCode::Div8,
        (BinaryOp::Divide, true) => OpCode::Idiv8,
        (BinaryOp::Modulo, false) => OpCode::Mod8,
        (BinaryOp::Modulo, true) => OpCode::Imod8,
        (BinaryOp::ShiftLeft, _) => OpCode::Shl8,
        (BinaryOp::ShiftRight, false) => OpCode::Shr8,
        (BinaryOp::ShiftRight, true) => OpCode::Sar8,
        (BinaryOp::BitAnd, _) => OpCode::Band8,
        (BinaryOp::BitXor, _) => OpCode::Bxor8,
        (BinaryOp::BitOr, _) => OpCode::Bor8,
        (BinaryOp::And, _) => OpCode::And8,
        (BinaryOp::Or, _) => OpCode::Or8,
        (
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual,
            false,
        ) => OpCode::Cmp8,
        (
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual,
            true,
        ) => OpCode::Icmp8,
    }
}

fn set_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Less => OpCode::SetLt,
        BinaryOp::Greater => OpCode::SetGt,
        BinaryOp::LessEqual => OpCode::SetLe,
        BinaryOp::GreaterEqual => OpCode::SetGe,
        BinaryOp::NotEqual => OpCode::SetNeq,
        _ => OpCode::SetEq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> CompileResult<Bytecode> {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        Compiler::new().compile(&program)
    }

    fn frame_reservation(bytecode: &Bytecode, name: &str) -> i64 {
        let function = bytecode.function(name).unwrap();
        // enter; add.sp <amount>
        assert_eq!(bytecode.chunk.code[function.offset], OpCode::Enter as u8);
        assert_eq!(
            bytecode.chunk.code[function.offset + 1],
            OpCode::AddSp as u8
        );
        bytecode.chunk.read_u64(function.offset + 2).unwrap() as i64
    }

    #[test]
    fn test_single_function_table() {
        let bytecode = compile("fun f() -> i32 begin return 5 end").unwrap();
        assert_eq!(bytecode.functions.len(), 1);
        let f = &bytecode.functions[0];
        assert_eq!(f.name, "f");
        assert_eq!(f.offset, 0);
        assert_eq!(f.len, bytecode.chunk.len());
        assert_eq!(f.return_type, Type::I32);
        assert_eq!(f.frame_size, 0);
    }

    #[test]
    fn test_frame_size_matches_locals() {
        let bytecode = compile(
            "fun f() -> unit begin
                var a : u8 = 1
                var b : i32
                begin var c : i64 = 3 end
                if a then var d : u16 end
            end",
        )
        .unwrap();
        let expected = 1 + 4 + 8 + 2;
        assert_eq!(bytecode.functions[0].frame_size, expected);
        assert_eq!(frame_reservation(&bytecode, "f"), -(expected as i64));
    }

    #[test]
    fn test_functions_are_laid_out_in_order() {
        let bytecode = compile(
            "fun a() -> unit begin end
             fun b() -> unit begin a() end",
        )
        .unwrap();
        let a = bytecode.function("a").unwrap();
        let b = bytecode.function("b").unwrap();
        assert_eq!(a.offset + a.len, b.offset);
        assert_eq!(b.offset + b.len, bytecode.chunk.len());
    }

    #[test]
    fn test_undeclared_function() {
        assert!(matches!(
            compile("fun main() -> unit begin missing() end"),
            Err(CompileError::Undeclared(name, _)) if name == "missing"
        ));
    }

    #[test]
    fn test_undeclared_variable() {
        assert!(matches!(
            compile("fun main() -> i32 begin return y end"),
            Err(CompileError::Undeclared(..))
        ));
    }

    #[test]
    fn test_block_variables_do_not_escape() {
        assert!(matches!(
            compile("fun main() -> i32 begin begin var x : i32 = 1 end return x end"),
            Err(CompileError::Undeclared(..))
        ));
    }

    #[test]
    fn test_wrong_local_kind() {
        assert!(matches!(
            compile("fun f() -> i32 begin return f end"),
            Err(CompileError::NotAVariable(..))
        ));
        assert!(matches!(
            compile("fun f() -> unit begin var g : i32 g() end"),
            Err(CompileError::NotAFunction(..))
        ));
    }

    #[test]
    fn test_duplicate_function() {
        assert!(matches!(
            compile("fun f() -> unit begin end fun f() -> unit begin end"),
            Err(CompileError::DuplicateFunction(..))
        ));
    }

    #[test]
    fn test_unit_misuse() {
        assert!(matches!(
            compile("fun f(unit x) -> unit begin end"),
            Err(CompileError::UnitValue(..))
        ));
        assert!(matches!(
            compile("fun f() -> unit begin var x : unit end"),
            Err(CompileError::UnitValue(..))
        ));
        assert!(matches!(
            compile("fun g() -> unit begin end fun f() -> i32 begin return g() end"),
            Err(CompileError::UnitValue(..))
        ));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(matches!(
            compile("fun g(i32 a) -> i32 begin return a end fun f() -> i32 begin return g() end"),
            Err(CompileError::WrongArity {
                expected: 1,
                got: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_return_checks() {
        assert!(matches!(
            compile("fun f() -> unit begin return 1 end"),
            Err(CompileError::InvalidReturn(..))
        ));
        assert!(matches!(
            compile("fun f() -> i32 begin return end"),
            Err(CompileError::InvalidReturn(..))
        ));
    }

    #[test]
    fn test_narrowing_is_rejected() {
        assert!(matches!(
            compile("fun f() -> u8 begin var x : i32 = 1 return x end"),
            Err(CompileError::UnsupportedCast { .. })
        ));
    }

    #[test]
    fn test_float_rules() {
        // Integer literals may initialize floats.
        assert!(compile("fun f() -> unit begin var x : f64 = 2 end").is_ok());
        assert!(compile("fun f() -> unit begin var x : f32 = 1.5 end").is_ok());
        assert!(matches!(
            compile("fun f() -> unit begin var x : i32 = 1.5 end"),
            Err(CompileError::UnsupportedCast { .. })
        ));
        assert!(matches!(
            compile("fun f() -> unit begin var x : f32 = 1.5 x += 1 end"),
            Err(CompileError::FloatArithmetic(_))
        ));
        assert!(matches!(
            compile("fun f() -> unit begin var x : f32 var y : i32 = 1 x = y end"),
            Err(CompileError::UnsupportedCast { .. })
        ));
    }

    #[test]
    fn test_global_variables_are_rejected() {
        assert!(matches!(
            compile("var g : i32 = 1"),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_string_outside_print() {
        assert!(matches!(
            compile("fun f() -> unit begin var x : u8 = \"no\" end"),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_literal_range() {
        assert!(compile("fun f() -> u8 begin return 255 end").is_ok());
        assert!(matches!(
            compile("fun f() -> u8 begin return 256 end"),
            Err(CompileError::Unsupported { .. })
        ));
        assert!(compile("fun f() -> i8 begin return -128 end").is_ok());
        assert!(matches!(
            compile("fun f() -> i8 begin return 128 end"),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_literal_beside_fixed_operand() {
        let literal = |value| Natural::Literal {
            value,
            negated: false,
        };
        let byte = Natural::Fixed(Type::U8);
        assert_eq!(byte.combine(literal(200)).resolve(), Type::U8);
        assert_eq!(byte.combine(literal(300)).resolve(), Type::I32);
        assert_eq!(literal(300).combine(byte).resolve(), Type::I32);
        assert_eq!(
            Natural::Fixed(Type::I64).combine(literal(u64::MAX)).resolve(),
            Type::U64
        );
        assert_eq!(literal(1).combine(literal(3_000_000_000)).resolve(), Type::I64);
        assert_eq!(literal(7).resolve(), Type::I32);
    }

    #[test]
    fn test_widening_cast_sequence() {
        let mut compiler = Compiler::new();
        compiler
            .emit_cast(Type::I8, Type::I64, Span::default())
            .unwrap();
        compiler
            .emit_cast(Type::U8, Type::I16, Span::default())
            .unwrap();
        compiler
            .emit_cast(Type::I32, Type::U32, Span::default())
            .unwrap();
        assert_eq!(
            compiler.bytecode.chunk.code,
            vec![
                OpCode::Sext8To16 as u8,
                OpCode::Sext16To32 as u8,
                OpCode::Sext32To64 as u8,
                OpCode::Zext8To16 as u8,
            ]
        );
    }

    #[test]
    fn test_binary_shape() {
        let mut compiler = Compiler::new();
        compiler.scopes.declare(Local::variable("x", Type::I64, -8));
        let tokens = Scanner::new("fun t() -> unit begin 1 + x end")
            .scan_tokens()
            .unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let DeclKind::Function(function) = &program.decls[0].kind else {
            panic!("Expected function");
        };
        let StmtKind::Expression(expr) = &function.body[0].kind else {
            panic!("Expected expression");
        };

        let mut ty = Type::Unit;
        compiler.emit_expr(expr, &mut ty).unwrap();
        assert_eq!(ty, Type::I64);

        let mut expected = vec![OpCode::MovImm64 as u8];
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.push(OpCode::Push64 as u8);
        expected.push(OpCode::MovAOffset64 as u8);
        expected.extend_from_slice(&(-8i64).to_be_bytes());
        expected.push(OpCode::Add64 as u8);
        assert_eq!(compiler.bytecode.chunk.code, expected);
    }

    #[test]
    fn test_compiler_is_reusable() {
        let tokens = Scanner::new("fun f() -> i32 begin return 5 end")
            .scan_tokens()
            .unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let mut compiler = Compiler::new();
        let first = compiler.compile(&program).unwrap();
        let second = compiler.compile(&program).unwrap();
        assert_eq!(first, second);
    }
}
