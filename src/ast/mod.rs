//! Abstract Syntax Tree for brisk.

pub mod expr;
pub mod stmt;
pub mod types;

pub use expr::{AssignOp, BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{Decl, DeclKind, FunctionDecl, MatchArm, Param, Program, Stmt, StmtKind, VarDecl};
pub use types::Type;
