//! Lexical scopes for the compiler: declared variables and functions.

use crate::ast::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Variable,
    Function,
}

/// A name visible in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub kind: LocalKind,
    pub name: String,
    /// Variable type, or a function's return type.
    pub ty: Type,
    /// Frame offset from the base pointer: negative for locals, positive for
    /// parameters. Zero for functions.
    pub offset: i64,
    /// Parameter types of a function.
    pub params: Vec<Type>,
    /// Code address of a function. Zero for variables.
    pub address: usize,
}

impl Local {
    pub fn variable(name: impl Into<String>, ty: Type, offset: i64) -> Self {
        Self {
            kind: LocalKind::Variable,
            name: name.into(),
            ty,
            offset,
            params: Vec::new(),
            address: 0,
        }
    }

    pub fn function(
        name: impl Into<String>,
        params: Vec<Type>,
        return_type: Type,
        address: usize,
    ) -> Self {
        Self {
            kind: LocalKind::Function,
            name: name.into(),
            ty: return_type,
            offset: 0,
            params,
            address,
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == LocalKind::Function
    }
}

/// One scope table.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    locals: Vec<Local>,
}

impl Scope {
    /// The most recent declaration of `name` in this scope.
    pub fn get(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find(|local| local.name == name)
    }
}

/// Nested scopes, innermost last.
#[derive(Debug, Clone)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    /// A chain holding only the outermost (program) scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Discard the innermost scope. The outermost scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Add to the innermost scope.
    pub fn declare(&mut self, local: Local) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.push(local);
        }
    }

    /// Walk outward from the innermost scope; the first match wins.
    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Look only in the innermost scope.
    pub fn lookup_current(&self, name: &str) -> Option<&Local> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut scopes = ScopeChain::new();
        scopes.declare(Local::variable("x", Type::I32, -4));
        scopes.push();
        scopes.declare(Local::variable("x", Type::U8, -5));
        assert_eq!(scopes.lookup("x").map(|l| l.ty), Some(Type::U8));
        scopes.pop();
        assert_eq!(scopes.lookup("x").map(|l| l.ty), Some(Type::I32));
    }

    #[test]
    fn test_latest_declaration_in_scope_wins() {
        let mut scopes = ScopeChain::new();
        scopes.declare(Local::variable("x", Type::I32, -4));
        scopes.declare(Local::variable("x", Type::I64, -12));
        assert_eq!(scopes.lookup("x").map(|l| l.offset), Some(-12));
    }

    #[test]
    fn test_inner_names_vanish_after_pop() {
        let mut scopes = ScopeChain::new();
        scopes.push();
        scopes.declare(Local::variable("tmp", Type::U16, -2));
        assert!(scopes.lookup("tmp").is_some());
        scopes.pop();
        assert!(scopes.lookup("tmp").is_none());
    }

    #[test]
    fn test_outer_scope_survives_pop() {
        let mut scopes = ScopeChain::new();
        assert!(scopes.pop().is_none());
        assert_eq!(scopes.depth(), 1);
    }

    #[test]
    fn test_function_entries() {
        let mut scopes = ScopeChain::new();
        scopes.declare(Local::function("f", vec![Type::I32], Type::Unit, 0));
        let f = scopes.lookup_current("f").unwrap();
        assert!(f.is_function());
        assert_eq!(f.params, vec![Type::I32]);
    }
}
