//! Scoped symbol table.
//!
//! Symbols live in a flat arena addressed by [`SymbolId`]; scopes are an
//! ordered stack of name-to-id frames. Cross-references between symbols
//! (a function's parameters, a call site's callee) are ids into the arena,
//! never direct references, so the whole table can be cloned to seed a new
//! compilation with the cached prototype scope.

use crate::foundation::{Constant, Span, Type};
use indexmap::IndexMap;
use std::rc::Rc;

/// Stable index of a symbol in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared function or action parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Rc<str>,
    pub ty: Type,
    /// Trailing default value; must have folded to a constant of the
    /// parameter's type at declaration
    pub default: Option<Constant>,
    pub span: Span,
}

/// What a name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    /// Global variable. Constant globals carry their folded value and get
    /// no runtime storage; plain globals are indexed in declaration order
    /// and addressed relative to BP after the global frame is built.
    Global {
        index: usize,
        constant: Option<Constant>,
    },
    /// Function-local variable or parameter; stack-relative storage is
    /// assigned during code generation
    Local,
    /// User function: prototype and, once seen, definition
    Function {
        params: Vec<Param>,
        min_args: usize,
        defined: bool,
    },
    /// Engine action from the prototype source, addressed by id
    Action {
        id: u16,
        params: Vec<Param>,
        min_args: usize,
    },
}

impl SymbolKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function { .. } | SymbolKind::Action { .. })
    }
}

/// A named entity: variable, constant, function or engine action.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: Rc<str>,
    /// For callables this is the return type
    pub ty: Type,
    pub kind: SymbolKind,
    pub span: Span,
}

/// Result of a failed declaration: the id of the conflicting symbol.
pub type Redefinition = SymbolId;

/// Scoped name table with stack discipline.
///
/// The outermost frame holds globals and engine actions; nested frames
/// correspond to function bodies and compound statements. Lookup walks
/// from innermost outward. Shadowing across frames is permitted for
/// locals only; engine actions can never be shadowed or redeclared.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<IndexMap<Rc<str>, SymbolId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![IndexMap::new()],
        }
    }

    /// Open a nested scope frame.
    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Close the innermost scope frame.
    ///
    /// The global frame cannot be popped.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    /// Current nesting depth; 1 is the global scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare a symbol in the innermost scope.
    ///
    /// Fails with the existing id when the name is already bound in the
    /// same frame, or anywhere to an engine action.
    pub fn declare(&mut self, symbol: Symbol) -> Result<SymbolId, Redefinition> {
        if let Some(&existing) = self.scopes.last().unwrap().get(&symbol.name) {
            return Err(existing);
        }
        // Engine actions are not shadowable from nested scopes.
        if self.scopes.len() > 1 {
            if let Some(existing) = self.lookup(&symbol.name) {
                if matches!(self.get(existing).kind, SymbolKind::Action { .. }) {
                    return Err(existing);
                }
            }
        }
        let id = SymbolId(self.symbols.len() as u32);
        let name = symbol.name.clone();
        self.symbols.push(symbol);
        self.scopes.last_mut().unwrap().insert(name, id);
        Ok(id)
    }

    /// Look a name up, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Fetch a symbol by id.
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    /// Fetch a symbol mutably by id.
    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// Iterate every symbol in the arena in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: Rc::from(name),
            ty,
            kind: SymbolKind::Local,
            span: Span::zero(0),
        }
    }

    fn action(name: &str, id: u16) -> Symbol {
        Symbol {
            name: Rc::from(name),
            ty: Type::Void,
            kind: SymbolKind::Action {
                id,
                params: vec![],
                min_args: 0,
            },
            span: Span::zero(0),
        }
    }

    #[test]
    fn test_declare_and_lookup() {
        let mut table = SymbolTable::new();
        let id = table.declare(var("x", Type::Int)).unwrap();
        assert_eq!(table.lookup("x"), Some(id));
        assert_eq!(table.get(id).ty, Type::Int);
        assert_eq!(table.lookup("y"), None);
    }

    #[test]
    fn test_redefinition_in_same_frame() {
        let mut table = SymbolTable::new();
        let first = table.declare(var("x", Type::Int)).unwrap();
        assert_eq!(table.declare(var("x", Type::Float)), Err(first));
    }

    #[test]
    fn test_shadowing_across_frames() {
        let mut table = SymbolTable::new();
        let outer = table.declare(var("x", Type::Int)).unwrap();
        table.push_scope();
        let inner = table.declare(var("x", Type::Float)).unwrap();
        assert_eq!(table.lookup("x"), Some(inner));
        table.pop_scope();
        assert_eq!(table.lookup("x"), Some(outer));
    }

    #[test]
    fn test_actions_cannot_be_shadowed() {
        let mut table = SymbolTable::new();
        let act = table.declare(action("PrintString", 1)).unwrap();
        table.push_scope();
        assert_eq!(table.declare(var("PrintString", Type::Int)), Err(act));
    }

    #[test]
    fn test_clone_preserves_ids() {
        let mut table = SymbolTable::new();
        let id = table.declare(var("x", Type::Int)).unwrap();
        let cloned = table.clone();
        assert_eq!(cloned.lookup("x"), Some(id));
    }
}
