//! Top-level declarations and the compilation unit.

use crate::ast::expr::Expr;
use crate::ast::stmt::Block;
use crate::foundation::Span;
use crate::symbol::SymbolId;

/// A global variable with runtime storage.
///
/// Constant globals never reach this list; their values fold into the
/// expressions that reference them.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub symbol: SymbolId,
    pub init: Option<Expr>,
    pub span: Span,
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub symbol: SymbolId,
    /// Local symbols of the parameters, in declaration order; the code
    /// generator lays the frame out from this list
    pub params: Vec<SymbolId>,
    pub body: Block,
    pub span: Span,
}

/// A fully parsed and analyzed compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Resource name of the top-level source
    pub unit_name: String,
    /// Globals with storage, in declaration order
    pub globals: Vec<GlobalDecl>,
    /// Function definitions, in declaration order (includes definitions
    /// pulled in from included units)
    pub functions: Vec<Function>,
    /// Resource names of every unit pulled in through `#include`
    pub includes: Vec<String>,
}

impl Program {
    /// Find the definition of a function symbol.
    pub fn function(&self, symbol: SymbolId) -> Option<&Function> {
        self.functions.iter().find(|f| f.symbol == symbol)
    }
}
