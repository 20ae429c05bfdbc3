//! Data model of the NWScript compiler.
//!
//! This crate holds everything the pipeline phases share: source spans and
//! the source map, the NWScript type lattice, the typed AST produced by the
//! parser, the scoped symbol table, and the unified diagnostic type.
//! It contains no behaviour beyond the data structures themselves.

pub mod ast;
pub mod error;
pub mod foundation;
pub mod symbol;

pub use ast::{Block, Expr, ExprKind, Function, GlobalDecl, LocalDecl, Program, Stmt, SwitchCase};
pub use error::{Diagnostic, DiagnosticFormatter, ErrorKind, Severity};
pub use foundation::{Constant, SourceFile, SourceMap, Span, Type};
pub use symbol::{Param, Symbol, SymbolId, SymbolKind, SymbolTable};
