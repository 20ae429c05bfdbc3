//! Typed abstract syntax tree.
//!
//! The parser performs semantic analysis while it parses, so every
//! expression node in an accepted program already carries its resolved
//! type, and constant subexpressions have been folded into
//! [`ExprKind::Constant`](crate::ast::ExprKind::Constant) nodes. The code
//! generator walks this tree without further analysis.

pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::{Function, GlobalDecl, Program};
pub use expr::{BinaryOp, Expr, ExprKind, LValue, UnaryOp, VecComponent};
pub use stmt::{Block, LocalDecl, Stmt, SwitchCase};
