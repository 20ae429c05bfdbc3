//! Expression nodes.

use crate::foundation::{Constant, Span, Type};
use crate::symbol::SymbolId;

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Ushr,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// True for `== != < <= > >=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// True for the int-only operators (`% << >> >>> & | ^`).
    pub fn is_int_only(self) -> bool {
        matches!(
            self,
            BinaryOp::Mod
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::Ushr
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
        )
    }

    /// Source spelling, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Unary prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
    /// `~`
    Comp,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Comp => "~",
        }
    }
}

/// Vector component selected by `.x`, `.y` or `.z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecComponent {
    X,
    Y,
    Z,
}

impl VecComponent {
    /// Byte offset of the component within its vector.
    pub fn offset(self) -> u16 {
        match self {
            VecComponent::X => 0,
            VecComponent::Y => 4,
            VecComponent::Z => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VecComponent::X => "x",
            VecComponent::Y => "y",
            VecComponent::Z => "z",
        }
    }
}

/// An assignable place: a variable, optionally narrowed to one vector
/// component.
#[derive(Debug, Clone, PartialEq)]
pub struct LValue {
    pub symbol: SymbolId,
    pub component: Option<VecComponent>,
    pub span: Span,
}

/// A typed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Resolved type; `Void` only in statement-expression position
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// The folded constant value, when this node is one.
    pub fn constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }
}

/// Expression node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal or successfully folded subtree
    Constant(Constant),
    /// Reference to a variable
    Var(SymbolId),
    /// Vector literal `[x, y, z]` with non-constant parts
    VectorLit(Vec<Expr>),
    /// Call of a user function or engine action
    Call { callee: SymbolId, args: Vec<Expr> },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Simple or compound assignment; yields the stored value
    Assign {
        target: LValue,
        /// `Some` for compound assignment (`+=` carries `Add`, ...)
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// Prefix or postfix `++`/`--` on an int variable
    IncDec {
        target: LValue,
        decrement: bool,
        postfix: bool,
    },
    /// Conditional operator `c ? a : b`
    Ternary {
        cond: Box<Expr>,
        then_val: Box<Expr>,
        else_val: Box<Expr>,
    },
    /// Vector component read `v.x`
    Member {
        base: Box<Expr>,
        component: VecComponent,
    },
    /// Implicit `int` to `float` widening inserted by the type checker
    IntToFloat(Box<Expr>),
}
