//! Constant folding.
//!
//! Binary and unary operations on literal operands reduce at parse time.
//! Integer arithmetic is wrapping 32-bit two's complement; shift counts
//! mask to five bits. Folding never produces a value the VM would not:
//! division by zero simply refuses to fold (the `#if` evaluator, which
//! must produce a value, rejects it separately).

use nwscript_ast::ast::{BinaryOp, UnaryOp};
use nwscript_ast::Constant;
use std::rc::Rc;

/// Fold a unary operation over a constant operand.
pub fn fold_unary(op: UnaryOp, operand: &Constant) -> Option<Constant> {
    use Constant as C;
    match (op, operand) {
        (UnaryOp::Neg, C::Int(v)) => Some(C::Int(v.wrapping_neg())),
        (UnaryOp::Neg, C::Float(v)) => Some(C::Float(-v)),
        (UnaryOp::Not, C::Int(v)) => Some(C::Int((*v == 0) as i32)),
        (UnaryOp::Comp, C::Int(v)) => Some(C::Int(!v)),
        _ => None,
    }
}

/// Fold a binary operation over constant operands.
///
/// Mixed int/float operands promote to float first, mirroring the type
/// checker's arithmetic rules.
pub fn fold_binary(op: BinaryOp, lhs: &Constant, rhs: &Constant) -> Option<Constant> {
    use Constant as C;
    match (lhs, rhs) {
        (C::Int(l), C::Int(r)) => fold_int(op, *l, *r),
        (C::Float(l), C::Float(r)) => fold_float(op, *l, *r),
        (C::Int(l), C::Float(r)) => fold_float(op, *l as f32, *r),
        (C::Float(l), C::Int(r)) => fold_float(op, *l, *r as f32),
        (C::String(l), C::String(r)) => fold_string(op, l, r),
        (C::Object(l), C::Object(r)) => match op {
            BinaryOp::Eq => Some(C::Int((l == r) as i32)),
            BinaryOp::Ne => Some(C::Int((l != r) as i32)),
            _ => None,
        },
        (C::Vector(l), C::Vector(r)) => match op {
            BinaryOp::Add => Some(C::Vector([l[0] + r[0], l[1] + r[1], l[2] + r[2]])),
            BinaryOp::Sub => Some(C::Vector([l[0] - r[0], l[1] - r[1], l[2] - r[2]])),
            BinaryOp::Eq => Some(C::Int((l == r) as i32)),
            BinaryOp::Ne => Some(C::Int((l != r) as i32)),
            _ => None,
        },
        (C::Vector(v), C::Float(s)) => match op {
            BinaryOp::Mul => Some(C::Vector([v[0] * s, v[1] * s, v[2] * s])),
            BinaryOp::Div if *s != 0.0 => Some(C::Vector([v[0] / s, v[1] / s, v[2] / s])),
            _ => None,
        },
        (C::Float(s), C::Vector(v)) => match op {
            BinaryOp::Mul => Some(C::Vector([s * v[0], s * v[1], s * v[2]])),
            _ => None,
        },
        _ => None,
    }
}

fn fold_int(op: BinaryOp, l: i32, r: i32) -> Option<Constant> {
    use BinaryOp as B;
    let v = match op {
        B::Add => l.wrapping_add(r),
        B::Sub => l.wrapping_sub(r),
        B::Mul => l.wrapping_mul(r),
        B::Div => {
            if r == 0 {
                return None;
            }
            l.wrapping_div(r)
        }
        B::Mod => {
            if r == 0 {
                return None;
            }
            l.wrapping_rem(r)
        }
        B::Shl => l.wrapping_shl(r as u32 & 31),
        B::Shr => l.wrapping_shr(r as u32 & 31),
        B::Ushr => ((l as u32) >> (r as u32 & 31)) as i32,
        B::BitAnd => l & r,
        B::BitOr => l | r,
        B::BitXor => l ^ r,
        B::LogAnd => ((l != 0) && (r != 0)) as i32,
        B::LogOr => ((l != 0) || (r != 0)) as i32,
        B::Eq => (l == r) as i32,
        B::Ne => (l != r) as i32,
        B::Lt => (l < r) as i32,
        B::Le => (l <= r) as i32,
        B::Gt => (l > r) as i32,
        B::Ge => (l >= r) as i32,
    };
    Some(Constant::Int(v))
}

fn fold_float(op: BinaryOp, l: f32, r: f32) -> Option<Constant> {
    use BinaryOp as B;
    let v = match op {
        B::Add => l + r,
        B::Sub => l - r,
        B::Mul => l * r,
        B::Div => {
            if r == 0.0 {
                return None;
            }
            l / r
        }
        B::Eq => return Some(Constant::Int((l == r) as i32)),
        B::Ne => return Some(Constant::Int((l != r) as i32)),
        B::Lt => return Some(Constant::Int((l < r) as i32)),
        B::Le => return Some(Constant::Int((l <= r) as i32)),
        B::Gt => return Some(Constant::Int((l > r) as i32)),
        B::Ge => return Some(Constant::Int((l >= r) as i32)),
        _ => return None,
    };
    Some(Constant::Float(v))
}

fn fold_string(op: BinaryOp, l: &Rc<str>, r: &Rc<str>) -> Option<Constant> {
    match op {
        BinaryOp::Add => {
            let mut s = String::with_capacity(l.len() + r.len());
            s.push_str(l);
            s.push_str(r);
            Some(Constant::String(Rc::from(s.as_str())))
        }
        BinaryOp::Eq => Some(Constant::Int((l == r) as i32)),
        BinaryOp::Ne => Some(Constant::Int((l != r) as i32)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nwscript_ast::ast::BinaryOp as B;

    fn int(v: i32) -> Constant {
        Constant::Int(v)
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(fold_binary(B::Add, &int(1), &int(2)), Some(int(3)));
        assert_eq!(fold_binary(B::Mul, &int(2), &int(3)), Some(int(6)));
        assert_eq!(fold_binary(B::Mod, &int(7), &int(3)), Some(int(1)));
    }

    #[test]
    fn test_int_wrapping() {
        assert_eq!(
            fold_binary(B::Add, &int(i32::MAX), &int(1)),
            Some(int(i32::MIN))
        );
        assert_eq!(
            fold_binary(B::Mul, &int(i32::MIN), &int(-1)),
            Some(int(i32::MIN))
        );
    }

    #[test]
    fn test_division_by_zero_refuses() {
        assert_eq!(fold_binary(B::Div, &int(1), &int(0)), None);
        assert_eq!(fold_binary(B::Mod, &int(1), &int(0)), None);
    }

    #[test]
    fn test_unsigned_shift() {
        assert_eq!(fold_binary(B::Ushr, &int(-1), &int(28)), Some(int(0xF)));
        assert_eq!(fold_binary(B::Shr, &int(-16), &int(2)), Some(int(-4)));
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        assert_eq!(
            fold_binary(B::Add, &int(1), &Constant::Float(0.5)),
            Some(Constant::Float(1.5))
        );
    }

    #[test]
    fn test_string_concat() {
        let l = Constant::String("ab".into());
        let r = Constant::String("cd".into());
        assert_eq!(
            fold_binary(B::Add, &l, &r),
            Some(Constant::String("abcd".into()))
        );
    }

    #[test]
    fn test_comparisons_yield_int() {
        assert_eq!(fold_binary(B::Lt, &int(1), &int(2)), Some(int(1)));
        assert_eq!(
            fold_binary(B::Eq, &Constant::Float(1.0), &Constant::Float(2.0)),
            Some(int(0))
        );
    }

    #[test]
    fn test_vector_ops() {
        let v = Constant::Vector([1.0, 2.0, 3.0]);
        let w = Constant::Vector([0.0, 0.0, 1.0]);
        assert_eq!(
            fold_binary(B::Add, &v, &w),
            Some(Constant::Vector([1.0, 2.0, 4.0]))
        );
        assert_eq!(
            fold_binary(B::Mul, &v, &Constant::Float(2.0)),
            Some(Constant::Vector([2.0, 4.0, 6.0]))
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(fold_unary(UnaryOp::Neg, &int(5)), Some(int(-5)));
        assert_eq!(fold_unary(UnaryOp::Not, &int(0)), Some(int(1)));
        assert_eq!(fold_unary(UnaryOp::Comp, &int(0)), Some(int(-1)));
        assert_eq!(
            fold_unary(UnaryOp::Neg, &Constant::Float(2.0)),
            Some(Constant::Float(-2.0))
        );
        assert_eq!(fold_unary(UnaryOp::Not, &Constant::Float(1.0)), None);
    }
}
