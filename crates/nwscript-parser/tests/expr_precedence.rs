//! Expression precedence, associativity and typing.
//!
//! NWScript follows C precedence: assignment < ternary < `||` < `&&` <
//! `|` < `^` < `&` < equality < relational < shifts < additive <
//! multiplicative < unary < postfix. Constant folding is disabled in
//! these tests by operating on variables.

use nwscript_ast::ast::{BinaryOp, ExprKind, UnaryOp};
use nwscript_ast::{Diagnostic, Expr, Program, SourceMap, Stmt, SymbolTable, Type};
use nwscript_parser::{parse_unit, IncludeLoadError, IncludeProvider, ParserConfig};
use std::rc::Rc;

struct NoIncludes;

impl IncludeProvider for NoIncludes {
    fn load(&mut self, _name: &str) -> Result<Rc<str>, IncludeLoadError> {
        Err(IncludeLoadError::NotFound)
    }
}

/// Parse a source with `int a; int b; int c;` style globals available.
fn parse(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let mut sources = SourceMap::new();
    let mut provider = NoIncludes;
    let mut symbols = SymbolTable::new();
    let config = ParserConfig::default();
    parse_unit(
        "test",
        Rc::from(source),
        &mut sources,
        &mut provider,
        &mut symbols,
        &config,
    )
    .map(|(program, _)| program)
}

/// Extract the initializer of `int x = <expr>;` inside main, where main
/// is the only function and the declaration its only statement.
fn init_expr(source: &str) -> Expr {
    let wrapped = format!(
        "int a; int b; int c; void main() {{ int x = {}; }}",
        source
    );
    let program = parse(&wrapped).expect("parse failed");
    let main = program.functions.last().expect("main parsed");
    match &main.body.stmts[0] {
        Stmt::Decl(decls) => decls[0].init.clone().expect("initializer present"),
        other => panic!("expected declaration, got {:?}", other),
    }
}

fn as_binary(expr: &Expr) -> (BinaryOp, &Expr, &Expr) {
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => (*op, lhs.as_ref(), rhs.as_ref()),
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn test_mul_binds_tighter_than_add() {
    // a + b * c parses as a + (b * c)
    let expr = init_expr("a + b * c");
    let (op, lhs, rhs) = as_binary(&expr);
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(lhs.kind, ExprKind::Var(_)));
    assert_eq!(as_binary(rhs).0, BinaryOp::Mul);
}

#[test]
fn test_additive_left_associative() {
    // a - b - c parses as (a - b) - c
    let expr = init_expr("a - b - c");
    let (op, lhs, _) = as_binary(&expr);
    assert_eq!(op, BinaryOp::Sub);
    assert_eq!(as_binary(lhs).0, BinaryOp::Sub);
}

#[test]
fn test_shift_binds_tighter_than_relational() {
    // a << b < c parses as (a << b) < c
    let expr = init_expr("a << b < c");
    let (op, lhs, _) = as_binary(&expr);
    assert_eq!(op, BinaryOp::Lt);
    assert_eq!(as_binary(lhs).0, BinaryOp::Shl);
}

#[test]
fn test_and_binds_tighter_than_or() {
    // a && b || c parses as (a && b) || c
    let expr = init_expr("a && b || c");
    let (op, lhs, _) = as_binary(&expr);
    assert_eq!(op, BinaryOp::LogOr);
    assert_eq!(as_binary(lhs).0, BinaryOp::LogAnd);
}

#[test]
fn test_bitwise_between_logical_and_equality() {
    // a | b == c parses as a | (b == c)
    let expr = init_expr("a | b == c");
    let (op, _, rhs) = as_binary(&expr);
    assert_eq!(op, BinaryOp::BitOr);
    assert_eq!(as_binary(rhs).0, BinaryOp::Eq);
}

#[test]
fn test_unary_binds_tighter_than_mul() {
    // -a * b parses as (-a) * b
    let expr = init_expr("-a * b");
    let (op, lhs, _) = as_binary(&expr);
    assert_eq!(op, BinaryOp::Mul);
    assert!(matches!(
        lhs.kind,
        ExprKind::Unary {
            op: UnaryOp::Neg,
            ..
        }
    ));
}

#[test]
fn test_unsigned_shift_operator() {
    let expr = init_expr("a >>> b");
    assert_eq!(as_binary(&expr).0, BinaryOp::Ushr);
}

#[test]
fn test_ternary_over_logical() {
    // a && b ? a : b keeps the logical op in the condition
    let expr = init_expr("a && b ? a : b");
    match &expr.kind {
        ExprKind::Ternary { cond, .. } => {
            assert_eq!(as_binary(cond).0, BinaryOp::LogAnd);
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

#[test]
fn test_assignment_right_associative() {
    // a = b = c assigns c to b, then the result to a
    let expr = init_expr("a = b = c");
    match &expr.kind {
        ExprKind::Assign { value, .. } => {
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_comparison_yields_int() {
    let expr = init_expr("a < b");
    assert_eq!(expr.ty, Type::Int);
}

#[test]
fn test_constant_folding_collapses_literals() {
    let expr = init_expr("1 + 2 * 3");
    assert!(matches!(
        expr.kind,
        ExprKind::Constant(nwscript_ast::Constant::Int(7))
    ));
}

#[test]
fn test_folding_is_two_complement() {
    let expr = init_expr("0x7FFFFFFF + 1");
    assert!(matches!(
        expr.kind,
        ExprKind::Constant(nwscript_ast::Constant::Int(i32::MIN))
    ));
}

#[test]
fn test_mixed_arithmetic_promotes_to_float() {
    let wrapped = "void main() { float f; int n; float x = f + n; }";
    let program = parse(wrapped).expect("parse failed");
    let main = &program.functions[0];
    match &main.body.stmts[2] {
        Stmt::Decl(decls) => {
            let init = decls[0].init.as_ref().unwrap();
            assert_eq!(init.ty, Type::Float);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_int_widens_into_float_initializer() {
    let wrapped = "void main() { int n; float x = n; }";
    let program = parse(wrapped).expect("parse failed");
    match &program.functions[0].body.stmts[1] {
        Stmt::Decl(decls) => {
            let init = decls[0].init.as_ref().unwrap();
            assert!(matches!(init.kind, ExprKind::IntToFloat(_)));
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_string_concat_types() {
    let wrapped = r#"void main() { string s = "a" + "b"; }"#;
    let program = parse(wrapped).expect("parse failed");
    match &program.functions[0].body.stmts[0] {
        Stmt::Decl(decls) => {
            let init = decls[0].init.as_ref().unwrap();
            assert_eq!(init.ty, Type::String);
            assert!(matches!(
                init.kind,
                ExprKind::Constant(nwscript_ast::Constant::String(ref s)) if s.as_ref() == "ab"
            ));
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_vector_arithmetic_types() {
    let ok = parse("void main() { vector v; vector w = v + v; vector u = v * 2.0; }");
    assert!(ok.is_ok());
}

#[test]
fn test_vector_component_access() {
    let wrapped = "void main() { vector v; float f = v.y; }";
    let program = parse(wrapped).expect("parse failed");
    match &program.functions[0].body.stmts[1] {
        Stmt::Decl(decls) => {
            let init = decls[0].init.as_ref().unwrap();
            assert!(matches!(init.kind, ExprKind::Member { .. }));
            assert_eq!(init.ty, Type::Float);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn test_string_plus_int_rejected() {
    let err = parse(r#"void main() { string s = "a" + 1; }"#).unwrap_err();
    assert_eq!(err[0].kind, nwscript_ast::ErrorKind::Type);
}

#[test]
fn test_vector_modulus_rejected() {
    let err = parse("void main() { vector v; vector w = v % v; }").unwrap_err();
    assert_eq!(err[0].kind, nwscript_ast::ErrorKind::Type);
}

#[test]
fn test_logical_not_on_float_rejected() {
    let err = parse("void main() { int x = !1.0; }").unwrap_err();
    assert_eq!(err[0].kind, nwscript_ast::ErrorKind::Type);
}

#[test]
fn test_increment_requires_int_variable() {
    let err = parse("void main() { float f; f++; }").unwrap_err();
    assert_eq!(err[0].kind, nwscript_ast::ErrorKind::Type);
}
