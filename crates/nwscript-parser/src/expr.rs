//! Expression parsing: Pratt core with typing and eager constant folding.

use crate::fold::{fold_binary, fold_unary};
use crate::Parser;
use nwscript_ast::ast::{BinaryOp, Expr, ExprKind, LValue, UnaryOp, VecComponent};
use nwscript_ast::{Constant, Diagnostic, ErrorKind, Span, SymbolKind, Type};
use nwscript_lexer::Token;

/// Binary operator metadata: (precedence, operator).
///
/// All NWScript binary operators are left-associative; higher precedence
/// binds tighter. Single source of truth for the Pratt loop.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    use BinaryOp as B;
    Some(match token {
        Token::PipePipe => (10, B::LogOr),
        Token::AmpAmp => (20, B::LogAnd),
        Token::Pipe => (30, B::BitOr),
        Token::Caret => (40, B::BitXor),
        Token::Amp => (50, B::BitAnd),
        Token::EqEq => (60, B::Eq),
        Token::BangEq => (60, B::Ne),
        Token::Lt => (70, B::Lt),
        Token::LtEq => (70, B::Le),
        Token::Gt => (70, B::Gt),
        Token::GtEq => (70, B::Ge),
        Token::Shl => (80, B::Shl),
        Token::Shr => (80, B::Shr),
        Token::Ushr => (80, B::Ushr),
        Token::Plus => (90, B::Add),
        Token::Minus => (90, B::Sub),
        Token::Star => (100, B::Mul),
        Token::Slash => (100, B::Div),
        Token::Percent => (100, B::Mod),
        _ => return None,
    })
}

/// Compound-assignment operator carried by an assignment token.
fn assign_op_info(token: &Token) -> Option<Option<BinaryOp>> {
    Some(match token {
        Token::Eq => None,
        Token::PlusEq => Some(BinaryOp::Add),
        Token::MinusEq => Some(BinaryOp::Sub),
        Token::StarEq => Some(BinaryOp::Mul),
        Token::SlashEq => Some(BinaryOp::Div),
        Token::PercentEq => Some(BinaryOp::Mod),
        _ => return None,
    })
}

/// Result type of a binary operation, or `None` when the pairing is
/// rejected. Mirrors the reference compiler's operator table.
fn binary_type(op: BinaryOp, l: Type, r: Type) -> Option<Type> {
    use BinaryOp as B;
    use Type as T;
    match op {
        B::LogAnd | B::LogOr => {
            let ok = |t: Type| matches!(t, T::Int | T::Object);
            (ok(l) && ok(r)).then_some(T::Int)
        }
        B::Eq | B::Ne => {
            let comparable = matches!(l, T::Int | T::Float | T::String | T::Object | T::Vector);
            (l == r && comparable).then_some(T::Int)
        }
        B::Lt | B::Le | B::Gt | B::Ge => {
            (l.is_arithmetic() && r.is_arithmetic()).then_some(T::Int)
        }
        op if op.is_int_only() => (l == T::Int && r == T::Int).then_some(T::Int),
        B::Add => match (l, r) {
            (T::Int, T::Int) => Some(T::Int),
            (T::Float, T::Float) | (T::Int, T::Float) | (T::Float, T::Int) => Some(T::Float),
            (T::String, T::String) => Some(T::String),
            (T::Vector, T::Vector) => Some(T::Vector),
            _ => None,
        },
        B::Sub => match (l, r) {
            (T::Int, T::Int) => Some(T::Int),
            (T::Float, T::Float) | (T::Int, T::Float) | (T::Float, T::Int) => Some(T::Float),
            (T::Vector, T::Vector) => Some(T::Vector),
            _ => None,
        },
        B::Mul => match (l, r) {
            (T::Int, T::Int) => Some(T::Int),
            (T::Float, T::Float) | (T::Int, T::Float) | (T::Float, T::Int) => Some(T::Float),
            (T::Vector, T::Float) => Some(T::Vector),
            (T::Float, T::Vector) => Some(T::Vector),
            _ => None,
        },
        B::Div => match (l, r) {
            (T::Int, T::Int) => Some(T::Int),
            (T::Float, T::Float) | (T::Int, T::Float) | (T::Float, T::Int) => Some(T::Float),
            (T::Vector, T::Float) => Some(T::Vector),
            _ => None,
        },
        _ => None,
    }
}

impl Parser<'_> {
    /// Parse a full expression (assignment level).
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_assign()
    }

    pub(crate) fn parse_assign(&mut self) -> Result<Expr, Diagnostic> {
        let lhs = self.parse_ternary()?;

        let Some(op) = self.stream.peek().and_then(assign_op_info) else {
            return Ok(lhs);
        };
        self.stream.advance();

        // Right-associative: `a = b = c` assigns c to b first.
        let value = self.parse_assign()?;
        let target = self.to_lvalue(&lhs)?;
        let target_ty = self.lvalue_type(&target);
        let span = lhs.span.merge(&value.span);

        let value = match op {
            None => self.coerce(value, target_ty, "assignment")?,
            Some(binop) => {
                if target_ty == Type::Vector && !self.config.extensions {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        span,
                        "compound assignment on vectors requires language extensions",
                    ));
                }
                let value = match (target_ty, value.ty) {
                    // Vector scaling takes a float right-hand side.
                    (Type::Vector, Type::Int) if matches!(binop, BinaryOp::Mul | BinaryOp::Div) => {
                        self.coerce(value, Type::Float, "assignment")?
                    }
                    _ => value,
                };
                match binary_type(binop, target_ty, value.ty) {
                    Some(result) if result == target_ty => value,
                    _ => {
                        return Err(Diagnostic::error(
                            ErrorKind::Type,
                            span,
                            format!(
                                "operator '{}=' cannot combine {} and {}",
                                binop.symbol(),
                                self.type_name(target_ty),
                                self.type_name(value.ty)
                            ),
                        ));
                    }
                }
            }
        };

        Ok(Expr::new(
            ExprKind::Assign {
                target,
                op,
                value: Box::new(value),
            },
            target_ty,
            span,
        ))
    }

    fn parse_ternary(&mut self) -> Result<Expr, Diagnostic> {
        let cond = self.parse_binary(0)?;
        if !self.stream.eat(&Token::Question) {
            return Ok(cond);
        }
        self.check_condition(&cond)?;

        let then_val = self.parse_assign()?;
        self.stream.expect(Token::Colon)?;
        let else_val = self.parse_ternary()?;

        let span = cond.span.merge(&else_val.span);
        let (then_val, else_val, ty) = self.unify_branches(then_val, else_val, span)?;

        // The conditional folds when its condition does.
        if let Some(Constant::Int(c)) = cond.constant() {
            return Ok(if *c != 0 { then_val } else { else_val });
        }

        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_val: Box::new(then_val),
                else_val: Box::new(else_val),
            },
            ty,
            span,
        ))
    }

    fn unify_branches(
        &self,
        then_val: Expr,
        else_val: Expr,
        span: Span,
    ) -> Result<(Expr, Expr, Type), Diagnostic> {
        if then_val.ty == else_val.ty {
            let ty = then_val.ty;
            return Ok((then_val, else_val, ty));
        }
        if then_val.ty.is_arithmetic() && else_val.ty.is_arithmetic() {
            let then_val = self.coerce(then_val, Type::Float, "conditional")?;
            let else_val = self.coerce(else_val, Type::Float, "conditional")?;
            return Ok((then_val, else_val, Type::Float));
        }
        Err(Diagnostic::error(
            ErrorKind::Type,
            span,
            format!(
                "conditional branches have mismatched types {} and {}",
                self.type_name(then_val.ty),
                self.type_name(else_val.ty)
            ),
        ))
    }

    /// Pratt loop: binary operators with precedence climbing.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_unary()?;

        while let Some(token) = self.stream.peek() {
            let Some((prec, op)) = binary_op_info(token) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.stream.advance();

            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.typed_binary(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    /// Type-check one binary application, folding constant operands.
    fn typed_binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr, Diagnostic> {
        let span = lhs.span.merge(&rhs.span);

        // Relational operators compare same-typed operands; a mixed
        // int/float pairing widens the int side first.
        let (lhs, rhs) = if matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
            && lhs.ty != rhs.ty
            && lhs.ty.is_arithmetic()
            && rhs.ty.is_arithmetic()
        {
            (
                self.coerce(lhs, Type::Float, "comparison")?,
                self.coerce(rhs, Type::Float, "comparison")?,
            )
        } else {
            (lhs, rhs)
        };

        let Some(ty) = binary_type(op, lhs.ty, rhs.ty) else {
            return Err(Diagnostic::error(
                ErrorKind::Type,
                span,
                format!(
                    "operator '{}' cannot combine {} and {}",
                    op.symbol(),
                    self.type_name(lhs.ty),
                    self.type_name(rhs.ty)
                ),
            ));
        };

        if let (Some(lc), Some(rc)) = (lhs.constant(), rhs.constant()) {
            if let Some(folded) = fold_binary(op, lc, rc) {
                return Ok(Expr::new(ExprKind::Constant(folded), ty, span));
            }
        }

        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        ))
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.stream.current_span();
        match self.stream.peek() {
            Some(Token::Minus) => {
                self.stream.advance();
                let operand = self.parse_unary()?;
                if !operand.ty.is_arithmetic() {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        operand.span,
                        format!("operator '-' expects int or float, found {}", self.type_name(operand.ty)),
                    ));
                }
                self.typed_unary(UnaryOp::Neg, operand, span)
            }
            Some(Token::Bang) => {
                self.stream.advance();
                let operand = self.parse_unary()?;
                if !matches!(operand.ty, Type::Int | Type::Object) {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        operand.span,
                        format!("operator '!' expects int or object, found {}", self.type_name(operand.ty)),
                    ));
                }
                self.typed_unary(UnaryOp::Not, operand, span)
            }
            Some(Token::Tilde) => {
                self.stream.advance();
                let operand = self.parse_unary()?;
                if operand.ty != Type::Int {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        operand.span,
                        format!("operator '~' expects int, found {}", self.type_name(operand.ty)),
                    ));
                }
                self.typed_unary(UnaryOp::Comp, operand, span)
            }
            Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                let decrement = matches!(self.stream.peek(), Some(Token::MinusMinus));
                self.stream.advance();
                let operand = self.parse_unary()?;
                let target = self.to_lvalue(&operand)?;
                self.check_incdec(&target, operand.span)?;
                Ok(Expr::new(
                    ExprKind::IncDec {
                        target,
                        decrement,
                        postfix: false,
                    },
                    Type::Int,
                    span.merge(&operand.span),
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn typed_unary(&self, op: UnaryOp, operand: Expr, span: Span) -> Result<Expr, Diagnostic> {
        let span = span.merge(&operand.span);
        let ty = match op {
            UnaryOp::Neg => operand.ty,
            UnaryOp::Not | UnaryOp::Comp => Type::Int,
        };
        if let Some(c) = operand.constant() {
            if let Some(folded) = fold_unary(op, c) {
                return Ok(Expr::new(ExprKind::Constant(folded), ty, span));
            }
        }
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_atom()?;

        loop {
            match self.stream.peek() {
                Some(Token::Dot) => {
                    self.stream.advance();
                    let span = self.stream.current_span();
                    let component = match self.stream.advance() {
                        Some((Token::Ident(name), _)) => match name.as_ref() {
                            "x" => VecComponent::X,
                            "y" => VecComponent::Y,
                            "z" => VecComponent::Z,
                            other => {
                                return Err(Diagnostic::error(
                                    ErrorKind::Name,
                                    span,
                                    format!("unknown vector component '{}'", other),
                                ));
                            }
                        },
                        _ => {
                            return Err(Diagnostic::error(
                                ErrorKind::Parse,
                                span,
                                "expected a vector component after '.'",
                            ));
                        }
                    };
                    if expr.ty != Type::Vector {
                        return Err(Diagnostic::error(
                            ErrorKind::Type,
                            expr.span,
                            format!("member access on {}, expected vector", self.type_name(expr.ty)),
                        ));
                    }
                    let span = expr.span.merge(&span);
                    let folded = match expr.constant() {
                        Some(Constant::Vector(v)) => {
                            Some(v[component.offset() as usize / 4])
                        }
                        _ => None,
                    };
                    expr = match folded {
                        Some(value) => Expr::new(
                            ExprKind::Constant(Constant::Float(value)),
                            Type::Float,
                            span,
                        ),
                        None => Expr::new(
                            ExprKind::Member {
                                base: Box::new(expr),
                                component,
                            },
                            Type::Float,
                            span,
                        ),
                    };
                }
                Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                    let decrement = matches!(self.stream.peek(), Some(Token::MinusMinus));
                    let op_span = self.stream.current_span();
                    self.stream.advance();
                    let target = self.to_lvalue(&expr)?;
                    self.check_incdec(&target, expr.span)?;
                    expr = Expr::new(
                        ExprKind::IncDec {
                            target,
                            decrement,
                            postfix: true,
                        },
                        Type::Int,
                        expr.span.merge(&op_span),
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.stream.current_span();
        match self.stream.peek() {
            Some(Token::IntLiteral(v)) => {
                let v = *v;
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::Constant(Constant::Int(v)),
                    Type::Int,
                    span,
                ))
            }
            Some(Token::FloatLiteral(v)) => {
                let v = *v;
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::Constant(Constant::Float(v)),
                    Type::Float,
                    span,
                ))
            }
            Some(Token::StringLiteral(s)) => {
                let s = s.clone();
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::Constant(Constant::String(s)),
                    Type::String,
                    span,
                ))
            }
            Some(Token::LParen) => {
                self.stream.advance();
                let expr = self.parse_expr()?;
                self.stream.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => self.parse_vector_literal(),
            Some(Token::Ident(_)) => {
                if matches!(self.stream.peek_nth(1), Some(Token::LParen)) {
                    self.parse_call()
                } else {
                    self.parse_name_ref()
                }
            }
            Some(Token::Struct) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "the 'struct' keyword is reserved and cannot be used",
            )),
            Some(found) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                format!("expected an expression, found '{}'", found),
            )),
            None => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "expected an expression, found end of file",
            )),
        }
    }

    /// Vector literal `[x, y, z]`: exactly three float components.
    fn parse_vector_literal(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.stream.expect(Token::LBracket)?;
        let mut parts = Vec::with_capacity(3);
        for i in 0..3 {
            if i > 0 {
                self.stream.expect(Token::Comma)?;
            }
            let part = self.parse_assign()?;
            parts.push(self.coerce(part, Type::Float, "vector component")?);
        }
        let end = self.stream.expect(Token::RBracket)?;
        let span = start.merge(&end);

        let mut components = [0f32; 3];
        let all_const = parts.iter().enumerate().all(|(i, p)| match p.constant() {
            Some(Constant::Float(v)) => {
                components[i] = *v;
                true
            }
            _ => false,
        });
        if all_const {
            return Ok(Expr::new(
                ExprKind::Constant(Constant::Vector(components)),
                Type::Vector,
                span,
            ));
        }
        Ok(Expr::new(ExprKind::VectorLit(parts), Type::Vector, span))
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let name_span = self.stream.current_span();
        let name = match self.stream.advance() {
            Some((Token::Ident(name), _)) => name,
            _ => unreachable!("caller checked for an identifier"),
        };
        self.stream.expect(Token::LParen)?;

        let Some(callee) = self.symbols.lookup(&name) else {
            return Err(Diagnostic::error(
                ErrorKind::Name,
                name_span,
                format!("undeclared function '{}'", name),
            ));
        };
        let symbol = self.symbols.get(callee);
        let ret_ty = symbol.ty;
        let (params, min_args) = match &symbol.kind {
            SymbolKind::Function {
                params, min_args, ..
            }
            | SymbolKind::Action {
                params, min_args, ..
            } => (params.clone(), *min_args),
            _ => {
                return Err(Diagnostic::error(
                    ErrorKind::Name,
                    name_span,
                    format!("'{}' is not a function", name),
                ));
            }
        };

        let mut args = Vec::new();
        while !self.stream.check(&Token::RParen) {
            if !args.is_empty() {
                self.stream.expect(Token::Comma)?;
            }
            let arg = self.parse_assign()?;
            let index = args.len();
            match params.get(index) {
                Some(param) if param.ty == Type::Action => {
                    // An action argument is a deferred call to a void
                    // function; the generator captures it as a closure.
                    if !matches!(arg.kind, ExprKind::Call { .. }) || arg.ty != Type::Void {
                        return Err(Diagnostic::error(
                            ErrorKind::Type,
                            arg.span,
                            format!(
                                "argument {} of '{}' must be a call to a void function",
                                index + 1,
                                name
                            ),
                        ));
                    }
                    args.push(arg);
                }
                Some(param) => {
                    let context = format!("argument {} of '{}'", index + 1, name);
                    args.push(self.coerce(arg, param.ty, &context)?);
                }
                None => {
                    return Err(Diagnostic::error(
                        ErrorKind::Arity,
                        arg.span,
                        format!(
                            "too many arguments to '{}': expected at most {}",
                            name,
                            params.len()
                        ),
                    ));
                }
            }
        }
        let end = self.stream.expect(Token::RParen)?;

        if args.len() < min_args {
            return Err(Diagnostic::error(
                ErrorKind::Arity,
                name_span.merge(&end),
                format!(
                    "too few arguments to '{}': expected at least {}, found {}",
                    name,
                    min_args,
                    args.len()
                ),
            ));
        }

        Ok(Expr::new(
            ExprKind::Call { callee, args },
            ret_ty,
            name_span.merge(&end),
        ))
    }

    fn parse_name_ref(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.stream.current_span();
        let name = match self.stream.advance() {
            Some((Token::Ident(name), _)) => name,
            _ => unreachable!("caller checked for an identifier"),
        };
        let Some(id) = self.symbols.lookup(&name) else {
            return Err(Diagnostic::error(
                ErrorKind::Name,
                span,
                format!("undeclared identifier '{}'", name),
            ));
        };
        let symbol = self.symbols.get(id);
        match &symbol.kind {
            SymbolKind::Global {
                constant: Some(value),
                ..
            } => {
                let value = value.clone();
                let ty = value.ty();
                Ok(Expr::new(ExprKind::Constant(value), ty, span))
            }
            SymbolKind::Global { .. } | SymbolKind::Local => {
                Ok(Expr::new(ExprKind::Var(id), symbol.ty, span))
            }
            SymbolKind::Function { .. } | SymbolKind::Action { .. } => Err(Diagnostic::error(
                ErrorKind::Name,
                span,
                format!("function '{}' used as a value", name),
            )),
        }
    }

    // === Typing helpers ===

    /// Coerce an expression to a target type, inserting the implicit
    /// int-to-float widening where the rules allow it.
    pub(crate) fn coerce(
        &self,
        expr: Expr,
        target: Type,
        context: &str,
    ) -> Result<Expr, Diagnostic> {
        if expr.ty == target {
            return Ok(expr);
        }
        if expr.ty == Type::Int && target == Type::Float {
            let span = expr.span;
            let folded = expr.constant().map(|c| c.widened_to(Type::Float));
            return Ok(match folded {
                Some(c) => Expr::new(ExprKind::Constant(c), Type::Float, span),
                None => Expr::new(ExprKind::IntToFloat(Box::new(expr)), Type::Float, span),
            });
        }
        Err(Diagnostic::error(
            ErrorKind::Type,
            expr.span,
            format!(
                "{}: expected {}, found {}",
                context,
                self.type_name(target),
                self.type_name(expr.ty)
            ),
        ))
    }

    /// Require an expression to be usable as a truth value.
    pub(crate) fn check_condition(&self, expr: &Expr) -> Result<(), Diagnostic> {
        match expr.ty {
            Type::Int | Type::Object => Ok(()),
            other => Err(Diagnostic::error(
                ErrorKind::Type,
                expr.span,
                format!("condition must be int or object, found {}", self.type_name(other)),
            )),
        }
    }

    fn to_lvalue(&self, expr: &Expr) -> Result<LValue, Diagnostic> {
        match &expr.kind {
            ExprKind::Var(symbol) => Ok(LValue {
                symbol: *symbol,
                component: None,
                span: expr.span,
            }),
            ExprKind::Member { base, component } => match base.kind {
                ExprKind::Var(symbol) => Ok(LValue {
                    symbol,
                    component: Some(*component),
                    span: expr.span,
                }),
                _ => Err(Diagnostic::error(
                    ErrorKind::Type,
                    expr.span,
                    "expression is not assignable",
                )),
            },
            ExprKind::Constant(_) => Err(Diagnostic::error(
                ErrorKind::Type,
                expr.span,
                "cannot assign to a constant",
            )),
            _ => Err(Diagnostic::error(
                ErrorKind::Type,
                expr.span,
                "expression is not assignable",
            )),
        }
    }

    fn lvalue_type(&self, target: &LValue) -> Type {
        if target.component.is_some() {
            Type::Float
        } else {
            self.symbols.get(target.symbol).ty
        }
    }

    fn check_incdec(&self, target: &LValue, span: Span) -> Result<(), Diagnostic> {
        if self.lvalue_type(target) != Type::Int {
            return Err(Diagnostic::error(
                ErrorKind::Type,
                span,
                "'++' and '--' require an int variable",
            ));
        }
        Ok(())
    }

    /// Display a type with its declared engine name where one exists.
    pub(crate) fn type_name(&self, ty: Type) -> String {
        if let Type::Engine(n) = ty {
            if let Some((name, _)) = self.config.engine_types.iter().find(|(_, &i)| i == n) {
                return name.to_string();
            }
        }
        ty.to_string()
    }
}
