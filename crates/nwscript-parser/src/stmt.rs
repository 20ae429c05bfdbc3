//! Statement parsing.

use crate::Parser;
use nwscript_ast::ast::ExprKind;
use nwscript_ast::{
    Block, Constant, Diagnostic, ErrorKind, LocalDecl, Stmt, SwitchCase, Symbol, SymbolKind, Type,
};
use nwscript_lexer::Token;
use std::rc::Rc;

impl Parser<'_> {
    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let span = self.stream.current_span();
        match self.stream.peek() {
            Some(Token::Semicolon) => {
                self.stream.advance();
                Ok(Stmt::Empty)
            }
            Some(Token::LBrace) => {
                self.symbols.push_scope();
                let block = self.parse_block();
                self.symbols.pop_scope();
                Ok(Stmt::Block(block?))
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::Do) => self.parse_do_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Switch) => self.parse_switch(),
            Some(Token::Break) => {
                self.stream.advance();
                self.stream.expect(Token::Semicolon)?;
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(Diagnostic::error(
                        ErrorKind::Parse,
                        span,
                        "'break' outside of a loop or switch",
                    ));
                }
                Ok(Stmt::Break(span))
            }
            Some(Token::Continue) => {
                self.stream.advance();
                self.stream.expect(Token::Semicolon)?;
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error(
                        ErrorKind::Parse,
                        span,
                        "'continue' outside of a loop",
                    ));
                }
                Ok(Stmt::Continue(span))
            }
            Some(Token::Return) => self.parse_return(),
            Some(Token::Const) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "'const' is only allowed at global scope",
            )),
            Some(Token::Struct) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "the 'struct' keyword is reserved and cannot be used",
            )),
            Some(tok) if tok.is_type_keyword() => self.parse_local_decl(),
            Some(Token::Ident(name)) if self.config.engine_types.contains_key(name) => {
                self.parse_local_decl()
            }
            _ => {
                let expr = self.parse_expr()?;
                self.stream.expect(Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Parse the statements of a compound statement. The caller owns the
    /// scope frame so that function bodies can pre-declare parameters.
    pub(crate) fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        let start = self.stream.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.stream.check(&Token::RBrace) {
            if self.stream.at_end() {
                return Err(Diagnostic::error(
                    ErrorKind::Parse,
                    self.stream.current_span(),
                    "missing '}' before end of file",
                ));
            }
            stmts.push(self.parse_stmt()?);
        }
        let end = self.stream.expect(Token::RBrace)?;
        Ok(Block {
            stmts,
            span: start.merge(&end),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        self.stream.expect(Token::If)?;
        self.stream.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.check_condition(&cond)?;
        self.stream.expect(Token::RParen)?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.stream.eat(&Token::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        self.stream.expect(Token::While)?;
        self.stream.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.check_condition(&cond)?;
        self.stream.expect(Token::RParen)?;
        self.loop_depth += 1;
        let body = self.parse_stmt();
        self.loop_depth -= 1;
        Ok(Stmt::While {
            cond,
            body: Box::new(body?),
        })
    }

    fn parse_do_while(&mut self) -> Result<Stmt, Diagnostic> {
        self.stream.expect(Token::Do)?;
        self.loop_depth += 1;
        let body = self.parse_stmt();
        self.loop_depth -= 1;
        let body = body?;
        self.stream.expect(Token::While)?;
        self.stream.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.check_condition(&cond)?;
        self.stream.expect(Token::RParen)?;
        self.stream.expect(Token::Semicolon)?;
        Ok(Stmt::DoWhile {
            body: Box::new(body),
            cond,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        self.stream.expect(Token::For)?;
        self.stream.expect(Token::LParen)?;
        let init = if self.stream.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.stream.expect(Token::Semicolon)?;
        let cond = if self.stream.check(&Token::Semicolon) {
            None
        } else {
            let cond = self.parse_expr()?;
            self.check_condition(&cond)?;
            Some(cond)
        };
        self.stream.expect(Token::Semicolon)?;
        let step = if self.stream.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.stream.expect(Token::RParen)?;
        self.loop_depth += 1;
        let body = self.parse_stmt();
        self.loop_depth -= 1;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body: Box::new(body?),
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, Diagnostic> {
        let span = self.stream.expect(Token::Switch)?;
        self.stream.expect(Token::LParen)?;
        let value = self.parse_expr()?;
        match value.ty {
            Type::Int => {}
            Type::String if self.config.extensions => {}
            Type::String => {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    value.span,
                    "'switch' on string requires language extensions",
                ));
            }
            other => {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    value.span,
                    format!("'switch' expects int, found {}", self.type_name(other)),
                ));
            }
        }
        self.stream.expect(Token::RParen)?;
        self.stream.expect(Token::LBrace)?;

        let mut cases: Vec<SwitchCase> = Vec::new();
        self.switch_depth += 1;
        let result = self.parse_switch_body(value.ty, &mut cases);
        self.switch_depth -= 1;
        result?;

        let end = self.stream.expect(Token::RBrace)?;
        Ok(Stmt::Switch {
            value,
            cases,
            span: span.merge(&end),
        })
    }

    fn parse_switch_body(
        &mut self,
        value_ty: Type,
        cases: &mut Vec<SwitchCase>,
    ) -> Result<(), Diagnostic> {
        while !self.stream.check(&Token::RBrace) {
            let span = self.stream.current_span();
            let label = match self.stream.peek() {
                Some(Token::Case) => {
                    self.stream.advance();
                    let expr = self.parse_expr()?;
                    let Some(label) = expr.constant().cloned() else {
                        return Err(Diagnostic::error(
                            ErrorKind::Const,
                            expr.span,
                            "'case' label must be a constant expression",
                        ));
                    };
                    if label.ty() != value_ty {
                        return Err(Diagnostic::error(
                            ErrorKind::Type,
                            expr.span,
                            format!(
                                "'case' label type {} does not match switch value",
                                self.type_name(label.ty())
                            ),
                        ));
                    }
                    if cases.iter().any(|c| c.label.as_ref() == Some(&label)) {
                        return Err(Diagnostic::error(
                            ErrorKind::Parse,
                            expr.span,
                            format!("duplicate 'case' label {}", label),
                        ));
                    }
                    self.stream.expect(Token::Colon)?;
                    Some(label)
                }
                Some(Token::Default) => {
                    self.stream.advance();
                    self.stream.expect(Token::Colon)?;
                    if cases.iter().any(|c| c.label.is_none()) {
                        return Err(Diagnostic::error(
                            ErrorKind::Parse,
                            span,
                            "duplicate 'default' label",
                        ));
                    }
                    None
                }
                Some(found) => {
                    return Err(Diagnostic::error(
                        ErrorKind::Parse,
                        span,
                        format!("expected 'case' or 'default', found '{}'", found),
                    ));
                }
                None => {
                    return Err(Diagnostic::error(
                        ErrorKind::Parse,
                        span,
                        "missing '}' in switch",
                    ));
                }
            };

            let mut stmts = Vec::new();
            while !matches!(
                self.stream.peek(),
                Some(Token::Case) | Some(Token::Default) | Some(Token::RBrace) | None
            ) {
                let stmt_span = self.stream.current_span();
                let stmt = self.parse_stmt()?;
                if matches!(stmt, Stmt::Decl(_)) {
                    return Err(Diagnostic::error(
                        ErrorKind::Parse,
                        stmt_span,
                        "declarations inside a 'case' must be enclosed in a block",
                    ));
                }
                stmts.push(stmt);
            }
            cases.push(SwitchCase { label, stmts, span });
        }
        Ok(())
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let span = self.stream.expect(Token::Return)?;
        let ret_type = self
            .ret_type
            .expect("return statements only parse inside function bodies");
        let value = if self.stream.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.stream.expect(Token::Semicolon)?;

        let value = match (ret_type, value) {
            (Type::Void, None) => None,
            (Type::Void, Some(expr)) => {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    expr.span,
                    "void function cannot return a value",
                ));
            }
            (_, None) => {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    span,
                    format!("expected a return value of type {}", self.type_name(ret_type)),
                ));
            }
            (ty, Some(expr)) => Some(self.coerce(expr, ty, "return value")?),
        };

        Ok(Stmt::Return { value, span })
    }

    /// One local declaration statement; a comma list produces one
    /// declarator entry per name.
    fn parse_local_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let ty = self.parse_type_spec()?;
        if !ty.is_storable() {
            return Err(Diagnostic::error(
                ErrorKind::Type,
                self.stream.prev_span(),
                format!("cannot declare a variable of type {}", self.type_name(ty)),
            ));
        }

        let mut decls = Vec::new();
        loop {
            let name_span = self.stream.current_span();
            let name = self.expect_ident()?;
            let init = if self.stream.eat(&Token::Eq) {
                let expr = self.parse_expr()?;
                Some(self.coerce(expr, ty, "initializer")?)
            } else {
                None
            };

            let symbol = Symbol {
                name: name.clone(),
                ty,
                kind: SymbolKind::Local,
                span: name_span,
            };
            let id = self.symbols.declare(symbol).map_err(|_| {
                Diagnostic::error(
                    ErrorKind::Name,
                    name_span,
                    format!("'{}' is already declared in this scope", name),
                )
            })?;
            decls.push(LocalDecl {
                symbol: id,
                init,
                span: name_span,
            });

            if !self.stream.eat(&Token::Comma) {
                break;
            }
        }
        self.stream.expect(Token::Semicolon)?;
        Ok(Stmt::Decl(decls))
    }

    pub(crate) fn expect_ident(&mut self) -> Result<Rc<str>, Diagnostic> {
        let span = self.stream.current_span();
        match self.stream.advance() {
            Some((Token::Ident(name), _)) => Ok(name),
            Some((found, _)) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                format!("expected an identifier, found '{}'", found),
            )),
            None => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "expected an identifier, found end of file",
            )),
        }
    }

    /// A type specifier: base type keyword or a declared engine type name.
    pub(crate) fn parse_type_spec(&mut self) -> Result<Type, Diagnostic> {
        let span = self.stream.current_span();
        match self.stream.advance() {
            Some((Token::Void, _)) => Ok(Type::Void),
            Some((Token::Int, _)) => Ok(Type::Int),
            Some((Token::Float, _)) => Ok(Type::Float),
            Some((Token::String, _)) => Ok(Type::String),
            Some((Token::Object, _)) => Ok(Type::Object),
            Some((Token::Vector, _)) => Ok(Type::Vector),
            Some((Token::Action, _)) => Ok(Type::Action),
            Some((Token::Struct, _)) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "the 'struct' keyword is reserved and cannot be used",
            )),
            Some((Token::Ident(name), _)) => {
                match self.config.engine_types.get(&name) {
                    Some(&index) => Ok(Type::Engine(index)),
                    None => Err(Diagnostic::error(
                        ErrorKind::Parse,
                        span,
                        format!("unknown type '{}'", name),
                    )),
                }
            }
            Some((found, _)) => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                format!("expected a type, found '{}'", found),
            )),
            None => Err(Diagnostic::error(
                ErrorKind::Parse,
                span,
                "expected a type, found end of file",
            )),
        }
    }

    /// Require an expression that folded to a constant; switch labels,
    /// parameter defaults and `const` initializers all need one.
    pub(crate) fn require_constant(&self, expr: &nwscript_ast::Expr) -> Result<Constant, Diagnostic> {
        match &expr.kind {
            ExprKind::Constant(c) => Ok(c.clone()),
            _ => Err(Diagnostic::error(
                ErrorKind::Const,
                expr.span,
                "a constant expression is required here",
            )),
        }
    }
}
