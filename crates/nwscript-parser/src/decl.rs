//! Top-level declaration parsing (keyword-dispatched).
//!
//! A translation unit is a sequence of global declarations: variables,
//! function prototypes and function definitions. In prototype mode
//! (`nwscript.nss`) prototypes become engine actions numbered in
//! declaration order and globals must fold to constants.

use crate::{ParseMode, Parser};
use nwscript_ast::{
    Diagnostic, ErrorKind, Function, GlobalDecl, Param, Span, Symbol, SymbolId, SymbolKind, Type,
};
use nwscript_lexer::Token;
use std::rc::Rc;
use tracing::trace;

impl Parser<'_> {
    /// Parse the whole unit, collecting diagnostics up to the configured
    /// limit. Error recovery re-synchronizes at statement boundaries only
    /// when more than one diagnostic was asked for.
    pub(crate) fn parse_program(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        while !self.stream.at_end() {
            match self.parse_global_decl() {
                Ok(()) => {}
                Err(diag) => {
                    diagnostics.push(diag);
                    if diagnostics.len() >= self.config.max_errors {
                        break;
                    }
                    self.stream.synchronize();
                }
            }
        }
        diagnostics
    }

    fn parse_global_decl(&mut self) -> Result<(), Diagnostic> {
        let const_span = self.stream.current_span();
        let is_const = self.stream.eat(&Token::Const);
        let ty = self.parse_type_spec()?;
        let name_span = self.stream.current_span();
        let name = self.expect_ident()?;

        if self.stream.check(&Token::LParen) {
            if is_const {
                return Err(Diagnostic::error(
                    ErrorKind::Parse,
                    const_span,
                    "'const' cannot be applied to a function",
                ));
            }
            self.parse_function(ty, name, name_span)
        } else {
            self.parse_global_vars(is_const, ty, name, name_span)
        }
    }

    // === Functions ===

    fn parse_function(
        &mut self,
        ret_ty: Type,
        name: Rc<str>,
        name_span: Span,
    ) -> Result<(), Diagnostic> {
        let params = self.parse_params(&name)?;
        let min_args = params.iter().take_while(|p| p.default.is_none()).count();

        let is_definition = !self.stream.check(&Token::Semicolon);
        let symbol_id = self.declare_function(
            ret_ty,
            name.clone(),
            name_span,
            params.clone(),
            min_args,
            is_definition,
        )?;

        if !is_definition {
            self.stream.expect(Token::Semicolon)?;
            return Ok(());
        }

        // Definition: parameters live in the body's outer frame. The
        // scope must be popped on every path so error recovery resumes
        // at the right depth.
        self.symbols.push_scope();
        let mut param_ids = Vec::with_capacity(params.len());
        let mut param_error = None;
        for param in &params {
            match self.symbols.declare(Symbol {
                name: param.name.clone(),
                ty: param.ty,
                kind: SymbolKind::Local,
                span: param.span,
            }) {
                Ok(id) => param_ids.push(id),
                Err(_) => {
                    param_error = Some(Diagnostic::error(
                        ErrorKind::Name,
                        param.span,
                        format!("duplicate parameter '{}'", param.name),
                    ));
                    break;
                }
            }
        }
        if let Some(diag) = param_error {
            self.symbols.pop_scope();
            return Err(diag);
        }

        self.ret_type = Some(ret_ty);
        let body = self.parse_block();
        self.ret_type = None;
        self.symbols.pop_scope();
        let body = body?;

        trace!(function = %name, params = params.len(), "parsed function");
        self.program.functions.push(Function {
            symbol: symbol_id,
            params: param_ids,
            body,
            span: name_span,
        });
        Ok(())
    }

    fn parse_params(&mut self, fn_name: &str) -> Result<Vec<Param>, Diagnostic> {
        self.stream.expect(Token::LParen)?;
        let mut params: Vec<Param> = Vec::new();

        while !self.stream.check(&Token::RParen) {
            if !params.is_empty() {
                self.stream.expect(Token::Comma)?;
            }
            let ty_span = self.stream.current_span();
            let ty = self.parse_type_spec()?;
            match ty {
                Type::Void => {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        ty_span,
                        "parameters cannot have type void",
                    ));
                }
                Type::Action if self.config.mode != ParseMode::Prototype => {
                    return Err(Diagnostic::error(
                        ErrorKind::Type,
                        ty_span,
                        "only engine actions may take 'action' parameters",
                    ));
                }
                _ => {}
            }

            let span = self.stream.current_span();
            let name = self.expect_ident()?;

            let default = if self.stream.eat(&Token::Eq) {
                let expr = self.parse_assign()?;
                let expr = self.coerce(expr, ty, "default value")?;
                Some(self.require_constant(&expr).map_err(|mut d| {
                    d.message = format!(
                        "default value of parameter '{}' must be a constant",
                        name
                    );
                    d
                })?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(Diagnostic::error(
                        ErrorKind::Arity,
                        span,
                        format!(
                            "parameter '{}' of '{}' must have a default: earlier parameters do",
                            name, fn_name
                        ),
                    ));
                }
                None
            };

            params.push(Param {
                name,
                ty,
                default,
                span,
            });
        }
        self.stream.expect(Token::RParen)?;
        Ok(params)
    }

    /// Declare or re-declare a function, enforcing prototype/definition
    /// consistency and the engine-action rules.
    fn declare_function(
        &mut self,
        ret_ty: Type,
        name: Rc<str>,
        name_span: Span,
        params: Vec<Param>,
        min_args: usize,
        is_definition: bool,
    ) -> Result<SymbolId, Diagnostic> {
        if let Some(existing_id) = self.symbols.lookup(&name) {
            let existing = self.symbols.get(existing_id).clone();
            match existing.kind {
                SymbolKind::Action {
                    params: ref action_params,
                    ..
                } => {
                    let same_signature = existing.ty == ret_ty
                        && action_params.len() == params.len()
                        && action_params
                            .iter()
                            .zip(params.iter())
                            .all(|(a, b)| a.ty == b.ty);
                    if !is_definition && same_signature {
                        // Harmless re-prototype of an engine action.
                        return Ok(existing_id);
                    }
                    return Err(Diagnostic::error(
                        ErrorKind::Name,
                        name_span,
                        format!("cannot redefine engine action '{}'", name),
                    ));
                }
                SymbolKind::Function {
                    params: ref proto_params,
                    defined,
                    ..
                } => {
                    let same_signature = existing.ty == ret_ty
                        && proto_params.len() == params.len()
                        && proto_params
                            .iter()
                            .zip(params.iter())
                            .all(|(a, b)| a.ty == b.ty);
                    if !same_signature {
                        return Err(Diagnostic::error(
                            ErrorKind::Name,
                            name_span,
                            format!(
                                "declaration of '{}' does not match its earlier prototype",
                                name
                            ),
                        ));
                    }
                    if is_definition && defined {
                        return Err(Diagnostic::error(
                            ErrorKind::Name,
                            name_span,
                            format!("function '{}' already has a body", name),
                        ));
                    }
                    if is_definition {
                        if let SymbolKind::Function { defined, .. } =
                            &mut self.symbols.get_mut(existing_id).kind
                        {
                            *defined = true;
                        }
                    }
                    return Ok(existing_id);
                }
                _ => {
                    return Err(Diagnostic::error(
                        ErrorKind::Name,
                        name_span,
                        format!("'{}' is already declared as a variable", name),
                    ));
                }
            }
        }

        let kind = if self.config.mode == ParseMode::Prototype && !is_definition {
            let id = self.next_action_id;
            self.next_action_id += 1;
            SymbolKind::Action {
                id,
                params,
                min_args,
            }
        } else {
            SymbolKind::Function {
                params,
                min_args,
                defined: is_definition,
            }
        };

        self.symbols
            .declare(Symbol {
                name: name.clone(),
                ty: ret_ty,
                kind,
                span: name_span,
            })
            .map_err(|_| {
                Diagnostic::error(
                    ErrorKind::Name,
                    name_span,
                    format!("'{}' is already declared", name),
                )
            })
    }

    // === Global variables ===

    fn parse_global_vars(
        &mut self,
        is_const: bool,
        ty: Type,
        first_name: Rc<str>,
        first_span: Span,
    ) -> Result<(), Diagnostic> {
        if !ty.is_storable() {
            return Err(Diagnostic::error(
                ErrorKind::Type,
                first_span,
                format!("cannot declare a variable of type {}", self.type_name(ty)),
            ));
        }

        let as_constant = is_const || self.config.mode == ParseMode::Prototype;
        if is_const
            && self.config.mode == ParseMode::Script
            && !self.config.extensions
            && !matches!(ty, Type::Int | Type::Float | Type::String)
        {
            return Err(Diagnostic::error(
                ErrorKind::Type,
                first_span,
                format!(
                    "'const {}' requires language extensions",
                    self.type_name(ty)
                ),
            ));
        }

        let mut name = first_name;
        let mut name_span = first_span;
        loop {
            let init = if self.stream.eat(&Token::Eq) {
                let expr = self.parse_expr()?;
                Some(self.coerce(expr, ty, "initializer")?)
            } else {
                None
            };

            if as_constant {
                let Some(init) = init else {
                    return Err(Diagnostic::error(
                        ErrorKind::Const,
                        name_span,
                        format!("constant '{}' requires an initializer", name),
                    ));
                };
                let value = self.require_constant(&init)?;
                self.declare_global(
                    name.clone(),
                    ty,
                    name_span,
                    SymbolKind::Global {
                        index: 0,
                        constant: Some(value),
                    },
                )?;
            } else {
                let index = self.next_global_index;
                self.next_global_index += 1;
                let id = self.declare_global(
                    name.clone(),
                    ty,
                    name_span,
                    SymbolKind::Global {
                        index,
                        constant: None,
                    },
                )?;
                self.program.globals.push(GlobalDecl {
                    symbol: id,
                    init,
                    span: name_span,
                });
            }

            if !self.stream.eat(&Token::Comma) {
                break;
            }
            name_span = self.stream.current_span();
            name = self.expect_ident()?;
        }
        self.stream.expect(Token::Semicolon)?;
        Ok(())
    }

    fn declare_global(
        &mut self,
        name: Rc<str>,
        ty: Type,
        name_span: Span,
        kind: SymbolKind,
    ) -> Result<SymbolId, Diagnostic> {
        self.symbols
            .declare(Symbol {
                name: name.clone(),
                ty,
                kind,
                span: name_span,
            })
            .map_err(|_| {
                Diagnostic::error(
                    ErrorKind::Name,
                    name_span,
                    format!("'{}' is already declared", name),
                )
            })
    }
}

