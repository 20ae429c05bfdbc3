//! Preprocessor: `#define`/`#if`/`#include` token filter.
//!
//! Sits between the lexer and the parser. Consumes the raw token stream
//! of the top-level source (newlines included), applies object-like macro
//! expansion and conditional inclusion, and splices in `#include`d
//! sources after lexing and filtering them the same way. The output is a
//! single flat token vector with all newlines and directives removed.
//!
//! Includes are resolved through the [`IncludeProvider`] capability — a
//! single `load` operation the driver implements over the resource
//! loader and its cache. The in-progress include stack detects circular
//! inclusion; a completed set makes guarded re-inclusion idempotent.

use indexmap::IndexMap;
use logos::Logos;
use nwscript_ast::{Diagnostic, ErrorKind, SourceMap, Span};
use nwscript_lexer::Token;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Object-like macro table: name to replacement token list.
pub type MacroTable = IndexMap<Rc<str>, Vec<(Token, Span)>>;

/// Failure loading an included source.
#[derive(Debug, Error)]
pub enum IncludeLoadError {
    #[error("resource not found")]
    NotFound,
    #[error("{0}")]
    Failed(String),
}

/// Capability to fetch an includable source by resource name.
///
/// Names arrive lowercased (resource names are case-insensitive) and
/// without extension; implementations should append `.nss`.
pub trait IncludeProvider {
    fn load(&mut self, name: &str) -> Result<Rc<str>, IncludeLoadError>;
}

/// Result of preprocessing one top-level unit.
#[derive(Debug)]
pub struct Preprocessed {
    /// Flat token stream; no newlines, no directives
    pub tokens: Vec<(Token, Span)>,
    /// Macro table as it stood at end of unit
    pub defines: MacroTable,
    /// Resource names of all units included, in first-inclusion order
    pub includes: Vec<String>,
}

/// Preprocess one unit and everything it includes.
pub fn preprocess(
    unit_name: &str,
    source: Rc<str>,
    sources: &mut SourceMap,
    provider: &mut dyn IncludeProvider,
    predefined: MacroTable,
) -> Result<Preprocessed, Diagnostic> {
    let mut pp = Preprocessor {
        sources,
        provider,
        defines: predefined,
        completed: Vec::new(),
        in_progress: Vec::new(),
        includes: Vec::new(),
        output: Vec::new(),
    };
    pp.run_unit(unit_name, source)?;
    Ok(Preprocessed {
        tokens: pp.output,
        defines: pp.defines,
        includes: pp.includes,
    })
}

/// One conditional-inclusion frame.
struct Cond {
    /// All enclosing frames were active when this one was opened
    parent_active: bool,
    /// The current branch is being emitted
    active: bool,
    /// Some branch of this conditional has already been taken
    taken: bool,
    else_seen: bool,
}

struct Preprocessor<'a> {
    sources: &'a mut SourceMap,
    provider: &'a mut dyn IncludeProvider,
    defines: MacroTable,
    /// Lowercased names of fully processed units
    completed: Vec<String>,
    /// Lowercased names of units whose processing has begun but not ended
    in_progress: Vec<String>,
    includes: Vec<String>,
    output: Vec<(Token, Span)>,
}

impl Preprocessor<'_> {
    fn run_unit(&mut self, name: &str, source: Rc<str>) -> Result<(), Diagnostic> {
        let key = name.to_ascii_lowercase();
        self.in_progress.push(key.clone());
        let file_id = self.sources.add_file(name, source.clone());

        let raw: Vec<(Result<Token, ()>, Span)> = Token::lexer(&source)
            .spanned()
            .map(|(tok, range)| {
                (
                    tok,
                    Span::new(file_id, range.start as u32, range.end as u32),
                )
            })
            .collect();

        let mut conds: Vec<Cond> = Vec::new();
        let mut at_line_start = true;
        let mut i = 0;

        while i < raw.len() {
            let (tok, span) = &raw[i];
            let active = conds.iter().all(|c| c.parent_active && c.active);

            match tok {
                Ok(Token::Newline) => {
                    at_line_start = true;
                    i += 1;
                }
                Ok(Token::Directive(dname)) => {
                    if active && !at_line_start {
                        return Err(Diagnostic::error(
                            ErrorKind::Preprocessor,
                            *span,
                            format!("'#{}' must appear at the start of a line", dname),
                        ));
                    }
                    i = self.directive(dname.clone(), *span, &raw, i + 1, &mut conds)?;
                    at_line_start = true;
                }
                _ if !active => {
                    // Tokens in a failed branch are lexed but suppressed,
                    // lexical garbage included.
                    at_line_start = false;
                    i += 1;
                }
                Ok(Token::BadString) => {
                    return Err(Diagnostic::error(
                        ErrorKind::Lex,
                        *span,
                        "unterminated string literal",
                    ));
                }
                Ok(Token::BadComment) => {
                    return Err(Diagnostic::error(
                        ErrorKind::Lex,
                        *span,
                        "unterminated block comment",
                    ));
                }
                Ok(tok) => {
                    let tok = tok.clone();
                    let span = *span;
                    self.emit(tok, span);
                    at_line_start = false;
                    i += 1;
                }
                Err(()) => {
                    return Err(Diagnostic::error(
                        ErrorKind::Lex,
                        *span,
                        format!("unrecognized character '{}'", self.sources.snippet(span)),
                    ));
                }
            }
        }

        if let Some(_unclosed) = conds.last() {
            return Err(Diagnostic::error(
                ErrorKind::Preprocessor,
                Span::new(file_id, source.len() as u32, source.len() as u32),
                "missing '#endif' at end of file",
            ));
        }

        self.in_progress.pop();
        self.completed.push(key);
        Ok(())
    }

    /// Emit a token, expanding object-like macros non-recursively.
    fn emit(&mut self, tok: Token, span: Span) {
        let mut hide = Vec::new();
        let mut out = std::mem::take(&mut self.output);
        self.expand_into(tok, span, &mut hide, &mut out);
        self.output = out;
    }

    fn expand_into(
        &self,
        tok: Token,
        span: Span,
        hide: &mut Vec<Rc<str>>,
        out: &mut Vec<(Token, Span)>,
    ) {
        if let Token::Ident(name) = &tok {
            if !hide.iter().any(|h| h == name) {
                if let Some(replacement) = self.defines.get(name) {
                    let replacement = replacement.clone();
                    hide.push(name.clone());
                    for (t, _) in replacement {
                        // Expanded tokens carry the invocation span so
                        // diagnostics point at the use site.
                        self.expand_into(t, span, hide, out);
                    }
                    hide.pop();
                    return;
                }
            }
        }
        out.push((tok, span));
    }

    /// Handle one directive. `i` indexes the token after the directive
    /// name; returns the index after the directive's line.
    fn directive(
        &mut self,
        name: Rc<str>,
        span: Span,
        raw: &[(Result<Token, ()>, Span)],
        mut i: usize,
        conds: &mut Vec<Cond>,
    ) -> Result<usize, Diagnostic> {
        let active = conds.iter().all(|c| c.parent_active && c.active);

        // The directive's arguments run to end of line.
        let mut args: Vec<(Token, Span)> = Vec::new();
        while i < raw.len() {
            match &raw[i] {
                (Ok(Token::Newline), _) => {
                    i += 1;
                    break;
                }
                (Ok(tok), s) => {
                    args.push((tok.clone(), *s));
                    i += 1;
                }
                (Err(()), s) => {
                    if active {
                        return Err(Diagnostic::error(
                            ErrorKind::Lex,
                            *s,
                            "unrecognized character in directive",
                        ));
                    }
                    i += 1;
                }
            }
        }

        match name.as_ref() {
            "define" if active => {
                let (macro_name, rest) = split_macro_name(&args, span)?;
                debug!(name = %macro_name, tokens = rest.len(), "define");
                self.defines.insert(macro_name, rest);
            }
            "undef" if active => {
                let (macro_name, rest) = split_macro_name(&args, span)?;
                if !rest.is_empty() {
                    return Err(Diagnostic::error(
                        ErrorKind::Preprocessor,
                        span,
                        "'#undef' takes a single name",
                    ));
                }
                self.defines.shift_remove(&macro_name);
            }
            "ifdef" | "ifndef" => {
                let value = if active {
                    let (macro_name, _) = split_macro_name(&args, span)?;
                    self.defines.contains_key(&macro_name) == (name.as_ref() == "ifdef")
                } else {
                    false
                };
                conds.push(Cond {
                    parent_active: active,
                    active: value,
                    taken: value,
                    else_seen: false,
                });
            }
            "if" => {
                let value = if active {
                    self.eval_condition(&args, span)? != 0
                } else {
                    false
                };
                conds.push(Cond {
                    parent_active: active,
                    active: value,
                    taken: value,
                    else_seen: false,
                });
            }
            "else" => match conds.last_mut() {
                Some(cond) if !cond.else_seen => {
                    cond.else_seen = true;
                    cond.active = cond.parent_active && !cond.taken;
                    cond.taken |= cond.active;
                }
                Some(_) => {
                    return Err(Diagnostic::error(
                        ErrorKind::Preprocessor,
                        span,
                        "duplicate '#else'",
                    ));
                }
                None => {
                    return Err(Diagnostic::error(
                        ErrorKind::Preprocessor,
                        span,
                        "'#else' without matching '#if'",
                    ));
                }
            },
            "endif" => {
                if conds.pop().is_none() {
                    return Err(Diagnostic::error(
                        ErrorKind::Preprocessor,
                        span,
                        "'#endif' without matching '#if'",
                    ));
                }
            }
            "include" if active => {
                let target = match args.as_slice() {
                    [(Token::StringLiteral(s), _)] => s.clone(),
                    _ => {
                        return Err(Diagnostic::error(
                            ErrorKind::Preprocessor,
                            span,
                            "'#include' expects a quoted resource name",
                        ));
                    }
                };
                self.include(&target, span)?;
            }
            "define" | "undef" | "include" => {
                // Suppressed branch: recognised but ignored.
            }
            _ if active => {
                return Err(Diagnostic::error(
                    ErrorKind::Preprocessor,
                    span,
                    format!("unknown preprocessor directive '#{}'", name),
                ));
            }
            _ => {}
        }

        Ok(i)
    }

    fn include(&mut self, target: &str, span: Span) -> Result<(), Diagnostic> {
        if target.is_empty() || target.len() > 16 {
            return Err(Diagnostic::error(
                ErrorKind::Include,
                span,
                format!("'{}' is not a valid resource name", target),
            ));
        }
        let key = target.to_ascii_lowercase();
        if self.in_progress.contains(&key) {
            return Err(Diagnostic::error(
                ErrorKind::Include,
                span,
                format!("circular include of '{}'", target),
            ));
        }
        if self.completed.contains(&key) {
            debug!(name = %key, "skipping re-include");
            return Ok(());
        }

        let source = self.provider.load(&key).map_err(|err| match err {
            IncludeLoadError::NotFound => Diagnostic::error(
                ErrorKind::Include,
                span,
                format!("include file '{}' not found", target),
            ),
            IncludeLoadError::Failed(msg) => Diagnostic::error(
                ErrorKind::Resource,
                span,
                format!("failed to load '{}': {}", target, msg),
            ),
        })?;

        debug!(name = %key, bytes = source.len(), "include");
        self.includes.push(key.clone());
        self.run_unit(&key, source)
    }

    /// Evaluate a `#if` controlling expression to a 32-bit int.
    fn eval_condition(&self, args: &[(Token, Span)], span: Span) -> Result<i32, Diagnostic> {
        if args.is_empty() {
            return Err(Diagnostic::error(
                ErrorKind::Preprocessor,
                span,
                "'#if' requires a constant expression",
            ));
        }

        // Expand macros first so defined names participate.
        let mut expanded = Vec::new();
        let mut hide = Vec::new();
        for (tok, s) in args {
            self.expand_into(tok.clone(), *s, &mut hide, &mut expanded);
        }

        let mut ev = CondEval {
            tokens: &expanded,
            pos: 0,
        };
        let value = ev.ternary()?;
        if ev.pos < ev.tokens.len() {
            let (tok, s) = &ev.tokens[ev.pos];
            return Err(Diagnostic::error(
                ErrorKind::Preprocessor,
                *s,
                format!("unexpected '{}' in '#if' expression", tok),
            ));
        }
        Ok(value)
    }
}

fn split_macro_name(
    args: &[(Token, Span)],
    span: Span,
) -> Result<(Rc<str>, Vec<(Token, Span)>), Diagnostic> {
    match args.split_first() {
        Some(((Token::Ident(name), _), rest)) => Ok((name.clone(), rest.to_vec())),
        _ => Err(Diagnostic::error(
            ErrorKind::Preprocessor,
            span,
            "expected a macro name",
        )),
    }
}

/// Constant-int evaluator for `#if` expressions.
///
/// Two's-complement 32-bit semantics throughout; shifts mask their count
/// to five bits.
struct CondEval<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl CondEval<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, s)| *s)
            .unwrap_or_else(|| Span::zero(0))
    }

    fn ternary(&mut self) -> Result<i32, Diagnostic> {
        let cond = self.binary(0)?;
        if matches!(self.peek(), Some(Token::Question)) {
            self.pos += 1;
            let then_val = self.ternary()?;
            match self.peek() {
                Some(Token::Colon) => self.pos += 1,
                _ => {
                    return Err(self.error("expected ':' in conditional"));
                }
            }
            let else_val = self.ternary()?;
            return Ok(if cond != 0 { then_val } else { else_val });
        }
        Ok(cond)
    }

    fn binary(&mut self, min_prec: u8) -> Result<i32, Diagnostic> {
        let mut lhs = self.unary()?;
        while let Some(tok) = self.peek() {
            let Some((prec, op)) = cond_op_info(tok) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = self.apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i32, Diagnostic> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok((self.unary()? == 0) as i32)
            }
            Some(Token::Tilde) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.ternary()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::IntLiteral(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            Some(Token::Ident(name)) => {
                let msg = format!("undefined name '{}' in '#if' expression", name);
                Err(self.error(&msg))
            }
            Some(tok) => {
                let msg = format!("unexpected '{}' in '#if' expression", tok);
                Err(self.error(&msg))
            }
            None => Err(self.error("'#if' expression ends unexpectedly")),
        }
    }

    fn apply(&self, op: CondOp, l: i32, r: i32) -> Result<i32, Diagnostic> {
        use CondOp as O;
        Ok(match op {
            O::Mul => l.wrapping_mul(r),
            O::Div => {
                if r == 0 {
                    return Err(self.error("division by zero in '#if' expression"));
                }
                l.wrapping_div(r)
            }
            O::Mod => {
                if r == 0 {
                    return Err(self.error("division by zero in '#if' expression"));
                }
                l.wrapping_rem(r)
            }
            O::Add => l.wrapping_add(r),
            O::Sub => l.wrapping_sub(r),
            O::Shl => l.wrapping_shl(r as u32 & 31),
            O::Shr => l.wrapping_shr(r as u32 & 31),
            O::Ushr => ((l as u32) >> (r as u32 & 31)) as i32,
            O::Lt => (l < r) as i32,
            O::Le => (l <= r) as i32,
            O::Gt => (l > r) as i32,
            O::Ge => (l >= r) as i32,
            O::Eq => (l == r) as i32,
            O::Ne => (l != r) as i32,
            O::BitAnd => l & r,
            O::BitXor => l ^ r,
            O::BitOr => l | r,
            O::LogAnd => ((l != 0) && (r != 0)) as i32,
            O::LogOr => ((l != 0) || (r != 0)) as i32,
        })
    }

    fn error(&self, message: &str) -> Diagnostic {
        Diagnostic::error(ErrorKind::Preprocessor, self.span(), message)
    }
}

#[derive(Clone, Copy)]
enum CondOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Ushr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

fn cond_op_info(token: &Token) -> Option<(u8, CondOp)> {
    use CondOp as O;
    Some(match token {
        Token::PipePipe => (10, O::LogOr),
        Token::AmpAmp => (20, O::LogAnd),
        Token::Pipe => (30, O::BitOr),
        Token::Caret => (40, O::BitXor),
        Token::Amp => (50, O::BitAnd),
        Token::EqEq => (60, O::Eq),
        Token::BangEq => (60, O::Ne),
        Token::Lt => (70, O::Lt),
        Token::LtEq => (70, O::Le),
        Token::Gt => (70, O::Gt),
        Token::GtEq => (70, O::Ge),
        Token::Shl => (80, O::Shl),
        Token::Shr => (80, O::Shr),
        Token::Ushr => (80, O::Ushr),
        Token::Plus => (90, O::Add),
        Token::Minus => (90, O::Sub),
        Token::Star => (100, O::Mul),
        Token::Slash => (100, O::Div),
        Token::Percent => (100, O::Mod),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory include provider for tests.
    pub struct MapProvider(pub HashMap<String, Rc<str>>);

    impl IncludeProvider for MapProvider {
        fn load(&mut self, name: &str) -> Result<Rc<str>, IncludeLoadError> {
            self.0
                .get(name)
                .cloned()
                .ok_or(IncludeLoadError::NotFound)
        }
    }

    fn run(source: &str) -> Result<Preprocessed, Diagnostic> {
        run_with(source, HashMap::new())
    }

    fn run_with(
        source: &str,
        files: HashMap<String, Rc<str>>,
    ) -> Result<Preprocessed, Diagnostic> {
        let mut sources = SourceMap::new();
        let mut provider = MapProvider(files);
        preprocess(
            "main",
            Rc::from(source),
            &mut sources,
            &mut provider,
            MacroTable::new(),
        )
    }

    fn kinds(pre: &Preprocessed) -> Vec<Token> {
        pre.tokens.iter().map(|(t, _)| t.clone()).collect()
    }

    #[test]
    fn test_macro_expansion() {
        let pre = run("#define SIZE 4\nint x = SIZE;").unwrap();
        assert_eq!(
            kinds(&pre),
            vec![
                Token::Int,
                Token::Ident(Rc::from("x")),
                Token::Eq,
                Token::IntLiteral(4),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_empty_macro_expands_to_nothing() {
        let pre = run("#define EMPTY\nint EMPTY x;").unwrap();
        assert_eq!(
            kinds(&pre),
            vec![Token::Int, Token::Ident(Rc::from("x")), Token::Semicolon]
        );
    }

    #[test]
    fn test_macro_expansion_is_not_recursive() {
        let pre = run("#define A A\nA").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("A"))]);
    }

    #[test]
    fn test_undef() {
        let pre = run("#define A 1\n#undef A\nA").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("A"))]);
    }

    #[test]
    fn test_ifdef() {
        let pre = run("#define YES\n#ifdef YES\na\n#endif\n#ifdef NO\nb\n#endif").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("a"))]);
    }

    #[test]
    fn test_ifndef_else() {
        let pre = run("#ifndef MISSING\na\n#else\nb\n#endif").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("a"))]);
    }

    #[test]
    fn test_if_arithmetic() {
        let pre = run("#if 1 + 2 * 3 == 7\nyes\n#endif").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("yes"))]);
    }

    #[test]
    fn test_if_uses_defines() {
        let pre = run("#define VER 174\n#if VER >= 170\nnew\n#else\nold\n#endif").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("new"))]);
    }

    #[test]
    fn test_if_two_complement_wrapping() {
        // 0x7FFFFFFF + 1 wraps negative.
        let pre = run("#if 0x7FFFFFFF + 1 < 0\nwrapped\n#endif").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("wrapped"))]);
    }

    #[test]
    fn test_nested_conditionals() {
        let source = "#if 1\n#if 0\na\n#else\nb\n#endif\n#endif";
        let pre = run(source).unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("b"))]);
    }

    #[test]
    fn test_missing_endif() {
        let err = run("#if 1\nx").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Preprocessor);
        assert!(err.message.contains("#endif"));
    }

    #[test]
    fn test_stray_endif() {
        let err = run("#endif").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Preprocessor);
    }

    #[test]
    fn test_undefined_name_in_if() {
        let err = run("#if MYSTERY\nx\n#endif").unwrap_err();
        assert!(err.message.contains("MYSTERY"));
    }

    #[test]
    fn test_directive_not_at_line_start() {
        let err = run("int x; #define A 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Preprocessor);
        assert!(err.message.contains("start of a line"));
    }

    #[test]
    fn test_include() {
        let mut files = HashMap::new();
        files.insert("util".to_string(), Rc::from("int helper;"));
        let pre = run_with("#include \"util\"\nint x;", files).unwrap();
        assert_eq!(pre.includes, vec!["util".to_string()]);
        assert_eq!(
            kinds(&pre),
            vec![
                Token::Int,
                Token::Ident(Rc::from("helper")),
                Token::Semicolon,
                Token::Int,
                Token::Ident(Rc::from("x")),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_repeat_include_is_idempotent() {
        let mut files = HashMap::new();
        files.insert("util".to_string(), Rc::from("int helper;"));
        let pre = run_with("#include \"util\"\n#include \"UTIL\"", files).unwrap();
        // Second inclusion short-circuits; names compare case-insensitively.
        assert_eq!(pre.includes, vec!["util".to_string()]);
        assert_eq!(kinds(&pre).len(), 3);
    }

    #[test]
    fn test_circular_include_rejected() {
        let mut files = HashMap::new();
        files.insert("a".to_string(), Rc::from("#include \"b\"\n"));
        files.insert("b".to_string(), Rc::from("#include \"a\"\n"));
        let err = run_with("#include \"a\"\n", files).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Include);
        assert!(err.message.contains("circular"));
    }

    #[test]
    fn test_missing_include() {
        let err = run("#include \"nothere\"").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Include);
        assert!(err.message.contains("not found"));
    }

    #[test]
    fn test_include_skipped_in_failed_branch() {
        // Would fail with NotFound were it processed.
        let pre = run("#if 0\n#include \"nothere\"\n#endif\nx").unwrap();
        assert_eq!(kinds(&pre), vec![Token::Ident(Rc::from("x"))]);
    }

    #[test]
    fn test_unterminated_string_reported() {
        let err = run("string s = \"oops").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert!(err.message.contains("unterminated string"));
    }
}
