//! NWScript parsing and semantic analysis.
//!
//! This crate hosts the middle of the compiler pipeline:
//!
//! - `preprocessor`: `#define`/`#if`/`#include` token filter between the
//!   lexer and the parser, resolving includes through an
//!   [`IncludeProvider`]
//! - a hand-written recursive descent parser with a Pratt expression core
//!   that type-checks while it parses and folds constants eagerly
//!
//! The parser produces a typed [`Program`] plus the populated
//! [`SymbolTable`]; the code generator consumes both without re-analysis.

mod decl;
mod expr;
pub mod fold;
pub mod preprocessor;
mod stmt;
mod stream;

pub use preprocessor::{preprocess, IncludeLoadError, IncludeProvider, MacroTable, Preprocessed};

use indexmap::IndexMap;
use nwscript_ast::{Diagnostic, Program, SourceMap, SymbolTable, Type};
use std::rc::Rc;
use stream::TokenStream;

/// What kind of unit is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// A user script: prototypes are forward declarations
    Script,
    /// The canonical prototype source (`nwscript.nss`): prototypes are
    /// engine actions numbered in declaration order, globals are constants
    Prototype,
}

/// Parser configuration, owned by the compiler façade.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub mode: ParseMode,
    /// Enable the extension language features (const globals of any base
    /// type, compound assignment on vectors, `switch` on `string`)
    pub extensions: bool,
    /// Reference compiler version selector (169 or 174)
    pub version: u32,
    /// Engine opaque type names, in `engine_0..` order
    pub engine_types: IndexMap<Rc<str>, u8>,
    /// Number of diagnostics to collect before giving up on a unit;
    /// 1 aborts at the first hard error without re-synchronizing
    pub max_errors: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::Script,
            extensions: false,
            version: 174,
            engine_types: IndexMap::new(),
            max_errors: 1,
        }
    }
}

pub(crate) struct Parser<'a> {
    pub(crate) stream: TokenStream,
    pub(crate) symbols: &'a mut SymbolTable,
    pub(crate) config: &'a ParserConfig,
    pub(crate) program: Program,
    /// Return type of the function body being parsed
    pub(crate) ret_type: Option<Type>,
    pub(crate) loop_depth: usize,
    pub(crate) switch_depth: usize,
    /// Next engine-action id in prototype mode
    pub(crate) next_action_id: u16,
    /// Next storage index for non-constant globals
    pub(crate) next_global_index: usize,
}

/// Parse a preprocessed token stream into a typed program.
///
/// `symbols` should arrive seeded with the prototype scope (engine
/// actions, engine constants) for script units, or with just the builtin
/// object constants for the prototype unit itself.
pub fn parse_tokens(
    unit_name: &str,
    tokens: Vec<(nwscript_lexer::Token, nwscript_ast::Span)>,
    symbols: &mut SymbolTable,
    config: &ParserConfig,
) -> Result<Program, Vec<Diagnostic>> {
    let mut parser = Parser {
        stream: TokenStream::new(tokens),
        symbols,
        config,
        program: Program {
            unit_name: unit_name.to_string(),
            ..Program::default()
        },
        ret_type: None,
        loop_depth: 0,
        switch_depth: 0,
        next_action_id: 0,
        next_global_index: 0,
    };

    let diagnostics = parser.parse_program();
    if diagnostics.is_empty() {
        Ok(parser.program)
    } else {
        Err(diagnostics)
    }
}

/// Preprocess and parse one compilation unit.
///
/// Convenience composition of [`preprocess`] and [`parse_tokens`]; the
/// returned program records the units pulled in through `#include`.
pub fn parse_unit(
    unit_name: &str,
    source: Rc<str>,
    sources: &mut SourceMap,
    provider: &mut dyn IncludeProvider,
    symbols: &mut SymbolTable,
    config: &ParserConfig,
) -> Result<(Program, MacroTable), Vec<Diagnostic>> {
    let pre = preprocess(unit_name, source, sources, provider, MacroTable::new())
        .map_err(|d| vec![d])?;
    let mut program = parse_tokens(unit_name, pre.tokens, symbols, config)?;
    program.includes = pre.includes;
    Ok((program, pre.defines))
}
