//! NWScript compiler façade.
//!
//! Orchestrates the pipeline for one top-level source: preprocessing and
//! include resolution through the [`ResourceLoader`], parsing and semantic
//! analysis, NCS code generation, and optional debug-symbol output. Also
//! exposes the disassembler for compiled byte streams.
//!
//! The façade owns the include cache and the parsed prototype table
//! (`nwscript.nss`), both shared read-only across compiles. Each call to
//! [`Compiler::compile`] works in its own `SourceMap`, symbol table and
//! AST arena, released when the call returns; output byte buffers are
//! transferred to the caller.

pub mod actions;
pub mod codegen;
pub mod disasm;
pub mod loader;
pub mod ndb;
pub mod opcode;

pub use actions::{ActionPrototype, PrototypeTable};
pub use codegen::{CodeGen, CodegenOutput, DebugInfo};
pub use loader::{FileSystemLoader, MemoryLoader, ResourceError, ResourceLoader, ResourceType};
pub use nwscript_ast::{Diagnostic, DiagnosticFormatter, ErrorKind, Severity, SourceMap, Type};

use indexmap::IndexMap;
use nwscript_ast::{Span, SymbolTable};
use nwscript_lexer::decode_source;
use nwscript_parser::{
    parse_tokens, preprocess, IncludeLoadError, IncludeProvider, MacroTable, ParseMode,
    ParserConfig,
};
use std::rc::Rc;
use tracing::{debug, info};

/// Compilation options, owned by the façade and fixed per instance.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Reference compiler version selector (169 or 174)
    pub version: u32,
    /// Drop functions unreachable from the entry point
    pub optimize: bool,
    /// Enable the extension language features
    pub extensions: bool,
    /// Produce `.ndb` debug symbols alongside the code
    pub debug_symbols: bool,
    /// Diagnostics to collect per unit before giving up
    pub max_errors: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            version: 174,
            optimize: false,
            extensions: false,
            debug_symbols: false,
            max_errors: 1,
        }
    }
}

/// Artifacts and diagnostics of one compilation.
///
/// On failure `code` is empty — partial output is discarded — and
/// `diagnostics` carries at least one error.
pub struct CompileOutput {
    /// Compiled `.ncs` bytes
    pub code: Vec<u8>,
    /// `.ndb` debug-symbol text, when enabled
    pub debug: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Sources seen by this compilation, for diagnostic rendering
    pub sources: SourceMap,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Render diagnostics with source snippets and the given prefix.
    pub fn format_diagnostics(&self, prefix: Option<&str>) -> String {
        DiagnosticFormatter::new(&self.sources)
            .with_prefix(prefix)
            .format_all(&self.diagnostics)
    }

    fn failure(diagnostics: Vec<Diagnostic>, sources: SourceMap) -> Self {
        Self {
            code: Vec::new(),
            debug: None,
            diagnostics,
            sources,
        }
    }
}

/// Mutable façade configuration (the reference compiler's globals).
#[derive(Debug, Clone)]
struct CompilerConfig {
    error_prefix: Option<String>,
    cache_enabled: bool,
}

/// The NWScript compiler.
pub struct Compiler {
    loader: Box<dyn ResourceLoader>,
    options: CompilerOptions,
    config: CompilerConfig,
    /// Source cache by lowercased resource name
    cache: IndexMap<String, Rc<str>>,
    prototype: Option<PrototypeTable>,
}

impl Compiler {
    pub fn new(loader: Box<dyn ResourceLoader>, options: CompilerOptions) -> Self {
        Self {
            loader,
            options,
            config: CompilerConfig {
                error_prefix: None,
                cache_enabled: true,
            },
            cache: IndexMap::new(),
            prototype: None,
        }
    }

    /// Prefix prepended to every rendered diagnostic.
    pub fn set_error_prefix(&mut self, prefix: Option<String>) {
        self.config.error_prefix = prefix;
    }

    pub fn error_prefix(&self) -> Option<&str> {
        self.config.error_prefix.as_deref()
    }

    /// Toggle the include cache; disabling drops cached sources.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.config.cache_enabled = enabled;
        if !enabled {
            self.cache.clear();
        }
    }

    /// Drop every cached include source (the prototype table stays).
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Signature of the engine action with the given id, if the
    /// prototype source declares one.
    pub fn get_action_prototype(&mut self, index: usize) -> Option<&ActionPrototype> {
        if self.ensure_prototype().is_err() {
            return None;
        }
        self.prototype
            .as_ref()
            .and_then(|table| table.actions.get(index))
    }

    /// Compile one source to NCS bytes.
    pub fn compile(&mut self, name: &str, source_bytes: &[u8]) -> CompileOutput {
        let mut sources = SourceMap::new();

        if name.is_empty() || name.len() > 16 {
            sources.add_file(name, Rc::from(""));
            return CompileOutput::failure(
                vec![Diagnostic::error(
                    ErrorKind::Resource,
                    Span::zero(0),
                    format!("'{}' is not a valid resource name", name),
                )],
                sources,
            );
        }

        if let Err(output) = self.ensure_prototype() {
            return output;
        }
        let (mut symbols, engine_types, proto_files) = {
            let proto = self.prototype.as_ref().expect("loaded above");
            (
                proto.symbols.clone(),
                proto.engine_types.clone(),
                proto.files.clone(),
            )
        };
        // Replay the prototype unit's files so its symbol spans keep
        // their file ids in this compilation's map.
        for (file_name, source) in &proto_files {
            sources.add_file(file_name.clone(), source.clone());
        }

        let text: Rc<str> = Rc::from(decode_source(source_bytes));
        let pre = {
            let mut provider = CacheProvider {
                loader: self.loader.as_mut(),
                cache: &mut self.cache,
                enabled: self.config.cache_enabled,
            };
            match preprocess(name, text, &mut sources, &mut provider, MacroTable::new()) {
                Ok(pre) => pre,
                Err(diag) => return CompileOutput::failure(vec![diag], sources),
            }
        };

        let parser_config = ParserConfig {
            mode: ParseMode::Script,
            extensions: self.options.extensions,
            version: self.options.version,
            engine_types,
            max_errors: self.options.max_errors,
        };
        let mut program = match parse_tokens(name, pre.tokens, &mut symbols, &parser_config) {
            Ok(program) => program,
            Err(diagnostics) => return CompileOutput::failure(diagnostics, sources),
        };
        program.includes = pre.includes;

        let generated = match CodeGen::new(&program, &symbols, &sources, self.options.optimize)
            .generate()
        {
            Ok(generated) => generated,
            Err(diag) => return CompileOutput::failure(vec![diag], sources),
        };

        let debug = self
            .options
            .debug_symbols
            .then(|| ndb::write_ndb(&generated.debug));

        info!(
            unit = name,
            bytes = generated.code.len(),
            includes = program.includes.len(),
            "compiled"
        );
        CompileOutput {
            code: generated.code,
            debug,
            diagnostics: Vec::new(),
            sources,
        }
    }

    /// Disassemble a compiled byte stream into a printable listing.
    ///
    /// Debug symbols, when supplied, name functions and call targets;
    /// a loadable prototype source additionally names engine actions.
    pub fn disassemble(
        &mut self,
        code: &[u8],
        ndb_text: Option<&str>,
    ) -> Result<String, Diagnostic> {
        // Action names are a nicety: ignore prototype load failures here.
        let _ = self.ensure_prototype();
        let info = ndb_text.map(ndb::parse_ndb);
        disasm::disassemble(
            code,
            info.as_ref(),
            self.prototype.as_ref().map(|p| p.actions.as_slice()),
        )
    }

    /// Parse and cache the prototype table on first use.
    fn ensure_prototype(&mut self) -> Result<(), CompileOutput> {
        if self.prototype.is_some() {
            return Ok(());
        }

        let mut sources = SourceMap::new();
        let source_bytes = match self.loader.load("nwscript", ResourceType::Nss) {
            Ok(bytes) => bytes,
            Err(err) => {
                sources.add_file("nwscript", Rc::from(""));
                return Err(CompileOutput::failure(
                    vec![Diagnostic::error(
                        ErrorKind::Resource,
                        Span::zero(0),
                        format!("cannot load the prototype source: {}", err),
                    )],
                    sources,
                ));
            }
        };

        let text: Rc<str> = Rc::from(decode_source(&source_bytes));
        let pre = {
            let mut provider = CacheProvider {
                loader: self.loader.as_mut(),
                cache: &mut self.cache,
                enabled: self.config.cache_enabled,
            };
            match preprocess("nwscript", text, &mut sources, &mut provider, MacroTable::new()) {
                Ok(pre) => pre,
                Err(diag) => return Err(CompileOutput::failure(vec![diag], sources)),
            }
        };

        let engine_types = actions::engine_types_from_defines(&pre.defines);
        let mut symbols = SymbolTable::new();
        actions::seed_builtins(&mut symbols);
        let config = ParserConfig {
            mode: ParseMode::Prototype,
            extensions: self.options.extensions,
            version: self.options.version,
            engine_types: engine_types.clone(),
            max_errors: 1,
        };
        if let Err(diagnostics) = parse_tokens("nwscript", pre.tokens, &mut symbols, &config) {
            return Err(CompileOutput::failure(diagnostics, sources));
        }

        let action_list = actions::collect_actions(&symbols);
        debug!(
            actions = action_list.len(),
            engine_types = engine_types.len(),
            "prototype table loaded"
        );
        self.prototype = Some(PrototypeTable {
            symbols,
            engine_types,
            actions: action_list,
            files: actions::snapshot_files(&sources),
        });
        Ok(())
    }
}

/// Include provider bridging the resource loader and the façade cache.
struct CacheProvider<'a> {
    loader: &'a mut dyn ResourceLoader,
    cache: &'a mut IndexMap<String, Rc<str>>,
    enabled: bool,
}

impl IncludeProvider for CacheProvider<'_> {
    fn load(&mut self, name: &str) -> Result<Rc<str>, IncludeLoadError> {
        if self.enabled {
            if let Some(cached) = self.cache.get(name) {
                return Ok(cached.clone());
            }
        }
        let bytes = self
            .loader
            .load(name, ResourceType::Nss)
            .map_err(|err| match err {
                ResourceError::NotFound(_) => IncludeLoadError::NotFound,
                other => IncludeLoadError::Failed(other.to_string()),
            })?;
        let text: Rc<str> = Rc::from(decode_source(&bytes));
        if self.enabled {
            self.cache.insert(name.to_string(), text.clone());
        }
        Ok(text)
    }
}
