//! Compile-time diagnostics.
//!
//! # Design
//!
//! - `Diagnostic` — single diagnostic with source location and message
//! - `ErrorKind` — categorizes diagnostics by compiler phase
//! - `Severity` — error, warning, or note
//! - `DiagnosticFormatter` — formats diagnostics with source snippets
//!
//! Diagnostics are accumulated by the driver and reported through a
//! caller-supplied sink; the phases themselves return early with the first
//! hard error of their unit.

use crate::foundation::{SourceMap, Span};
use std::fmt;

/// Compilation diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category of this diagnostic
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Human-readable message
    pub message: String,
}

/// Category of compilation error.
///
/// # Invariant
///
/// The discriminant values must match the `ERROR_KIND_NAMES` indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// Bad token, unterminated string or comment
    Lex = 0,
    /// Mismatched `#endif`, bad conditional expression, unknown directive
    Preprocessor = 1,
    /// Unexpected token, missing semicolon
    Parse = 2,
    /// Operand mismatch, assignment incompatibility
    Type = 3,
    /// Undeclared or redefined name, wrong kind of name
    Name = 4,
    /// Too many or too few arguments, missing default
    Arity = 5,
    /// Non-constant expression in a constant context
    Const = 6,
    /// Direct or indirect call cycle
    Recursion = 7,
    /// Resource not found or circular inclusion
    Include = 8,
    /// Stack imbalance, unresolved fixup, missing entry point
    Codegen = 9,
    /// Failure reported by the resource loader
    Resource = 10,
}

/// Human-readable names for error kinds, indexed by discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "lexical error",       // 0: Lex
    "preprocessor error",  // 1: Preprocessor
    "syntax error",        // 2: Parse
    "type mismatch",       // 3: Type
    "name error",          // 4: Name
    "argument mismatch",   // 5: Arity
    "constant required",   // 6: Const
    "recursion",           // 7: Recursion
    "include error",       // 8: Include
    "code generation",     // 9: Codegen
    "resource error",      // 10: Resource
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note
    Note,
    /// Code is accepted but suspicious
    Warning,
    /// Compilation of the unit cannot proceed
    Error,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            span,
            message: message.into(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            span,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl ErrorKind {
    /// Human-readable name of this kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity,
            self.kind.name(),
            self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Formats diagnostics with source context.
///
/// Produces messages with a `name.nss(line,col): severity: message` header
/// (the reference compiler's shape, honouring the configured error prefix)
/// followed by the offending source line and a caret underline.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
    prefix: Option<&'a str>,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self {
            sources,
            prefix: None,
        }
    }

    /// Prepend a caller-configured prefix to every header line.
    pub fn with_prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Format one diagnostic.
    pub fn format(&self, diag: &Diagnostic) -> String {
        let mut output = String::new();

        let name = self.sources.file_name(&diag.span);
        let (line, col) = self.sources.line_col(&diag.span);
        if let Some(prefix) = self.prefix {
            output.push_str(prefix);
            output.push(' ');
        }
        output.push_str(&format!(
            "{}.nss({},{}): {}: {}: {}\n",
            name,
            line,
            col,
            diag.severity,
            diag.kind.name(),
            diag.message
        ));

        let file = self.sources.file(&diag.span);
        if let Some(source_line) = file.line_text(line) {
            output.push_str(&format!("{:4} | {}\n", line, source_line));
            let start_col = col as usize;
            let span_len = (diag.span.end - diag.span.start) as usize;
            let end_col = (start_col + span_len).min(source_line.len() + 1);
            let underline = " ".repeat(start_col.saturating_sub(1))
                + &"^".repeat(end_col.saturating_sub(start_col).max(1));
            output.push_str(&format!("     | {}\n", underline));
        }

        output
    }

    /// Format a batch of diagnostics separated by blank lines.
    pub fn format_all(&self, diags: &[Diagnostic]) -> String {
        diags
            .iter()
            .map(|d| self.format(d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn test_sources() -> SourceMap {
        let mut sources = SourceMap::new();
        sources.add_file("demo", Rc::from("int x = foo;\n"));
        sources
    }

    #[test]
    fn test_error_creation() {
        let d = Diagnostic::error(ErrorKind::Name, Span::new(0, 8, 11), "undeclared 'foo'");
        assert!(d.is_error());
        assert_eq!(d.kind, ErrorKind::Name);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::Lex.name(), "lexical error");
        assert_eq!(ErrorKind::Recursion.name(), "recursion");
        assert_eq!(ErrorKind::Resource.name(), "resource error");
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::error(ErrorKind::Type, Span::zero(0), "cannot add string to int");
        let text = d.to_string();
        assert!(text.contains("error"));
        assert!(text.contains("type mismatch"));
    }

    #[test]
    fn test_formatter_header_and_caret() {
        let sources = test_sources();
        let d = Diagnostic::error(ErrorKind::Name, Span::new(0, 8, 11), "undeclared 'foo'");
        let text = DiagnosticFormatter::new(&sources).format(&d);
        assert!(text.contains("demo.nss(1,9): error: name error: undeclared 'foo'"));
        assert!(text.contains("int x = foo;"));
        assert!(text.contains("^^^"));
    }

    #[test]
    fn test_formatter_prefix() {
        let sources = test_sources();
        let d = Diagnostic::error(ErrorKind::Parse, Span::zero(0), "missing ';'");
        let text = DiagnosticFormatter::new(&sources)
            .with_prefix(Some("NSC:"))
            .format(&d);
        assert!(text.starts_with("NSC: demo.nss"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
