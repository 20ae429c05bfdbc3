//! Source location tracking for error reporting and debug symbols.
//!
//! # Design
//!
//! - `Span` — compact source location (file id + byte range)
//! - `SourceMap` — all sources of one compilation, indexed by file id
//! - `SourceFile` — single source with a line-start index
//!
//! Files are identified by resource name, not by filesystem path: the
//! compiler never touches the filesystem itself, it receives sources from
//! a resource loader.

use std::rc::Rc;

/// Compact source location reference.
///
/// Points to a byte range in a source file registered in a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Index into `SourceMap` files
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0)
    }

    /// Merge two spans into one covering both.
    ///
    /// Spans from different files keep the first file and range; include
    /// expansion can legitimately mix files in one construct.
    pub fn merge(&self, other: &Span) -> Span {
        if self.file_id != other.file_id {
            return *self;
        }
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Collection of all source files in one compilation.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with line indexing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Resource name this source was loaded under (e.g. `nw_i0_generic`)
    pub name: String,
    /// Decoded source text
    pub source: Rc<str>,
    /// Byte offsets of each line start; `line_starts[0]` is always 0 and
    /// the final element is the EOF sentinel
    pub line_starts: Vec<u32>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its id.
    pub fn add_file(&mut self, name: impl Into<String>, source: Rc<str>) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(name.into(), source));
        file_id as u16
    }

    /// Get the file a span points into.
    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    /// Resource name of the file a span points into.
    pub fn file_name(&self, span: &Span) -> &str {
        &self.files[span.file_id as usize].name
    }

    /// Source snippet covered by a span.
    pub fn snippet(&self, span: &Span) -> &str {
        let file = &self.files[span.file_id as usize];
        &file.source[span.start as usize..span.end as usize]
    }

    /// 1-based (line, column) of a span's start.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.files[span.file_id as usize].line_col(span.start)
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Iterate registered files in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }
}

impl SourceFile {
    /// Create a source file, computing its line index.
    pub fn new(name: String, source: Rc<str>) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            name,
            source,
            line_starts,
        }
    }

    /// 1-based (line, column) for a byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.source.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.max(1) - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;
        (line, col)
    }

    /// Text of a 1-based line number, without its terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[(line - 1) as usize] as usize;
        let end = self.line_starts[line as usize] as usize;
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Number of lines in this file.
    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }
}

fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push((idx + 1) as u32);
        }
    }
    if line_starts.last() != Some(&(source.len() as u32)) {
        line_starts.push(source.len() as u32);
    }
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(source: &str) -> SourceMap {
        let mut map = SourceMap::new();
        map.add_file("test", Rc::from(source));
        map
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(0, 10, 20);
        let b = Span::new(0, 15, 30);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
    }

    #[test]
    fn test_span_merge_cross_file_keeps_first() {
        let a = Span::new(0, 10, 20);
        let b = Span::new(1, 0, 5);
        assert_eq!(a.merge(&b), a);
    }

    #[test]
    fn test_line_col() {
        let map = map_with("void main()\n{\n}\n");
        assert_eq!(map.line_col(&Span::new(0, 0, 4)), (1, 1));
        assert_eq!(map.line_col(&Span::new(0, 5, 9)), (1, 6));
        assert_eq!(map.line_col(&Span::new(0, 12, 13)), (2, 1));
        assert_eq!(map.line_col(&Span::new(0, 14, 15)), (3, 1));
    }

    #[test]
    fn test_snippet() {
        let map = map_with("int x = 42;");
        assert_eq!(map.snippet(&Span::new(0, 8, 10)), "42");
    }

    #[test]
    fn test_line_text() {
        let map = map_with("first\nsecond\n");
        let file = map.file(&Span::zero(0));
        assert_eq!(file.line_text(1), Some("first"));
        assert_eq!(file.line_text(2), Some("second"));
        assert_eq!(file.line_text(4), None);
    }
}
