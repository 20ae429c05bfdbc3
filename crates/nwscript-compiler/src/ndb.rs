//! Debug-symbol (`.ndb`) text format.
//!
//! Line-oriented records associating byte-code addresses with source:
//!
//! ```text
//! NDB V1.0
//! N <file-id> <resource-name>
//! f <name> <start> <end> <ret-type> [<param-type>...]
//! l <start> <file-id> <line> <end>
//! v <name> <frame-offset> <type> <start> <end>
//! ```
//!
//! Addresses are 8-digit lowercase hex; types use the single-letter codes
//! (`i f s o v`, `e<n>` for engine types). Records are in ascending
//! address order within each section.

use crate::codegen::DebugInfo;
use nwscript_ast::Type;

/// Header line of every debug-symbol file.
pub const NDB_MAGIC: &str = "NDB V1.0";

/// Render collected debug records into the textual format.
pub fn write_ndb(debug: &DebugInfo) -> String {
    let mut out = String::new();
    out.push_str(NDB_MAGIC);
    out.push('\n');

    for (id, name) in debug.files.iter().enumerate() {
        out.push_str(&format!("N {} {}\n", id, name));
    }

    let mut functions: Vec<_> = debug.functions.iter().collect();
    functions.sort_by_key(|f| f.start);
    for f in functions {
        out.push_str(&format!(
            "f {} {:08x} {:08x} {}",
            f.name,
            f.start,
            f.end,
            f.ret.debug_code()
        ));
        for param in &f.params {
            out.push(' ');
            out.push_str(&param.debug_code());
        }
        out.push('\n');
    }

    let mut lines: Vec<_> = debug.lines.iter().collect();
    lines.sort_by_key(|l| l.start);
    for l in lines {
        out.push_str(&format!(
            "l {:08x} {} {} {:08x}\n",
            l.start, l.file, l.line, l.end
        ));
    }

    let mut variables: Vec<_> = debug.variables.iter().collect();
    variables.sort_by_key(|v| v.start);
    for v in variables {
        out.push_str(&format!(
            "v {} {} {} {:08x} {:08x}\n",
            v.name,
            v.offset,
            v.ty.debug_code(),
            v.start,
            v.end
        ));
    }

    out
}

/// Parsed view of a debug-symbol file, as much as the disassembler needs.
#[derive(Debug, Default, Clone)]
pub struct NdbInfo {
    /// (name, start, end) per function, ascending by start
    pub functions: Vec<(String, u32, u32)>,
    /// (name, frame offset, start, end) per variable
    pub variables: Vec<(String, i32, u32, u32)>,
}

impl NdbInfo {
    /// Name of the function whose entry is exactly `addr`.
    pub fn function_at(&self, addr: u32) -> Option<&str> {
        self.functions
            .iter()
            .find(|(_, start, _)| *start == addr)
            .map(|(name, _, _)| name.as_str())
    }

    /// Variable covering `offset` at address `addr`.
    pub fn variable_at(&self, offset: i32, addr: u32) -> Option<&str> {
        self.variables
            .iter()
            .find(|(_, o, start, end)| *o == offset && (*start..=*end).contains(&addr))
            .map(|(name, ..)| name.as_str())
    }
}

/// Parse a debug-symbol file. Unknown or malformed records are skipped;
/// the disassembler treats debug data as best-effort.
pub fn parse_ndb(text: &str) -> NdbInfo {
    let mut info = NdbInfo::default();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("f") => {
                let (Some(name), Some(start), Some(end)) =
                    (fields.next(), fields.next(), fields.next())
                else {
                    continue;
                };
                let (Ok(start), Ok(end)) = (
                    u32::from_str_radix(start, 16),
                    u32::from_str_radix(end, 16),
                ) else {
                    continue;
                };
                info.functions.push((name.to_string(), start, end));
            }
            Some("v") => {
                let (Some(name), Some(offset), Some(_ty), Some(start), Some(end)) = (
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                ) else {
                    continue;
                };
                let (Ok(offset), Ok(start), Ok(end)) = (
                    offset.parse::<i32>(),
                    u32::from_str_radix(start, 16),
                    u32::from_str_radix(end, 16),
                ) else {
                    continue;
                };
                info.variables.push((name.to_string(), offset, start, end));
            }
            _ => {}
        }
    }
    info.functions.sort_by_key(|(_, start, _)| *start);
    info
}
