//! Disassembler listings and their debug-symbol annotations.

use nwscript_compiler::{CompileOutput, Compiler, CompilerOptions, MemoryLoader};

const NWSCRIPT: &str = r#"
void PrintString(string sString);
void PrintInteger(int nInteger);
"#;

fn compiler() -> Compiler {
    let mut loader = MemoryLoader::new();
    loader.insert("nwscript", NWSCRIPT.as_bytes().to_vec());
    Compiler::new(
        Box::new(loader),
        CompilerOptions {
            debug_symbols: true,
            ..CompilerOptions::default()
        },
    )
}

fn compile(source: &str) -> (Compiler, CompileOutput) {
    let mut c = compiler();
    let output = c.compile("demo", source.as_bytes());
    assert!(
        output.succeeded(),
        "failed:\n{}",
        output.format_diagnostics(None)
    );
    (c, output)
}

#[test]
fn test_listing_shape() {
    let (mut c, output) = compile("void main() { int x = 2; PrintInteger(x); }");
    let listing = c.disassemble(&output.code, None).unwrap();

    let mut lines = listing.lines();
    assert!(lines.next().unwrap().starts_with("; NCS V1.0"));
    for line in lines {
        // offset, two spaces, mnemonic
        assert!(
            u32::from_str_radix(&line[0..8], 16).is_ok(),
            "bad line: {}",
            line
        );
    }
    assert!(listing.contains("CONSTI"));
    assert!(listing.contains("ACTION"));
    assert!(listing.contains("RETN"));
}

#[test]
fn test_function_labels_from_ndb() {
    let (mut c, output) = compile("int twice(int n) { return n + n; } void main() { int x = twice(4); }");
    let ndb = output.debug.as_deref().unwrap();
    let listing = c.disassemble(&output.code, Some(ndb)).unwrap();

    assert!(listing.lines().any(|l| l == "main:"));
    assert!(listing.lines().any(|l| l == "twice:"));
    // The call site resolves symbolically.
    assert!(listing
        .lines()
        .any(|l| l.contains("JSR") && l.contains("twice")));
}

#[test]
fn test_action_names_annotated() {
    let (mut c, output) = compile(r#"void main() { PrintString("hey"); }"#);
    let listing = c.disassemble(&output.code, None).unwrap();
    assert!(listing
        .lines()
        .any(|l| l.contains("ACTION") && l.contains("PrintString")));
    assert!(listing.contains("\"hey\""));
}

#[test]
fn test_jump_targets_in_range() {
    let (mut c, output) = compile(
        "void main() { int i; while (i < 3) { i++; if (i == 2) break; } }",
    );
    let listing = c.disassemble(&output.code, None).unwrap();
    let total = output.code.len() as u32;
    for line in listing.lines() {
        if let Some(pos) = line.find("off_") {
            let target = u32::from_str_radix(&line[pos + 4..pos + 12], 16).unwrap();
            assert!(target >= 13 && target <= total, "target escapes: {}", line);
        }
    }
}

#[test]
fn test_rejects_bad_magic() {
    let mut c = compiler();
    let err = c.disassemble(b"NOT A SCRIPT AT ALL", None).unwrap_err();
    assert!(err.message.contains("magic") || err.message.contains("header"));
}

#[test]
fn test_rejects_size_mismatch() {
    let (mut c, output) = compile("void main() {}");
    let mut code = output.code.clone();
    code.push(0x00);
    let err = c.disassemble(&code, None).unwrap_err();
    assert!(err.message.contains("size record"));
}

#[test]
fn test_rejects_truncated_stream() {
    let (mut c, output) = compile("void main() { int x = 1; }");
    let mut code = output.code.clone();
    // Chop into the middle of the trailing MOVSP/RETN pair.
    code.truncate(code.len() - 4);
    // Fix the size record to match the truncated length, leaving a
    // dangling instruction.
    let len = code.len() as u32;
    code[9..13].copy_from_slice(&len.to_be_bytes());
    assert!(c.disassemble(&code, None).is_err());
}
