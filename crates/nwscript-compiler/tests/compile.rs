//! End-to-end compilation scenarios against a small prototype fixture.
//!
//! Engine-action ids follow declaration order in the prototype source,
//! so the fixture pins each action's id by position.

use nwscript_compiler::{
    CompileOutput, Compiler, CompilerOptions, ErrorKind, MemoryLoader,
};

/// Prototype source fixture. Declaration order fixes the action ids.
const NWSCRIPT: &str = r#"
// Engine opaque types
#define ENGINE_NUM_STRUCTURES  2
#define ENGINE_STRUCTURE_0     effect
#define ENGINE_STRUCTURE_1     event

int    TRUE  = 1;
int    FALSE = 0;
float  PI    = 3.141592;

void   PrintString(string sString);                                  // 0
void   PrintInteger(int nInteger);                                   // 1
int    GetLocalInt(object oObject, string sVarName);                 // 2
void   SetLocalInt(object oObject, string sVarName, int nValue);     // 3
float  IntToFloat(int nInteger);                                     // 4
void   DelayCommand(float fSeconds, action aActionToDelay);          // 5
void   SpeakString(string sStringToSpeak, int nTalkVolume = 0);      // 6
object GetArea(object oTarget = OBJECT_SELF);                        // 7
"#;

fn compiler_with(files: &[(&str, &str)], options: CompilerOptions) -> Compiler {
    let mut loader = MemoryLoader::new();
    loader.insert("nwscript", NWSCRIPT.as_bytes().to_vec());
    for (name, source) in files {
        loader.insert(name, source.as_bytes().to_vec());
    }
    Compiler::new(Box::new(loader), options)
}

fn compile(source: &str) -> CompileOutput {
    compiler_with(&[], CompilerOptions::default()).compile("demo", source.as_bytes())
}

fn compile_ok(source: &str) -> Vec<u8> {
    let output = compile(source);
    assert!(
        output.succeeded(),
        "compilation failed:\n{}",
        output.format_diagnostics(None)
    );
    output.code
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// === File framing ===

#[test]
fn test_header_and_size_record() {
    let code = compile_ok("void main() {}");
    assert_eq!(&code[0..8], b"NCS V1.0");
    assert_eq!(code[8], 0x42);
    let declared = u32::from_be_bytes([code[9], code[10], code[11], code[12]]);
    assert_eq!(declared as usize, code.len());
}

// === S1: constant folding ===

#[test]
fn test_s1_constant_folding() {
    let code = compile_ok("void main() { int x = 1 + 2 * 3; }");
    // Folded push of 7...
    assert!(contains(&code, &[0x04, 0x03, 0, 0, 0, 7]));
    // ...no runtime multiply...
    assert!(!contains(&code, &[0x16, 0x20]));
    // ...local popped, then return.
    assert!(contains(&code, &[0x1B, 0x00, 0xFF, 0xFF, 0xFF, 0xFC]));
    assert_eq!(&code[code.len() - 2..], &[0x20, 0x00]);
}

// === S2: vector arithmetic ===

#[test]
fn test_s2_vector_arithmetic() {
    let code = compile_ok(
        "void main() { vector v = [1.0, 2.0, 3.0]; v = v + [0.0, 0.0, 1.0]; }",
    );
    // Three float pushes per vector literal.
    let const_f = code.windows(2).filter(|w| w == &[0x04u8, 0x04]).count();
    assert_eq!(const_f, 6);
    // Vector-vector add.
    assert!(contains(&code, &[0x14, 0x3A]));
}

// === S3: engine action call ===

#[test]
fn test_s3_engine_action_call() {
    let code = compile_ok(r#"void main() { PrintString("hi"); }"#);
    // Push of the string literal...
    assert!(contains(&code, &[0x04, 0x05, 0x00, 0x02, b'h', b'i']));
    // ...then ACTION id=0 (declaration order), argc=1.
    assert!(contains(&code, &[0x05, 0x00, 0x00, 0x00, 0x01]));
}

#[test]
fn test_action_id_follows_declaration_order() {
    let code = compile_ok("void main() { PrintInteger(4); }");
    assert!(contains(&code, &[0x05, 0x00, 0x00, 0x01, 0x01]));
}

// === S4: conditionals ===

#[test]
fn test_s4_conditional_return_paths() {
    let source = "int f(int x) { if (x > 0) return 1; return 0; } void main() { int r = f(3); }";
    let code = compile_ok(source);
    // Compare and jump-if-zero.
    assert!(contains(&code, &[0x0E, 0x20]));
    assert!(contains(&code, &[0x1F, 0x00]));

    // Both return sites plus stub and main: at least four RETN lines.
    let mut compiler = compiler_with(&[], CompilerOptions::default());
    let listing = compiler.disassemble(&code, None).unwrap();
    let retn = listing.lines().filter(|l| l.contains("RETN")).count();
    assert!(retn >= 4, "expected >= 4 RETN, listing:\n{}", listing);
}

// === S5: recursion rejection ===

#[test]
fn test_s5_direct_recursion_rejected() {
    let output = compile("int f(int x) { return f(x - 1); } void main() { int r = f(3); }");
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Recursion);
}

#[test]
fn test_indirect_recursion_rejected() {
    let output = compile(
        "int a(int x); int b(int x) { return a(x); } int a(int x) { return b(x); } \
         void main() { int r = a(1); }",
    );
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Recursion);
}

// === S6: disassembly round-trip ===

#[test]
fn test_s6_disassembly_of_s1() {
    let code = compile_ok("void main() { int x = 1 + 2 * 3; }");
    let mut compiler = compiler_with(&[], CompilerOptions::default());
    let listing = compiler.disassemble(&code, None).unwrap();

    let mut lines = listing.lines();
    assert!(lines.next().unwrap().starts_with("; NCS V1.0"));
    let first = lines.next().unwrap();
    assert!(first.starts_with("0000000D"), "got: {}", first);

    // Addresses ascend strictly.
    let addrs: Vec<u32> = listing
        .lines()
        .filter_map(|l| u32::from_str_radix(l.get(0..8)?, 16).ok())
        .collect();
    assert!(addrs.windows(2).all(|w| w[0] < w[1]));
}

// === Property 3: determinism ===

#[test]
fn test_determinism_across_runs() {
    let source = r#"
        int counter;
        int next() { counter++; return counter; }
        void main() {
            int i;
            for (i = 0; i < 3; i++) { SetLocalInt(OBJECT_SELF, "n", next()); }
        }
    "#;
    let a = compiler_with(&[], CompilerOptions::default()).compile("demo", source.as_bytes());
    let b = compiler_with(&[], CompilerOptions::default()).compile("demo", source.as_bytes());
    assert!(a.succeeded() && b.succeeded());
    assert_eq!(a.code, b.code);
    assert_eq!(a.debug, b.debug);
}

// === Property 7: default-argument law ===

#[test]
fn test_default_argument_law_engine_action() {
    let explicit = compile_ok(r#"void main() { SpeakString("x", 0); }"#);
    let defaulted = compile_ok(r#"void main() { SpeakString("x"); }"#);
    assert_eq!(explicit, defaulted);
}

#[test]
fn test_default_argument_law_user_function() {
    let explicit = compile_ok("void g(int a, int b = 7) {} void main() { g(1, 7); }");
    let defaulted = compile_ok("void g(int a, int b = 7) {} void main() { g(1); }");
    assert_eq!(explicit, defaulted);
}

#[test]
fn test_object_default_fills_from_builtin() {
    // GetArea's default is OBJECT_SELF (handle 0): CONSTO 0.
    let code = compile_ok("void main() { object o = GetArea(); }");
    assert!(contains(&code, &[0x04, 0x06, 0x00, 0x00, 0x00, 0x00]));
}

// === Property 8: include cycles ===

#[test]
fn test_include_cycle_rejected() {
    let output = compiler_with(
        &[("a", "#include \"b\"\nint fa() { return 1; }"),
          ("b", "#include \"a\"\nint fb() { return 2; }")],
        CompilerOptions::default(),
    )
    .compile("demo", b"#include \"a\"\nvoid main() { int x = fa(); }");
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Include);
    assert!(output.diagnostics[0].message.contains("circular"));
}

#[test]
fn test_guarded_reinclusion_is_idempotent() {
    let header = "#ifndef UTIL_H\n#define UTIL_H\nint util() { return 1; }\n#endif\n";
    let output = compiler_with(
        &[("util", header), ("mid", "#include \"util\"\nint mid() { return util(); }")],
        CompilerOptions::default(),
    )
    .compile(
        "demo",
        b"#include \"util\"\n#include \"mid\"\nvoid main() { int x = mid(); }",
    );
    assert!(
        output.succeeded(),
        "failed:\n{}",
        output.format_diagnostics(None)
    );
}

// === Globals ===

#[test]
fn test_globals_use_bp_frame() {
    let code = compile_ok("int G = 5; void main() { G = G + 1; }");
    assert!(contains(&code, &[0x2A, 0x00])); // SAVEBP
    assert!(contains(&code, &[0x27, 0x01])); // CPTOPBP
    assert!(contains(&code, &[0x26, 0x01])); // CPDOWNBP
    assert!(contains(&code, &[0x2B, 0x00])); // RESTOREBP
}

#[test]
fn test_scriptless_globals_have_no_bp_frame() {
    let code = compile_ok("void main() { int x = 1; }");
    assert!(!contains(&code, &[0x2A, 0x00]));
}

#[test]
fn test_starting_conditional_entry() {
    let code = compile_ok("int StartingConditional() { return TRUE; }");
    // The stub reserves the result slot before calling in.
    assert_eq!(&code[13..15], &[0x02, 0x03]);
}

#[test]
fn test_starting_conditional_with_globals() {
    let output = compile("int G = 2; int StartingConditional() { return G; }");
    assert!(
        output.succeeded(),
        "failed:\n{}",
        output.format_diagnostics(None)
    );
}

// === Action closures ===

#[test]
fn test_action_argument_captures_state() {
    let code = compile_ok(r#"void main() { DelayCommand(1.0, PrintString("hi")); }"#);
    assert!(contains(&code, &[0x2C, 0x10])); // STORE_STATE
}

// === Types in emitted code ===

#[test]
fn test_engine_type_local_reserves_typed_slot() {
    let code = compile_ok("void main() { effect e; }");
    assert!(contains(&code, &[0x02, 0x10])); // RSADD engine_0
}

#[test]
fn test_runtime_int_widening() {
    let code = compile_ok("void main() { int n = 3; float f = n; }");
    // Widening adds 0.0 with the int/float pairing.
    assert!(contains(&code, &[0x14, 0x25]));
}

#[test]
fn test_object_condition_compares_against_invalid() {
    let code = compile_ok("void main() { object o = GetArea(); if (o) { PrintInteger(1); } }");
    // CONSTO 1 (OBJECT_INVALID), NEQUALOO
    assert!(contains(&code, &[0x04, 0x06, 0x00, 0x00, 0x00, 0x01, 0x0C, 0x22]));
}

// === Control flow smoke ===

#[test]
fn test_control_flow_stack_discipline() {
    let source = r#"
        void main() {
            int i;
            int total;
            for (i = 0; i < 10; i++) {
                int j = i * 2;
                if (j > 5) break;
                while (j > 0) { j--; continue; }
                total += j;
            }
            do { total--; } while (total > 0);
            switch (i) {
                case 0: PrintInteger(0); break;
                case 1: { int k = 3; PrintInteger(k); }
                default: PrintInteger(9); break;
            }
            string s = i > 3 ? "big" : "small";
            PrintString(s);
        }
    "#;
    let code = compile_ok(source);
    // The stream must stay decodable end to end.
    let mut compiler = compiler_with(&[], CompilerOptions::default());
    compiler.disassemble(&code, None).unwrap();
}

#[test]
fn test_vector_component_assignment() {
    let code = compile_ok("void main() { vector v; v.x = 1.5; float f = v.z; }");
    let mut compiler = compiler_with(&[], CompilerOptions::default());
    compiler.disassemble(&code, None).unwrap();
}

// === Optimization flag ===

#[test]
fn test_unreachable_functions_kept_without_optimize() {
    let source = "void unused() { PrintInteger(1); } void main() {}";
    let kept = compile_ok(source);

    let optimized = compiler_with(
        &[],
        CompilerOptions {
            optimize: true,
            ..CompilerOptions::default()
        },
    )
    .compile("demo", source.as_bytes());
    assert!(optimized.succeeded());
    assert!(optimized.code.len() < kept.len());
}

// === Failure modes ===

#[test]
fn test_no_entry_point() {
    let output = compile("int helper() { return 1; }");
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Codegen);
    assert!(output.diagnostics[0].message.contains("entry point"));
}

#[test]
fn test_missing_function_body() {
    let output = compile("void g(); void main() { g(); }");
    assert!(!output.succeeded());
    assert!(output.diagnostics[0].message.contains("never defined"));
}

#[test]
fn test_missing_return_path() {
    let output = compile("int f(int x) { if (x > 0) return 1; } void main() { int r = f(1); }");
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Type);
}

#[test]
fn test_failure_discards_partial_output() {
    let output = compile("void main() { int x = missing; }");
    assert!(!output.succeeded());
    assert!(output.code.is_empty());
    assert!(output.debug.is_none());
}

#[test]
fn test_long_resource_name_rejected() {
    let output = compiler_with(&[], CompilerOptions::default())
        .compile("far_too_long_resource_name", b"void main() {}");
    assert!(!output.succeeded());
    assert_eq!(output.diagnostics[0].kind, ErrorKind::Resource);
}

// === Debug symbols ===

#[test]
fn test_debug_symbols_emitted_on_request() {
    let mut compiler = compiler_with(
        &[],
        CompilerOptions {
            debug_symbols: true,
            ..CompilerOptions::default()
        },
    );
    let output = compiler.compile("demo", b"void main() { int x = 4; PrintInteger(x); }");
    assert!(output.succeeded());
    let ndb = output.debug.expect("debug symbols requested");
    assert!(ndb.starts_with("NDB V1.0"));
    assert!(ndb.contains("f main"));
    assert!(ndb.contains("v x"));
    assert!(ndb.lines().any(|l| l.starts_with("l ")));
    assert!(ndb.lines().any(|l| l.starts_with("N ")));
}

// === Facade surface ===

#[test]
fn test_get_action_prototype() {
    use nwscript_compiler::Type;

    let mut compiler = compiler_with(&[], CompilerOptions::default());
    let proto = compiler.get_action_prototype(0).expect("action 0 exists");
    assert_eq!(proto.name.as_ref(), "PrintString");
    assert_eq!(proto.ret, Type::Void);
    assert_eq!(proto.param_types, vec![Type::String]);
    assert_eq!(proto.min_params, 1);

    let delay = compiler.get_action_prototype(5).expect("action 5 exists");
    assert_eq!(delay.name.as_ref(), "DelayCommand");
    assert_eq!(delay.param_types, vec![Type::Float, Type::Action]);

    assert!(compiler.get_action_prototype(99).is_none());
}

#[test]
fn test_cache_can_be_disabled() {
    let mut compiler = compiler_with(
        &[("util", "int util() { return 1; }")],
        CompilerOptions::default(),
    );
    compiler.set_cache_enabled(false);
    let source = b"#include \"util\"\nvoid main() { int x = util(); }";
    assert!(compiler.compile("demo", source).succeeded());
    assert!(compiler.compile("demo", source).succeeded());
}

#[test]
fn test_error_prefix_applied() {
    let mut compiler = compiler_with(&[], CompilerOptions::default());
    compiler.set_error_prefix(Some("NSC:".to_string()));
    let output = compiler.compile("demo", b"void main() { int x = missing; }");
    let text = output.format_diagnostics(compiler.error_prefix());
    assert!(text.starts_with("NSC: demo.nss"));
}
