//! Declaration parsing: globals, constants, prototypes, defaults, and
//! the prototype (engine-action) mode.

use indexmap::IndexMap;
use nwscript_ast::{
    Constant, Diagnostic, ErrorKind, Program, SourceMap, SymbolKind, SymbolTable, Type,
};
use nwscript_parser::{
    parse_unit, IncludeLoadError, IncludeProvider, MacroTable, ParseMode, ParserConfig,
};
use std::collections::HashMap;
use std::rc::Rc;

struct MapProvider(HashMap<String, Rc<str>>);

impl IncludeProvider for MapProvider {
    fn load(&mut self, name: &str) -> Result<Rc<str>, IncludeLoadError> {
        self.0.get(name).cloned().ok_or(IncludeLoadError::NotFound)
    }
}

fn parse_with(
    source: &str,
    config: &ParserConfig,
    symbols: &mut SymbolTable,
    includes: HashMap<String, Rc<str>>,
) -> Result<(Program, MacroTable), Vec<Diagnostic>> {
    let mut sources = SourceMap::new();
    let mut provider = MapProvider(includes);
    parse_unit(
        "test",
        Rc::from(source),
        &mut sources,
        &mut provider,
        symbols,
        config,
    )
}

fn parse(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let mut symbols = SymbolTable::new();
    parse_with(source, &ParserConfig::default(), &mut symbols, HashMap::new())
        .map(|(program, _)| program)
}

fn first_error(source: &str) -> Diagnostic {
    parse(source).unwrap_err().remove(0)
}

#[test]
fn test_global_variable_gets_storage() {
    let program = parse("int gCounter; void main() { gCounter = 1; }").unwrap();
    assert_eq!(program.globals.len(), 1);
}

#[test]
fn test_const_global_folds_into_uses() {
    let mut symbols = SymbolTable::new();
    let (program, _) = parse_with(
        "const int SIZE = 4; void main() { int x = SIZE + 1; }",
        &ParserConfig::default(),
        &mut symbols,
        HashMap::new(),
    )
    .unwrap();
    // Constants take no storage.
    assert!(program.globals.is_empty());
    let id = symbols.lookup("SIZE").unwrap();
    match &symbols.get(id).kind {
        SymbolKind::Global {
            constant: Some(Constant::Int(4)),
            ..
        } => {}
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_const_requires_initializer() {
    let err = first_error("const int SIZE;");
    assert_eq!(err.kind, ErrorKind::Const);
}

#[test]
fn test_const_requires_constant_expression() {
    let err = first_error("int g; const int SIZE = g;");
    assert_eq!(err.kind, ErrorKind::Const);
}

#[test]
fn test_prototype_then_definition() {
    let program = parse("int twice(int n); void main() { int x = twice(2); } int twice(int n) { return n + n; }")
        .unwrap();
    assert_eq!(program.functions.len(), 2);
}

#[test]
fn test_signature_mismatch_rejected() {
    let err = first_error("int f(int n); int f(float n) { return 1; }");
    assert_eq!(err.kind, ErrorKind::Name);
}

#[test]
fn test_duplicate_body_rejected() {
    let err = first_error("void f() {} void f() {}");
    assert_eq!(err.kind, ErrorKind::Name);
}

#[test]
fn test_default_arguments_fill_call_sites() {
    let program = parse("void f(int a, int b = 7) {} void main() { f(1); }").unwrap();
    assert_eq!(program.functions.len(), 2);
}

#[test]
fn test_too_few_arguments() {
    let err = first_error("void f(int a, int b = 7) {} void main() { f(); }");
    assert_eq!(err.kind, ErrorKind::Arity);
}

#[test]
fn test_too_many_arguments() {
    let err = first_error("void f(int a) {} void main() { f(1, 2); }");
    assert_eq!(err.kind, ErrorKind::Arity);
}

#[test]
fn test_default_must_be_constant() {
    let err = first_error("int g() { return 1; } void f(int a = g()) {}");
    assert_eq!(err.kind, ErrorKind::Const);
}

#[test]
fn test_default_may_reference_const_global() {
    let program = parse("const int LIMIT = 9; void f(int a = LIMIT) {} void main() { f(); }");
    assert!(program.is_ok());
}

#[test]
fn test_non_trailing_default_rejected() {
    let err = first_error("void f(int a = 1, int b) {}");
    assert_eq!(err.kind, ErrorKind::Arity);
}

#[test]
fn test_struct_keyword_rejected() {
    let err = first_error("struct point { int x; };");
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(err.message.contains("struct"));
}

#[test]
fn test_prototype_mode_numbers_actions() {
    let mut symbols = SymbolTable::new();
    let config = ParserConfig {
        mode: ParseMode::Prototype,
        ..ParserConfig::default()
    };
    parse_with(
        "void PrintString(string s);\nint GetValue(object o);\nvoid Noop();",
        &config,
        &mut symbols,
        HashMap::new(),
    )
    .unwrap();

    for (name, expected) in [("PrintString", 0u16), ("GetValue", 1), ("Noop", 2)] {
        let id = symbols.lookup(name).unwrap();
        match &symbols.get(id).kind {
            SymbolKind::Action { id: action_id, .. } => assert_eq!(*action_id, expected),
            other => panic!("{} is {:?}", name, other),
        }
    }
}

#[test]
fn test_engine_action_cannot_be_redefined() {
    let mut symbols = SymbolTable::new();
    let config = ParserConfig {
        mode: ParseMode::Prototype,
        ..ParserConfig::default()
    };
    parse_with("void PrintString(string s);", &config, &mut symbols, HashMap::new()).unwrap();

    // Same table, now in script mode: a body for an action is an error.
    let err = parse_with(
        "void PrintString(string s) {}",
        &ParserConfig::default(),
        &mut symbols,
        HashMap::new(),
    )
    .unwrap_err();
    assert_eq!(err[0].kind, ErrorKind::Name);
    assert!(err[0].message.contains("engine action"));
}

#[test]
fn test_engine_action_reprototype_at_same_signature_ok() {
    let mut symbols = SymbolTable::new();
    let config = ParserConfig {
        mode: ParseMode::Prototype,
        ..ParserConfig::default()
    };
    parse_with("void PrintString(string s);", &config, &mut symbols, HashMap::new()).unwrap();

    let result = parse_with(
        "void PrintString(string s); void main() { PrintString(\"x\"); }",
        &ParserConfig::default(),
        &mut symbols,
        HashMap::new(),
    );
    assert!(result.is_ok());
}

#[test]
fn test_engine_types_usable_when_declared() {
    let mut engine_types = IndexMap::new();
    engine_types.insert(Rc::from("effect"), 0u8);
    let config = ParserConfig {
        engine_types,
        ..ParserConfig::default()
    };
    let mut symbols = SymbolTable::new();
    let result = parse_with(
        "void main() { effect e; }",
        &config,
        &mut symbols,
        HashMap::new(),
    );
    assert!(result.is_ok());

    // The local's scope is gone, but the symbol survives in the arena.
    let (_, symbol) = symbols
        .iter()
        .find(|(_, s)| s.name.as_ref() == "e")
        .unwrap();
    assert_eq!(symbol.ty, Type::Engine(0));
}

#[test]
fn test_engine_type_arithmetic_rejected() {
    let mut engine_types = IndexMap::new();
    engine_types.insert(Rc::from("effect"), 0u8);
    let config = ParserConfig {
        engine_types,
        ..ParserConfig::default()
    };
    let mut symbols = SymbolTable::new();
    let err = parse_with(
        "void main() { effect a; effect b; int x = a == b; }",
        &config,
        &mut symbols,
        HashMap::new(),
    )
    .unwrap_err();
    assert_eq!(err[0].kind, ErrorKind::Type);
}

#[test]
fn test_const_vector_requires_extensions() {
    let err = first_error("const vector UP = [0.0, 0.0, 1.0];");
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("extensions"));
}

#[test]
fn test_const_vector_allowed_with_extensions() {
    let config = ParserConfig {
        extensions: true,
        ..ParserConfig::default()
    };
    let mut symbols = SymbolTable::new();
    let result = parse_with(
        "const vector UP = [0.0, 0.0, 1.0]; void main() { vector v = UP; }",
        &config,
        &mut symbols,
        HashMap::new(),
    );
    assert!(result.is_ok());
}

#[test]
fn test_switch_on_string_requires_extensions() {
    let source = r#"void main() { string s; switch (s) { case "a": break; } }"#;
    let err = first_error(source);
    assert_eq!(err.kind, ErrorKind::Type);

    let config = ParserConfig {
        extensions: true,
        ..ParserConfig::default()
    };
    let mut symbols = SymbolTable::new();
    assert!(parse_with(source, &config, &mut symbols, HashMap::new()).is_ok());
}

#[test]
fn test_includes_parse_into_same_unit() {
    let mut includes = HashMap::new();
    includes.insert(
        "util".to_string(),
        Rc::from("int helper(int n) { return n + 1; }"),
    );
    let mut symbols = SymbolTable::new();
    let (program, _) = parse_with(
        "#include \"util\"\nvoid main() { int x = helper(1); }",
        &ParserConfig::default(),
        &mut symbols,
        includes,
    )
    .unwrap();
    assert_eq!(program.includes, vec!["util".to_string()]);
    assert_eq!(program.functions.len(), 2);
}
