//! Engine-action prototype table.
//!
//! The global scope of every compilation is seeded from the canonical
//! prototype source (`nwscript.nss`): engine-action signatures numbered in
//! declaration order, engine constants, and the engine opaque type names
//! announced through `ENGINE_STRUCTURE_<n>` defines. The table is parsed
//! once and cached by the façade; each compile clones its symbol scope.

use indexmap::IndexMap;
use nwscript_ast::{Constant, SourceMap, Span, Symbol, SymbolKind, SymbolTable, Type};
use nwscript_lexer::Token;
use nwscript_parser::MacroTable;
use std::rc::Rc;

use crate::codegen::{OBJECT_INVALID, OBJECT_SELF};

/// One engine action's resolved signature.
#[derive(Debug, Clone)]
pub struct ActionPrototype {
    pub name: Rc<str>,
    pub ret: Type,
    pub param_types: Vec<Type>,
    pub min_params: usize,
}

/// The cached result of parsing the prototype source.
#[derive(Debug, Clone)]
pub struct PrototypeTable {
    /// Global scope holding actions and engine constants
    pub symbols: SymbolTable,
    /// Engine type names in `engine_0..` order
    pub engine_types: IndexMap<Rc<str>, u8>,
    /// Actions indexed by id
    pub actions: Vec<ActionPrototype>,
    /// Sources registered while preprocessing, in file-id order; every
    /// compile re-registers them so prototype symbol spans stay valid
    pub files: Vec<(String, Rc<str>)>,
}

/// Seed the object-handle builtins the prototype source itself relies on
/// (`OBJECT_SELF` defaults on action parameters).
pub fn seed_builtins(symbols: &mut SymbolTable) {
    for (name, handle) in [("OBJECT_SELF", OBJECT_SELF), ("OBJECT_INVALID", OBJECT_INVALID)] {
        symbols
            .declare(Symbol {
                name: Rc::from(name),
                ty: Type::Object,
                kind: SymbolKind::Global {
                    index: 0,
                    constant: Some(Constant::Object(handle)),
                },
                span: Span::zero(0),
            })
            .expect("builtins seed an empty scope");
    }
}

/// Extract engine type names from the prototype unit's macro table.
///
/// The original compiler reads `ENGINE_STRUCTURE_0` .. `ENGINE_STRUCTURE_9`
/// defines whose replacement is the type's source-level name.
pub fn engine_types_from_defines(defines: &MacroTable) -> IndexMap<Rc<str>, u8> {
    let mut engine_types = IndexMap::new();
    for n in 0..10u8 {
        let key = format!("ENGINE_STRUCTURE_{}", n);
        let Some(replacement) = defines.get(key.as_str()) else {
            continue;
        };
        if let [(Token::Ident(name), _)] = replacement.as_slice() {
            engine_types.insert(name.clone(), n);
        }
    }
    engine_types
}

/// Collect the action signatures out of a parsed prototype scope,
/// ordered by id.
pub fn collect_actions(symbols: &SymbolTable) -> Vec<ActionPrototype> {
    let mut actions: Vec<(u16, ActionPrototype)> = symbols
        .iter()
        .filter_map(|(_, symbol)| match &symbol.kind {
            SymbolKind::Action {
                id,
                params,
                min_args,
            } => Some((
                *id,
                ActionPrototype {
                    name: symbol.name.clone(),
                    ret: symbol.ty,
                    param_types: params.iter().map(|p| p.ty).collect(),
                    min_params: *min_args,
                },
            )),
            _ => None,
        })
        .collect();
    actions.sort_by_key(|(id, _)| *id);
    actions.into_iter().map(|(_, proto)| proto).collect()
}

/// Record the prototype unit's sources for replay into later compiles.
pub fn snapshot_files(sources: &SourceMap) -> Vec<(String, Rc<str>)> {
    sources
        .iter()
        .map(|file| (file.name.clone(), file.source.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nwscript_ast::Span;

    #[test]
    fn test_seed_builtins() {
        let mut symbols = SymbolTable::new();
        seed_builtins(&mut symbols);
        let id = symbols.lookup("OBJECT_INVALID").unwrap();
        match &symbols.get(id).kind {
            SymbolKind::Global {
                constant: Some(Constant::Object(handle)),
                ..
            } => assert_eq!(*handle, OBJECT_INVALID),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_engine_types_from_defines() {
        let mut defines = MacroTable::new();
        defines.insert(
            Rc::from("ENGINE_STRUCTURE_0"),
            vec![(Token::Ident(Rc::from("effect")), Span::zero(0))],
        );
        defines.insert(
            Rc::from("ENGINE_STRUCTURE_2"),
            vec![(Token::Ident(Rc::from("location")), Span::zero(0))],
        );
        let types = engine_types_from_defines(&defines);
        assert_eq!(types.get("effect"), Some(&0));
        assert_eq!(types.get("location"), Some(&2));
        assert_eq!(types.len(), 2);
    }
}
