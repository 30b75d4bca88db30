use std::collections::HashMap;

// =============================================================================
// SYMBOLS - Lexically scoped name resolution for the compiler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope: a name map plus a link to the enclosing scope.
///
/// The outermost table is the global scope; every enclosed table defines
/// locals. Resolution walks outward, so inner definitions shadow outer
/// ones. Redefining a name in the same scope overwrites the entry and
/// still burns a fresh slot index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    pub num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            store: HashMap::new(),
            num_definitions: 0,
        }
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Unwraps one level of nesting, returning the enclosing table.
    /// Panics when called on the global table; the compiler only pairs it
    /// with a preceding `new_enclosed`.
    pub fn into_outer(self) -> SymbolTable {
        *self.outer.expect("into_outer called on the global table")
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: if self.is_global() {
                SymbolScope::Global
            } else {
                SymbolScope::Local
            },
            index: self.num_definitions,
        };

        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Registers a builtin at a fixed registry index. Does not consume a
    /// variable slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };

        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        match self.store.get(name) {
            Some(symbol) => Some(symbol),
            None => self.outer.as_ref().and_then(|outer| outer.resolve(name)),
        }
    }
}
