//! String interner for identifiers and keywords.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Stores all known symbols.
#[derive(Debug, Default)]
pub struct Interner(HashSet<Symbol>);

impl Interner {
    pub fn new() -> Interner {
        Interner(HashSet::new())
    }

    /// Maps a string to its unique symbol, interning it on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.0.get(name) {
            sym.clone()
        } else {
            let sym = Symbol(Rc::new(name.to_string()));
            self.0.insert(sym.clone());
            sym
        }
    }
}

/// An interned, immutable string.
///
/// Symbols produced by the same [`Interner`] are unique per spelling, so
/// equality is a pointer comparison.
#[derive(Debug, Hash, Clone)]
pub struct Symbol(Rc<String>);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}
