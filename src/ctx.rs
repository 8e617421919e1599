use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interner::{Interner, Symbol};
use crate::token::Token;

/// Mostly read-only state shared by the whole pipeline and persisting across
/// interpreter sessions: the string interner and the keyword table.
#[derive(Debug)]
pub struct Context {
    interner: RefCell<Interner>,
    keywords: HashMap<Symbol, Token>,
}

impl Context {
    /// Creates a new context.
    ///
    /// Returns an `Rc` because the context is shared between the scanner,
    /// the parser and the evaluator.
    pub fn new() -> Rc<Self> {
        let mut interner = Interner::new();

        let mut keywords = HashMap::new();
        for (name, token) in KEYWORDS.iter().cloned() {
            keywords.insert(interner.intern(name), token);
        }

        Rc::new(Context {
            interner: RefCell::new(interner),
            keywords,
        })
    }

    /// Interns the given string if needed and returns its symbol.
    pub fn symbol(&self, name: &str) -> Symbol {
        self.interner.borrow_mut().intern(name)
    }

    /// Returns the token associated with the given symbol if it is a keyword.
    pub fn keyword(&self, id: &Symbol) -> Option<Token> {
        self.keywords.get(id).cloned()
    }
}

const KEYWORDS: [(&str, Token); 15] = [
    ("and", Token::And),
    ("struct", Token::Struct),
    ("else", Token::Else),
    ("false", Token::False),
    ("for", Token::For),
    ("fn", Token::Fn),
    ("if", Token::If),
    ("nil", Token::Nil),
    ("or", Token::Or),
    ("return", Token::Return),
    ("super", Token::Super),
    ("this", Token::This),
    ("true", Token::True),
    ("let", Token::Let),
    ("while", Token::While),
];
