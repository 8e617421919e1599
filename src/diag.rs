//! Diagnostics sink shared by the scanner and the parser.
//!
//! Lexical and syntax errors do not abort their stage; they are recorded
//! here and the driver decides what to do once the stage has finished.  One
//! sink serves one pipeline; the interpreter clears it before every run so
//! REPL lines do not inherit stale errors.

use std::cell::RefCell;
use std::rc::Rc;

/// Line number (starting at one).
pub type Position = u32;

#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: RefCell<Vec<String>>,
}

impl Diagnostics {
    /// Creates a new sink.
    ///
    /// Returns an `Rc` because the sink is shared between pipeline stages.
    pub fn new() -> Rc<Diagnostics> {
        Rc::new(Diagnostics::default())
    }

    /// Records an error with no location detail beyond the line.
    pub fn error(&self, line: Position, message: &str) {
        self.report(line, "", message);
    }

    /// Records an error, returning the formatted message.
    ///
    /// `locus` is either empty, ` at end`, or ` at 'LEXEME'`.
    pub fn report(&self, line: Position, locus: &str, message: &str) -> String {
        let formatted = format!("[line {}] Error{}: {}", line, locus, message);
        self.messages.borrow_mut().push(formatted.clone());
        formatted
    }

    pub fn had_error(&self) -> bool {
        !self.messages.borrow().is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}
