//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use crate::ctx::Context;
use crate::diag::Diagnostics;
use crate::eval::{Evaluator, RuntimeError};
use crate::parser::Parser;

/// Tree-walk interpreter.
///
/// Each call to [`Interpreter::eval`] runs one program (a file, or one REPL
/// line) against the same persistent global environment, printing the
/// program's resulting value to the output sink.
///
/// # Example
///
/// Invoke the interpreter a first time to define a function, then additional
/// times to call it:
///
/// ```
/// # use rmonkey::interpreter::{Interpreter, MonkeyError};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     let max = fn(x, y) {
///         if (x > y) {
///             return x;
///         } else {
///             return y;
///         }
///     };
/// "#;
/// interp.eval(func_def.as_bytes())?;
///
/// interp.eval("max(10, 20);".as_bytes()).expect("interpreter error");
/// interp.eval("max(5, 4);".as_bytes()).expect("interpreter error");
///
/// assert_eq!(output, b"20\n5\n");
/// # Ok::<(), MonkeyError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    diag: Rc<Diagnostics>,
    evaluator: Evaluator<'t, W>,
}

/// Errors the interpreter can raise.
#[derive(Debug)]
pub enum MonkeyError {
    /// The input could not be read.
    Read(io::Error),

    /// Lexical or syntax errors were reported; evaluation was skipped.
    Parse(Vec<String>),

    /// Evaluation failed.
    Runtime(RuntimeError),
}

impl fmt::Display for MonkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonkeyError::Read(e) => write!(f, "read error: {}", e),
            MonkeyError::Parse(messages) => write!(f, "{}", messages.join("\n")),
            MonkeyError::Runtime(e) => write!(f, "ERROR: {}", e),
        }
    }
}

impl Error for MonkeyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MonkeyError::Read(e) => Some(e),
            MonkeyError::Parse(_) => None,
            MonkeyError::Runtime(e) => Some(e),
        }
    }
}

impl From<io::Error> for MonkeyError {
    fn from(e: io::Error) -> MonkeyError {
        MonkeyError::Read(e)
    }
}

impl From<RuntimeError> for MonkeyError {
    fn from(e: RuntimeError) -> MonkeyError {
        MonkeyError::Runtime(e)
    }
}

impl<'t, W: Write> Interpreter<'t, W> {
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        Interpreter {
            ctx: Context::new(),
            diag: Diagnostics::new(),
            evaluator: Evaluator::new(output),
        }
    }

    /// Scans, parses and evaluates one program.
    ///
    /// If the scanner or parser reported any error, evaluation is skipped
    /// and the collected messages are returned.  On success the program's
    /// value, if it produced one, is printed to the output in inspect form.
    pub fn eval<R: BufRead>(&mut self, input: R) -> Result<(), MonkeyError> {
        self.diag.clear();
        let mut parser = Parser::new(input, self.ctx.clone(), self.diag.clone());
        let prg = parser.parse_program()?;
        if self.diag.had_error() {
            return Err(MonkeyError::Parse(self.diag.messages()));
        }
        if let Some(value) = self.evaluator.eval_program(&prg)? {
            self.evaluator.print_value(&value)?;
        }
        Ok(())
    }
}
