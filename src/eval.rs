//! Tree-walking evaluator.
//!
//! Evaluation is a synchronous recursive walk over the AST, threading an
//! [`Env`].  Runtime errors travel in the `Result` error channel and
//! short-circuit every surrounding operation; `return` unwinds through an
//! evaluator flag that the nearest function-call boundary (or the program
//! top level) consumes.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use crate::ast::{Block, Expr, ExprKind, InfixOp, PrefixOp, Stmt, StmtKind};
use crate::builtins;
use crate::diag::Position;
use crate::object::{BuiltinError, Env, Function, HashPair, Type, Value};

#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    globals: Rc<Env>,
    is_returning: Option<Value>,
}

/// A failed evaluation.
///
/// `Display` yields the language-level message, prefixed with the line of
/// the operation that raised it (`Io` is a host failure and carries no
/// source position).
#[derive(Debug)]
pub enum RuntimeError {
    TypeMismatch {
        line: Position,
        left: Type,
        op: InfixOp,
        right: Type,
    },
    UnknownOperator {
        line: Position,
        left: Type,
        op: InfixOp,
        right: Type,
    },
    UnknownPrefixOperator {
        line: Position,
        op: PrefixOp,
        right: Type,
    },
    IdentifierNotFound {
        line: Position,
        name: String,
    },
    NotAFunction {
        line: Position,
        ty: Type,
    },
    IndexNotSupported {
        line: Position,
        ty: Type,
    },
    UnusableHashKey {
        line: Position,
        ty: Type,
    },
    Builtin {
        line: Position,
        message: String,
    },
    Io(io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TypeMismatch {
                line,
                left,
                op,
                right,
            } => write!(f, "[line {}] type mismatch: {} {} {}", line, left, op, right),
            RuntimeError::UnknownOperator {
                line,
                left,
                op,
                right,
            } => write!(
                f,
                "[line {}] unknown operator: {} {} {}",
                line, left, op, right
            ),
            RuntimeError::UnknownPrefixOperator { line, op, right } => {
                write!(f, "[line {}] unknown operator: {}{}", line, op, right)
            }
            RuntimeError::IdentifierNotFound { line, name } => {
                write!(f, "[line {}] identifier not found: {}", line, name)
            }
            RuntimeError::NotAFunction { line, ty } => {
                write!(f, "[line {}] not a function: {}", line, ty)
            }
            RuntimeError::IndexNotSupported { line, ty } => {
                write!(f, "[line {}] index operator not supported: {}", line, ty)
            }
            RuntimeError::UnusableHashKey { line, ty } => {
                write!(f, "[line {}] unusable as hash key: {}", line, ty)
            }
            RuntimeError::Builtin { line, message } => {
                write!(f, "[line {}] {}", line, message)
            }
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError::Io(e)
    }
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W) -> Evaluator<'t, W> {
        Evaluator {
            output,
            globals: Env::new(),
            is_returning: None,
        }
    }

    /// Evaluates a program against the persistent global environment.
    ///
    /// The result is the last statement's value (`None` when the program is
    /// empty or ends in a declaration).  A top-level `return` ends the
    /// program with the returned value.
    pub fn eval_program(&mut self, stmts: &[Stmt]) -> Result<Option<Value>, RuntimeError> {
        let env = self.globals.clone();
        let mut result = None;
        for stmt in stmts {
            result = self.eval_stmt(stmt, env.clone())?;
            if let Some(v) = self.is_returning.take() {
                return Ok(Some(v));
            }
        }
        Ok(result)
    }

    /// Writes a value's inspect form to the evaluator's output.
    pub fn print_value(&mut self, value: &Value) -> Result<(), RuntimeError> {
        writeln!(self.output, "{}", value)?;
        Ok(())
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: Rc<Env>) -> Result<Option<Value>, RuntimeError> {
        match &stmt.kind {
            StmtKind::Let(name, value) => {
                let v = self.eval_expr(value, env.clone())?;
                env.define(name, v);
                Ok(None)
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                debug_assert!(self.is_returning.is_none());
                self.is_returning = Some(v);
                Ok(None)
            }
            StmtKind::Expr(e) => Ok(Some(self.eval_expr(e, env)?)),
        }
    }

    /// Evaluates a block in the given environment.  Blocks do not open a new
    /// frame; only function calls do.  A pending return stops execution and
    /// propagates untouched.
    fn eval_block(&mut self, block: &Block, env: Rc<Env>) -> Result<Option<Value>, RuntimeError> {
        let mut result = None;
        for stmt in &block.stmts {
            if self.is_returning.is_some() {
                break;
            }
            result = self.eval_stmt(stmt, env.clone())?;
        }
        Ok(result)
    }

    fn eval_expr(&mut self, expr: &Expr, env: Rc<Env>) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Ident(sym) => env
                .get(sym)
                .or_else(|| builtins::lookup(sym.as_str()).map(Value::Builtin))
                .ok_or_else(|| RuntimeError::IdentifierNotFound {
                    line: expr.line,
                    name: sym.as_str().to_owned(),
                }),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(Rc::new(s.clone()))),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Prefix(op, right) => {
                let right = self.eval_expr(right, env)?;
                eval_prefix(expr.line, *op, right)
            }
            ExprKind::Infix(op, left, right) => {
                if matches!(op, InfixOp::And | InfixOp::Or) {
                    self.eval_logic(expr.line, *op, left, right, env)
                } else {
                    let left = self.eval_expr(left, env.clone())?;
                    let right = self.eval_expr(right, env)?;
                    eval_infix(expr.line, *op, left, right)
                }
            }
            ExprKind::If(cond, then, alt) => {
                let cond = self.eval_expr(cond, env.clone())?;
                if cond.is_truthy() {
                    Ok(self.eval_block(then, env)?.unwrap_or(Value::Null))
                } else if let Some(alt) = alt {
                    Ok(self.eval_block(alt, env)?.unwrap_or(Value::Null))
                } else {
                    Ok(Value::Null)
                }
            }
            ExprKind::While(cond, body) => {
                loop {
                    let c = self.eval_expr(cond, env.clone())?;
                    if !c.is_truthy() {
                        break;
                    }
                    self.eval_block(body, env.clone())?;
                    if self.is_returning.is_some() {
                        break;
                    }
                }
                Ok(Value::Null)
            }
            ExprKind::Function(params, body) => Ok(Value::Function(Rc::new(Function {
                params: params.clone(),
                body: body.clone(),
                env,
            }))),
            ExprKind::Call(callee, args) => {
                let callee = self.eval_expr(callee, env.clone())?;
                let args = args
                    .iter()
                    .map(|a| self.eval_expr(a, env.clone()))
                    .collect::<Result<Vec<Value>, RuntimeError>>()?;
                self.eval_call(expr.line, callee, args)
            }
            ExprKind::Array(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| self.eval_expr(e, env.clone()))
                    .collect::<Result<Vec<Value>, RuntimeError>>()?;
                Ok(Value::Array(Rc::new(elements)))
            }
            ExprKind::Index(left, index) => {
                let left = self.eval_expr(left, env.clone())?;
                let index = self.eval_expr(index, env)?;
                eval_index(expr.line, left, index)
            }
            ExprKind::Hash(pairs) => self.eval_hash(expr.line, pairs, env),
            ExprKind::Assign(name, value) => {
                let v = self.eval_expr(value, env.clone())?;
                env.assign(name, v.clone());
                Ok(v)
            }
        }
    }

    /// `and`/`or` with short-circuit: a boolean left decides, otherwise the
    /// boolean right is the answer.  Non-boolean operands fall through to
    /// the ordinary infix error reporting.
    fn eval_logic(
        &mut self,
        line: Position,
        op: InfixOp,
        left: &Expr,
        right: &Expr,
        env: Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        let left = self.eval_expr(left, env.clone())?;
        match (op, &left) {
            (InfixOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (InfixOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            _ => (),
        }
        let right = self.eval_expr(right, env)?;
        if let (Value::Bool(_), Value::Bool(b)) = (&left, &right) {
            return Ok(Value::Bool(*b));
        }
        eval_infix(line, op, left, right)
    }

    fn eval_call(
        &mut self,
        line: Position,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(f) => {
                let call_env = Env::with_outer(f.env.clone());
                // Positional binding: excess arguments are ignored, missing
                // parameters stay unbound.
                for (param, arg) in f.params.iter().zip(args) {
                    call_env.define(param, arg);
                }
                let result = self.eval_block(&f.body, call_env)?;
                Ok(match self.is_returning.take() {
                    Some(v) => v,
                    None => result.unwrap_or(Value::Null),
                })
            }
            Value::Builtin(b) => {
                let out: &mut dyn Write = &mut *self.output;
                (b.func)(out, &args).map_err(|e| match e {
                    BuiltinError::Bad(message) => RuntimeError::Builtin { line, message },
                    BuiltinError::Io(e) => RuntimeError::Io(e),
                })
            }
            other => Err(RuntimeError::NotAFunction {
                line,
                ty: other.type_of(),
            }),
        }
    }

    fn eval_hash(
        &mut self,
        line: Position,
        pairs: &[(Expr, Expr)],
        env: Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        let mut map = HashMap::new();
        for (key_expr, value_expr) in pairs {
            let key = self.eval_expr(key_expr, env.clone())?;
            let hash_key = key
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableHashKey {
                    line,
                    ty: key.type_of(),
                })?;
            let value = self.eval_expr(value_expr, env.clone())?;
            // Duplicate keys: the later pair wins.
            map.insert(hash_key, HashPair { key, value });
        }
        Ok(Value::Hash(Rc::new(map)))
    }
}

fn eval_prefix(line: Position, op: PrefixOp, right: Value) -> Result<Value, RuntimeError> {
    match op {
        PrefixOp::Bang => Ok(match right {
            Value::Bool(b) => Value::Bool(!b),
            Value::Null => Value::Null,
            _ => Value::Bool(false),
        }),
        PrefixOp::Minus => match right {
            Value::Number(n) => Ok(Value::Number(-n)),
            v => Err(RuntimeError::UnknownPrefixOperator {
                line,
                op,
                right: v.type_of(),
            }),
        },
    }
}

fn eval_infix(line: Position, op: InfixOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (&left, &right) {
        (Value::Number(l), Value::Number(r)) => number_infix(line, op, *l, *r),
        (l, r)
            if matches!(l, Value::Str(_) | Value::Number(_))
                && matches!(r, Value::Str(_) | Value::Number(_)) =>
        {
            string_infix(line, op, &left, &right)
        }
        _ if left.type_of() != right.type_of() => Err(RuntimeError::TypeMismatch {
            line,
            left: left.type_of(),
            op,
            right: right.type_of(),
        }),
        _ => match op {
            InfixOp::EqualEqual => Ok(Value::Bool(left == right)),
            InfixOp::BangEqual => Ok(Value::Bool(left != right)),
            _ => Err(RuntimeError::UnknownOperator {
                line,
                left: left.type_of(),
                op,
                right: right.type_of(),
            }),
        },
    }
}

fn number_infix(line: Position, op: InfixOp, l: f64, r: f64) -> Result<Value, RuntimeError> {
    let v = match op {
        InfixOp::Plus => Value::Number(l + r),
        InfixOp::Minus => Value::Number(l - r),
        InfixOp::Star => Value::Number(l * r),
        // Division by zero yields the IEEE result, not an error.
        InfixOp::Slash => Value::Number(l / r),
        InfixOp::Less => Value::Bool(l < r),
        InfixOp::LessEqual => Value::Bool(l <= r),
        InfixOp::Greater => Value::Bool(l > r),
        InfixOp::GreaterEqual => Value::Bool(l >= r),
        InfixOp::EqualEqual => Value::Bool(l == r),
        InfixOp::BangEqual => Value::Bool(l != r),
        InfixOp::And | InfixOp::Or => {
            return Err(RuntimeError::UnknownOperator {
                line,
                left: Type::Number,
                op,
                right: Type::Number,
            })
        }
    };
    Ok(v)
}

/// Mixed string/number operators work on the operands' inspect forms; `+`
/// concatenates, comparisons are lexicographic.
fn string_infix(
    line: Position,
    op: InfixOp,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    if op == InfixOp::Plus {
        return Ok(Value::Str(Rc::new(format!("{}{}", left, right))));
    }
    let l = left.to_string();
    let r = right.to_string();
    let v = match op {
        InfixOp::Less => Value::Bool(l < r),
        InfixOp::LessEqual => Value::Bool(l <= r),
        InfixOp::Greater => Value::Bool(l > r),
        InfixOp::GreaterEqual => Value::Bool(l >= r),
        InfixOp::EqualEqual => Value::Bool(l == r),
        InfixOp::BangEqual => Value::Bool(l != r),
        _ => {
            return Err(RuntimeError::UnknownOperator {
                line,
                left: left.type_of(),
                op,
                right: right.type_of(),
            })
        }
    };
    Ok(v)
}

fn eval_index(line: Position, left: Value, index: Value) -> Result<Value, RuntimeError> {
    match (&left, &index) {
        (Value::Array(elements), Value::Number(idx)) => {
            let max = elements.len() as f64 - 1.0;
            // Indices truncate; anything outside [0, len-1] is null.
            if idx.is_nan() || *idx < 0.0 || *idx > max {
                Ok(Value::Null)
            } else {
                Ok(elements[*idx as usize].clone())
            }
        }
        (Value::Hash(pairs), _) => {
            let key = index.hash_key().ok_or(RuntimeError::UnusableHashKey {
                line,
                ty: index.type_of(),
            })?;
            Ok(pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::IndexNotSupported {
            line,
            ty: left.type_of(),
        }),
    }
}
