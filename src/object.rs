//! Runtime value universe: values, type tags, hash keys and environments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::Block;
use crate::interner::Symbol;

/// A runtime value.
///
/// Heap-backed variants share their payload via `Rc`, so cloning a value is
/// cheap and clones compare identical (see [`PartialEq`] below).  `Display`
/// is the value's inspect form, used by `puts` and the REPL.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Number(f64),
    Str(Rc<String>),
    Bool(bool),
    Function(Rc<Function>),
    Builtin(Builtin),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashMap<HashKey, HashPair>>),
}

/// Type tags, as spelled in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Number,
    Str,
    Bool,
    Function,
    Builtin,
    Array,
    Hash,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Null => "NULL",
            Type::Number => "NUMBER",
            Type::Str => "STRING",
            Type::Bool => "BOOLEAN",
            Type::Function => "FUNCTION",
            Type::Builtin => "BUILTIN",
            Type::Array => "ARRAY",
            Type::Hash => "HASH",
        };
        write!(f, "{}", s)
    }
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Number(_) => Type::Number,
            Value::Str(_) => Type::Str,
            Value::Bool(_) => Type::Bool,
            Value::Function(_) => Type::Function,
            Value::Builtin(_) => Type::Builtin,
            Value::Array(_) => Type::Array,
            Value::Hash(_) => Type::Hash,
        }
    }

    /// Condition test: `false` and `null` are falsy, everything else truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Derives the hash-table key for this value.
    ///
    /// Only numbers, strings and booleans are hashable.  Numbers key on
    /// their exact bit pattern; strings on FNV-1a over their bytes.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Bool(b) => Some(HashKey {
                ty: Type::Bool,
                value: *b as u64,
            }),
            Value::Number(n) => Some(HashKey {
                ty: Type::Number,
                value: n.to_bits(),
            }),
            Value::Str(s) => Some(HashKey {
                ty: Type::Str,
                value: fnv1a(s.as_bytes()),
            }),
            _ => None,
        }
    }
}

/// Equality as observed by `==`/`!=`: scalars structurally, heap objects by
/// identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Function(func) => {
                let params = func
                    .params
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::Array(elements) => {
                let elements = elements.iter().map(|e| e.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Hash(pairs) => {
                let pairs = pairs
                    .values()
                    .map(|p| format!("{}:{}", p.key, p.value))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", pairs.join(", "))
            }
        }
    }
}

/// A user function: parameters, shared body, and the environment captured at
/// the point of definition.
#[derive(Clone)]
pub struct Function {
    pub params: Vec<Symbol>,
    pub body: Rc<Block>,
    pub env: Rc<Env>,
}

// The captured environment may (indirectly) contain the function itself, so
// the derived impl would recurse forever.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .finish()
    }
}

/// A host routine callable like a user function.
///
/// Builtins write program output through the sink handed to them by the
/// evaluator and do their own arity and type checking.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

pub type BuiltinFn = fn(&mut dyn Write, &[Value]) -> Result<Value, BuiltinError>;

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.func == other.func
    }
}

/// Failure raised by a builtin.  `Bad` messages are prefixed with the call's
/// line by the evaluator; I/O failures pass through unchanged.
#[derive(Debug)]
pub enum BuiltinError {
    Bad(String),
    Io(io::Error),
}

impl From<io::Error> for BuiltinError {
    fn from(e: io::Error) -> BuiltinError {
        BuiltinError::Io(e)
    }
}

/// Key under which hashable values are stored in hash tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    ty: Type,
    value: u64,
}

/// A hash-table entry; the key object is kept for inspect printing.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A frame of name→value bindings with an optional link to the enclosing
/// frame.  Function calls introduce new frames; blocks do not.
#[derive(Debug, Default)]
pub struct Env {
    bindings: RefCell<HashMap<Symbol, Value>>,
    outer: Option<Rc<Env>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Rc::new(Env::default())
    }

    pub fn with_outer(outer: Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(outer),
        })
    }

    /// Looks a name up, walking outward through enclosing frames.
    pub fn get(&self, sym: &Symbol) -> Option<Value> {
        match self.bindings.borrow().get(sym) {
            Some(v) => Some(v.clone()),
            None => self.outer.as_ref().and_then(|o| o.get(sym)),
        }
    }

    /// Binds a name in this frame, shadowing or replacing any previous
    /// binding here.
    pub fn define(&self, sym: &Symbol, val: Value) {
        self.bindings.borrow_mut().insert(sym.clone(), val);
    }

    /// Writes to the nearest enclosing frame that already binds the name;
    /// if none does, the name is bound in this frame.
    pub fn assign(&self, sym: &Symbol, val: Value) {
        if !self.try_assign(sym, &val) {
            self.define(sym, val);
        }
    }

    fn try_assign(&self, sym: &Symbol, val: &Value) -> bool {
        if self.bindings.borrow().contains_key(sym) {
            self.bindings.borrow_mut().insert(sym.clone(), val.clone());
            true
        } else {
            match &self.outer {
                Some(outer) => outer.try_assign(sym, val),
                None => false,
            }
        }
    }
}
