//! Abstract syntax tree.
//!
//! Nodes are built by the parser and treated as read-only by the evaluator.
//! Every node records the line of its primary token for diagnostics.
//! `Display` reproduces a canonical source form, which function values reuse
//! for their inspect representation.

use std::fmt;
use std::rc::Rc;

use crate::diag::Position;
use crate::interner::Symbol;

#[derive(Debug, PartialEq, Clone)]
pub struct Stmt {
    pub line: Position,
    pub kind: StmtKind,
}

#[derive(Debug, PartialEq, Clone)]
pub enum StmtKind {
    Let(Symbol, Box<Expr>),
    Return(Option<Box<Expr>>),
    Expr(Box<Expr>),
}

/// A brace-delimited statement list.  Blocks appear only as `if`/`while`/`fn`
/// bodies; a `{` in expression position is a hash literal.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub line: Position,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expr {
    pub line: Position,
    pub kind: ExprKind,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    Ident(Symbol),
    Number(f64),
    Str(String),
    Bool(bool),
    Prefix(PrefixOp, Box<Expr>),
    Infix(InfixOp, Box<Expr>, Box<Expr>),
    If(Box<Expr>, Block, Option<Block>),
    While(Box<Expr>, Block),
    // The body is shared with every function value closing over it.
    Function(Vec<Symbol>, Rc<Block>),
    Call(Box<Expr>, Vec<Expr>),
    Array(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    // Pairs in source order; evaluation applies last-write-wins.
    Hash(Vec<(Expr, Expr)>),
    Assign(Symbol, Box<Expr>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PrefixOp {
    Bang,
    Minus,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Bang => write!(f, "!"),
            PrefixOp::Minus => write!(f, "-"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InfixOp {
    Plus,
    Minus,
    Star,
    Slash,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    And,
    Or,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InfixOp::Plus => "+",
            InfixOp::Minus => "-",
            InfixOp::Star => "*",
            InfixOp::Slash => "/",
            InfixOp::Less => "<",
            InfixOp::LessEqual => "<=",
            InfixOp::Greater => ">",
            InfixOp::GreaterEqual => ">=",
            InfixOp::EqualEqual => "==",
            InfixOp::BangEqual => "!=",
            InfixOp::And => "and",
            InfixOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Let(name, value) => write!(f, "let {} = {};", name, value),
            StmtKind::Return(None) => write!(f, "return;"),
            StmtKind::Return(Some(value)) => write!(f, "return {};", value),
            StmtKind::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.stmts {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Ident(sym) => write!(f, "{}", sym),
            ExprKind::Number(n) => write!(f, "{}", n),
            ExprKind::Str(s) => write!(f, "{}", s),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Prefix(op, right) => write!(f, "({}{})", op, right),
            ExprKind::Infix(op, left, right) => write!(f, "({} {} {})", left, op, right),
            ExprKind::If(cond, then, alt) => {
                write!(f, "if{} {}", cond, then)?;
                if let Some(alt) = alt {
                    write!(f, "else {}", alt)?;
                }
                Ok(())
            }
            ExprKind::While(cond, body) => write!(f, "while{} {}", cond, body),
            ExprKind::Function(params, body) => {
                write!(f, "fn({}) {}", join(params), body)
            }
            ExprKind::Call(callee, args) => write!(f, "{}({})", callee, join(args)),
            ExprKind::Array(elements) => write!(f, "[{}]", join(elements)),
            ExprKind::Index(left, index) => write!(f, "({}[{}])", left, index),
            ExprKind::Hash(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            ExprKind::Assign(name, value) => write!(f, "({} = {})", name, value),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
