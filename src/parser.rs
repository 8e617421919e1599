//! Syntactic analyzer.
//!
//! A Pratt parser: statements dispatch on the current token, expressions
//! dispatch to a prefix rule and then fold infix operators whose binding
//! power exceeds the caller's.  Tokens are pulled from the scanner one at a
//! time through a `curr`/`peek` window.
//!
//! Syntax errors are reported to the shared [`Diagnostics`] sink; the parser
//! abandons the offending statement, skips a token, and carries on with the
//! next statement, so a partial program never contains partial statements.
//! Host read errors abort parsing via `Result`.

use std::io;
use std::io::prelude::*;
use std::mem;
use std::rc::Rc;

use crate::ast::{Block, Expr, ExprKind, InfixOp, PrefixOp, Stmt, StmtKind};
use crate::ctx::Context;
use crate::diag::{Diagnostics, Position};
use crate::interner::Symbol;
use crate::scanner::Scanner;
use crate::token::Token;

/// Operator binding powers, lowest to highest.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
enum Precedence {
    Lowest,
    Assign,      // =
    AndOr,       // and, or
    Equals,      // ==, !=
    LessGreater, // <, <=, >, >=
    Sum,         // +, -
    Product,     // *, /
    Prefix,      // -x, !x
    Call,        // f(x)
    Index,       // a[i]
}

/// Why the current statement cannot be finished.  Syntax problems have
/// already been reported to the sink by the time this is returned.
enum Abort {
    Syntax,
    Read(io::Error),
}

impl From<io::Error> for Abort {
    fn from(e: io::Error) -> Abort {
        Abort::Read(e)
    }
}

type PResult<T> = Result<T, Abort>;

pub struct Parser<R: BufRead> {
    scanner: Scanner<R>,
    diag: Rc<Diagnostics>,
    curr: Token,
    curr_line: Position,
    peek: Token,
    peek_line: Position,
}

impl<R: BufRead> Parser<R> {
    pub fn new(input: R, ctx: Rc<Context>, diag: Rc<Diagnostics>) -> Parser<R> {
        Parser {
            scanner: Scanner::new(input, ctx, diag.clone()),
            diag,
            // Nothing has been scanned yet.
            curr: Token::Eof,
            curr_line: 1,
            peek: Token::Eof,
            peek_line: 1,
        }
    }

    /// Parses the whole input.
    ///
    /// Statements that fail to parse are dropped after their error has been
    /// reported; the caller must check the diagnostics sink before
    /// evaluating the result.
    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, io::Error> {
        // Fill the curr/peek window.
        self.advance()?;
        self.advance()?;

        let mut prg = vec![];
        while self.curr != Token::Eof {
            match self.statement() {
                Ok(stmt) => prg.push(stmt),
                Err(Abort::Syntax) => (),
                Err(Abort::Read(e)) => return Err(e),
            }
            self.advance()?;
        }
        Ok(prg)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match self.curr {
            Token::Let => self.let_statement(),
            Token::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> PResult<Stmt> {
        let line = self.curr_line;
        let name = self.expect_identifier()?;
        self.expect_peek(Token::Equal)?;
        self.advance()?;
        let value = self.expression(Precedence::Lowest)?;
        self.skip_optional_semicolon()?;
        Ok(Stmt {
            line,
            kind: StmtKind::Let(name, Box::new(value)),
        })
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let line = self.curr_line;
        let value = if self.peek == Token::Semicolon {
            None
        } else {
            self.advance()?;
            Some(Box::new(self.expression(Precedence::Lowest)?))
        };
        self.skip_optional_semicolon()?;
        Ok(Stmt {
            line,
            kind: StmtKind::Return(value),
        })
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let line = self.curr_line;
        let expr = self.expression(Precedence::Lowest)?;
        self.skip_optional_semicolon()?;
        Ok(Stmt {
            line,
            kind: StmtKind::Expr(Box::new(expr)),
        })
    }

    fn expression(&mut self, precedence: Precedence) -> PResult<Expr> {
        let mut left = self.prefix()?;
        while self.peek != Token::Semicolon && precedence < Self::precedence_of(&self.peek) {
            self.advance()?;
            left = self.infix(left)?;
        }
        Ok(left)
    }

    /// Parses the expression form introduced by the current token.
    fn prefix(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        let kind = match self.curr.clone() {
            Token::Identifier(sym) => ExprKind::Ident(sym),
            Token::Number(n) => ExprKind::Number(n),
            Token::Str(s) => ExprKind::Str(s),
            Token::True => ExprKind::Bool(true),
            Token::False => ExprKind::Bool(false),
            Token::Bang => return self.prefix_operator(PrefixOp::Bang),
            Token::Minus => return self.prefix_operator(PrefixOp::Minus),
            Token::LeftParen => return self.grouped_expression(),
            Token::If => return self.if_expression(),
            Token::While => return self.while_expression(),
            Token::Fn => return self.function_literal(),
            Token::LeftBracket => return self.array_literal(),
            Token::LeftCurly => return self.hash_literal(),
            token => {
                return Err(self.error_at(
                    line,
                    &token,
                    &format!("no prefix parse function for {} found", token.type_str()),
                ))
            }
        };
        Ok(Expr { line, kind })
    }

    fn prefix_operator(&mut self, op: PrefixOp) -> PResult<Expr> {
        let line = self.curr_line;
        self.advance()?;
        let right = self.expression(Precedence::Prefix)?;
        Ok(Expr {
            line,
            kind: ExprKind::Prefix(op, Box::new(right)),
        })
    }

    /// Parses the operator continuation for the current token; `left` is the
    /// expression already parsed.
    fn infix(&mut self, left: Expr) -> PResult<Expr> {
        match self.curr {
            Token::LeftParen => self.call_expression(left),
            Token::LeftBracket => self.index_expression(left),
            Token::Equal => self.assign_expression(left),
            _ => self.binary_expression(left),
        }
    }

    fn binary_expression(&mut self, left: Expr) -> PResult<Expr> {
        let line = self.curr_line;
        let op = match self.curr {
            Token::Plus => InfixOp::Plus,
            Token::Minus => InfixOp::Minus,
            Token::Star => InfixOp::Star,
            Token::Slash => InfixOp::Slash,
            Token::Less => InfixOp::Less,
            Token::LessEqual => InfixOp::LessEqual,
            Token::Greater => InfixOp::Greater,
            Token::GreaterEqual => InfixOp::GreaterEqual,
            Token::EqualEqual => InfixOp::EqualEqual,
            Token::BangEqual => InfixOp::BangEqual,
            Token::And => InfixOp::And,
            Token::Or => InfixOp::Or,
            // The precedence table admits no other token here.
            _ => unreachable!("token without an infix rule"),
        };
        let precedence = Self::precedence_of(&self.curr);
        self.advance()?;
        let right = self.expression(precedence)?;
        Ok(Expr {
            line,
            kind: ExprKind::Infix(op, Box::new(left), Box::new(right)),
        })
    }

    fn assign_expression(&mut self, left: Expr) -> PResult<Expr> {
        let line = self.curr_line;
        let name = match left.kind {
            ExprKind::Ident(sym) => sym,
            _ => {
                let equal = self.curr.clone();
                return Err(self.error_at(line, &equal, "Invalid assignment target."));
            }
        };
        self.advance()?;
        // Parse the right side at the lowest power so `a = b = 1` nests to
        // the right.
        let value = self.expression(Precedence::Lowest)?;
        Ok(Expr {
            line,
            kind: ExprKind::Assign(name, Box::new(value)),
        })
    }

    fn grouped_expression(&mut self) -> PResult<Expr> {
        self.advance()?;
        let expr = self.expression(Precedence::Lowest)?;
        self.expect_peek(Token::RightParen)?;
        Ok(expr)
    }

    fn if_expression(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        self.expect_peek(Token::LeftParen)?;
        self.advance()?;
        let cond = self.expression(Precedence::Lowest)?;
        self.expect_peek(Token::RightParen)?;
        self.expect_peek(Token::LeftCurly)?;
        let then = self.block()?;
        let alt = if self.peek == Token::Else {
            self.advance()?;
            self.expect_peek(Token::LeftCurly)?;
            Some(self.block()?)
        } else {
            None
        };
        Ok(Expr {
            line,
            kind: ExprKind::If(Box::new(cond), then, alt),
        })
    }

    fn while_expression(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        self.expect_peek(Token::LeftParen)?;
        self.advance()?;
        let cond = self.expression(Precedence::Lowest)?;
        self.expect_peek(Token::RightParen)?;
        self.expect_peek(Token::LeftCurly)?;
        let body = self.block()?;
        Ok(Expr {
            line,
            kind: ExprKind::While(Box::new(cond), body),
        })
    }

    /// Parses a `{ ... }` statement list; the current token is the `{`.
    fn block(&mut self) -> PResult<Block> {
        let line = self.curr_line;
        self.advance()?;
        let mut stmts = vec![];
        while self.curr != Token::RightCurly && self.curr != Token::Eof {
            stmts.push(self.statement()?);
            self.advance()?;
        }
        Ok(Block { line, stmts })
    }

    fn function_literal(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        self.expect_peek(Token::LeftParen)?;
        let params = self.function_params()?;
        self.expect_peek(Token::LeftCurly)?;
        let body = self.block()?;
        Ok(Expr {
            line,
            kind: ExprKind::Function(params, Rc::new(body)),
        })
    }

    fn function_params(&mut self) -> PResult<Vec<Symbol>> {
        let mut params = vec![];
        if self.peek == Token::RightParen {
            self.advance()?;
            return Ok(params);
        }
        loop {
            params.push(self.expect_identifier()?);
            if self.peek != Token::Comma {
                break;
            }
            self.advance()?;
        }
        self.expect_peek(Token::RightParen)?;
        Ok(params)
    }

    fn call_expression(&mut self, callee: Expr) -> PResult<Expr> {
        let line = self.curr_line;
        let args = self.expression_list(Token::RightParen)?;
        Ok(Expr {
            line,
            kind: ExprKind::Call(Box::new(callee), args),
        })
    }

    fn index_expression(&mut self, left: Expr) -> PResult<Expr> {
        let line = self.curr_line;
        self.advance()?;
        let index = self.expression(Precedence::Lowest)?;
        self.expect_peek(Token::RightBracket)?;
        Ok(Expr {
            line,
            kind: ExprKind::Index(Box::new(left), Box::new(index)),
        })
    }

    fn array_literal(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        let elements = self.expression_list(Token::RightBracket)?;
        Ok(Expr {
            line,
            kind: ExprKind::Array(elements),
        })
    }

    /// Parses a comma-separated expression list up to `end`; the current
    /// token is the opening delimiter.
    fn expression_list(&mut self, end: Token) -> PResult<Vec<Expr>> {
        let mut list = vec![];
        if self.peek == end {
            self.advance()?;
            return Ok(list);
        }
        self.advance()?;
        list.push(self.expression(Precedence::Lowest)?);
        while self.peek == Token::Comma {
            self.advance()?;
            self.advance()?;
            list.push(self.expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;
        Ok(list)
    }

    fn hash_literal(&mut self) -> PResult<Expr> {
        let line = self.curr_line;
        let mut pairs = vec![];
        while self.peek != Token::RightCurly {
            self.advance()?;
            let key = self.expression(Precedence::Lowest)?;
            self.expect_peek(Token::Colon)?;
            self.advance()?;
            let value = self.expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if self.peek != Token::RightCurly {
                self.expect_peek(Token::Comma)?;
            }
        }
        self.expect_peek(Token::RightCurly)?;
        Ok(Expr {
            line,
            kind: ExprKind::Hash(pairs),
        })
    }

    fn skip_optional_semicolon(&mut self) -> PResult<()> {
        if self.peek == Token::Semicolon {
            self.advance()?;
        }
        Ok(())
    }

    fn expect_peek(&mut self, expected: Token) -> PResult<()> {
        if self.peek == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.peek_error(expected.type_str()))
        }
    }

    fn expect_identifier(&mut self) -> PResult<Symbol> {
        if let Token::Identifier(sym) = self.peek.clone() {
            self.advance()?;
            Ok(sym)
        } else {
            Err(self.peek_error("IDENTIFIER"))
        }
    }

    fn peek_error(&self, expected: &str) -> Abort {
        self.error_at(
            self.peek_line,
            &self.peek.clone(),
            &format!(
                "expected next token to be {}, got {} instead",
                expected,
                self.peek.type_str()
            ),
        )
    }

    fn error_at(&self, line: Position, token: &Token, message: &str) -> Abort {
        let locus = if *token == Token::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token)
        };
        self.diag.report(line, &locus, message);
        Abort::Syntax
    }

    fn precedence_of(token: &Token) -> Precedence {
        match token {
            Token::Equal => Precedence::Assign,
            Token::And | Token::Or => Precedence::AndOr,
            Token::EqualEqual | Token::BangEqual => Precedence::Equals,
            Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => {
                Precedence::LessGreater
            }
            Token::Plus | Token::Minus => Precedence::Sum,
            Token::Star | Token::Slash => Precedence::Product,
            Token::LeftParen => Precedence::Call,
            Token::LeftBracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }

    fn advance(&mut self) -> Result<(), io::Error> {
        let (line, token) = self.scanner.get_token()?;
        self.curr = mem::replace(&mut self.peek, token);
        self.curr_line = self.peek_line;
        self.peek_line = line;
        Ok(())
    }
}

impl<R: BufRead> std::fmt::Debug for Parser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("curr", &self.curr)
            .field("peek", &self.peek)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with(
        ctx: Rc<Context>,
        diag: Rc<Diagnostics>,
        input: &str,
    ) -> Result<Vec<Stmt>, io::Error> {
        let mut parser = Parser::new(input.as_bytes(), ctx, diag);
        parser.parse_program()
    }

    /// Parses `input`, asserting it is error-free.
    fn parse_prg(ctx: Rc<Context>, input: &str) -> Vec<Stmt> {
        let diag = Diagnostics::new();
        let prg = parse_with(ctx, diag.clone(), input).expect("read error");
        assert_eq!(diag.messages(), Vec::<String>::new());
        prg
    }

    /// Parses `input` as a single expression statement.
    fn parse_expr(ctx: Rc<Context>, input: &str) -> Expr {
        let prg = parse_prg(ctx, input);
        assert_eq!(prg.len(), 1, "expected a single statement: {:?}", prg);
        match prg.into_iter().next().unwrap().kind {
            StmtKind::Expr(e) => *e,
            s => panic!("expected expression statement, got {:?}", s),
        }
    }

    /// Parses `input` and returns the reported messages.
    fn parse_errors(input: &str) -> Vec<String> {
        let diag = Diagnostics::new();
        parse_with(Context::new(), diag.clone(), input).expect("read error");
        diag.messages()
    }

    fn expr(kind: ExprKind) -> Expr {
        Expr { line: 1, kind }
    }

    fn num(n: f64) -> Expr {
        expr(ExprKind::Number(n))
    }

    fn infix(op: InfixOp, left: Expr, right: Expr) -> Expr {
        expr(ExprKind::Infix(op, Box::new(left), Box::new(right)))
    }

    #[test]
    fn literal_expressions() {
        let ctx = Context::new();
        assert_eq!(parse_expr(ctx.clone(), "42;"), num(42.0));
        assert_eq!(parse_expr(ctx.clone(), "true;"), expr(ExprKind::Bool(true)));
        assert_eq!(
            parse_expr(ctx.clone(), "\"hi\";"),
            expr(ExprKind::Str("hi".to_string()))
        );
        assert_eq!(
            parse_expr(ctx.clone(), "foo;"),
            expr(ExprKind::Ident(ctx.symbol("foo")))
        );
    }

    #[test]
    fn semicolon_is_optional() {
        let ctx = Context::new();
        assert_eq!(parse_expr(ctx, "42"), num(42.0));
    }

    #[test]
    fn prefix_operators() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "!true;"),
            expr(ExprKind::Prefix(
                PrefixOp::Bang,
                Box::new(expr(ExprKind::Bool(true)))
            ))
        );
        assert_eq!(
            parse_expr(ctx, "--42;"),
            expr(ExprKind::Prefix(
                PrefixOp::Minus,
                Box::new(expr(ExprKind::Prefix(PrefixOp::Minus, Box::new(num(42.0)))))
            ))
        );
    }

    #[test]
    fn products_bind_tighter_than_sums() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx, "1 + 2 * 3;"),
            infix(InfixOp::Plus, num(1.0), infix(InfixOp::Star, num(2.0), num(3.0)))
        );
    }

    #[test]
    fn sums_are_left_associative() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx, "1 + 2 + 3;"),
            infix(InfixOp::Plus, infix(InfixOp::Plus, num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn grouping_overrides_precedence() {
        let ctx = Context::new();
        // Grouping produces no wrapper node.
        assert_eq!(
            parse_expr(ctx, "(1 + 2) * 3;"),
            infix(InfixOp::Star, infix(InfixOp::Plus, num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn comparison_operators_parse_as_infix() {
        let ctx = Context::new();
        for (src, op) in [
            ("1 < 2;", InfixOp::Less),
            ("1 <= 2;", InfixOp::LessEqual),
            ("1 > 2;", InfixOp::Greater),
            ("1 >= 2;", InfixOp::GreaterEqual),
            ("1 == 2;", InfixOp::EqualEqual),
            ("1 != 2;", InfixOp::BangEqual),
        ] {
            assert_eq!(parse_expr(ctx.clone(), src), infix(op, num(1.0), num(2.0)));
        }
    }

    #[test]
    fn and_or_bind_below_equality() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx, "1 == 2 and 3 != 4;"),
            infix(
                InfixOp::And,
                infix(InfixOp::EqualEqual, num(1.0), num(2.0)),
                infix(InfixOp::BangEqual, num(3.0), num(4.0))
            )
        );
    }

    #[test]
    fn let_statement() {
        let ctx = Context::new();
        assert_eq!(
            parse_prg(ctx.clone(), "let answer = 6 * 7;"),
            vec![Stmt {
                line: 1,
                kind: StmtKind::Let(
                    ctx.symbol("answer"),
                    Box::new(infix(InfixOp::Star, num(6.0), num(7.0)))
                ),
            }]
        );
    }

    #[test]
    fn return_statements() {
        let ctx = Context::new();
        assert_eq!(
            parse_prg(ctx.clone(), "return;"),
            vec![Stmt {
                line: 1,
                kind: StmtKind::Return(None),
            }]
        );
        assert_eq!(
            parse_prg(ctx, "return false;"),
            vec![Stmt {
                line: 1,
                kind: StmtKind::Return(Some(Box::new(expr(ExprKind::Bool(false))))),
            }]
        );
    }

    #[test]
    fn assignment_expression() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "a = 1;"),
            expr(ExprKind::Assign(ctx.symbol("a"), Box::new(num(1.0))))
        );
    }

    #[test]
    fn assignment_nests_to_the_right() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "a = b = 1;"),
            expr(ExprKind::Assign(
                ctx.symbol("a"),
                Box::new(expr(ExprKind::Assign(ctx.symbol("b"), Box::new(num(1.0)))))
            ))
        );
    }

    #[test]
    fn assignment_requires_an_identifier_target() {
        assert_eq!(
            parse_errors("1 + a = b;"),
            vec!["[line 1] Error at '=': Invalid assignment target.".to_string()]
        );
    }

    #[test]
    fn if_expression() {
        let ctx = Context::new();
        let parsed = parse_expr(ctx.clone(), "if (x < y) { x } else { y };");
        match parsed.kind {
            ExprKind::If(cond, then, Some(alt)) => {
                assert_eq!(
                    *cond,
                    infix(
                        InfixOp::Less,
                        expr(ExprKind::Ident(ctx.symbol("x"))),
                        expr(ExprKind::Ident(ctx.symbol("y")))
                    )
                );
                assert_eq!(then.stmts.len(), 1);
                assert_eq!(alt.stmts.len(), 1);
            }
            k => panic!("expected if expression, got {:?}", k),
        }
    }

    #[test]
    fn if_without_else() {
        let ctx = Context::new();
        match parse_expr(ctx, "if (true) { 1 };").kind {
            ExprKind::If(_, _, None) => (),
            k => panic!("expected if without else, got {:?}", k),
        }
    }

    #[test]
    fn while_expression() {
        let ctx = Context::new();
        match parse_expr(ctx.clone(), "while (i < 5) { i = i + 1; };").kind {
            ExprKind::While(cond, body) => {
                assert_eq!(
                    *cond,
                    infix(
                        InfixOp::Less,
                        expr(ExprKind::Ident(ctx.symbol("i"))),
                        num(5.0)
                    )
                );
                assert_eq!(body.stmts.len(), 1);
            }
            k => panic!("expected while expression, got {:?}", k),
        }
    }

    #[test]
    fn function_literal() {
        let ctx = Context::new();
        match parse_expr(ctx.clone(), "fn(x, y) { x + y; };").kind {
            ExprKind::Function(params, body) => {
                assert_eq!(params, vec![ctx.symbol("x"), ctx.symbol("y")]);
                assert_eq!(body.stmts.len(), 1);
            }
            k => panic!("expected function literal, got {:?}", k),
        }
    }

    #[test]
    fn function_literal_without_params() {
        let ctx = Context::new();
        match parse_expr(ctx, "fn() { 1 };").kind {
            ExprKind::Function(params, _) => assert!(params.is_empty()),
            k => panic!("expected function literal, got {:?}", k),
        }
    }

    #[test]
    fn function_params_must_be_identifiers() {
        // Later cascade errors may follow; the first one is the real report.
        assert_eq!(
            parse_errors("fn(1) { 1 };")[0],
            "[line 1] Error at '1': expected next token to be IDENTIFIER, got NUMBER instead"
        );
    }

    #[test]
    fn call_expression() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "add(1, 2 * 3);"),
            expr(ExprKind::Call(
                Box::new(expr(ExprKind::Ident(ctx.symbol("add")))),
                vec![num(1.0), infix(InfixOp::Star, num(2.0), num(3.0))]
            ))
        );
    }

    #[test]
    fn call_without_arguments() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "f();"),
            expr(ExprKind::Call(
                Box::new(expr(ExprKind::Ident(ctx.symbol("f")))),
                vec![]
            ))
        );
    }

    #[test]
    fn array_literal() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "[1, 2 * 2, \"three\"];"),
            expr(ExprKind::Array(vec![
                num(1.0),
                infix(InfixOp::Star, num(2.0), num(2.0)),
                expr(ExprKind::Str("three".to_string())),
            ]))
        );
        assert_eq!(parse_expr(ctx, "[];"), expr(ExprKind::Array(vec![])));
    }

    #[test]
    fn index_binds_tighter_than_product() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "2 * a[0];"),
            infix(
                InfixOp::Star,
                num(2.0),
                expr(ExprKind::Index(
                    Box::new(expr(ExprKind::Ident(ctx.symbol("a")))),
                    Box::new(num(0.0))
                ))
            )
        );
    }

    #[test]
    fn hash_literal() {
        let ctx = Context::new();
        assert_eq!(
            parse_expr(ctx.clone(), "{\"one\": 1, \"two\": 2};"),
            expr(ExprKind::Hash(vec![
                (expr(ExprKind::Str("one".to_string())), num(1.0)),
                (expr(ExprKind::Str("two".to_string())), num(2.0)),
            ]))
        );
    }

    #[test]
    fn empty_hash_and_trailing_comma() {
        let ctx = Context::new();
        assert_eq!(parse_expr(ctx.clone(), "{};"), expr(ExprKind::Hash(vec![])));
        assert_eq!(
            parse_expr(ctx, "{1: 2,};"),
            expr(ExprKind::Hash(vec![(num(1.0), num(2.0))]))
        );
    }

    #[test]
    fn missing_token_is_reported_with_lexeme() {
        assert_eq!(
            parse_errors("let = 5;"),
            vec![
                "[line 1] Error at '=': expected next token to be IDENTIFIER, got = instead"
                    .to_string(),
                // The parser restarts at `=`, which has no prefix rule.
                "[line 1] Error at '=': no prefix parse function for = found".to_string(),
            ]
        );
    }

    #[test]
    fn missing_token_at_end_of_input() {
        assert_eq!(
            parse_errors("(1"),
            vec!["[line 1] Error at end: expected next token to be ), got EOF instead".to_string()]
        );
    }

    #[test]
    fn parsing_continues_after_a_bad_statement() {
        let ctx = Context::new();
        let diag = Diagnostics::new();
        let prg = parse_with(ctx.clone(), diag.clone(), "let 5; let y = 2;").expect("read error");
        assert!(diag.had_error());
        assert!(prg.iter().any(|s| matches!(
            &s.kind,
            StmtKind::Let(name, _) if *name == ctx.symbol("y")
        )));
    }

    #[test]
    fn nodes_carry_their_source_line() {
        let ctx = Context::new();
        let prg = parse_prg(ctx, "1;\n2;\nlet x = 3;");
        assert_eq!(prg.iter().map(|s| s.line).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn parse_is_deterministic() {
        let ctx = Context::new();
        let src = "let f = fn(x) { if (x > 0) { x } else { 0 - x } }; f(3);";
        assert_eq!(parse_prg(ctx.clone(), src), parse_prg(ctx, src));
    }
}
