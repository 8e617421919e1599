//! Lexical analyzer.

use std::collections::VecDeque;
use std::io;
use std::io::prelude::*;
use std::io::Bytes;
use std::rc::Rc;

use crate::ctx::Context;
use crate::diag::{Diagnostics, Position};
use crate::token::Token;

/// Turns a sequence of bytes into a sequence of tokens.
///
/// The scan is byte-based: every lexeme class is ASCII, so bytes are matched
/// directly and only string literals may carry non-ASCII content.  A string
/// literal's bytes are collected first and validated as UTF-8 once, at the
/// closing quote; a non-ASCII byte anywhere else is an ordinary bad
/// character.
///
/// Lexical errors (bad characters, unterminated strings) are recorded in the
/// shared [`Diagnostics`] sink and scanning continues without emitting a
/// token; host read errors and invalid UTF-8 abort via `Result`.  After the
/// end of input every call yields [`Token::Eof`].
pub struct Scanner<R: BufRead> {
    input: Bytes<R>,

    // Lookahead buffer.  Two slots: deciding whether `.` after digits starts
    // a fractional part needs the byte after the dot.
    pending: VecDeque<u8>,

    line: Position,
    ctx: Rc<Context>,
    diag: Rc<Diagnostics>,

    // Buffers used when scanning longer tokens.  Allocated here to reuse
    // memory: `buf` for identifiers and numbers (always ASCII), `str_buf`
    // for string literal bytes awaiting UTF-8 validation.
    buf: String,
    str_buf: Vec<u8>,
}

impl<R: BufRead> Scanner<R> {
    /// Creates a new scanner operating on `input`.
    pub fn new(input: R, ctx: Rc<Context>, diag: Rc<Diagnostics>) -> Scanner<R> {
        Scanner {
            input: input.bytes(),
            pending: VecDeque::new(),
            line: 1,
            ctx,
            diag,
            buf: String::new(),
            str_buf: Vec::new(),
        }
    }

    /// Scans the next token and returns it together with the line it ends on.
    pub fn get_token(&mut self) -> Result<(Position, Token), io::Error> {
        loop {
            let b = match self.advance()? {
                None => return Ok((self.line, Token::Eof)),
                Some(b) => b,
            };
            let token = match b {
                b'\n' => {
                    self.line += 1;
                    continue;
                }
                b' ' | b'\t' | b'\r' => continue,
                b'(' => Token::LeftParen,
                b')' => Token::RightParen,
                b'{' => Token::LeftCurly,
                b'}' => Token::RightCurly,
                b'[' => Token::LeftBracket,
                b']' => Token::RightBracket,
                b',' => Token::Comma,
                b'.' => Token::Dot,
                b'-' => Token::Minus,
                b'+' => Token::Plus,
                b';' => Token::Semicolon,
                b':' => Token::Colon,
                b'*' => Token::Star,
                b'/' => {
                    if self.match_next(b'/')? {
                        self.skip_comment()?;
                        continue;
                    }
                    Token::Slash
                }
                b'!' => {
                    if self.match_next(b'=')? {
                        Token::BangEqual
                    } else {
                        Token::Bang
                    }
                }
                b'=' => {
                    if self.match_next(b'=')? {
                        Token::EqualEqual
                    } else {
                        Token::Equal
                    }
                }
                b'<' => {
                    if self.match_next(b'=')? {
                        Token::LessEqual
                    } else {
                        Token::Less
                    }
                }
                b'>' => {
                    if self.match_next(b'=')? {
                        Token::GreaterEqual
                    } else {
                        Token::Greater
                    }
                }
                b'"' => match self.scan_string()? {
                    Some(token) => token,
                    None => continue,
                },
                b'0'..=b'9' => match self.scan_number(b)? {
                    Some(token) => token,
                    None => continue,
                },
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(b)?,
                _ => {
                    self.diag.error(self.line, "Unexpected character.");
                    continue;
                }
            };
            return Ok((self.line, token));
        }
    }

    /// Scans the remainder of a string literal; the opening quote has been
    /// consumed.  The payload is everything between the quotes, which may
    /// span lines; its bytes are validated as UTF-8 in one pass at the end.
    fn scan_string(&mut self) -> Result<Option<Token>, io::Error> {
        self.str_buf.clear();
        loop {
            match self.advance()? {
                None => {
                    self.diag.error(self.line, "Unterminated string.");
                    return Ok(None);
                }
                Some(b'"') => break,
                Some(b) => {
                    if b == b'\n' {
                        self.line += 1;
                    }
                    self.str_buf.push(b);
                }
            }
        }
        match std::str::from_utf8(&self.str_buf) {
            Ok(s) => Ok(Some(Token::Str(s.to_string()))),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "string literal is not valid UTF-8",
            )),
        }
    }

    /// Scans a number literal: digits with an optional `.`-plus-digits
    /// fraction.  A dot not followed by a digit is left for the next token.
    fn scan_number(&mut self, first_digit: u8) -> Result<Option<Token>, io::Error> {
        self.buf.clear();
        self.buf.push(first_digit as char);
        while let Some(b) = self.peek()? {
            if !b.is_ascii_digit() {
                break;
            }
            self.buf.push(b as char);
            self.advance()?;
        }
        if self.peek()? == Some(b'.') && self.peek_next()?.is_some_and(|b| b.is_ascii_digit()) {
            self.buf.push('.');
            self.advance()?;
            while let Some(b) = self.peek()? {
                if !b.is_ascii_digit() {
                    break;
                }
                self.buf.push(b as char);
                self.advance()?;
            }
        }

        match self.buf.parse::<f64>() {
            Ok(n) => Ok(Some(Token::Number(n))),
            Err(_) => {
                self.diag.error(self.line, "Unable to parse number.");
                Ok(None)
            }
        }
    }

    fn scan_identifier(&mut self, first_byte: u8) -> Result<Token, io::Error> {
        self.buf.clear();
        self.buf.push(first_byte as char);
        while let Some(b) = self.peek()? {
            if !(b.is_ascii_alphanumeric() || b == b'_') {
                break;
            }
            self.buf.push(b as char);
            self.advance()?;
        }

        let sym = self.ctx.symbol(&self.buf);
        if let Some(token) = self.ctx.keyword(&sym) {
            Ok(token)
        } else {
            Ok(Token::Identifier(sym))
        }
    }

    fn skip_comment(&mut self) -> Result<(), io::Error> {
        while let Some(b) = self.peek()? {
            if b == b'\n' {
                break;
            }
            self.advance()?;
        }
        Ok(())
    }

    /// Consumes the next byte if it equals `expected`.
    fn match_next(&mut self, expected: u8) -> Result<bool, io::Error> {
        if self.peek()? == Some(expected) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn fill(&mut self, n: usize) -> Result<(), io::Error> {
        while self.pending.len() < n {
            match self.input.next() {
                Some(b) => self.pending.push_back(b?),
                None => break,
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>, io::Error> {
        self.fill(1)?;
        Ok(self.pending.front().copied())
    }

    fn peek_next(&mut self) -> Result<Option<u8>, io::Error> {
        self.fill(2)?;
        Ok(self.pending.get(1).copied())
    }

    fn advance(&mut self) -> Result<Option<u8>, io::Error> {
        self.fill(1)?;
        Ok(self.pending.pop_front())
    }
}

impl<R: BufRead> Iterator for Scanner<R> {
    type Item = Result<Token, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_token() {
            Ok((_, Token::Eof)) => None,
            Ok((_, t)) => Some(Ok(t)),
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: BufRead> std::fmt::Debug for Scanner<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").field("line", &self.line).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn scan(input: &str) -> Result<Vec<Token>, io::Error> {
        let ctx = Context::new();
        scan_with(input, ctx, Diagnostics::new())
    }

    fn scan_with(
        input: &str,
        ctx: Rc<Context>,
        diag: Rc<Diagnostics>,
    ) -> Result<Vec<Token>, io::Error> {
        let s = Scanner::new(BufReader::new(input.as_bytes()), ctx, diag);
        s.collect()
    }

    #[test]
    fn scan_single_token() -> Result<(), io::Error> {
        assert_eq!(scan("+")?, vec![Token::Plus]);
        Ok(())
    }

    #[test]
    fn fixed_tokens() -> Result<(), io::Error> {
        assert_eq!(
            scan("+-*/()[]{},.;: = == != ! < <= > >=")?,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::LeftParen,
                Token::RightParen,
                Token::LeftBracket,
                Token::RightBracket,
                Token::LeftCurly,
                Token::RightCurly,
                Token::Comma,
                Token::Dot,
                Token::Semicolon,
                Token::Colon,
                Token::Equal,
                Token::EqualEqual,
                Token::BangEqual,
                Token::Bang,
                Token::Less,
                Token::LessEqual,
                Token::Greater,
                Token::GreaterEqual,
            ]
        );
        Ok(())
    }

    #[test]
    fn blanks_are_ignored() -> Result<(), io::Error> {
        assert_eq!(scan(" \t\r\n+")?, vec![Token::Plus]);
        Ok(())
    }

    #[test]
    fn comments_are_ignored() -> Result<(), io::Error> {
        assert_eq!(
            scan("true // false\nfalse")?,
            vec![Token::True, Token::False]
        );
        Ok(())
    }

    #[test]
    fn numbers() -> Result<(), io::Error> {
        assert_eq!(scan("1")?, vec![Token::Number(1.0)]);
        assert_eq!(scan("42")?, vec![Token::Number(42.0)]);
        assert_eq!(scan("4.2")?, vec![Token::Number(4.2)]);
        Ok(())
    }

    #[test]
    fn fraction_requires_a_digit() -> Result<(), io::Error> {
        // `1.` is a number followed by a dot, not a malformed float.
        assert_eq!(scan("1.")?, vec![Token::Number(1.0), Token::Dot]);
        let ctx = Context::new();
        assert_eq!(
            scan_with("1.foo", ctx.clone(), Diagnostics::new())?,
            vec![
                Token::Number(1.0),
                Token::Dot,
                Token::Identifier(ctx.symbol("foo")),
            ]
        );
        Ok(())
    }

    #[test]
    fn scan_several_tokens_without_blanks() -> Result<(), io::Error> {
        assert_eq!(
            scan("42+24")?,
            vec![Token::Number(42.0), Token::Plus, Token::Number(24.0)]
        );
        Ok(())
    }

    #[test]
    fn scanner_keeps_track_of_lines() -> Result<(), io::Error> {
        let ctx = Context::new();
        let mut s = Scanner::new(
            BufReader::new("1\n2 3\n4".as_bytes()),
            ctx,
            Diagnostics::new(),
        );
        assert_eq!(s.get_token()?, (1, Token::Number(1.0)));
        assert_eq!(s.get_token()?, (2, Token::Number(2.0)));
        assert_eq!(s.get_token()?, (2, Token::Number(3.0)));
        assert_eq!(s.get_token()?, (3, Token::Number(4.0)));
        assert_eq!(s.get_token()?, (3, Token::Eof));
        Ok(())
    }

    #[test]
    fn identifiers() -> Result<(), io::Error> {
        let ctx = Context::new();
        assert_eq!(
            scan_with("f foo _foo t42", ctx.clone(), Diagnostics::new())?,
            vec![
                Token::Identifier(ctx.symbol("f")),
                Token::Identifier(ctx.symbol("foo")),
                Token::Identifier(ctx.symbol("_foo")),
                Token::Identifier(ctx.symbol("t42"))
            ]
        );
        Ok(())
    }

    #[test]
    fn keywords() -> Result<(), io::Error> {
        assert_eq!(
            scan("and struct else false for fn if nil or return super this true let while")?,
            vec![
                Token::And,
                Token::Struct,
                Token::Else,
                Token::False,
                Token::For,
                Token::Fn,
                Token::If,
                Token::Nil,
                Token::Or,
                Token::Return,
                Token::Super,
                Token::This,
                Token::True,
                Token::Let,
                Token::While,
            ]
        );
        Ok(())
    }

    #[test]
    fn string_literal() -> Result<(), io::Error> {
        assert_eq!(
            scan(r#""hello world""#)?,
            vec![Token::Str("hello world".to_string())]
        );
        assert_eq!(scan(r#""""#)?, vec![Token::Str(String::new())]);
        Ok(())
    }

    #[test]
    fn string_may_contain_multi_byte_characters() -> Result<(), io::Error> {
        assert_eq!(scan("\"héllo ∏\"")?, vec![Token::Str("héllo ∏".to_string())]);
        Ok(())
    }

    #[test]
    fn string_with_invalid_utf8_is_a_read_error() {
        // 0xff can never appear in well-formed UTF-8.
        let input: &[u8] = b"\"a\xffb\"";
        let mut s = Scanner::new(BufReader::new(input), Context::new(), Diagnostics::new());
        match s.get_token() {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn string_may_span_lines() -> Result<(), io::Error> {
        let ctx = Context::new();
        let mut s = Scanner::new(
            BufReader::new("\"a\nb\" 1".as_bytes()),
            ctx,
            Diagnostics::new(),
        );
        assert_eq!(s.get_token()?, (2, Token::Str("a\nb".to_string())));
        assert_eq!(s.get_token()?, (2, Token::Number(1.0)));
        Ok(())
    }

    #[test]
    fn unterminated_string_is_reported() -> Result<(), io::Error> {
        let diag = Diagnostics::new();
        let tokens = scan_with("\"oops", Context::new(), diag.clone())?;
        assert!(tokens.is_empty());
        assert_eq!(
            diag.messages(),
            vec!["[line 1] Error: Unterminated string.".to_string()]
        );
        Ok(())
    }

    #[test]
    fn unexpected_character_is_reported_and_skipped() -> Result<(), io::Error> {
        let diag = Diagnostics::new();
        let tokens = scan_with("1 @ 2", Context::new(), diag.clone())?;
        assert_eq!(tokens, vec![Token::Number(1.0), Token::Number(2.0)]);
        assert_eq!(
            diag.messages(),
            vec!["[line 1] Error: Unexpected character.".to_string()]
        );
        Ok(())
    }

    #[test]
    fn non_ascii_outside_strings_is_reported_per_byte() -> Result<(), io::Error> {
        let diag = Diagnostics::new();
        // `π` is two bytes, neither of which starts a token.
        let tokens = scan_with("π", Context::new(), diag.clone())?;
        assert!(tokens.is_empty());
        assert_eq!(diag.messages().len(), 2);
        Ok(())
    }

    #[test]
    fn scanning_is_deterministic() -> Result<(), io::Error> {
        let ctx = Context::new();
        let src = "let x = 1.5; while (x <= 2) { puts(\"hi\"); } // done";
        assert_eq!(
            scan_with(src, ctx.clone(), Diagnostics::new())?,
            scan_with(src, ctx, Diagnostics::new())?
        );
        Ok(())
    }

    #[test]
    fn eof_is_sticky() -> Result<(), io::Error> {
        let ctx = Context::new();
        let mut s = Scanner::new(BufReader::new("".as_bytes()), ctx, Diagnostics::new());
        assert_eq!(s.get_token()?, (1, Token::Eof));
        assert_eq!(s.get_token()?, (1, Token::Eof));
        Ok(())
    }
}
