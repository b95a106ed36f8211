//! Tokenizer for G source text.

use std::fmt;

use crate::error::GError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    Comma,
    At,
    Dot,
    Colon,
    /// The `"` message operator, emitted only in send-target position;
    /// string literals are lexed whole as `TokenKind::String`.
    Quote,
    ObjRef(String),
    String(String),
    Number(f64),
    Symbol(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// True immediately after lexing an `ObjRef`, `RBracket` or `Symbol` in
    /// callee/ref position, so the next `"` is read as a send operator
    /// rather than opening a string literal.
    prev_was_ref_like: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            prev_was_ref_like: false,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, GError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, GError> {
        let before = self.pos;
        self.skip_whitespace_and_comments();
        if self.pos != before {
            // Whitespace breaks the adjacency the send operator requires.
            self.prev_was_ref_like = false;
        }
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let (kind, was_ref_like) = match b {
            b'[' => {
                self.advance();
                (TokenKind::LBracket, false)
            }
            b']' => {
                self.advance();
                (TokenKind::RBracket, true)
            }
            b',' => {
                self.advance();
                (TokenKind::Comma, false)
            }
            b'@' => {
                self.advance();
                (TokenKind::At, false)
            }
            b'.' => {
                self.advance();
                (TokenKind::Dot, false)
            }
            b':' => {
                self.advance();
                (TokenKind::Colon, false)
            }
            b'"' => {
                if self.prev_was_ref_like {
                    // The operator and the string's opening quote are the
                    // same character: emit a zero-width Quote token here and
                    // leave the quote itself for the next call to lex as the
                    // start of the payload string literal.
                    (TokenKind::Quote, false)
                } else {
                    let s = self.lex_string(start)?;
                    (TokenKind::String(s), false)
                }
            }
            b'#' => {
                let s = self.lex_objref();
                (TokenKind::ObjRef(s), true)
            }
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                let n = self.lex_number()?;
                (TokenKind::Number(n), false)
            }
            _ if b.is_ascii_digit() => {
                let n = self.lex_number()?;
                (TokenKind::Number(n), false)
            }
            _ if is_symbol_start(b) => {
                let s = self.lex_symbol();
                (TokenKind::Symbol(s), true)
            }
            _ => {
                return Err(GError::parse_failure(
                    format!("unexpected character {:?}", b as char),
                    Span::new(start, start + 1),
                ));
            }
        };

        self.prev_was_ref_like = was_ref_like;
        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }

    fn lex_string(&mut self, start: usize) -> Result<String, GError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(GError::parse_failure(
                        "unterminated string literal",
                        Span::new(start, self.pos),
                    ));
                }
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(other) => out.push(other as char),
                    None => {
                        return Err(GError::parse_failure(
                            "unterminated escape sequence",
                            Span::new(start, self.pos),
                        ));
                    }
                },
                Some(b) => out.push(b as char),
            }
        }
        Ok(out)
    }

    fn lex_objref(&mut self) -> String {
        let start = self.pos;
        self.advance(); // '#'
        let mut colons = 0;
        while let Some(b) = self.peek() {
            if b == b':' && colons == 0 {
                colons += 1;
                self.pos += 1;
            } else if is_objref_char(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn lex_number(&mut self) -> Result<f64, GError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.pos];
        text.parse::<f64>().map_err(|_| {
            GError::parse_failure(format!("invalid number literal {text:?}"), Span::new(start, self.pos))
        })
    }

    fn lex_symbol(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_symbol_char) {
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }
}

fn is_symbol_start(b: u8) -> bool {
    !b.is_ascii_digit() && is_symbol_char(b)
}

fn is_symbol_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'_' | b'-' | b'+' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'!' | b'?' | b'^' | b'&'
        )
}

fn is_objref_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::At => write!(f, "@"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Quote => write!(f, "\""),
            TokenKind::ObjRef(s) => write!(f, "{s}"),
            TokenKind::String(s) => write!(f, "{s:?}"),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Symbol(s) => write!(f, "{s}"),
            TokenKind::Eof => write!(f, "<eof>"),
        }
    }
}
