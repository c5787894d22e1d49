//! Byte-level scanner shared by the tokenizer and the comment stripper.
//!
//! The scanner classifies the input into lexemes (whitespace, comments and
//! tokens) in one left-to-right pass. Quoted strings are consumed whole, so
//! comment markers inside them are never seen.

use super::{TokenKind, is_keyword};
use crate::error::LexError;

/// Class of a scanned span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexemeClass {
    Whitespace,
    Comment,
    Token(TokenKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lexeme {
    pub class: LexemeClass,
    pub start: usize,
    pub end: usize,
}

/// Two-character operators, longest-match first.
const TWO_CHAR_OPS: &[&str] = &[
    ":=", "=>", "<>", "!=", "^=", "~=", "<=", ">=", "||", "..", "<<", ">>", "**",
];

pub(crate) struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    /// Scan the next lexeme. `None` at end of input.
    pub fn next_lexeme(&mut self) -> Option<Result<Lexeme, LexError>> {
        let start = self.pos;
        let b = self.peek(0)?;

        let class = if b.is_ascii_whitespace() {
            while self.peek(0).is_some_and(|c| c.is_ascii_whitespace()) {
                self.pos += 1;
            }
            LexemeClass::Whitespace
        } else if b == b'-' && self.peek(1) == Some(b'-') {
            while self.peek(0).is_some_and(|c| c != b'\n') {
                self.pos += 1;
            }
            LexemeClass::Comment
        } else if b == b'/' && self.peek(1) == Some(b'*') {
            // Block comments do not nest: the first `*/` closes.
            match self.src[start + 2..].find("*/") {
                Some(rel) => self.pos = start + 2 + rel + 2,
                None => return Some(Err(LexError::unterminated_comment(self.src, start))),
            }
            LexemeClass::Comment
        } else if b == b'\'' {
            self.pos += 1;
            if let Err(e) = self.quoted(b'\'', start) {
                return Some(Err(e));
            }
            LexemeClass::Token(TokenKind::StringLiteral)
        } else if matches!(b, b'q' | b'Q') && self.peek(1) == Some(b'\'') && self.peek(2).is_some()
        {
            if let Err(e) = self.alternative_quoted(start) {
                return Some(Err(e));
            }
            LexemeClass::Token(TokenKind::StringLiteral)
        } else if matches!(b, b'n' | b'N') && self.peek(1) == Some(b'\'') {
            self.pos += 2;
            if let Err(e) = self.quoted(b'\'', start) {
                return Some(Err(e));
            }
            LexemeClass::Token(TokenKind::StringLiteral)
        } else if b == b'"' {
            self.pos += 1;
            if let Err(e) = self.quoted(b'"', start) {
                return Some(Err(e));
            }
            LexemeClass::Token(TokenKind::Identifier)
        } else if b.is_ascii_digit() || (b == b'.' && self.peek(1).is_some_and(|c| c.is_ascii_digit()))
        {
            self.number();
            LexemeClass::Token(TokenKind::NumericLiteral)
        } else if is_ident_start(b) {
            self.identifier();
            let kind = if is_keyword(&self.src[start..self.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            LexemeClass::Token(kind)
        } else if b == b':' && self.peek(1).is_some_and(is_ident_start) {
            self.pos += 1;
            self.identifier();
            while self.peek(0) == Some(b'.') && self.peek(1).is_some_and(is_ident_start) {
                self.pos += 1;
                self.identifier();
            }
            LexemeClass::Token(TokenKind::BindVariable)
        } else if matches!(b, b'(' | b')' | b',' | b';' | b'.')
            && !self.src[start..].starts_with("..")
        {
            self.pos += 1;
            LexemeClass::Token(TokenKind::Punctuation)
        } else {
            let rest = &self.src[start..];
            match TWO_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
                Some(op) => self.pos += op.len(),
                None => self.pos += utf8_len(b),
            }
            LexemeClass::Token(TokenKind::Operator)
        };

        Some(Ok(Lexeme {
            class,
            start,
            end: self.pos,
        }))
    }

    /// Consume a `delim`-quoted body; the opening delimiter is already consumed.
    /// A doubled delimiter is a literal and keeps the scanner inside the string.
    fn quoted(&mut self, delim: u8, start: usize) -> Result<(), LexError> {
        loop {
            match self.peek(0) {
                None => return Err(LexError::unterminated_string(self.src, start)),
                Some(c) if c == delim => {
                    if self.peek(1) == Some(delim) {
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Oracle `q'[...]'` quoting: closes at the matching delimiter followed by `'`.
    fn alternative_quoted(&mut self, start: usize) -> Result<(), LexError> {
        let open = self.bytes[start + 2];
        let close = match open {
            b'[' => b']',
            b'{' => b'}',
            b'(' => b')',
            b'<' => b'>',
            other => other,
        };
        self.pos = start + 3;
        loop {
            match self.peek(0) {
                None => return Err(LexError::unterminated_string(self.src, start)),
                Some(c) if c == close && self.peek(1) == Some(b'\'') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn identifier(&mut self) {
        while self.peek(0).is_some_and(is_ident_part) {
            self.pos += 1;
        }
    }

    fn number(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        // `1..10` is a range, not a decimal point.
        if self.peek(0) == Some(b'.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let digits_at = if matches!(self.peek(1), Some(b'+' | b'-')) { 2 } else { 1 };
            if self.peek(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digits_at;
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
    }
}

/// Non-ASCII bytes count as identifier characters so multi-byte
/// sequences are never split.
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'#') || b >= 0x80
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
