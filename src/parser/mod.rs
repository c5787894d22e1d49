//! Trigger parser.
//!
//! ```text
//! tokens → header → sections ─┬─ declarations
//!                              ├─ statements (recursive)
//!                              └─ handlers
//! ```
//!
//! Only lexical and block-structure errors abort a unit. Everything below
//! the section split degrades to raw nodes plus a diagnostic.

pub mod declarations;
pub mod handlers;
pub mod header;
pub mod nesting;
pub mod sections;
pub mod statements;

#[cfg(test)]
mod tests;

pub use declarations::parse_declarations;
pub use handlers::{HandlerSection, parse_handlers};
pub use header::{Header, parse_header};
pub use nesting::NestingTracker;
pub use sections::{RawSections, split};
pub use statements::parse_statements;

use crate::ast::TriggerUnit;
use crate::diagnostics::{Diagnostics, Stage};
use crate::error::{TranslateError, TranslateResult};
use crate::lexer::{Token, TokenKind, render, tokenize};

/// Parser output for one unit.
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub unit: TriggerUnit,
    pub diagnostics: Diagnostics,
    /// Number of statements the parser delimited, at every depth.
    pub statements_found: usize,
}

/// State threaded through the recursive statement parser.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub diagnostics: Diagnostics,
    pub statements_found: usize,
    /// Path of the statement list being parsed (`2.then`, `handler1`);
    /// empty at the top level.
    pub prefix: String,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current prefix, or `None` at the top level.
    pub fn path(&self) -> Option<&str> {
        (!self.prefix.is_empty()).then_some(self.prefix.as_str())
    }

    /// Run `f` with `branch` appended to the prefix.
    pub(crate) fn within<T>(&mut self, branch: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        let inner = if self.prefix.is_empty() {
            branch.to_string()
        } else {
            format!("{}.{}", self.prefix, branch)
        };
        let outer = std::mem::replace(&mut self.prefix, inner);
        let value = f(self);
        self.prefix = outer;
        value
    }
}

/// Tokenize and parse one trigger.
pub fn parse(source: &str) -> TranslateResult<ParsedUnit> {
    let tokens = tokenize(source)?;
    parse_tokens(source, &tokens)
}

/// Parse an already tokenized trigger. `source` is only used to place
/// structure errors.
pub fn parse_tokens(source: &str, tokens: &[Token]) -> TranslateResult<ParsedUnit> {
    let mut ctx = ParseContext::new();

    let header = parse_header(tokens, &mut ctx.diagnostics);
    let body = &tokens[header.body_start..];
    let sections = split(body).map_err(|err| TranslateError::structure(source, err))?;
    for warning in &sections.warnings {
        ctx.diagnostics
            .warn(Stage::Structure, Some(warning.offset()), warning.to_string());
    }
    if let Some(first) = sections.trailing.first() {
        ctx.diagnostics.warn(
            Stage::Structure,
            Some(first.offset),
            format!("ignored text after the terminal END: {}", render(sections.trailing)),
        );
    }
    tracing::debug!(
        "split unit: {} declare, {} body, {} exception tokens",
        sections.declare.map_or(0, <[Token]>::len),
        sections.begin.len(),
        sections.exception.map_or(0, <[Token]>::len),
    );

    let declarations = sections
        .declare
        .map(|tokens| parse_declarations(tokens, &mut ctx.diagnostics))
        .unwrap_or_default();
    let body = parse_statements(sections.begin, &mut ctx);
    let handlers = sections
        .exception
        .map(|tokens| parse_handlers(tokens, &mut ctx))
        .unwrap_or_default();

    let unit = TriggerUnit {
        metadata: header.metadata,
        declarations,
        body,
        exception_handlers: handlers.handlers,
        unparsed_handlers: handlers.unparsed,
    };
    tracing::debug!(
        "parsed {} statements, {} diagnostics",
        ctx.statements_found,
        ctx.diagnostics.len()
    );

    Ok(ParsedUnit {
        unit,
        diagnostics: ctx.diagnostics,
        statements_found: ctx.statements_found,
    })
}

/// Forward-only reader over a token slice, for the fixed-shape grammars
/// (trigger header, cursor declarations, call names).
#[derive(Debug, Clone)]
pub(crate) struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn tokens(&self) -> &'a [Token] {
        self.tokens
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    /// Tokens not yet consumed.
    pub fn rest(&self) -> &'a [Token] {
        &self.tokens[self.pos..]
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Offset of the current token, or of the end of the last one.
    pub fn offset(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(token) => token.offset,
            None => self
                .tokens
                .last()
                .map(|t| t.offset + t.text.len())
                .unwrap_or(0),
        }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    pub fn eat_word(&mut self, word: &str) -> bool {
        let found = self.peek_word(word);
        if found {
            self.pos += 1;
        }
        found
    }

    pub fn eat_punct(&mut self, punct: char) -> bool {
        let found = self.peek().is_some_and(|t| t.is_punct(punct));
        if found {
            self.pos += 1;
        }
        found
    }

    pub fn expect_word(&mut self, word: &str) -> Result<(), String> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(token) => format!("expected {}, found '{}'", word, token.text),
                None => format!("expected {}, found end of input", word),
            })
        }
    }

    /// A plain or quoted identifier.
    pub fn identifier(&mut self) -> Result<String, String> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                self.pos += 1;
                Ok(token.text.clone())
            }
            Some(token) => Err(format!("expected a name, found '{}'", token.text)),
            None => Err("expected a name, found end of input".to_string()),
        }
    }

    /// `name(.name)*`. Segments after the first may be keywords
    /// (`pkg.delete`).
    pub fn qualified_name(&mut self) -> Result<String, String> {
        let mut name = self.identifier()?;
        while self.peek().is_some_and(|t| t.is_punct('.'))
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword))
        {
            name.push('.');
            name.push_str(&self.tokens[self.pos + 1].text);
            self.pos += 2;
        }
        Ok(name)
    }
}
