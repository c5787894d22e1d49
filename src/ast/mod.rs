//! Abstract Syntax Tree for one trigger unit.
//!
//! The tree is built once by the parser and never mutated; code
//! generation reads it and produces new text.

pub mod statement;
pub mod types;
pub mod visit;

pub use statement::*;
pub use types::{DeclaredType, TypeAttribute};
pub use visit::{StatementStats, walk};

use serde::{Deserialize, Serialize};

use crate::lexer::{Token, render, tokenize_partial};

/// Expression or SQL text kept as normalized source, plus the offset of
/// its first token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub offset: usize,
}

impl Fragment {
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }

    /// Render a token span. Empty spans yield an empty fragment.
    pub fn from_tokens(tokens: &[Token]) -> Self {
        Self {
            text: render(tokens),
            offset: tokens.first().map(|t| t.offset).unwrap_or(0),
        }
    }

    /// Re-tokenize the text; offsets are shifted to approximate the source.
    pub fn tokens(&self) -> Vec<Token> {
        let (mut tokens, _) = tokenize_partial(&self.text);
        for token in &mut tokens {
            token.offset += self.offset;
        }
        tokens
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Top-level parse result for one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TriggerMetadata>,
    pub declarations: Declarations,
    pub body: StatementList,
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
    /// EXCEPTION-section text that did not form a handler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed_handlers: Vec<Fragment>,
}

impl TriggerUnit {
    /// Typed vs raw statement counts over the whole tree.
    pub fn stats(&self) -> StatementStats {
        let mut stats = StatementStats::default();
        walk(&self.body, &mut |_, stmt| stats.record(stmt));
        visit::walk_handlers(&self.exception_handlers, &mut |_, stmt| stats.record(stmt));
        stats.raw += self.unparsed_handlers.len();
        stats
    }

    /// Deterministic JSON form of the tree.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Header of `CREATE [OR REPLACE] TRIGGER ...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMetadata {
    pub name: String,
    pub or_replace: bool,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    pub table: String,
    pub for_each_row: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Fragment>,
}

impl TriggerMetadata {
    pub fn fires_on(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl TriggerTiming {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            EventKind::Insert => "INSERT",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,
    /// `UPDATE OF col, ...`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// Declarations of one block, each list in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cursors: Vec<CursorDecl>,
    /// Declarations that could not be parsed, kept verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<RawDeclaration>,
}

impl Declarations {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.variables.len()
            + self.constants.len()
            + self.exceptions.len()
            + self.cursors.len()
            + self.raw.len()
    }

    /// Case-insensitive lookup of a declared exception.
    pub fn declares_exception(&self, name: &str) -> bool {
        self.exceptions
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub declared_type: DeclaredType,
    /// `None` when absent or the literal `NULL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Initializer>,
    #[serde(default)]
    pub not_null: bool,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub declared_type: DeclaredType,
    pub value: Initializer,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDecl {
    pub name: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<CursorParam>,
    pub query: Fragment,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorParam {
    pub name: String,
    pub declared_type: DeclaredType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeclaration {
    pub text: Fragment,
}

/// Default or constant value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Initializer {
    /// A quoted string literal, stored unquoted with `''` collapsed.
    String(String),
    Expr(Fragment),
}

impl Initializer {
    /// SQL text, re-quoting string literals.
    pub fn to_sql(&self) -> String {
        match self {
            Initializer::String(s) => format!("'{}'", s.replace('\'', "''")),
            Initializer::Expr(f) => f.text.clone(),
        }
    }
}
