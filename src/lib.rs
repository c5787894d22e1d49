//! # plsql2pg
//!
//! Translate Oracle PL/SQL trigger bodies into PostgreSQL PL/pgSQL.
//!
//! ```text
//! source → lexer → parser (header, sections, declarations,
//!                          statements, handlers)
//!        → TriggerUnit → transpiler → PL/pgSQL + diagnostics
//! ```
//!
//! ## Quick Example
//!
//! ```
//! use plsql2pg::prelude::*;
//!
//! let src = "DECLARE v_x NUMBER := 0; BEGIN :new.total := NVL(v_x, 0); END;";
//! let out = plsql2pg::translate(src, &DialectMapping::oracle_defaults(), &GenerateOptions::default())?;
//! assert!(out.sql.contains("NEW.total := COALESCE(v_x, 0);"));
//! # Ok::<(), TranslateError>(())
//! ```
//!
//! Only lexical and block-structure errors fail a unit. Everything else
//! degrades to raw nodes or pass-through text and is reported in
//! [`Translation::diagnostics`].

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::Config;
    pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity, Stage};
    pub use crate::error::*;
    pub use crate::parser::{ParsedUnit, parse};
    pub use crate::transpiler::{
        DialectMapping, GenerateOptions, Generated, ToPlpgsql, WrapMode, generate,
    };
    pub use crate::{Translation, translate};
}

pub use parser::parse;

use ast::TriggerUnit;
use diagnostics::Diagnostics;
use error::TranslateResult;
use transpiler::{DialectMapping, GenerateOptions};

/// Result of translating one trigger.
#[derive(Debug, Clone)]
pub struct Translation {
    pub unit: TriggerUnit,
    pub sql: String,
    /// Parser diagnostics followed by mapping diagnostics.
    pub diagnostics: Diagnostics,
    pub statements_found: usize,
}

/// Parse and generate in one step.
pub fn translate(
    source: &str,
    mapping: &DialectMapping,
    options: &GenerateOptions,
) -> TranslateResult<Translation> {
    let parsed = parser::parse(source)?;
    let generated = transpiler::generate(&parsed.unit, mapping, options)?;
    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(generated.diagnostics);
    Ok(Translation {
        unit: parsed.unit,
        sql: generated.sql,
        diagnostics,
        statements_found: parsed.statements_found,
    })
}
