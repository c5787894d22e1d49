//! Dialect mapping tables.
//!
//! Three case-insensitive tables drive translation:
//!
//! | Table        | Key                 | Value                                  |
//! |--------------|---------------------|----------------------------------------|
//! | `types`      | Oracle type name    | target type template (`numeric({*})`)  |
//! | `functions`  | Oracle function     | target template (`COALESCE({0}, {1})`) |
//! | `exceptions` | Oracle exception    | PL/pgSQL condition name                |
//!
//! In templates `{0}`, `{1}`, ... are positional arguments and `{*}` is
//! all arguments joined with `, `. A function template without
//! placeholders renames the call and also replaces the bare identifier, so
//! `SYSDATE = "CURRENT_TIMESTAMP"` covers the pseudo function.

use std::collections::BTreeMap;
use std::path::Path;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, value},
    multi::many0,
    sequence::delimited,
};
use serde::{Deserialize, Serialize};

use crate::ast::DeclaredType;
use crate::error::{TranslateError, TranslateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Arg(usize),
    AllArgs,
}

/// Parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, String> {
        match all_consuming(segments)(source) {
            Ok((_, segments)) => Ok(Self {
                source: source.to_string(),
                segments,
            }),
            Err(e) => Err(format!("invalid template '{}': {}", source, e)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Text(_)))
    }

    /// Substitute `args`. `None` when a positional placeholder has no
    /// argument.
    pub fn expand(&self, args: &[String]) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Arg(n) => out.push_str(args.get(*n)?),
                Segment::AllArgs => out.push_str(&args.join(", ")),
            }
        }
        Some(out)
    }

    /// Substitute type modifiers. Missing ones expand to nothing and an
    /// emptied `()` is dropped: `varchar({0})` → `varchar`.
    fn expand_modifiers(&self, modifiers: &[String]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Arg(n) => {
                    if let Some(m) = modifiers.get(*n) {
                        out.push_str(m);
                    }
                }
                Segment::AllArgs => out.push_str(&modifiers.join(", ")),
            }
        }
        out.replace("()", "")
    }
}

fn placeholder(input: &str) -> IResult<&str, Segment> {
    delimited(
        char('{'),
        alt((
            value(Segment::AllArgs, char('*')),
            map_res(digit1, |d: &str| d.parse().map(Segment::Arg)),
        )),
        char('}'),
    )(input)
}

fn segments(input: &str) -> IResult<&str, Vec<Segment>> {
    many0(alt((
        placeholder,
        map(take_till1(|c| c == '{'), |t: &str| Segment::Text(t.to_string())),
        map(tag("{"), |t: &str| Segment::Text(t.to_string())),
    )))(input)
}

/// On-disk form of a mapping table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingFile {
    /// Start from [`DialectMapping::oracle_defaults`] and override it.
    #[serde(default = "default_true")]
    pub extends_defaults: bool,
    #[serde(default)]
    pub types: BTreeMap<String, String>,
    #[serde(default)]
    pub functions: BTreeMap<String, String>,
    #[serde(default)]
    pub exceptions: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// Read-only translation tables. Keys are stored upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialectMapping {
    types: BTreeMap<String, Template>,
    functions: BTreeMap<String, Template>,
    exceptions: BTreeMap<String, String>,
}

impl DialectMapping {
    /// Empty tables: everything passes through with a warning.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in Oracle → PostgreSQL table.
    pub fn oracle_defaults() -> Self {
        let mut mapping = Self::empty();
        for (from, to) in DEFAULT_TYPES {
            mapping.insert_type(from, to).ok();
        }
        for (from, to) in DEFAULT_FUNCTIONS {
            mapping.insert_function(from, to).ok();
        }
        for (from, to) in DEFAULT_EXCEPTIONS {
            mapping.insert_exception(from, to);
        }
        mapping
    }

    /// Parse a mapping TOML document.
    pub fn from_toml_str(content: &str) -> TranslateResult<Self> {
        let file: MappingFile =
            toml::from_str(content).map_err(|e| TranslateError::Mapping(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: MappingFile) -> TranslateResult<Self> {
        let mut mapping = if file.extends_defaults {
            Self::oracle_defaults()
        } else {
            Self::empty()
        };
        for (from, to) in &file.types {
            mapping
                .insert_type(from, to)
                .map_err(|e| TranslateError::Mapping(format!("types.{}: {}", from, e)))?;
        }
        for (from, to) in &file.functions {
            mapping
                .insert_function(from, to)
                .map_err(|e| TranslateError::Mapping(format!("functions.{}: {}", from, e)))?;
        }
        for (from, to) in &file.exceptions {
            mapping.insert_exception(from, to);
        }
        Ok(mapping)
    }

    /// Load a mapping TOML file.
    pub fn load(path: &Path) -> TranslateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("loading mapping from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Serialize the effective tables; the result loads back unchanged.
    pub fn to_toml(&self) -> TranslateResult<String> {
        let file = MappingFile {
            extends_defaults: false,
            types: source_map(&self.types),
            functions: source_map(&self.functions),
            exceptions: self.exceptions.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| TranslateError::Mapping(e.to_string()))
    }

    pub fn insert_type(&mut self, from: &str, to: &str) -> Result<(), String> {
        self.types.insert(key(from), Template::parse(to)?);
        Ok(())
    }

    pub fn insert_function(&mut self, from: &str, to: &str) -> Result<(), String> {
        self.functions.insert(key(from), Template::parse(to)?);
        Ok(())
    }

    pub fn insert_exception(&mut self, from: &str, to: &str) {
        self.exceptions.insert(key(from), to.to_string());
    }

    pub fn function(&self, name: &str) -> Option<&Template> {
        self.functions.get(&key(name))
    }

    pub fn exception(&self, name: &str) -> Option<&str> {
        self.exceptions.get(&key(name)).map(String::as_str)
    }

    /// Target type for a declared type. Anchored types are kept as
    /// written. `None` when the type is not in the table.
    pub fn map_type(&self, ty: &DeclaredType) -> Option<String> {
        if ty.is_anchored() {
            return Some(ty.to_string());
        }
        let template = self.types.get(&ty.key())?;
        let modifiers: Vec<String> = ty
            .modifiers
            .iter()
            .map(|m| strip_length_semantics(m).to_string())
            .collect();
        Some(template.expand_modifiers(&modifiers))
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.functions.len() + self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

fn source_map(templates: &BTreeMap<String, Template>) -> BTreeMap<String, String> {
    templates
        .iter()
        .map(|(k, t)| (k.clone(), t.as_str().to_string()))
        .collect()
}

/// `100 BYTE` / `100 CHAR` → `100`.
fn strip_length_semantics(modifier: &str) -> &str {
    let upper = modifier.to_ascii_uppercase();
    for suffix in [" BYTE", " CHAR"] {
        if upper.ends_with(suffix) {
            return modifier[..modifier.len() - suffix.len()].trim_end();
        }
    }
    modifier
}

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("NUMBER", "numeric({*})"),
    ("NUMERIC", "numeric({*})"),
    ("DECIMAL", "numeric({*})"),
    ("INTEGER", "integer"),
    ("INT", "integer"),
    ("SMALLINT", "smallint"),
    ("PLS_INTEGER", "integer"),
    ("BINARY_INTEGER", "integer"),
    ("SIMPLE_INTEGER", "integer"),
    ("NATURAL", "integer"),
    ("POSITIVE", "integer"),
    ("FLOAT", "double precision"),
    ("BINARY_FLOAT", "real"),
    ("BINARY_DOUBLE", "double precision"),
    ("VARCHAR2", "varchar({0})"),
    ("VARCHAR", "varchar({0})"),
    ("NVARCHAR2", "varchar({0})"),
    ("CHAR", "char({0})"),
    ("NCHAR", "char({0})"),
    ("CLOB", "text"),
    ("NCLOB", "text"),
    ("LONG", "text"),
    ("BLOB", "bytea"),
    ("RAW", "bytea"),
    ("LONG RAW", "bytea"),
    ("DATE", "timestamp(0)"),
    ("TIMESTAMP", "timestamp({0})"),
    ("TIMESTAMP WITH TIME ZONE", "timestamptz({0})"),
    ("TIMESTAMP WITH LOCAL TIME ZONE", "timestamptz({0})"),
    ("BOOLEAN", "boolean"),
    ("XMLTYPE", "xml"),
];

const DEFAULT_FUNCTIONS: &[(&str, &str)] = &[
    ("NVL", "COALESCE({0}, {1})"),
    ("NVL2", "CASE WHEN {0} IS NOT NULL THEN {1} ELSE {2} END"),
    ("SYSDATE", "LOCALTIMESTAMP(0)"),
    ("SYSTIMESTAMP", "CURRENT_TIMESTAMP"),
    ("USER", "CURRENT_USER"),
    ("SQLCODE", "SQLSTATE"),
    ("SYS_GUID", "gen_random_uuid()"),
    ("INSTR", "strpos({0}, {1})"),
    ("LENGTHB", "octet_length({0})"),
    ("ADD_MONTHS", "({0} + ({1}) * INTERVAL '1 month')"),
    ("LAST_DAY", "(date_trunc('month', {0}) + INTERVAL '1 month - 1 day')"),
    ("DBMS_OUTPUT.PUT_LINE", "RAISE NOTICE '%', {0}"),
    (
        "RAISE_APPLICATION_ERROR",
        "RAISE EXCEPTION '%', {1} USING ERRCODE = 'P0001', DETAIL = 'ORA' || {0}",
    ),
];

const DEFAULT_EXCEPTIONS: &[(&str, &str)] = &[
    ("NO_DATA_FOUND", "no_data_found"),
    ("TOO_MANY_ROWS", "too_many_rows"),
    ("ZERO_DIVIDE", "division_by_zero"),
    ("DUP_VAL_ON_INDEX", "unique_violation"),
    ("VALUE_ERROR", "data_exception"),
    ("INVALID_NUMBER", "invalid_text_representation"),
    ("CASE_NOT_FOUND", "case_not_found"),
    ("CURSOR_ALREADY_OPEN", "duplicate_cursor"),
    ("INVALID_CURSOR", "invalid_cursor_state"),
    ("ROWTYPE_MISMATCH", "datatype_mismatch"),
    ("TIMEOUT_ON_RESOURCE", "lock_not_available"),
    ("LOGIN_DENIED", "invalid_authorization_specification"),
    ("STORAGE_ERROR", "out_of_memory"),
    ("PROGRAM_ERROR", "internal_error"),
];
