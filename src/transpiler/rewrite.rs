//! Token-level rewriting of expressions and embedded SQL.
//!
//! Fragments are re-tokenized and rewritten left to right:
//!
//! - `:new.col` / `:old.col` (or the REFERENCING aliases) → `NEW.col` / `OLD.col`
//! - `INSERTING` / `UPDATING` / `DELETING` → `TG_OP` tests
//! - `seq.NEXTVAL` → `nextval('seq')`
//! - `!=`, `^=`, `~=` → `<>`; `**` → `^`; `MINUS` → `EXCEPT`
//! - `FROM DUAL` is dropped
//! - `SQL%FOUND` / `SQL%NOTFOUND` → `FOUND` / `NOT FOUND`
//! - `q'[...]'` and `N'...'` literals are re-quoted
//! - calls found in the function table are expanded from their template
//! - `CAST(x AS type)` targets and `DECODE(...)` are rewritten
//!
//! Anything without a rule is kept as written; constructs that cannot be
//! expressed are reported as findings.

use std::collections::BTreeSet;

use crate::ast::{DeclaredType, Fragment};
use crate::diagnostics::Severity;
use crate::lexer::{Token, TokenKind, render, render_texts, unquote};
use crate::parser::nesting::{find_at_depth, matching_paren, split_commas};

use super::mapping::DialectMapping;

/// Functions with the same name and meaning in PostgreSQL.
const PORTABLE_FUNCTIONS: &[&str] = &[
    "ABS", "ASCII", "AVG", "CEIL", "CHR", "COALESCE", "CONCAT", "COUNT", "DENSE_RANK", "EXP",
    "EXTRACT", "FLOOR", "GREATEST", "INITCAP", "LAG", "LEAD", "LEAST", "LENGTH", "LN", "LOG",
    "LOWER", "LPAD", "LTRIM", "MAX", "MIN", "MOD", "NULLIF", "POWER", "RANK", "REGEXP_REPLACE",
    "REPLACE", "ROUND", "ROW_NUMBER", "RPAD", "RTRIM", "SIGN", "SQRT", "SUBSTR", "SUM",
    "TO_CHAR", "TO_DATE", "TO_NUMBER", "TO_TIMESTAMP", "TRANSLATE", "TRIM", "UPPER",
];

/// Something the rewriter could not translate faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Finding {
    pub offset: usize,
    /// Deduplication key, e.g. `function:DECODE`.
    pub key: String,
    pub message: String,
    /// `Error` when the emitted text will not run as is.
    pub severity: Severity,
}

impl Finding {
    pub fn new(offset: usize, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            offset,
            key: key.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    fn error(offset: usize, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::new(offset, key, message)
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Rewriter<'a> {
    mapping: &'a DialectMapping,
    new_alias: String,
    old_alias: String,
    cursors: BTreeSet<String>,
    bare_row_refs: bool,
}

type Out = Vec<(TokenKind, String)>;

impl<'a> Rewriter<'a> {
    pub fn new(mapping: &'a DialectMapping) -> Self {
        Self {
            mapping,
            new_alias: "NEW".to_string(),
            old_alias: "OLD".to_string(),
            cursors: BTreeSet::new(),
            bare_row_refs: false,
        }
    }

    /// `REFERENCING NEW AS n OLD AS o`
    pub fn with_aliases(mut self, new: Option<&str>, old: Option<&str>) -> Self {
        if let Some(alias) = new {
            self.new_alias = alias.to_ascii_uppercase();
        }
        if let Some(alias) = old {
            self.old_alias = alias.to_ascii_uppercase();
        }
        self
    }

    /// Declared cursor names; `c(args)` is then not a function call.
    pub fn with_cursors<'n>(mut self, names: impl IntoIterator<Item = &'n str>) -> Self {
        self.cursors
            .extend(names.into_iter().map(|n| n.to_ascii_uppercase()));
        self
    }

    /// Trigger WHEN clauses name rows without the colon: `new.status`.
    pub fn for_when_clause(&self) -> Self {
        Self {
            bare_row_refs: true,
            ..self.clone()
        }
    }

    pub fn fragment(&self, fragment: &Fragment, findings: &mut Vec<Finding>) -> String {
        self.tokens(&fragment.tokens(), findings)
    }

    pub fn tokens(&self, tokens: &[Token], findings: &mut Vec<Finding>) -> String {
        let mut out = Out::new();
        let mut i = 0;
        while i < tokens.len() {
            i = self.token(tokens, i, &mut out, findings);
        }
        render_texts(out.iter().map(|(k, t)| (*k, t.as_str())))
    }

    /// Target type text; unmapped types are kept with a finding.
    pub fn map_type(&self, ty: &DeclaredType, offset: usize, findings: &mut Vec<Finding>) -> String {
        match self.mapping.map_type(ty) {
            Some(mapped) => mapped,
            None => {
                findings.push(Finding::new(
                    offset,
                    format!("type:{}", ty.key()),
                    format!("unmapped type {} passed through", ty.name),
                ));
                ty.to_string()
            }
        }
    }

    /// `NEW` / `OLD` for a row reference name, if it is one.
    fn row_name(&self, name: &str) -> Option<&'static str> {
        if name.eq_ignore_ascii_case(&self.new_alias) {
            Some("NEW")
        } else if name.eq_ignore_ascii_case(&self.old_alias) {
            Some("OLD")
        } else {
            None
        }
    }

    fn token(&self, tokens: &[Token], i: usize, out: &mut Out, findings: &mut Vec<Finding>) -> usize {
        let t = &tokens[i];
        match t.kind {
            TokenKind::BindVariable => {
                out.push((TokenKind::Identifier, self.bind(t, findings)));
                i + 1
            }
            TokenKind::Operator => {
                let text = match t.text.as_str() {
                    "!=" | "^=" | "~=" => "<>",
                    "**" => "^",
                    other => other,
                };
                out.push((TokenKind::Operator, text.to_string()));
                i + 1
            }
            TokenKind::StringLiteral => {
                let text = match t.text.chars().next() {
                    Some('q' | 'Q' | 'n' | 'N') => match unquote(&t.text) {
                        Some(s) => format!("'{}'", s.replace('\'', "''")),
                        None => t.text.clone(),
                    },
                    _ => t.text.clone(),
                };
                out.push((TokenKind::StringLiteral, text));
                i + 1
            }
            TokenKind::Keyword if t.is_keyword("FROM") && is_dual(tokens, i + 1) => i + 2,
            TokenKind::Keyword if t.is_keyword("MINUS") => {
                out.push((TokenKind::Keyword, "EXCEPT".to_string()));
                i + 1
            }
            TokenKind::Identifier => self.identifier(tokens, i, out, findings),
            TokenKind::Punctuation if is_outer_join(tokens, i) => {
                findings.push(Finding::error(
                    t.offset,
                    "outer-join",
                    "Oracle outer join (+) needs a manual rewrite to LEFT JOIN",
                ));
                keep(t, out);
                i + 1
            }
            _ => {
                keep(t, out);
                i + 1
            }
        }
    }

    fn bind(&self, t: &Token, findings: &mut Vec<Finding>) -> String {
        let body = &t.text[1..];
        let (head, rest) = match body.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (body, None),
        };
        match (self.row_name(head), rest) {
            (Some(row), Some(rest)) => format!("{}.{}", row, rest),
            (Some(row), None) => row.to_string(),
            (None, _) => {
                findings.push(Finding::error(
                    t.offset,
                    format!("bind:{}", t.upper()),
                    format!("host bind variable {} kept as written", t.text),
                ));
                t.text.clone()
            }
        }
    }

    fn identifier(&self, tokens: &[Token], i: usize, out: &mut Out, findings: &mut Vec<Finding>) -> usize {
        let mut segments = vec![tokens[i].text.as_str()];
        let mut j = i;
        while tokens.get(j + 1).is_some_and(|t| t.is_punct('.'))
            && tokens
                .get(j + 2)
                .is_some_and(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword))
        {
            segments.push(tokens[j + 2].text.as_str());
            j += 2;
        }
        let next = j + 1;
        let offset = tokens[i].offset;
        let name = segments.join(".");
        let upper = name.to_ascii_uppercase();
        let last = segments[segments.len() - 1].to_ascii_uppercase();

        if segments.len() >= 2 && (last == "NEXTVAL" || last == "CURRVAL") {
            let sequence = segments[..segments.len() - 1].join(".");
            out.push((
                TokenKind::Identifier,
                format!("{}('{}')", last.to_ascii_lowercase(), sequence),
            ));
            return next;
        }

        if upper == "SQL"
            && tokens.get(next).is_some_and(|t| t.is_op("%"))
            && let Some(attr) = tokens.get(next + 1)
        {
            let replacement = match attr.upper().as_str() {
                "FOUND" => Some("FOUND"),
                "NOTFOUND" => Some("NOT FOUND"),
                "ISOPEN" => Some("false"),
                _ => None,
            };
            if let Some(text) = replacement {
                out.push((TokenKind::Identifier, text.to_string()));
                return next + 2;
            }
            if attr.is_word("ROWCOUNT") {
                findings.push(Finding::error(
                    offset,
                    "sql-rowcount",
                    "SQL%ROWCOUNT needs GET DIAGNOSTICS <var> = ROW_COUNT",
                ));
            }
        }

        if self.bare_row_refs && segments.len() >= 2 {
            if let Some(row) = self.row_name(segments[0]) {
                out.push((
                    TokenKind::Identifier,
                    format!("{}.{}", row, segments[1..].join(".")),
                ));
                return next;
            }
        }

        if tokens.get(next).is_some_and(|t| t.is_punct('(')) && !is_outer_join(tokens, next) {
            let table_context = i > 0 && tokens[i - 1].is_keyword("INTO");
            if !table_context && !self.cursors.contains(&upper) {
                if let Some(end) = self.call(tokens, &upper, offset, next, out, findings) {
                    return end;
                }
            }
            out.push((TokenKind::Identifier, name));
            return next;
        }

        if segments.len() == 1 {
            let test = match upper.as_str() {
                "INSERTING" => Some("(TG_OP = 'INSERT')"),
                "UPDATING" => Some("(TG_OP = 'UPDATE')"),
                "DELETING" => Some("(TG_OP = 'DELETE')"),
                _ => None,
            };
            if let Some(test) = test {
                out.push((TokenKind::Identifier, test.to_string()));
                return next;
            }
            if let Some(template) = self.mapping.function(&upper)
                && !template.has_placeholders()
            {
                out.push((TokenKind::Identifier, template.as_str().to_string()));
                return next;
            }
            if upper == "ROWNUM" {
                findings.push(Finding::error(
                    offset,
                    "rownum",
                    "ROWNUM has no PostgreSQL equivalent; use LIMIT or row_number()",
                ));
            }
        }

        out.push((TokenKind::Identifier, name));
        next
    }

    /// Rewrite the call `name(` at `open`. Returns the index after the
    /// closing paren when the whole call was replaced.
    #[allow(clippy::too_many_arguments)]
    fn call(
        &self,
        tokens: &[Token],
        name: &str,
        offset: usize,
        open: usize,
        out: &mut Out,
        findings: &mut Vec<Finding>,
    ) -> Option<usize> {
        let close = matching_paren(tokens, open)?;
        let inner = &tokens[open + 1..close];

        if let Some(template) = self.mapping.function(name) {
            let args = self.arguments(inner, findings);
            return match template.expand(&args) {
                Some(text) => {
                    out.push((TokenKind::Identifier, text));
                    Some(close + 1)
                }
                None => {
                    findings.push(Finding::new(
                        offset,
                        format!("arity:{}", name),
                        format!(
                            "{} called with {} argument(s); template '{}' needs more",
                            name,
                            args.len(),
                            template.as_str()
                        ),
                    ));
                    None
                }
            };
        }

        match name {
            "CAST" => {
                let text = self.cast(inner, offset, findings)?;
                out.push((TokenKind::Identifier, text));
                Some(close + 1)
            }
            "DECODE" => {
                let args = self.arguments(inner, findings);
                let text = decode(&args)?;
                out.push((TokenKind::Identifier, text));
                Some(close + 1)
            }
            "UPDATING" => {
                let column = match inner {
                    [only] if only.kind == TokenKind::StringLiteral => unquote(&only.text)?,
                    _ => return None,
                };
                out.push((
                    TokenKind::Identifier,
                    format!(
                        "(TG_OP = 'UPDATE' AND NEW.{0} IS DISTINCT FROM OLD.{0})",
                        column.to_ascii_lowercase()
                    ),
                ));
                Some(close + 1)
            }
            _ => {
                if !PORTABLE_FUNCTIONS.contains(&name) {
                    findings.push(Finding::new(
                        offset,
                        format!("function:{}", name),
                        format!("unmapped function {} passed through", name),
                    ));
                }
                None
            }
        }
    }

    fn arguments(&self, inner: &[Token], findings: &mut Vec<Finding>) -> Vec<String> {
        if inner.is_empty() {
            return Vec::new();
        }
        split_commas(inner)
            .into_iter()
            .map(|arg| self.tokens(arg, findings))
            .collect()
    }

    /// `CAST(expr AS type)` with the target type mapped.
    fn cast(&self, inner: &[Token], offset: usize, findings: &mut Vec<Finding>) -> Option<String> {
        let mut as_at = None;
        let mut from = 0;
        while let Some(at) = find_at_depth(inner, from, |t, i| t[i].is_keyword("AS")) {
            as_at = Some(at);
            from = at + 1;
        }
        let as_at = as_at?;
        let ty = DeclaredType::parse(&render(&inner[as_at + 1..]))?;
        let expr = self.tokens(&inner[..as_at], findings);
        Some(format!("CAST({} AS {})", expr, self.map_type(&ty, offset, findings)))
    }
}

fn keep(t: &Token, out: &mut Out) {
    out.push((t.kind, t.text.clone()));
}

/// `(+)`
fn is_outer_join(tokens: &[Token], i: usize) -> bool {
    tokens.get(i).is_some_and(|t| t.is_punct('('))
        && tokens.get(i + 1).is_some_and(|t| t.is_op("+"))
        && tokens.get(i + 2).is_some_and(|t| t.is_punct(')'))
}

fn is_dual(tokens: &[Token], i: usize) -> bool {
    tokens.get(i).is_some_and(|t| t.is_word("DUAL"))
        && !tokens.get(i + 1).is_some_and(|t| t.is_punct('.'))
}

/// `DECODE(e, s1, r1, ..., [default])` → searched CASE. Comparison uses
/// `IS NOT DISTINCT FROM` since DECODE matches NULL to NULL.
fn decode(args: &[String]) -> Option<String> {
    let (expr, rest) = args.split_first()?;
    if rest.len() < 2 {
        return None;
    }
    let mut text = String::from("CASE");
    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        text.push_str(&format!(
            " WHEN {} IS NOT DISTINCT FROM {} THEN {}",
            expr, pair[0], pair[1]
        ));
    }
    if let [default] = pairs.remainder() {
        text.push_str(&format!(" ELSE {}", default));
    }
    text.push_str(" END");
    Some(text)
}
