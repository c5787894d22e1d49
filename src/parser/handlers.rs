//! EXCEPTION section parser.
//!
//! A handler starts at `WHEN` when nothing is open and the `WHEN` begins a
//! statement, so `EXIT WHEN` and `CASE WHEN` inside bodies are skipped.

use crate::ast::{ExceptionHandler, Fragment};
use crate::diagnostics::Stage;
use crate::lexer::{Token, render};

use super::ParseContext;
use super::nesting::{find_at_depth, find_clause};
use super::statements::parse_statements;

/// Parsed EXCEPTION section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerSection {
    pub handlers: Vec<ExceptionHandler>,
    /// Spans that are not a `WHEN ... THEN` handler, kept as text. Each one
    /// counts as a raw statement.
    pub unparsed: Vec<Fragment>,
}

pub fn parse_handlers(tokens: &[Token], ctx: &mut ParseContext) -> HandlerSection {
    let mut starts = Vec::new();
    let mut from = 0;
    while let Some(at) = find_clause(tokens, from, &["WHEN"]) {
        starts.push(at);
        from = at + 1;
    }

    let mut section = HandlerSection::default();
    let first = starts.first().copied().unwrap_or(tokens.len());
    if first > 0 {
        unparsed(&mut section, &tokens[..first], "text before the first WHEN", ctx);
    }

    for (k, &start) in starts.iter().enumerate() {
        let end = starts.get(k + 1).copied().unwrap_or(tokens.len());
        let span = &tokens[start..end];
        let name = format!("handler{}", section.handlers.len() + 1);
        match handler(span, &name, ctx) {
            Ok(handler) => section.handlers.push(handler),
            Err(msg) => unparsed(&mut section, span, msg, ctx),
        }
    }

    let handlers = &section.handlers;
    if let Some(pos) = handlers.iter().position(ExceptionHandler::is_others) {
        if pos + 1 != handlers.len() {
            ctx.diagnostics.warn(
                Stage::Handler,
                Some(handlers[pos].offset),
                "WHEN OTHERS is not the last handler; it is emitted last",
            );
        }
    }
    tracing::debug!(
        "parsed {} exception handlers, {} unparsed spans",
        section.handlers.len(),
        section.unparsed.len()
    );
    section
}

fn unparsed(section: &mut HandlerSection, span: &[Token], reason: &str, ctx: &mut ParseContext) {
    let text = Fragment::from_tokens(span);
    let path = ctx.path().map(str::to_string);
    ctx.statements_found += 1;
    ctx.diagnostics.error_at(
        Stage::Handler,
        Some(text.offset),
        path.as_deref(),
        format!("{}; kept as a comment: {}", reason, text.text),
    );
    section.unparsed.push(text);
}

/// `WHEN name [OR name ...] THEN body`
fn handler(
    span: &[Token],
    name: &str,
    ctx: &mut ParseContext,
) -> Result<ExceptionHandler, &'static str> {
    let then = find_at_depth(span, 1, |t, i| t[i].is_keyword("THEN")).ok_or("WHEN without THEN")?;

    let mut names = Vec::new();
    for part in span[1..then].split(|t| t.is_keyword("OR")) {
        if part.is_empty() {
            return Err("missing exception name");
        }
        names.push(render(part));
    }
    let mut names = names.into_iter();
    let exception_name = names.next().ok_or("missing exception name")?;

    Ok(ExceptionHandler {
        exception_name,
        additional_names: names.collect(),
        body: ctx.within(name, |ctx| parse_statements(&span[then + 1..], ctx)),
        offset: span[0].offset,
    })
}
