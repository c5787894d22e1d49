//! Splits a block into its DECLARE, BEGIN and EXCEPTION sections.

use crate::error::StructureError;
use crate::lexer::Token;

use super::nesting::NestingTracker;

/// Token slices of one `[DECLARE ...] BEGIN ... [EXCEPTION ...] END` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSections<'a> {
    /// Between `DECLARE` and `BEGIN`. `None` when nothing precedes `BEGIN`.
    pub declare: Option<&'a [Token]>,
    /// Between `BEGIN` and `EXCEPTION` or the terminal `END`.
    pub begin: &'a [Token],
    /// Between the outer `EXCEPTION` and the terminal `END`.
    pub exception: Option<&'a [Token]>,
    /// Label after the terminal `END`.
    pub label: Option<String>,
    /// Tokens left after `END [label] [;] [/]`.
    pub trailing: &'a [Token],
    /// Non-fatal problems.
    pub warnings: Vec<StructureError>,
}

/// Split `tokens` into sections.
pub fn split(tokens: &[Token]) -> Result<RawSections<'_>, StructureError> {
    let begin = find_begin(tokens)?;

    let mut tracker = NestingTracker::new();
    let mut exception = None;
    let mut end = None;
    // Inside a nested block's DECLARE section, where `name EXCEPTION;`
    // declares an exception.
    let mut nested_declare = false;
    let mut i = begin;
    while i < tokens.len() {
        let token = &tokens[i];
        if tracker.in_outer_block() {
            if token.is_keyword("DECLARE") {
                nested_declare = true;
            } else if token.is_keyword("BEGIN") {
                nested_declare = false;
            } else if exception.is_none() && !nested_declare && token.is_keyword("EXCEPTION") {
                exception = Some(i);
            }
        }
        let step = tracker.advance(tokens, i);
        if tracker.is_balanced() && token.is_keyword("END") {
            end = Some(i);
            break;
        }
        i += step;
    }

    let mut warnings = Vec::new();
    let end = match end {
        Some(end) => end,
        None => {
            let offset = tokens.last().map(|t| t.offset).unwrap_or(0);
            warnings.push(StructureError::MissingTerminalEnd { offset });
            tokens.len()
        }
    };

    let body_end = exception.unwrap_or(end);
    let declare = match begin {
        0 => None,
        _ if tokens[0].is_keyword("DECLARE") => Some(&tokens[1..begin]),
        _ => Some(&tokens[..begin]),
    };

    // Everything after the terminal END is at depth 0.
    let (label, trailing) = after_end(tokens, end);
    if let Some(token) = trailing.iter().find(|t| t.is_keyword("DECLARE")) {
        return Err(StructureError::DeclareAfterBegin {
            offset: token.offset,
        });
    }

    Ok(RawSections {
        declare,
        begin: &tokens[begin + 1..body_end],
        exception: exception.map(|exc| &tokens[exc + 1..end]),
        label,
        trailing,
        warnings,
    })
}

/// Index of the first `BEGIN`, rejecting an `EXCEPTION` section that comes
/// before it. `name EXCEPTION` is a declaration, not a section.
fn find_begin(tokens: &[Token]) -> Result<usize, StructureError> {
    for (i, token) in tokens.iter().enumerate() {
        if token.is_keyword("BEGIN") {
            return Ok(i);
        }
        if token.is_keyword("EXCEPTION") && !(i > 0 && tokens[i - 1].is_identifier()) {
            return Err(StructureError::ExceptionBeforeBegin {
                offset: token.offset,
            });
        }
    }
    Err(StructureError::MissingBegin {
        offset: tokens.first().map(|t| t.offset).unwrap_or(0),
    })
}

/// Skip `[label] [;] [/]` after the terminal `END` at `end`.
fn after_end(tokens: &[Token], end: usize) -> (Option<String>, &[Token]) {
    let mut i = end + 1;
    let mut label = None;
    if let Some(token) = tokens.get(i) {
        if token.is_identifier() {
            label = Some(token.text.clone());
            i += 1;
        }
    }
    if tokens.get(i).is_some_and(|t| t.is_punct(';')) {
        i += 1;
    }
    if tokens.get(i).is_some_and(|t| t.is_op("/")) {
        i += 1;
    }
    (label, tokens.get(i..).unwrap_or(&[]))
}
