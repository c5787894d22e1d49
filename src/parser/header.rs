//! `CREATE [OR REPLACE] TRIGGER` header.
//!
//! ```text
//! CREATE [OR REPLACE] [EDITIONABLE | NONEDITIONABLE] TRIGGER [schema.]name
//!   { BEFORE | AFTER | INSTEAD OF } event [OR event ...]
//!   ON [schema.]table
//!   [REFERENCING { NEW | OLD | PARENT } [AS] alias ...]
//!   [FOR EACH ROW] [FOLLOWS | PRECEDES name] [ENABLE | DISABLE]
//!   [WHEN (condition)]
//! ```

use crate::ast::{EventKind, Fragment, TriggerEvent, TriggerMetadata, TriggerTiming};
use crate::diagnostics::{Diagnostics, Stage};
use crate::lexer::Token;

use super::TokenCursor;
use super::nesting::matching_paren;

/// Parsed header and the index where the block starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub metadata: Option<TriggerMetadata>,
    pub body_start: usize,
}

/// Parse an optional trigger header. Input that does not start with
/// `CREATE` has no header. A header that cannot be parsed is skipped up
/// to the first `DECLARE` or `BEGIN` with a warning.
pub fn parse_header(tokens: &[Token], diagnostics: &mut Diagnostics) -> Header {
    if !tokens.first().is_some_and(|t| t.is_keyword("CREATE")) {
        return Header {
            metadata: None,
            body_start: 0,
        };
    }

    let mut cursor = TokenCursor::new(tokens);
    match trigger_header(&mut cursor) {
        Ok(metadata) => {
            tracing::debug!("parsed header of trigger {}", metadata.name);
            Header {
                metadata: Some(metadata),
                body_start: cursor.pos(),
            }
        }
        Err(msg) => {
            let offset = cursor.offset();
            diagnostics.warn(Stage::Header, Some(offset), format!("trigger header skipped: {}", msg));
            let body_start = tokens
                .iter()
                .position(|t| t.is_keyword("DECLARE") || t.is_keyword("BEGIN"))
                .unwrap_or(tokens.len());
            Header {
                metadata: None,
                body_start,
            }
        }
    }
}

fn trigger_header(c: &mut TokenCursor<'_>) -> Result<TriggerMetadata, String> {
    c.expect_word("CREATE")?;
    let or_replace = if c.eat_word("OR") {
        c.expect_word("REPLACE")?;
        true
    } else {
        false
    };
    let _ = c.eat_word("EDITIONABLE") || c.eat_word("NONEDITIONABLE");
    c.expect_word("TRIGGER")?;
    let name = c.qualified_name()?;

    let timing = if c.eat_word("BEFORE") {
        TriggerTiming::Before
    } else if c.eat_word("AFTER") {
        TriggerTiming::After
    } else if c.eat_word("INSTEAD") {
        c.expect_word("OF")?;
        TriggerTiming::InsteadOf
    } else if c.peek_word("FOR") {
        return Err("compound triggers are not supported".to_string());
    } else {
        return Err("expected BEFORE, AFTER or INSTEAD OF".to_string());
    };

    let mut events = vec![event(c)?];
    while c.eat_word("OR") {
        events.push(event(c)?);
    }

    c.expect_word("ON")?;
    let table = c.qualified_name()?;

    let mut metadata = TriggerMetadata {
        name,
        or_replace,
        timing,
        events,
        table,
        for_each_row: false,
        new_alias: None,
        old_alias: None,
        when: None,
    };

    loop {
        if c.eat_word("REFERENCING") {
            referencing(c, &mut metadata)?;
        } else if c.eat_word("FOR") {
            c.expect_word("EACH")?;
            c.expect_word("ROW")?;
            metadata.for_each_row = true;
        } else if c.eat_word("FOLLOWS") || c.eat_word("PRECEDES") {
            c.qualified_name()?;
            while c.eat_punct(',') {
                c.qualified_name()?;
            }
        } else if c.eat_word("ENABLE") || c.eat_word("DISABLE") {
            continue;
        } else if c.eat_word("WHEN") {
            metadata.when = Some(when_condition(c)?);
        } else if c.peek_word("DECLARE") || c.peek_word("BEGIN") {
            return Ok(metadata);
        } else {
            return Err(match c.peek() {
                Some(token) => format!("unexpected '{}'", token.text),
                None => "no DECLARE or BEGIN after the header".to_string(),
            });
        }
    }
}

fn event(c: &mut TokenCursor<'_>) -> Result<TriggerEvent, String> {
    let kind = if c.eat_word("INSERT") {
        EventKind::Insert
    } else if c.eat_word("UPDATE") {
        EventKind::Update
    } else if c.eat_word("DELETE") {
        EventKind::Delete
    } else {
        return Err("expected INSERT, UPDATE or DELETE".to_string());
    };

    let mut columns = Vec::new();
    if kind == EventKind::Update && c.eat_word("OF") {
        columns.push(c.identifier()?);
        while c.eat_punct(',') {
            columns.push(c.identifier()?);
        }
    }
    Ok(TriggerEvent { kind, columns })
}

fn referencing(c: &mut TokenCursor<'_>, metadata: &mut TriggerMetadata) -> Result<(), String> {
    let mut seen = false;
    loop {
        let slot = if c.eat_word("NEW") {
            Some(&mut metadata.new_alias)
        } else if c.eat_word("OLD") {
            Some(&mut metadata.old_alias)
        } else if c.eat_word("PARENT") {
            None
        } else {
            break;
        };
        let _ = c.eat_word("AS");
        let alias = c.identifier()?;
        if let Some(slot) = slot {
            *slot = Some(alias);
        }
        seen = true;
    }
    if seen {
        Ok(())
    } else {
        Err("REFERENCING without NEW, OLD or PARENT".to_string())
    }
}

fn when_condition(c: &mut TokenCursor<'_>) -> Result<Fragment, String> {
    let open = c.pos();
    if !c.peek().is_some_and(|t| t.is_punct('(')) {
        return Err("WHEN condition must be parenthesized".to_string());
    }
    let close = matching_paren(c.tokens(), open).ok_or("unclosed WHEN condition")?;
    let condition = Fragment::from_tokens(&c.tokens()[open + 1..close]);
    c.seek(close + 1);
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn header(src: &str) -> (Header, Diagnostics) {
        let tokens = tokenize(src).unwrap();
        let mut diagnostics = Diagnostics::new();
        (parse_header(&tokens, &mut diagnostics), diagnostics)
    }

    #[test]
    fn test_no_header() {
        let (h, diags) = header("BEGIN NULL; END;");
        assert_eq!(h.metadata, None);
        assert_eq!(h.body_start, 0);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_full_header() {
        let (h, diags) = header(
            "CREATE OR REPLACE TRIGGER hr.trg_emp_audit
               BEFORE INSERT OR UPDATE OF salary, dept_id OR DELETE ON hr.employees
               REFERENCING NEW AS n OLD AS o
               FOR EACH ROW
               WHEN (n.salary > 0)
             DECLARE v NUMBER; BEGIN NULL; END;",
        );
        assert!(diags.is_empty());
        let meta = h.metadata.unwrap();
        assert_eq!(meta.name, "hr.trg_emp_audit");
        assert!(meta.or_replace);
        assert_eq!(meta.timing, TriggerTiming::Before);
        assert_eq!(meta.events.len(), 3);
        assert_eq!(meta.events[1].columns, vec!["salary", "dept_id"]);
        assert!(meta.fires_on(EventKind::Delete));
        assert_eq!(meta.table, "hr.employees");
        assert!(meta.for_each_row);
        assert_eq!(meta.new_alias.as_deref(), Some("n"));
        assert_eq!(meta.old_alias.as_deref(), Some("o"));
        assert_eq!(meta.when.unwrap().text, "n.salary > 0");
    }

    #[test]
    fn test_instead_of() {
        let (h, _) = header("CREATE TRIGGER v_trg INSTEAD OF INSERT ON v_emp BEGIN NULL; END;");
        let meta = h.metadata.unwrap();
        assert_eq!(meta.timing, TriggerTiming::InsteadOf);
        assert!(!meta.or_replace);
        assert!(!meta.for_each_row);
    }

    #[test]
    fn test_bad_header_is_skipped() {
        let src = "CREATE TRIGGER t SOMETIMES INSERT ON x BEGIN NULL; END;";
        let (h, diags) = header(src);
        assert_eq!(h.metadata, None);
        assert_eq!(h.body_start, 7);
        assert_eq!(diags.for_stage(Stage::Header).count(), 1);
    }
}
