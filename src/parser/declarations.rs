//! DECLARE section parser.
//!
//! Each declaration ends at a `;` outside parentheses. Forms are tried in
//! order:
//!
//! 1. `name EXCEPTION`
//! 2. `name CONSTANT type [NOT NULL] {:= | DEFAULT} expr`
//! 3. `CURSOR name [(params)] [RETURN type] IS query`
//! 4. `name type [NOT NULL] [{:= | DEFAULT} expr]`
//!
//! Anything else is kept as a [`RawDeclaration`] with a warning, so each
//! declaration in the input appears exactly once in the output.

use crate::ast::{
    Constant, CursorDecl, CursorParam, Declarations, DeclaredType, ExceptionDecl, Fragment,
    Initializer, RawDeclaration, Variable,
};
use crate::diagnostics::{Diagnostics, Stage};
use crate::lexer::{Token, TokenKind, render, unquote};

use super::TokenCursor;
use super::nesting::{find_at_depth, matching_paren, split_commas};

enum Declaration {
    Variable(Variable),
    Constant(Constant),
    Exception(ExceptionDecl),
    Cursor(CursorDecl),
}

pub fn parse_declarations(tokens: &[Token], diagnostics: &mut Diagnostics) -> Declarations {
    let mut decls = Declarations::default();
    let mut start = 0;
    while start < tokens.len() {
        let end = find_at_depth(tokens, start, |t, i| t[i].is_punct(';'));
        let span = &tokens[start..end.unwrap_or(tokens.len())];
        start = end.map_or(tokens.len(), |e| e + 1);
        if span.is_empty() {
            continue;
        }
        if end.is_none() {
            diagnostics.warn(
                Stage::Declaration,
                Some(span[0].offset),
                "declaration is missing its terminating ';'",
            );
        }

        match declaration(span) {
            Ok(Declaration::Variable(v)) => decls.variables.push(v),
            Ok(Declaration::Constant(c)) => decls.constants.push(c),
            Ok(Declaration::Exception(e)) => decls.exceptions.push(e),
            Ok(Declaration::Cursor(c)) => decls.cursors.push(c),
            Err(msg) => {
                let text = Fragment::from_tokens(span);
                diagnostics.warn(
                    Stage::Declaration,
                    Some(text.offset),
                    format!("{}: {}", msg, text.text),
                );
                decls.raw.push(RawDeclaration { text });
            }
        }
    }
    tracing::debug!("parsed {} declarations", decls.len());
    decls
}

fn declaration(span: &[Token]) -> Result<Declaration, String> {
    let first = &span[0];
    if first.is_keyword("CURSOR") {
        return cursor(span).map(Declaration::Cursor);
    }
    if first.is_keyword("PRAGMA") {
        return Err("PRAGMA kept verbatim".to_string());
    }
    if first.is_word("TYPE") || first.is_word("SUBTYPE") {
        return Err("type definitions are not supported".to_string());
    }
    if first.kind != TokenKind::Identifier {
        return Err("unrecognized declaration".to_string());
    }
    let name = first.text.clone();
    let offset = first.offset;

    if span.len() == 2 && span[1].is_keyword("EXCEPTION") {
        return Ok(Declaration::Exception(ExceptionDecl { name, offset }));
    }

    if span.get(1).is_some_and(|t| t.is_keyword("CONSTANT")) {
        let (declared_type, _, init) = typed_initializer(&span[2..])?;
        let value = init.ok_or_else(|| format!("constant {} has no value", name))?;
        let value = value.ok_or_else(|| format!("constant {} is NULL", name))?;
        return Ok(Declaration::Constant(Constant {
            name,
            declared_type,
            value,
            offset,
        }));
    }

    let (declared_type, not_null, init) = typed_initializer(&span[1..])?;
    Ok(Declaration::Variable(Variable {
        name,
        declared_type,
        default: init.flatten(),
        not_null,
        offset,
    }))
}

/// `type [NOT NULL] [{:= | DEFAULT} expr]`. The initializer is
/// `Some(None)` for an explicit `NULL`.
#[allow(clippy::type_complexity)]
fn typed_initializer(
    tokens: &[Token],
) -> Result<(DeclaredType, bool, Option<Option<Initializer>>), String> {
    let assign = find_at_depth(tokens, 0, |t, i| t[i].is_op(":=") || t[i].is_keyword("DEFAULT"));
    let mut type_tokens = &tokens[..assign.unwrap_or(tokens.len())];

    let mut not_null = false;
    if let [head @ .., not, null] = type_tokens {
        if not.is_keyword("NOT") && null.is_keyword("NULL") {
            not_null = true;
            type_tokens = head;
        }
    }

    let type_text = render(type_tokens);
    let declared_type =
        DeclaredType::parse(&type_text).ok_or_else(|| format!("unrecognized type '{}'", type_text))?;

    let init = match assign {
        Some(at) => Some(initializer(&tokens[at + 1..])?),
        None => None,
    };
    Ok((declared_type, not_null, init))
}

/// `None` for the literal `NULL`.
fn initializer(tokens: &[Token]) -> Result<Option<Initializer>, String> {
    match tokens {
        [] => Err("missing initializer expression".to_string()),
        [only] if only.is_keyword("NULL") => Ok(None),
        [only] if only.kind == TokenKind::StringLiteral => match unquote(&only.text) {
            Some(s) => Ok(Some(Initializer::String(s))),
            None => Ok(Some(Initializer::Expr(Fragment::from_tokens(tokens)))),
        },
        _ => Ok(Some(Initializer::Expr(Fragment::from_tokens(tokens)))),
    }
}

fn cursor(span: &[Token]) -> Result<CursorDecl, String> {
    let mut c = TokenCursor::new(span);
    c.expect_word("CURSOR")?;
    let offset = span[0].offset;
    let name = c.identifier()?;

    let mut parameters = Vec::new();
    if c.peek().is_some_and(|t| t.is_punct('(')) {
        let open = c.pos();
        let close = matching_paren(span, open).ok_or("unclosed cursor parameter list")?;
        for param in split_commas(&span[open + 1..close]) {
            parameters.push(cursor_param(param)?);
        }
        c.seek(close + 1);
    }

    if c.eat_word("RETURN") {
        let is = find_at_depth(span, c.pos(), |t, i| t[i].is_keyword("IS"))
            .ok_or("cursor has no IS")?;
        c.seek(is);
    }
    c.expect_word("IS")?;
    if c.is_done() {
        return Err(format!("cursor {} has no query", name));
    }

    Ok(CursorDecl {
        name,
        parameters,
        query: Fragment::from_tokens(c.rest()),
        offset,
    })
}

/// `name [IN] type [{:= | DEFAULT} expr]`
fn cursor_param(tokens: &[Token]) -> Result<CursorParam, String> {
    let (name, rest) = match tokens {
        [name, rest @ ..] if name.kind == TokenKind::Identifier => (name.text.clone(), rest),
        _ => return Err("malformed cursor parameter".to_string()),
    };
    let rest = match rest {
        [mode, tail @ ..] if mode.is_keyword("IN") => tail,
        _ => rest,
    };
    let (declared_type, _, _) = typed_initializer(rest)?;
    Ok(CursorParam {
        name,
        declared_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeAttribute;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn decls(src: &str) -> (Declarations, Diagnostics) {
        let tokens = tokenize(src).unwrap();
        let mut diagnostics = Diagnostics::new();
        (parse_declarations(&tokens, &mut diagnostics), diagnostics)
    }

    #[test]
    fn test_variables() {
        let (d, diags) = decls(
            "v_count NUMBER := 0;
             v_name VARCHAR2(100) DEFAULT 'n/a';
             v_sal emp.salary%TYPE;
             v_flag BOOLEAN NOT NULL := FALSE;
             v_empty DATE := NULL;",
        );
        assert!(diags.is_empty());
        assert_eq!(d.variables.len(), 5);

        assert_eq!(d.variables[0].name, "v_count");
        assert_eq!(
            d.variables[0].default,
            Some(Initializer::Expr(Fragment::new("0", 18)))
        );
        assert_eq!(
            d.variables[1].default,
            Some(Initializer::String("n/a".to_string()))
        );
        assert_eq!(d.variables[1].declared_type.modifiers, vec!["100"]);
        assert_eq!(
            d.variables[2].declared_type.attribute,
            Some(TypeAttribute::Type)
        );
        assert!(d.variables[3].not_null);
        assert_eq!(d.variables[4].default, None);
    }

    #[test]
    fn test_constants_and_exceptions() {
        let (d, diags) = decls(
            "c_limit CONSTANT NUMBER(10, 2) := 1000.50;
             c_msg CONSTANT VARCHAR2(20) := 'it''s';
             e_too_big EXCEPTION;",
        );
        assert!(diags.is_empty());
        assert_eq!(d.constants.len(), 2);
        assert_eq!(d.constants[0].declared_type.modifiers, vec!["10", "2"]);
        assert_eq!(d.constants[1].value, Initializer::String("it's".to_string()));
        assert_eq!(d.exceptions.len(), 1);
        assert!(d.declares_exception("E_TOO_BIG"));
    }

    #[test]
    fn test_cursor() {
        let (d, diags) = decls(
            "CURSOR c_items (p_order NUMBER, p_status IN VARCHAR2 DEFAULT 'OPEN') IS
               SELECT id, qty FROM order_items WHERE order_id = p_order;",
        );
        assert!(diags.is_empty());
        let cursor = &d.cursors[0];
        assert_eq!(cursor.name, "c_items");
        assert_eq!(cursor.parameters.len(), 2);
        assert_eq!(cursor.parameters[1].declared_type.name, "VARCHAR2");
        assert_eq!(
            cursor.query.text,
            "SELECT id, qty FROM order_items WHERE order_id = p_order"
        );
    }

    #[test]
    fn test_unparseable_declarations_are_kept() {
        let (d, diags) = decls(
            "PRAGMA AUTONOMOUS_TRANSACTION;
             TYPE t_ids IS TABLE OF NUMBER;
             v_ok NUMBER;
             c_bad CONSTANT NUMBER;",
        );
        assert_eq!(d.variables.len(), 1);
        assert_eq!(d.raw.len(), 3);
        assert_eq!(d.raw[0].text.text, "PRAGMA AUTONOMOUS_TRANSACTION");
        assert_eq!(diags.for_stage(Stage::Declaration).count(), 3);
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn test_default_with_parentheses_and_semicolon_in_string() {
        let (d, diags) = decls("v_x VARCHAR2(10) := NVL(f(1, 2), ';');");
        assert!(diags.is_empty());
        assert_eq!(
            d.variables[0].default.as_ref().map(Initializer::to_sql),
            Some("NVL(f(1, 2), ';')".to_string())
        );
    }
}
