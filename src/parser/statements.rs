//! Recursive-descent statement parser.
//!
//! A statement ends at the first `;` where no parenthesis, `IF`, `CASE`,
//! `LOOP` or `BEGIN` opened inside it is still open. Each delimited span is
//! then dispatched on its leading keyword. Compound statements parse their
//! branch bodies by calling back into [`parse_statements`].
//!
//! Spans that match no form, and compound statements that are malformed,
//! become a [`Statement::RawStatement`] over the whole span with a warning.

use crate::ast::{
    Block, ConditionalBranch, CursorOp, Fragment, InsertStatement, InsertTarget, SqlStatement,
    Statement, StatementList,
};
use crate::ast::visit::child_path;
use crate::diagnostics::Stage;
use crate::lexer::{Token, TokenKind, render};

use super::nesting::{find_at_depth, find_clause, matching_paren, split_commas};
use super::{ParseContext, TokenCursor, parse_declarations, parse_handlers, split};

/// Parse a statement sequence.
pub fn parse_statements(tokens: &[Token], ctx: &mut ParseContext) -> StatementList {
    let mut statements = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let Some((name, next)) = label_at(tokens, i) {
            ctx.statements_found += 1;
            statements.push(Statement::Label { name });
            i = next;
            continue;
        }

        let end = statement_end(tokens, i);
        let span = &tokens[i..end.unwrap_or(tokens.len())];
        i = end.map_or(tokens.len(), |e| e + 1);
        if span.is_empty() {
            continue;
        }
        let path = child_path(&ctx.prefix, statements.len());
        if end.is_none() {
            ctx.diagnostics.warn_at(
                Stage::Statement,
                Some(span[0].offset),
                &path,
                "statement is missing its terminating ';'",
            );
        }

        ctx.statements_found += 1;
        let (found, diagnostics) = (ctx.statements_found, ctx.diagnostics.len());
        // Branches of a compound statement are parsed under its path.
        let outer = std::mem::replace(&mut ctx.prefix, path);
        let parsed = statement(span, ctx);
        let path = std::mem::replace(&mut ctx.prefix, outer);
        let statement = match parsed {
            Ok(statement) => statement,
            Err(msg) => {
                // The span is kept whole: drop whatever its branches recorded.
                ctx.statements_found = found;
                ctx.diagnostics.truncate(diagnostics);
                let text = Fragment::from_tokens(span);
                ctx.diagnostics.warn_at(
                    Stage::Statement,
                    Some(text.offset),
                    &path,
                    format!("{}; kept verbatim", msg),
                );
                Statement::RawStatement { text }
            }
        };
        statements.push(statement);
    }
    statements
}

/// Index of the `;` ending the statement at `i`. A `DECLARE` block's
/// declarations end in `;` too, so its search starts at the `BEGIN`.
fn statement_end(tokens: &[Token], i: usize) -> Option<usize> {
    let from = if tokens[i].is_keyword("DECLARE") {
        find_at_depth(tokens, i, |t, j| t[j].is_keyword("BEGIN")).unwrap_or(i)
    } else {
        i
    };
    find_at_depth(tokens, from, |t, j| t[j].is_punct(';'))
}

/// `<<name>>` at `i`.
fn label_at(tokens: &[Token], i: usize) -> Option<(String, usize)> {
    match tokens.get(i..i + 3)? {
        [open, name, close]
            if open.is_op("<<") && name.kind == TokenKind::Identifier && close.is_op(">>") =>
        {
            Some((name.text.clone(), i + 3))
        }
        _ => None,
    }
}

/// Parse one `;`-free span. `Err` carries the reason it is kept raw.
fn statement(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let first = &span[0];
    if first.kind == TokenKind::Keyword {
        match first.upper().as_str() {
            "IF" => return if_statement(span, ctx),
            "CASE" => return case_statement(span, ctx),
            "FOR" => return for_loop(span, ctx),
            "WHILE" => return while_loop(span, ctx),
            "LOOP" => return plain_loop(span, ctx),
            "DECLARE" | "BEGIN" => return block(span, ctx),
            "SELECT" | "WITH" => return Ok(Statement::Select(sql(span))),
            "INSERT" => {
                return Ok(Statement::Insert(InsertStatement {
                    sql: Fragment::from_tokens(span),
                    target: insert_target(span),
                }));
            }
            "UPDATE" => return Ok(Statement::Update(sql(span))),
            "DELETE" => return Ok(Statement::Delete(sql(span))),
            "RAISE" => return raise(span),
            "NULL" if span.len() == 1 => return Ok(Statement::Null),
            "EXIT" => {
                let (label, condition) = exit_clause(span)?;
                return Ok(Statement::Exit { label, condition });
            }
            "CONTINUE" => {
                let (label, condition) = exit_clause(span)?;
                return Ok(Statement::Continue { label, condition });
            }
            "RETURN" => {
                let expr = (span.len() > 1).then(|| Fragment::from_tokens(&span[1..]));
                return Ok(Statement::Return { expr });
            }
            "OPEN" => return cursor_op(CursorOp::Open, span),
            "FETCH" => return cursor_op(CursorOp::Fetch, span),
            "CLOSE" => return cursor_op(CursorOp::Close, span),
            "EXECUTE" => return execute_immediate(span),
            _ => {}
        }
    }

    if let Some(at) = find_at_depth(span, 0, |t, j| t[j].is_op(":=")) {
        return assignment(span, at);
    }
    if first.kind == TokenKind::Identifier {
        return procedure_call(span);
    }
    Err(format!("unsupported statement starting with '{}'", first.text))
}

fn sql(span: &[Token]) -> SqlStatement {
    SqlStatement {
        sql: Fragment::from_tokens(span),
    }
}

/// Span ends with `END <keyword> [label]`: index of that `END`.
fn closing_end(span: &[Token], keyword: &str) -> Option<usize> {
    let n = span.len();
    let at = |k: usize| span.get(k);
    if n >= 2 && at(n - 2)?.is_keyword("END") && at(n - 1)?.is_keyword(keyword) {
        return Some(n - 2);
    }
    if n >= 3
        && at(n - 3)?.is_keyword("END")
        && at(n - 2)?.is_keyword(keyword)
        && at(n - 1)?.is_identifier()
    {
        return Some(n - 3);
    }
    None
}

/// `IF cond THEN ... [ELSIF cond THEN ...]* [ELSE ...] END IF`
fn if_statement(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let end = closing_end(span, "IF").ok_or("IF without END IF")?;
    let inner = &span[..end];

    let (condition, mut cursor) = condition_then(inner, 1, "IF")?;
    let mut branches = Vec::new();
    let mut else_branch = None;
    // Condition of the arm being read; `None` once inside ELSE.
    let mut current = Some(condition);

    loop {
        let stop = find_clause(inner, cursor, &["ELSIF", "ELSE"]).unwrap_or(inner.len());
        let branch = match (&current, branches.len()) {
            (None, _) => "else".to_string(),
            (Some(_), 0) => "then".to_string(),
            (Some(_), n) => format!("elsif{}", n),
        };
        let body = ctx.within(&branch, |ctx| parse_statements(&inner[cursor..stop], ctx));
        match current.take() {
            Some(condition) => branches.push(ConditionalBranch { condition, body }),
            None if stop == inner.len() => else_branch = Some(body),
            None => return Err("ELSE must be the last IF branch".to_string()),
        }
        if stop == inner.len() {
            break;
        }
        if inner[stop].is_keyword("ELSIF") {
            let (condition, next) = condition_then(inner, stop + 1, "ELSIF")?;
            current = Some(condition);
            cursor = next;
        } else {
            cursor = stop + 1;
        }
    }

    let mut branches = branches.into_iter();
    let first = branches.next().ok_or("IF without a THEN branch")?;
    Ok(Statement::If {
        condition: first.condition,
        then_branch: first.body,
        elsif_branches: branches.collect(),
        else_branch,
    })
}

/// Condition from `start` up to `THEN`; returns it and the index after `THEN`.
fn condition_then(tokens: &[Token], start: usize, what: &str) -> Result<(Fragment, usize), String> {
    let then = find_at_depth(tokens, start, |t, j| t[j].is_keyword("THEN"))
        .ok_or_else(|| format!("{} without THEN", what))?;
    if then == start {
        return Err(format!("{} without a condition", what));
    }
    Ok((Fragment::from_tokens(&tokens[start..then]), then + 1))
}

/// `CASE [selector] WHEN v THEN ... [WHEN ...]* [ELSE ...] END CASE`
fn case_statement(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let end = closing_end(span, "CASE").ok_or("CASE without END CASE")?;
    let inner = &span[..end];

    let first_when =
        find_at_depth(inner, 1, |t, j| t[j].is_keyword("WHEN")).ok_or("CASE without WHEN")?;
    let selector = (first_when > 1).then(|| Fragment::from_tokens(&inner[1..first_when]));

    let mut when_clauses = Vec::new();
    let mut else_branch = None;
    let mut at = first_when;
    loop {
        if inner[at].is_keyword("ELSE") {
            let stop = find_clause(inner, at + 1, &["WHEN", "ELSE"]).unwrap_or(inner.len());
            if stop != inner.len() {
                return Err("ELSE must be the last CASE branch".to_string());
            }
            else_branch = Some(ctx.within("else", |ctx| parse_statements(&inner[at + 1..], ctx)));
            break;
        }
        let (condition, body_start) = condition_then(inner, at + 1, "WHEN")?;
        let stop = find_clause(inner, body_start, &["WHEN", "ELSE"]).unwrap_or(inner.len());
        let branch = format!("when{}", when_clauses.len() + 1);
        let body = ctx.within(&branch, |ctx| parse_statements(&inner[body_start..stop], ctx));
        when_clauses.push(ConditionalBranch { condition, body });
        if stop == inner.len() {
            break;
        }
        at = stop;
    }

    Ok(Statement::Case {
        selector,
        when_clauses,
        else_branch,
    })
}

/// Index of the `LOOP` keyword opening the body, and the loop body tokens.
fn loop_body<'a>(span: &'a [Token], from: usize, what: &str) -> Result<(usize, &'a [Token]), String> {
    let end = closing_end(span, "LOOP").ok_or_else(|| format!("{} without END LOOP", what))?;
    let open = find_at_depth(&span[..end], from, |t, j| t[j].is_keyword("LOOP"))
        .ok_or_else(|| format!("{} without LOOP", what))?;
    Ok((open, &span[open + 1..end]))
}

fn body_statements(tokens: &[Token], ctx: &mut ParseContext) -> StatementList {
    ctx.within("body", |ctx| parse_statements(tokens, ctx))
}

/// `FOR v IN (query) LOOP`, `FOR v IN cursor[(args)] LOOP`,
/// `FOR i IN [REVERSE] a..b LOOP`.
fn for_loop(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let loop_var = match span.get(1) {
        Some(t) if t.kind == TokenKind::Identifier => t.text.clone(),
        _ => return Err("FOR without a loop variable".to_string()),
    };
    if !span.get(2).is_some_and(|t| t.is_keyword("IN")) {
        return Err("FOR without IN".to_string());
    }
    let (open, body_tokens) = loop_body(span, 3, "FOR")?;
    let head = &span[3..open];
    if head.is_empty() {
        return Err("FOR without an iteration source".to_string());
    }

    if let Some(range) = find_at_depth(head, 0, |t, j| t[j].is_op("..")) {
        let reverse = head[0].is_keyword("REVERSE");
        let lower = &head[usize::from(reverse)..range];
        let upper = &head[range + 1..];
        if lower.is_empty() || upper.is_empty() {
            return Err("FOR range needs both bounds".to_string());
        }
        return Ok(Statement::NumericForLoop {
            loop_var,
            reverse,
            lower: Fragment::from_tokens(lower),
            upper: Fragment::from_tokens(upper),
            body: body_statements(body_tokens, ctx),
        });
    }

    let cursor_query = if head[0].is_punct('(') && matching_paren(head, 0) == Some(head.len() - 1) {
        Fragment::from_tokens(&head[1..head.len() - 1])
    } else {
        Fragment::from_tokens(head)
    };
    Ok(Statement::ForLoop {
        loop_var,
        cursor_query,
        body: body_statements(body_tokens, ctx),
    })
}

fn while_loop(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let (open, body_tokens) = loop_body(span, 1, "WHILE")?;
    if open == 1 {
        return Err("WHILE without a condition".to_string());
    }
    Ok(Statement::WhileLoop {
        condition: Fragment::from_tokens(&span[1..open]),
        body: body_statements(body_tokens, ctx),
    })
}

fn plain_loop(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let (_, body_tokens) = loop_body(span, 0, "LOOP")?;
    Ok(Statement::Loop {
        body: body_statements(body_tokens, ctx),
    })
}

/// Nested `[DECLARE ...] BEGIN ... [EXCEPTION ...] END [label]`.
fn block(span: &[Token], ctx: &mut ParseContext) -> Result<Statement, String> {
    let sections = split(span).map_err(|e| e.to_string())?;
    if !sections.trailing.is_empty() {
        return Err("unexpected text after the block's END".to_string());
    }
    for warning in &sections.warnings {
        ctx.diagnostics.warn_at(
            Stage::Structure,
            Some(warning.offset()),
            &ctx.prefix,
            warning.to_string(),
        );
    }

    let declarations = sections
        .declare
        .map(|tokens| parse_declarations(tokens, &mut ctx.diagnostics));
    let body = body_statements(sections.begin, ctx);
    let handlers = sections
        .exception
        .map(|tokens| parse_handlers(tokens, ctx))
        .unwrap_or_default();

    Ok(Statement::Block(Box::new(Block {
        declarations,
        body,
        handlers: handlers.handlers,
        unparsed_handlers: handlers.unparsed,
    })))
}

/// `INSERT INTO table [alias] (cols) VALUES (vals)`
fn insert_target(span: &[Token]) -> Option<InsertTarget> {
    let mut c = TokenCursor::new(span);
    c.expect_word("INSERT").ok()?;
    c.expect_word("INTO").ok()?;
    let table = c.qualified_name().ok()?;
    if c.peek().is_some_and(|t| t.is_identifier()) {
        c.seek(c.pos() + 1);
    }

    let cols_open = c.pos();
    if !c.peek()?.is_punct('(') {
        return None;
    }
    let cols_close = matching_paren(span, cols_open)?;
    let mut columns = Vec::new();
    for part in split_commas(&span[cols_open + 1..cols_close]) {
        match part {
            [col] if col.is_identifier() => columns.push(col.text.clone()),
            _ => return None,
        }
    }

    c.seek(cols_close + 1);
    c.expect_word("VALUES").ok()?;
    let vals_open = c.pos();
    if !c.peek()?.is_punct('(') {
        return None;
    }
    let vals_close = matching_paren(span, vals_open)?;
    if vals_close != span.len() - 1 {
        return None;
    }
    let values: Vec<Fragment> = split_commas(&span[vals_open + 1..vals_close])
        .into_iter()
        .map(Fragment::from_tokens)
        .collect();

    if values.len() != columns.len() || values.iter().any(Fragment::is_empty) {
        return None;
    }
    Some(InsertTarget {
        table,
        columns,
        values,
    })
}

/// `RAISE` or `RAISE name`.
fn raise(span: &[Token]) -> Result<Statement, String> {
    let offset = span[0].offset;
    if span.len() == 1 {
        return Ok(Statement::Raise {
            exception_name: None,
            offset,
        });
    }
    let mut c = TokenCursor::new(&span[1..]);
    let name = c.qualified_name()?;
    if !c.is_done() {
        return Err("RAISE takes a single exception name".to_string());
    }
    Ok(Statement::Raise {
        exception_name: Some(name),
        offset,
    })
}

/// `[label] [WHEN cond]` after EXIT / CONTINUE.
fn exit_clause(span: &[Token]) -> Result<(Option<String>, Option<Fragment>), String> {
    let mut rest = &span[1..];
    let mut label = None;
    if let Some(first) = rest.first() {
        if first.is_identifier() {
            label = Some(first.text.clone());
            rest = &rest[1..];
        }
    }
    let condition = match rest {
        [] => None,
        [when, cond @ ..] if when.is_keyword("WHEN") && !cond.is_empty() => {
            Some(Fragment::from_tokens(cond))
        }
        _ => return Err(format!("malformed {}", span[0].upper())),
    };
    Ok((label, condition))
}

fn cursor_op(op: CursorOp, span: &[Token]) -> Result<Statement, String> {
    if span.len() < 2 {
        return Err(format!("{} without a cursor", op.keyword()));
    }
    Ok(Statement::Cursor {
        op,
        text: Fragment::from_tokens(&span[1..]),
    })
}

fn execute_immediate(span: &[Token]) -> Result<Statement, String> {
    match span {
        [_, immediate, rest @ ..] if immediate.is_word("IMMEDIATE") && !rest.is_empty() => {
            Ok(Statement::ExecuteImmediate {
                sql: Fragment::from_tokens(rest),
            })
        }
        _ => Err("EXECUTE without IMMEDIATE".to_string()),
    }
}

fn assignment(span: &[Token], at: usize) -> Result<Statement, String> {
    let target = &span[..at];
    let expr = &span[at + 1..];
    if target.is_empty() || expr.is_empty() {
        return Err("incomplete assignment".to_string());
    }
    Ok(Statement::Assignment {
        target: Fragment::from_tokens(target),
        expr: Fragment::from_tokens(expr),
    })
}

/// `name[.name]* [( args )]`
fn procedure_call(span: &[Token]) -> Result<Statement, String> {
    let offset = span[0].offset;
    let mut c = TokenCursor::new(span);
    let name = c.qualified_name()?;
    let rest = c.rest();

    let args = match rest {
        [] => Vec::new(),
        [open, ..] if open.is_punct('(') && matching_paren(rest, 0) == Some(rest.len() - 1) => {
            let inner = &rest[1..rest.len() - 1];
            if inner.is_empty() {
                Vec::new()
            } else {
                split_commas(inner)
                    .into_iter()
                    .map(Fragment::from_tokens)
                    .collect()
            }
        }
        _ => {
            return Err(format!(
                "unsupported statement '{} {}'",
                name,
                render(&rest[..rest.len().min(3)])
            ));
        }
    };
    Ok(Statement::ProcedureCall { name, args, offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> (StatementList, ParseContext) {
        let tokens = tokenize(src).unwrap();
        let mut ctx = ParseContext::new();
        let statements = parse_statements(&tokens, &mut ctx);
        (statements, ctx)
    }

    #[test]
    fn test_assignments_are_not_grouped() {
        let (stmts, ctx) = parse("a := 1; b := a + 1; :new.c := b;");
        assert_eq!(stmts.len(), 3);
        assert_eq!(ctx.statements_found, 3);
        assert!(stmts.iter().all(|s| s.kind_name() == "assignment"));
        match &stmts[2] {
            Statement::Assignment { target, expr } => {
                assert_eq!(target.text, ":new.c");
                assert_eq!(expr.text, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_elsif_else() {
        let (stmts, ctx) = parse(
            "IF a > 1 THEN x := 1; y := 2;
             ELSIF a = 0 THEN x := 0;
             ELSE IF b THEN NULL; ELSE z := 3; END IF;
             END IF;",
        );
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Statement::If {
                condition,
                then_branch,
                elsif_branches,
                else_branch,
            } => {
                assert_eq!(condition.text, "a > 1");
                assert_eq!(then_branch.len(), 2);
                assert_eq!(elsif_branches.len(), 1);
                assert_eq!(elsif_branches[0].condition.text, "a = 0");
                let else_branch = else_branch.as_ref().unwrap();
                assert_eq!(else_branch.len(), 1);
                assert_eq!(else_branch[0].kind_name(), "if");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.statements_found, 7);
    }

    #[test]
    fn test_if_without_then_is_raw() {
        let (stmts, ctx) = parse("IF a x := 1; END IF; y := 2;");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].is_raw());
        assert_eq!(stmts[1].kind_name(), "assignment");
        assert_eq!(ctx.diagnostics.for_stage(Stage::Statement).count(), 1);
    }

    #[test]
    fn test_case_forms() {
        let (stmts, ctx) = parse(
            "CASE v WHEN 1 THEN x := 'a'; WHEN 2 THEN x := 'b'; ELSE x := CASE WHEN y THEN 1 END; END CASE;
             CASE WHEN a > 0 THEN NULL; END CASE;",
        );
        assert!(ctx.diagnostics.is_empty());
        match &stmts[0] {
            Statement::Case {
                selector,
                when_clauses,
                else_branch,
            } => {
                assert_eq!(selector.as_ref().unwrap().text, "v");
                assert_eq!(when_clauses.len(), 2);
                assert_eq!(when_clauses[1].condition.text, "2");
                assert_eq!(else_branch.as_ref().unwrap().len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Statement::Case { selector, when_clauses, .. } => {
                assert!(selector.is_none());
                assert_eq!(when_clauses[0].condition.text, "a > 0");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_loops() {
        let (stmts, ctx) = parse(
            "FOR r IN (SELECT id FROM t WHERE x = 1) LOOP v := r.id; END LOOP;
             FOR i IN REVERSE 1..v_max LOOP NULL; END LOOP;
             FOR r IN c_items(5) LOOP NULL; END LOOP;
             WHILE v < 10 LOOP v := v + 1; EXIT WHEN v = 5; END LOOP;
             <<outer>> LOOP EXIT outer; END LOOP outer;",
        );
        assert!(ctx.diagnostics.is_empty());
        let kinds: Vec<_> = stmts.iter().map(Statement::kind_name).collect();
        assert_eq!(
            kinds,
            vec!["for_loop", "numeric_for_loop", "for_loop", "while_loop", "label", "loop"]
        );
        match &stmts[0] {
            Statement::ForLoop { loop_var, cursor_query, body } => {
                assert_eq!(loop_var, "r");
                assert_eq!(cursor_query.text, "SELECT id FROM t WHERE x = 1");
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Statement::NumericForLoop { reverse, lower, upper, .. } => {
                assert!(reverse);
                assert_eq!(lower.text, "1");
                assert_eq!(upper.text, "v_max");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[2] {
            Statement::ForLoop { cursor_query, .. } => assert_eq!(cursor_query.text, "c_items(5)"),
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[3] {
            Statement::WhileLoop { body, .. } => match &body[1] {
                Statement::Exit { label, condition } => {
                    assert_eq!(label, &None);
                    assert_eq!(condition.as_ref().unwrap().text, "v = 5");
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_block() {
        let (stmts, ctx) = parse(
            "DECLARE v NUMBER; BEGIN v := 1; EXCEPTION WHEN OTHERS THEN NULL; END;
             BEGIN NULL; END inner_blk;",
        );
        assert!(ctx.diagnostics.is_empty());
        match &stmts[0] {
            Statement::Block(block) => {
                assert_eq!(block.declarations.as_ref().unwrap().variables.len(), 1);
                assert_eq!(block.body.len(), 1);
                assert_eq!(block.handlers.len(), 1);
                assert!(block.handlers[0].is_others());
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Statement::Block(block) => assert!(block.declarations.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.statements_found, 5);
    }

    #[test]
    fn test_dml_and_insert_target() {
        let (stmts, _) = parse(
            "INSERT INTO audit_log (id, action, at) VALUES (audit_seq.NEXTVAL, 'U', SYSDATE);
             INSERT INTO t SELECT * FROM s;
             UPDATE t SET a = 1 WHERE id = :new.id;
             DELETE FROM t WHERE id = :old.id;
             SELECT COUNT(*) INTO v FROM t;",
        );
        let kinds: Vec<_> = stmts.iter().map(Statement::kind_name).collect();
        assert_eq!(kinds, vec!["insert", "insert", "update", "delete", "select"]);
        match &stmts[0] {
            Statement::Insert(insert) => {
                let target = insert.target.as_ref().unwrap();
                assert_eq!(target.table, "audit_log");
                assert_eq!(target.columns, vec!["id", "action", "at"]);
                assert_eq!(target.values[0].text, "audit_seq.NEXTVAL");
                assert_eq!(target.values[1].text, "'U'");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Statement::Insert(insert) => assert!(insert.target.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_calls_and_raise() {
        let (stmts, ctx) = parse(
            "log_change(:new.id, 'X'); pkg.refresh; RAISE_APPLICATION_ERROR(-20001, 'bad');
             RAISE e_bad; RAISE;",
        );
        assert!(ctx.diagnostics.is_empty());
        match &stmts[0] {
            Statement::ProcedureCall { name, args, .. } => {
                assert_eq!(name, "log_change");
                assert_eq!(args.len(), 2);
                assert_eq!(args[0].text, ":new.id");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1] {
            Statement::ProcedureCall { name, args, .. } => {
                assert_eq!(name, "pkg.refresh");
                assert!(args.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[2] {
            Statement::ProcedureCall { args, .. } => assert_eq!(args[0].text, "-20001"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            &stmts[3],
            Statement::Raise { exception_name: Some(name), .. } if name == "e_bad"
        ));
        assert!(matches!(stmts[4], Statement::Raise { exception_name: None, .. }));
    }

    #[test]
    fn test_misc_leaf_statements() {
        let (stmts, ctx) = parse(
            "NULL; RETURN; EXECUTE IMMEDIATE 'TRUNCATE TABLE t';
             OPEN c_items(1); FETCH c_items INTO r; CLOSE c_items;",
        );
        assert!(ctx.diagnostics.is_empty());
        let kinds: Vec<_> = stmts.iter().map(Statement::kind_name).collect();
        assert_eq!(
            kinds,
            vec!["null", "return", "execute_immediate", "cursor", "cursor", "cursor"]
        );
        match &stmts[4] {
            Statement::Cursor { op, text } => {
                assert_eq!(*op, CursorOp::Fetch);
                assert_eq!(text.text, "c_items INTO r");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_statements_are_raw() {
        let (stmts, ctx) = parse("COMMIT; MERGE INTO t USING s ON (1 = 1); GOTO done;");
        assert_eq!(stmts.len(), 3);
        assert!(stmts.iter().all(Statement::is_raw));
        assert_eq!(ctx.statements_found, 3);
        assert_eq!(ctx.diagnostics.len(), 3);
    }

    #[test]
    fn test_diagnostics_carry_statement_paths() {
        let (_, ctx) = parse(
            "IF a THEN COMMIT; ELSE x := 1; END IF;
             BEGIN NULL; GOTO done; EXCEPTION WHEN OTHERS THEN ROLLBACK; END;
             CASE WHEN b THEN NULL; WHEN c THEN LOOP SAVEPOINT s; END LOOP; END CASE;",
        );
        let paths: Vec<_> = ctx.diagnostics.iter().map(|d| d.path.as_deref()).collect();
        assert_eq!(
            paths,
            vec![
                Some("1.then.1"),
                Some("2.body.2"),
                Some("2.handler1.1"),
                Some("3.when2.1.body.1"),
            ]
        );
    }
}
