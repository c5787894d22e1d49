//! Structural traversal with path-based statement ids.
//!
//! Paths are derived from tree position only: top-level statements are
//! `1`, `2`, ...; children append their branch and 1-based index, e.g.
//! `2.then.1`, `2.elsif1.3`, `4.body.2`, `5.handler2.1`. Unit-level
//! handlers start at `handler1`.

use super::{ExceptionHandler, Statement};

/// Visit every statement depth-first, parents before children.
pub fn walk<'a>(list: &'a [Statement], f: &mut impl FnMut(&str, &'a Statement)) {
    walk_list(list, "", f);
}

/// Visit the bodies of unit-level exception handlers.
pub fn walk_handlers<'a>(
    handlers: &'a [ExceptionHandler],
    f: &mut impl FnMut(&str, &'a Statement),
) {
    for (k, handler) in handlers.iter().enumerate() {
        walk_list(&handler.body, &format!("handler{}", k + 1), f);
    }
}

/// Path of the `index`-th (0-based) child under `prefix`.
pub fn child_path(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        format!("{}", index + 1)
    } else {
        format!("{}.{}", prefix, index + 1)
    }
}

fn walk_list<'a>(list: &'a [Statement], prefix: &str, f: &mut impl FnMut(&str, &'a Statement)) {
    for (i, stmt) in list.iter().enumerate() {
        let path = child_path(prefix, i);
        f(&path, stmt);
        walk_children(stmt, &path, f);
    }
}

fn walk_children<'a>(stmt: &'a Statement, path: &str, f: &mut impl FnMut(&str, &'a Statement)) {
    match stmt {
        Statement::If {
            then_branch,
            elsif_branches,
            else_branch,
            ..
        } => {
            walk_list(then_branch, &format!("{}.then", path), f);
            for (k, branch) in elsif_branches.iter().enumerate() {
                walk_list(&branch.body, &format!("{}.elsif{}", path, k + 1), f);
            }
            if let Some(body) = else_branch {
                walk_list(body, &format!("{}.else", path), f);
            }
        }
        Statement::Case {
            when_clauses,
            else_branch,
            ..
        } => {
            for (k, branch) in when_clauses.iter().enumerate() {
                walk_list(&branch.body, &format!("{}.when{}", path, k + 1), f);
            }
            if let Some(body) = else_branch {
                walk_list(body, &format!("{}.else", path), f);
            }
        }
        Statement::ForLoop { body, .. }
        | Statement::NumericForLoop { body, .. }
        | Statement::WhileLoop { body, .. }
        | Statement::Loop { body } => walk_list(body, &format!("{}.body", path), f),
        Statement::Block(block) => {
            walk_list(&block.body, &format!("{}.body", path), f);
            for (k, handler) in block.handlers.iter().enumerate() {
                walk_list(&handler.body, &format!("{}.handler{}", path, k + 1), f);
            }
        }
        Statement::Select(_)
        | Statement::Insert(_)
        | Statement::Update(_)
        | Statement::Delete(_)
        | Statement::Assignment { .. }
        | Statement::Exit { .. }
        | Statement::Continue { .. }
        | Statement::Return { .. }
        | Statement::ProcedureCall { .. }
        | Statement::Raise { .. }
        | Statement::ExecuteImmediate { .. }
        | Statement::Cursor { .. }
        | Statement::Label { .. }
        | Statement::Null
        | Statement::RawStatement { .. } => {}
    }
}

/// Typed vs raw-fallback statement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementStats {
    pub typed: usize,
    pub raw: usize,
}

impl StatementStats {
    /// Count one statement. A block also counts its unparsed handler text
    /// as raw.
    pub fn record(&mut self, stmt: &Statement) {
        if stmt.is_raw() {
            self.raw += 1;
        } else {
            self.typed += 1;
        }
        if let Statement::Block(block) = stmt {
            self.raw += block.unparsed_handlers.len();
        }
    }

    pub fn total(&self) -> usize {
        self.typed + self.raw
    }
}
