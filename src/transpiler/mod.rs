//! PL/pgSQL code generation.
//!
//! Walks a [`TriggerUnit`] and emits an equivalent PostgreSQL block. The
//! tree shape is kept: IF stays IF, nested blocks stay nested, and every
//! statement produces exactly one output statement. Leaf SQL and
//! expressions go through the token rewriter under a [`DialectMapping`].

pub mod emitter;
pub mod mapping;
mod rewrite;


pub use emitter::Emitter;
pub use mapping::{DialectMapping, MappingFile, Template};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    Block, ConditionalBranch, Constant, CursorDecl, Declarations, DeclaredType, EventKind,
    ExceptionDecl, ExceptionHandler, Fragment, Initializer, RawDeclaration, Statement,
    TriggerMetadata, TriggerTiming, TriggerUnit, Variable,
};
use crate::ast::visit::child_path;
use crate::diagnostics::{Diagnostic, Diagnostics, Stage};
use crate::error::TranslateResult;
use rewrite::{Finding, Rewriter};

/// How the translated block is packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    /// A bare `DECLARE ... BEGIN ... END;` block.
    #[default]
    Block,
    /// `CREATE FUNCTION ... RETURNS trigger` plus `CREATE TRIGGER`.
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    pub wrap: WrapMode,
    /// Precede raw statements with a review comment.
    pub annotate_raw: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            indent: 4,
            wrap: WrapMode::Block,
            annotate_raw: true,
        }
    }
}

/// Generated PL/pgSQL plus the mapping diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub sql: String,
    pub diagnostics: Diagnostics,
}

/// Render a node as PL/pgSQL under a mapping, dropping diagnostics.
pub trait ToPlpgsql {
    fn to_plpgsql(&self, mapping: &DialectMapping) -> String;
}

impl ToPlpgsql for DeclaredType {
    fn to_plpgsql(&self, mapping: &DialectMapping) -> String {
        mapping.map_type(self).unwrap_or_else(|| self.to_string())
    }
}

impl ToPlpgsql for TriggerMetadata {
    /// The `CREATE TRIGGER` statement.
    fn to_plpgsql(&self, mapping: &DialectMapping) -> String {
        let rewriter = Rewriter::new(mapping)
            .with_aliases(self.new_alias.as_deref(), self.old_alias.as_deref())
            .for_when_clause();
        let when = self
            .when
            .as_ref()
            .map(|w| rewriter.fragment(w, &mut Vec::new()));
        create_trigger(self, when.as_deref())
    }
}

impl ToPlpgsql for TriggerUnit {
    fn to_plpgsql(&self, mapping: &DialectMapping) -> String {
        generate(self, mapping, &GenerateOptions::default())
            .map(|g| g.sql)
            .unwrap_or_default()
    }
}

/// Translate one trigger unit.
pub fn generate(
    unit: &TriggerUnit,
    mapping: &DialectMapping,
    options: &GenerateOptions,
) -> TranslateResult<Generated> {
    let mut generator = Generator::new(unit, mapping, options);
    match options.wrap {
        WrapMode::Block => generator.unit_block()?,
        WrapMode::Function => generator.function()?,
    }
    let generated = generator.finish();
    tracing::debug!(
        "generated {} bytes with {} mapping diagnostics",
        generated.sql.len(),
        generated.diagnostics.len()
    );
    Ok(generated)
}

struct Generator<'a> {
    unit: &'a TriggerUnit,
    mapping: &'a DialectMapping,
    options: &'a GenerateOptions,
    rewriter: Rewriter<'a>,
    out: Emitter,
    diagnostics: Diagnostics,
    reported: BTreeSet<String>,
    user_exceptions: BTreeSet<String>,
    /// Row returned by a bare `RETURN` in function mode.
    return_row: Option<&'static str>,
}

/// One declaration, for emitting in source order.
enum DeclItem<'a> {
    Variable(&'a Variable),
    Constant(&'a Constant),
    Cursor(&'a CursorDecl),
    Exception(&'a ExceptionDecl),
    Raw(&'a RawDeclaration),
}

impl<'a> Generator<'a> {
    fn new(unit: &'a TriggerUnit, mapping: &'a DialectMapping, options: &'a GenerateOptions) -> Self {
        let meta = unit.metadata.as_ref();
        let rewriter = Rewriter::new(mapping)
            .with_aliases(
                meta.and_then(|m| m.new_alias.as_deref()),
                meta.and_then(|m| m.old_alias.as_deref()),
            )
            .with_cursors(cursor_names(unit));
        Self {
            unit,
            mapping,
            options,
            rewriter,
            out: Emitter::new(options.indent),
            diagnostics: Diagnostics::new(),
            reported: BTreeSet::new(),
            user_exceptions: BTreeSet::new(),
            return_row: None,
        }
    }

    fn finish(self) -> Generated {
        Generated {
            sql: self.out.finish(),
            diagnostics: self.diagnostics,
        }
    }

    fn report(&mut self, path: Option<&str>, findings: Vec<Finding>) {
        for finding in findings {
            if self.reported.insert(finding.key) {
                self.diagnostics.push(Diagnostic {
                    severity: finding.severity,
                    stage: Stage::Mapping,
                    message: finding.message,
                    offset: Some(finding.offset),
                    path: path.map(str::to_string),
                });
            }
        }
    }

    fn warn_once(&mut self, key: String, offset: usize, path: Option<&str>, message: String) {
        self.report(path, vec![Finding::new(offset, key, message)]);
    }

    fn expr(&mut self, fragment: &Fragment, path: &str) -> String {
        self.rewrite(fragment, Some(path))
    }

    fn rewrite(&mut self, fragment: &Fragment, path: Option<&str>) -> String {
        let mut findings = Vec::new();
        let text = self.rewriter.fragment(fragment, &mut findings);
        self.report(path, findings);
        text
    }

    fn ty(&mut self, ty: &DeclaredType, offset: usize) -> String {
        let mut findings = Vec::new();
        let text = self.rewriter.map_type(ty, offset, &mut findings);
        self.report(None, findings);
        text
    }

    fn initializer(&mut self, init: &Initializer) -> String {
        match init {
            Initializer::String(_) => init.to_sql(),
            Initializer::Expr(fragment) => self.rewrite(fragment, None),
        }
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    fn unit_block(&mut self) -> fmt::Result {
        let unit = self.unit;
        self.block(
            &unit.declarations,
            &unit.body,
            &unit.exception_handlers,
            &unit.unparsed_handlers,
            "",
        )
    }

    fn function(&mut self) -> fmt::Result {
        let unit = self.unit;
        let meta = unit.metadata.as_ref();
        self.return_row = Some(trigger_return(meta));

        let function_name = match meta {
            Some(m) => format!("{}_fn", m.name),
            None => {
                self.warn_once(
                    "no-header".to_string(),
                    0,
                    None,
                    "no CREATE TRIGGER header; emitting the function only".to_string(),
                );
                "trigger_fn".to_string()
            }
        };

        let mut body = Emitter::new(self.options.indent);
        std::mem::swap(&mut self.out, &mut body);
        self.unit_block()?;
        std::mem::swap(&mut self.out, &mut body);
        let body = body.finish();
        let tag = if body.contains("$$") { "$body$" } else { "$$" };

        self.out
            .line(&format!("CREATE OR REPLACE FUNCTION {}()", function_name))?;
        self.out.line("RETURNS trigger")?;
        self.out.line("LANGUAGE plpgsql")?;
        self.out.line(&format!("AS {}", tag))?;
        self.out.line(body.trim_end())?;
        self.out.line(&format!("{};", tag))?;

        if let Some(meta) = meta {
            let when = match &meta.when {
                Some(condition) => {
                    let mut findings = Vec::new();
                    let text = self
                        .rewriter
                        .for_when_clause()
                        .fragment(condition, &mut findings);
                    self.report(None, findings);
                    Some(text)
                }
                None => None,
            };
            self.out.blank()?;
            self.out.line(&create_trigger(meta, when.as_deref()))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Blocks and declarations
    // ------------------------------------------------------------------

    /// User exceptions declared here are visible in this block and its
    /// handlers only.
    fn block(
        &mut self,
        decls: &Declarations,
        body: &[Statement],
        handlers: &[ExceptionHandler],
        unparsed: &[Fragment],
        path: &str,
    ) -> fmt::Result {
        let outer_exceptions = self.user_exceptions.clone();
        self.declare_section(decls, body, handlers)?;
        self.out.line("BEGIN")?;
        self.out.push();
        let body_prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}.body", path)
        };
        self.statements(body, &body_prefix)?;
        if path.is_empty() {
            self.trailing_return(body)?;
        }
        if handlers.is_empty() {
            self.unparsed_handlers(unparsed)?;
        }
        self.out.pop();
        self.handlers(handlers, unparsed, path)?;
        self.user_exceptions = outer_exceptions;
        self.out.line("END;")
    }

    fn declare_section(
        &mut self,
        decls: &Declarations,
        body: &[Statement],
        handlers: &[ExceptionHandler],
    ) -> fmt::Result {
        for e in &decls.exceptions {
            self.user_exceptions.insert(e.name.to_ascii_uppercase());
        }

        let mut items: Vec<(usize, DeclItem<'_>)> = Vec::with_capacity(decls.len());
        items.extend(decls.variables.iter().map(|v| (v.offset, DeclItem::Variable(v))));
        items.extend(decls.constants.iter().map(|c| (c.offset, DeclItem::Constant(c))));
        items.extend(decls.cursors.iter().map(|c| (c.offset, DeclItem::Cursor(c))));
        items.extend(decls.exceptions.iter().map(|e| (e.offset, DeclItem::Exception(e))));
        items.extend(decls.raw.iter().map(|r| (r.text.offset, DeclItem::Raw(r))));
        items.sort_by_key(|(offset, _)| *offset);

        let declared: BTreeSet<String> = decls
            .variables
            .iter()
            .map(|v| v.name.to_ascii_uppercase())
            .collect();
        let mut records = BTreeSet::new();
        query_loop_vars(body, &mut records);
        for handler in handlers {
            query_loop_vars(&handler.body, &mut records);
        }
        records.retain(|r: &String| !declared.contains(&r.to_ascii_uppercase()));

        if items.is_empty() && records.is_empty() {
            return Ok(());
        }
        self.out.line("DECLARE")?;
        self.out.push();
        for (_, item) in items {
            self.declaration(item)?;
        }
        for record in &records {
            self.out.line(&format!("{} RECORD;", record))?;
        }
        self.out.pop();
        Ok(())
    }

    fn declaration(&mut self, item: DeclItem<'_>) -> fmt::Result {
        match item {
            DeclItem::Variable(v) => {
                let mut line = format!("{} {}", v.name, self.ty(&v.declared_type, v.offset));
                if v.not_null {
                    line.push_str(" NOT NULL");
                }
                if let Some(init) = &v.default {
                    line.push_str(" := ");
                    line.push_str(&self.initializer(init));
                }
                line.push(';');
                self.out.line(&line)
            }
            DeclItem::Constant(c) => {
                let ty = self.ty(&c.declared_type, c.offset);
                let value = self.initializer(&c.value);
                self.out
                    .line(&format!("{} CONSTANT {} := {};", c.name, ty, value))
            }
            DeclItem::Cursor(c) => {
                let mut line = format!("{} CURSOR", c.name);
                if !c.parameters.is_empty() {
                    let params: Vec<String> = c
                        .parameters
                        .iter()
                        .map(|p| format!("{} {}", p.name, self.ty(&p.declared_type, c.offset)))
                        .collect();
                    line.push_str(&format!(" ({})", params.join(", ")));
                }
                let query = self.rewrite(&c.query, None);
                line.push_str(&format!(" FOR {};", query));
                self.out.line(&line)
            }
            DeclItem::Exception(e) => self.out.comment(&format!(
                "exception {}: raised as SQLSTATE P0001 (raise_exception)",
                e.name
            )),
            DeclItem::Raw(r) => self
                .out
                .comment(&format!("untranslated declaration: {}", r.text.text)),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statements(&mut self, list: &[Statement], prefix: &str) -> fmt::Result {
        for (i, stmt) in list.iter().enumerate() {
            let path = child_path(prefix, i);
            self.statement(stmt, &path)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Statement, path: &str) -> fmt::Result {
        match stmt {
            Statement::Select(s) | Statement::Update(s) | Statement::Delete(s) => {
                let sql = self.expr(&s.sql, path);
                self.out.line(&format!("{};", sql))
            }
            Statement::Insert(insert) => {
                let sql = self.expr(&insert.sql, path);
                self.out.line(&format!("{};", sql))
            }
            Statement::Assignment { target, expr } => {
                let target = self.expr(target, path);
                let expr = self.expr(expr, path);
                self.out.line(&format!("{} := {};", target, expr))
            }
            Statement::If {
                condition,
                then_branch,
                elsif_branches,
                else_branch,
            } => self.if_statement(condition, then_branch, elsif_branches, else_branch.as_deref(), path),
            Statement::Case {
                selector,
                when_clauses,
                else_branch,
            } => self.case_statement(selector.as_ref(), when_clauses, else_branch.as_deref(), path),
            Statement::ForLoop {
                loop_var,
                cursor_query,
                body,
            } => {
                let source = self.expr(cursor_query, path);
                self.out
                    .line(&format!("FOR {} IN {} LOOP", loop_var, source))?;
                self.loop_body(body, path)
            }
            Statement::NumericForLoop {
                loop_var,
                reverse,
                lower,
                upper,
                body,
            } => {
                let lower = self.expr(lower, path);
                let upper = self.expr(upper, path);
                let range = if *reverse {
                    format!("REVERSE {}..{}", upper, lower)
                } else {
                    format!("{}..{}", lower, upper)
                };
                self.out
                    .line(&format!("FOR {} IN {} LOOP", loop_var, range))?;
                self.loop_body(body, path)
            }
            Statement::WhileLoop { condition, body } => {
                let condition = self.expr(condition, path);
                self.out.line(&format!("WHILE {} LOOP", condition))?;
                self.loop_body(body, path)
            }
            Statement::Loop { body } => {
                self.out.line("LOOP")?;
                self.loop_body(body, path)
            }
            Statement::Exit { label, condition } => {
                let line = self.exit_line("EXIT", label.as_deref(), condition.as_ref(), path);
                self.out.line(&line)
            }
            Statement::Continue { label, condition } => {
                let line = self.exit_line("CONTINUE", label.as_deref(), condition.as_ref(), path);
                self.out.line(&line)
            }
            Statement::Return { expr } => match (expr, self.return_row) {
                (None, Some(row)) => self.out.line(&format!("RETURN {};", row)),
                (None, None) => self.out.line("RETURN;"),
                (Some(expr), _) => {
                    let expr = self.expr(expr, path);
                    self.out.line(&format!("RETURN {};", expr))
                }
            },
            Statement::Block(block) => self.nested_block(block, path),
            Statement::ProcedureCall { name, args, offset } => {
                self.procedure_call(name, args, *offset, path)
            }
            Statement::Raise {
                exception_name,
                offset,
            } => self.raise(exception_name.as_deref(), *offset, path),
            Statement::ExecuteImmediate { sql } => {
                let sql = self.expr(sql, path);
                self.out.line(&format!("EXECUTE {};", sql))
            }
            Statement::Cursor { op, text } => {
                let text = self.expr(text, path);
                self.out.line(&format!("{} {};", op.keyword(), text))
            }
            Statement::Label { name } => self.out.line(&format!("<<{}>>", name)),
            Statement::Null => self.out.line("NULL;"),
            Statement::RawStatement { text } => {
                if self.options.annotate_raw {
                    self.out.comment("untranslated statement, review:")?;
                }
                self.out.line(&format!("{};", text.text))
            }
        }
    }

    fn if_statement(
        &mut self,
        condition: &Fragment,
        then_branch: &[Statement],
        elsif_branches: &[ConditionalBranch],
        else_branch: Option<&[Statement]>,
        path: &str,
    ) -> fmt::Result {
        let condition = self.expr(condition, path);
        self.out.line(&format!("IF {} THEN", condition))?;
        self.nested(then_branch, &format!("{}.then", path))?;
        for (k, branch) in elsif_branches.iter().enumerate() {
            let condition = self.expr(&branch.condition, path);
            self.out.line(&format!("ELSIF {} THEN", condition))?;
            self.nested(&branch.body, &format!("{}.elsif{}", path, k + 1))?;
        }
        if let Some(body) = else_branch {
            self.out.line("ELSE")?;
            self.nested(body, &format!("{}.else", path))?;
        }
        self.out.line("END IF;")
    }

    fn case_statement(
        &mut self,
        selector: Option<&Fragment>,
        when_clauses: &[ConditionalBranch],
        else_branch: Option<&[Statement]>,
        path: &str,
    ) -> fmt::Result {
        match selector {
            Some(selector) => {
                let selector = self.expr(selector, path);
                self.out.line(&format!("CASE {}", selector))?;
            }
            None => self.out.line("CASE")?,
        }
        self.out.push();
        for (k, branch) in when_clauses.iter().enumerate() {
            let condition = self.expr(&branch.condition, path);
            self.out.line(&format!("WHEN {} THEN", condition))?;
            self.nested(&branch.body, &format!("{}.when{}", path, k + 1))?;
        }
        if let Some(body) = else_branch {
            self.out.line("ELSE")?;
            self.nested(body, &format!("{}.else", path))?;
        }
        self.out.pop();
        self.out.line("END CASE;")
    }

    fn loop_body(&mut self, body: &[Statement], path: &str) -> fmt::Result {
        self.nested(body, &format!("{}.body", path))?;
        self.out.line("END LOOP;")
    }

    fn nested(&mut self, list: &[Statement], prefix: &str) -> fmt::Result {
        self.out.push();
        self.statements(list, prefix)?;
        self.out.pop();
        Ok(())
    }

    fn nested_block(&mut self, block: &Block, path: &str) -> fmt::Result {
        let empty = Declarations::default();
        let decls = block.declarations.as_ref().unwrap_or(&empty);
        self.block(
            decls,
            &block.body,
            &block.handlers,
            &block.unparsed_handlers,
            path,
        )
    }

    fn exit_line(
        &mut self,
        keyword: &str,
        label: Option<&str>,
        condition: Option<&Fragment>,
        path: &str,
    ) -> String {
        let mut line = keyword.to_string();
        if let Some(label) = label {
            line.push(' ');
            line.push_str(label);
        }
        if let Some(condition) = condition {
            line.push_str(" WHEN ");
            line.push_str(&self.expr(condition, path));
        }
        line.push(';');
        line
    }

    fn procedure_call(
        &mut self,
        name: &str,
        args: &[Fragment],
        offset: usize,
        path: &str,
    ) -> fmt::Result {
        let args: Vec<String> = args.iter().map(|a| self.expr(a, path)).collect();
        let upper = name.to_ascii_uppercase();
        let mapping = self.mapping;

        if let Some(template) = mapping.function(&upper) {
            match template.expand(&args) {
                Some(text) if is_statement_template(&text) => {
                    return self.out.line(&format!("{};", text));
                }
                Some(text) => return self.out.line(&format!("PERFORM {};", text)),
                None => self.warn_once(
                    format!("arity:{}", upper),
                    offset,
                    Some(path),
                    format!(
                        "{} called with {} argument(s); template '{}' needs more",
                        name,
                        args.len(),
                        template.as_str()
                    ),
                ),
            }
        } else {
            self.warn_once(
                format!("function:{}", upper),
                offset,
                Some(path),
                format!("unmapped procedure {} called with PERFORM", name),
            );
        }
        self.out
            .line(&format!("PERFORM {}({});", name, args.join(", ")))
    }

    fn raise(&mut self, name: Option<&str>, offset: usize, path: &str) -> fmt::Result {
        let Some(name) = name else {
            return self.out.line("RAISE;");
        };
        let upper = name.to_ascii_uppercase();
        if self.user_exceptions.contains(&upper) {
            return self.out.line(&format!(
                "RAISE EXCEPTION '{}' USING ERRCODE = 'P0001';",
                name
            ));
        }
        if let Some(condition) = self.mapping.exception(&upper) {
            return self.out.line(&format!("RAISE {};", condition));
        }
        self.warn_once(
            format!("exception:{}", upper),
            offset,
            Some(path),
            format!("unmapped exception {} raised as SQLSTATE P0001", name),
        );
        self.out.line(&format!(
            "RAISE EXCEPTION '{}' USING ERRCODE = 'P0001';",
            name
        ))
    }

    // ------------------------------------------------------------------
    // Exception handlers
    // ------------------------------------------------------------------

    fn handlers(
        &mut self,
        handlers: &[ExceptionHandler],
        unparsed: &[Fragment],
        path: &str,
    ) -> fmt::Result {
        if handlers.is_empty() {
            return Ok(());
        }
        let mut ordered: Vec<(usize, &ExceptionHandler)> = handlers.iter().enumerate().collect();
        ordered.sort_by_key(|(_, h)| h.is_others());

        self.out.line("EXCEPTION")?;
        self.out.push();
        self.unparsed_handlers(unparsed)?;
        for (k, handler) in ordered {
            let prefix = if path.is_empty() {
                format!("handler{}", k + 1)
            } else {
                format!("{}.handler{}", path, k + 1)
            };
            let mut conditions: Vec<String> = Vec::new();
            for name in handler.names() {
                let condition = self.condition(name, handler.offset, &prefix);
                if !conditions.contains(&condition) {
                    conditions.push(condition);
                }
            }
            self.out
                .line(&format!("WHEN {} THEN", conditions.join(" OR ")))?;
            self.out.push();
            self.statements(&handler.body, &prefix)?;
            if path.is_empty() {
                self.trailing_return(&handler.body)?;
            }
            self.out.pop();
        }
        self.out.pop();
        Ok(())
    }

    /// EXCEPTION-section text the parser could not split into handlers.
    fn unparsed_handlers(&mut self, unparsed: &[Fragment]) -> fmt::Result {
        for text in unparsed {
            self.out
                .comment(&format!("untranslated handler text, review: {}", text.text))?;
        }
        Ok(())
    }

    fn condition(&mut self, name: &str, offset: usize, path: &str) -> String {
        let upper = name.to_ascii_uppercase();
        if upper == "OTHERS" {
            return "OTHERS".to_string();
        }
        if self.user_exceptions.contains(&upper) {
            self.warn_once(
                format!("handler:{}", upper),
                offset,
                Some(path),
                format!(
                    "handler for user exception {} catches every RAISE EXCEPTION (raise_exception)",
                    name
                ),
            );
            return "raise_exception".to_string();
        }
        if let Some(condition) = self.mapping.exception(&upper) {
            return condition.to_string();
        }
        self.warn_once(
            format!("exception:{}", upper),
            offset,
            Some(path),
            format!("unmapped exception {} passed through", name),
        );
        name.to_string()
    }

    /// Trigger functions must end in RETURN.
    fn trailing_return(&mut self, body: &[Statement]) -> fmt::Result {
        let Some(row) = self.return_row else {
            return Ok(());
        };
        let ends_flow = match body.last() {
            Some(Statement::Return { .. } | Statement::Raise { .. }) => true,
            Some(Statement::ProcedureCall { name, .. }) => self
                .mapping
                .function(name)
                .is_some_and(|t| raises_error(t.as_str())),
            _ => false,
        };
        if ends_flow {
            return Ok(());
        }
        self.out.line(&format!("RETURN {};", row))
    }
}

/// PL/pgSQL statement keywords a procedure template may expand to.
fn is_statement_template(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or_default();
    ["RAISE", "PERFORM", "EXECUTE", "NULL"]
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

/// A template that aborts the block, e.g. `RAISE EXCEPTION ...`.
fn raises_error(text: &str) -> bool {
    let mut words = text.split_whitespace();
    matches!(
        (words.next(), words.next()),
        (Some(a), Some(b)) if a.eq_ignore_ascii_case("RAISE") && b.eq_ignore_ascii_case("EXCEPTION")
    )
}

/// Value for a bare RETURN in a trigger function.
fn trigger_return(meta: Option<&TriggerMetadata>) -> &'static str {
    let Some(meta) = meta else {
        return "NEW";
    };
    if !meta.for_each_row || meta.timing == TriggerTiming::After {
        return "NULL";
    }
    let deletes = meta.fires_on(EventKind::Delete);
    let writes = meta.fires_on(EventKind::Insert) || meta.fires_on(EventKind::Update);
    match (deletes, writes) {
        (true, true) => "COALESCE(NEW, OLD)",
        (true, false) => "OLD",
        _ => "NEW",
    }
}

fn create_trigger(meta: &TriggerMetadata, when: Option<&str>) -> String {
    let trigger = meta.name.rsplit('.').next().unwrap_or(&meta.name);
    let events: Vec<String> = meta
        .events
        .iter()
        .map(|e| {
            if e.columns.is_empty() {
                e.kind.as_sql().to_string()
            } else {
                format!("{} OF {}", e.kind.as_sql(), e.columns.join(", "))
            }
        })
        .collect();

    let mut sql = format!(
        "CREATE {}TRIGGER {}\n    {} {} ON {}\n    FOR EACH {}",
        if meta.or_replace { "OR REPLACE " } else { "" },
        trigger,
        meta.timing.as_sql(),
        events.join(" OR "),
        meta.table,
        if meta.for_each_row { "ROW" } else { "STATEMENT" },
    );
    if let Some(when) = when {
        sql.push_str(&format!("\n    WHEN ({})", when));
    }
    sql.push_str(&format!("\n    EXECUTE FUNCTION {}_fn();", meta.name));
    sql
}

/// Cursor names declared anywhere in the unit.
fn cursor_names(unit: &TriggerUnit) -> Vec<&str> {
    let mut names: Vec<&str> = unit
        .declarations
        .cursors
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    crate::ast::walk(&unit.body, &mut |_, stmt| block_cursors(stmt, &mut names));
    crate::ast::visit::walk_handlers(&unit.exception_handlers, &mut |_, stmt| {
        block_cursors(stmt, &mut names)
    });
    names
}

fn block_cursors<'a>(stmt: &'a Statement, names: &mut Vec<&'a str>) {
    if let Statement::Block(block) = stmt
        && let Some(decls) = &block.declarations
    {
        names.extend(decls.cursors.iter().map(|c| c.name.as_str()));
    }
}

/// Loop variables of `FOR r IN (query)` loops, which PL/pgSQL needs
/// declared as RECORD. Nested blocks declare their own.
fn query_loop_vars(list: &[Statement], out: &mut BTreeSet<String>) {
    for stmt in list {
        match stmt {
            Statement::ForLoop {
                loop_var,
                cursor_query,
                body,
            } => {
                let first = cursor_query.text.split_whitespace().next().unwrap_or_default();
                if first.eq_ignore_ascii_case("SELECT") || first.eq_ignore_ascii_case("WITH") {
                    out.insert(loop_var.clone());
                }
                query_loop_vars(body, out);
            }
            Statement::If {
                then_branch,
                elsif_branches,
                else_branch,
                ..
            } => {
                query_loop_vars(then_branch, out);
                for branch in elsif_branches {
                    query_loop_vars(&branch.body, out);
                }
                if let Some(body) = else_branch {
                    query_loop_vars(body, out);
                }
            }
            Statement::Case {
                when_clauses,
                else_branch,
                ..
            } => {
                for branch in when_clauses {
                    query_loop_vars(&branch.body, out);
                }
                if let Some(body) = else_branch {
                    query_loop_vars(body, out);
                }
            }
            Statement::NumericForLoop { body, .. }
            | Statement::WhileLoop { body, .. }
            | Statement::Loop { body } => query_loop_vars(body, out),
            _ => {}
        }
    }
}
