//! Statement nodes of the trigger body.

use serde::{Deserialize, Serialize};

use super::{Declarations, Fragment};

/// Statements in execution order.
pub type StatementList = Vec<Statement>;

/// One PL/SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Select(SqlStatement),
    Insert(InsertStatement),
    Update(SqlStatement),
    Delete(SqlStatement),
    /// `target := expr`
    Assignment { target: Fragment, expr: Fragment },
    If {
        condition: Fragment,
        then_branch: StatementList,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        elsif_branches: Vec<ConditionalBranch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<StatementList>,
    },
    /// Selector form when `selector` is set, searched form otherwise.
    Case {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<Fragment>,
        when_clauses: Vec<ConditionalBranch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<StatementList>,
    },
    /// `FOR rec IN (query) LOOP` or `FOR rec IN cursor[(args)] LOOP`.
    /// The query is kept as opaque text.
    ForLoop {
        loop_var: String,
        cursor_query: Fragment,
        body: StatementList,
    },
    /// `FOR i IN [REVERSE] lower..upper LOOP`
    NumericForLoop {
        loop_var: String,
        reverse: bool,
        lower: Fragment,
        upper: Fragment,
        body: StatementList,
    },
    WhileLoop {
        condition: Fragment,
        body: StatementList,
    },
    Loop {
        body: StatementList,
    },
    Exit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Fragment>,
    },
    Continue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Fragment>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expr: Option<Fragment>,
    },
    /// Nested `[DECLARE ...] BEGIN ... [EXCEPTION ...] END;`
    Block(Box<Block>),
    ProcedureCall {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Fragment>,
        offset: usize,
    },
    /// `RAISE;` re-raises when `exception_name` is `None`.
    Raise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception_name: Option<String>,
        offset: usize,
    },
    /// Everything after `EXECUTE IMMEDIATE`.
    ExecuteImmediate { sql: Fragment },
    Cursor { op: CursorOp, text: Fragment },
    Label { name: String },
    Null,
    /// Unrecognized input, forwarded verbatim.
    RawStatement { text: Fragment },
}

impl Statement {
    pub fn is_raw(&self) -> bool {
        matches!(self, Statement::RawStatement { .. })
    }

    /// Short name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
            Statement::Assignment { .. } => "assignment",
            Statement::If { .. } => "if",
            Statement::Case { .. } => "case",
            Statement::ForLoop { .. } => "for_loop",
            Statement::NumericForLoop { .. } => "numeric_for_loop",
            Statement::WhileLoop { .. } => "while_loop",
            Statement::Loop { .. } => "loop",
            Statement::Exit { .. } => "exit",
            Statement::Continue { .. } => "continue",
            Statement::Return { .. } => "return",
            Statement::Block(_) => "block",
            Statement::ProcedureCall { .. } => "procedure_call",
            Statement::Raise { .. } => "raise",
            Statement::ExecuteImmediate { .. } => "execute_immediate",
            Statement::Cursor { .. } => "cursor",
            Statement::Label { .. } => "label",
            Statement::Null => "null",
            Statement::RawStatement { .. } => "raw_statement",
        }
    }
}

/// Leaf DML captured as normalized SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub sql: Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub sql: Fragment,
    /// Best-effort breakdown; `None` when the column or VALUES groups
    /// are not well-formed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<InsertTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertTarget {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Fragment>,
}

/// `condition THEN body` arm of IF/ELSIF or CASE WHEN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: Fragment,
    pub body: StatementList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declarations: Option<Declarations>,
    pub body: StatementList,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<ExceptionHandler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed_handlers: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub exception_name: String,
    /// Further names from `WHEN a OR b THEN`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_names: Vec<String>,
    pub body: StatementList,
    pub offset: usize,
}

impl ExceptionHandler {
    /// `WHEN OTHERS` catch-all.
    pub fn is_others(&self) -> bool {
        self.exception_name.eq_ignore_ascii_case("OTHERS")
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.exception_name.as_str())
            .chain(self.additional_names.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorOp {
    Open,
    Fetch,
    Close,
}

impl CursorOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            CursorOp::Open => "OPEN",
            CursorOp::Fetch => "FETCH",
            CursorOp::Close => "CLOSE",
        }
    }
}
