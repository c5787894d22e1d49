//! Accumulated, non-fatal findings attached to a successful translation.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structure,
    Header,
    Declaration,
    Statement,
    Handler,
    Mapping,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Structure => "structure",
            Stage::Header => "header",
            Stage::Declaration => "declaration",
            Stage::Statement => "statement",
            Stage::Handler => "handler",
            Stage::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    /// Approximate byte offset into the unit's source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Structural path of the statement involved, e.g. `2.then.1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}[{}]", level, self.stage)?;
        if let Some(offset) = self.offset {
            write!(f, " @{}", offset)?;
        }
        if let Some(path) = &self.path {
            write!(f, " ({})", path)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered collection of diagnostics for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    /// Record a warning at an optional source offset.
    pub fn warn(&mut self, stage: Stage, offset: Option<usize>, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            stage,
            message: message.into(),
            offset,
            path: None,
        });
    }

    /// Record a warning tied to a statement path.
    pub fn warn_at(
        &mut self,
        stage: Stage,
        offset: Option<usize>,
        path: &str,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            stage,
            message: message.into(),
            offset,
            path: Some(path.to_string()),
        });
    }

    pub fn error_at(
        &mut self,
        stage: Stage,
        offset: Option<usize>,
        path: Option<&str>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity: Severity::Error,
            stage,
            message: message.into(),
            offset,
            path: path.map(str::to_string),
        });
    }

    /// Drop everything recorded after the first `len` entries.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Diagnostics produced by one stage.
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.stage == stage)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
