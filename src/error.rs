//! Error types for plsql2pg.
//!
//! Only lexical and structural failures abort a unit. Everything else is
//! recovered where it happens and reported through
//! [`Diagnostics`](crate::diagnostics::Diagnostics).

use thiserror::Error;

use crate::lexer::line_col;

/// Fatal tokenizer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A quoted string (or quoted identifier) runs to end of input.
    #[error("Unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString {
        offset: usize,
        line: usize,
        column: usize,
    },

    /// A `/* ... */` comment runs to end of input.
    #[error("Unterminated block comment starting at line {line}, column {column}")]
    UnterminatedComment {
        offset: usize,
        line: usize,
        column: usize,
    },
}

impl LexError {
    pub(crate) fn unterminated_string(source: &str, offset: usize) -> Self {
        let (line, column) = line_col(source, offset);
        Self::UnterminatedString {
            offset,
            line,
            column,
        }
    }

    pub(crate) fn unterminated_comment(source: &str, offset: usize) -> Self {
        let (line, column) = line_col(source, offset);
        Self::UnterminatedComment {
            offset,
            line,
            column,
        }
    }

    /// Byte offset where the unterminated construct starts.
    pub fn offset(&self) -> usize {
        match self {
            Self::UnterminatedString { offset, .. } | Self::UnterminatedComment { offset, .. } => {
                *offset
            }
        }
    }
}

/// Block-structure errors found by the section splitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("No BEGIN keyword found; a trigger body needs BEGIN ... END")]
    MissingBegin { offset: usize },

    #[error("DECLARE found after the block's BEGIN")]
    DeclareAfterBegin { offset: usize },

    #[error("EXCEPTION section found before BEGIN")]
    ExceptionBeforeBegin { offset: usize },

    /// Not fatal: the body is taken to run to end of input.
    #[error("No terminal END matches the outer BEGIN")]
    MissingTerminalEnd { offset: usize },
}

impl StructureError {
    pub fn offset(&self) -> usize {
        match self {
            Self::MissingBegin { offset }
            | Self::DeclareAfterBegin { offset }
            | Self::ExceptionBeforeBegin { offset }
            | Self::MissingTerminalEnd { offset } => *offset,
        }
    }

    /// Whether this error aborts the unit.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingTerminalEnd { .. })
    }
}

/// The main error type for translating one unit.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{error} (line {line}, column {column})")]
    Structure {
        error: StructureError,
        line: usize,
        column: usize,
    },

    /// Malformed mapping table.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output formatting error")]
    Fmt(#[from] std::fmt::Error),
}

impl TranslateError {
    /// Attach a line/column position taken from `source` to a structure error.
    pub fn structure(source: &str, error: StructureError) -> Self {
        let (line, column) = line_col(source, error.offset());
        Self::Structure {
            error,
            line,
            column,
        }
    }

    /// Line of the offending construct, when the error has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex(LexError::UnterminatedString { line, .. })
            | Self::Lex(LexError::UnterminatedComment { line, .. })
            | Self::Structure { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Result type alias for plsql2pg operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_display() {
        let err = LexError::unterminated_string("BEGIN\n  x := 'abc;", 13);
        assert_eq!(
            err.to_string(),
            "Unterminated string literal starting at line 2, column 8"
        );
        assert_eq!(err.offset(), 13);
    }

    #[test]
    fn test_structure_error_position() {
        let source = "DECLARE\n  v NUMBER;\n";
        let err = TranslateError::structure(source, StructureError::MissingBegin { offset: 10 });
        assert_eq!(
            err.to_string(),
            "No BEGIN keyword found; a trigger body needs BEGIN ... END (line 2, column 3)"
        );
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_missing_end_is_not_fatal() {
        assert!(!StructureError::MissingTerminalEnd { offset: 0 }.is_fatal());
        assert!(StructureError::MissingBegin { offset: 0 }.is_fatal());
    }
}
