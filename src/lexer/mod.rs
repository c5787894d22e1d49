//! PL/SQL tokenizer.
//!
//! Turns trigger source text into a flat token stream. Comments and
//! whitespace are dropped, quoted strings are kept whole, and every token
//! remembers its byte offset into the original text.
//!
//! ```text
//! :new.total := NVL(v_sum, 0); -- keep
//! ─────┬──── ┬─ ─┬─┬──┬─┬┬─┬┬
//!      │     │   │ │  │ ││ │└── Punctuation
//!      │     │   │ │  │ ││ └── Punctuation
//!      │     │   │ │  │ │└── NumericLiteral
//!      │     │   │ │  │ └── Punctuation
//!      │     │   │ │  └── Identifier
//!      │     │   │ └── Punctuation
//!      │     │   └── Identifier
//!      │     └── Operator
//!      └── BindVariable
//! ```

pub mod comments;
mod scanner;

use serde::{Deserialize, Serialize};

use crate::error::LexError;
use scanner::{LexemeClass, Scanner};

pub use comments::strip_comments;

/// Words the parser dispatches on, plus the SQL words that keep a space
/// before an opening parenthesis when rendered.
const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BEGIN", "BETWEEN", "BY", "CASE", "CLOSE", "COMMIT", "CONNECT",
    "CONSTANT", "CONTINUE", "CREATE", "CURSOR", "DECLARE", "DEFAULT", "DELETE", "DESC",
    "DISTINCT", "ELSE", "ELSIF", "END", "ESCAPE", "EXCEPTION", "EXECUTE", "EXISTS", "EXIT",
    "FETCH", "FOR", "FROM", "GROUP", "HAVING", "IF", "IN", "INSERT", "INTERSECT", "INTO", "IS",
    "JOIN", "LIKE", "LOOP", "MERGE", "MINUS", "NOT", "NULL", "ON", "OPEN", "OR", "ORDER",
    "OTHERS", "PRAGMA", "PRIOR", "RAISE", "RETURN", "RETURNING", "REVERSE", "ROLLBACK",
    "SELECT", "SET", "START", "THEN", "TRIGGER", "UNION", "UPDATE", "USING", "VALUES", "WHEN",
    "WHERE", "WHILE", "WITH",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    Keyword,
    StringLiteral,
    NumericLiteral,
    /// `:new.col`, `:old.col`, `:name`
    BindVariable,
    Operator,
    /// `(`, `)`, `,`, `;`, `.`
    Punctuation,
    /// Unterminated remainder kept by [`tokenize_partial`].
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, exactly as written.
    pub text: String,
    /// Byte offset into the source.
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Case-insensitive keyword test.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Case-insensitive test against a keyword or a bare identifier.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::Identifier)
            && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, punct: char) -> bool {
        self.kind == TokenKind::Punctuation && self.text.len() == 1 && self.text.starts_with(punct)
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Upper-cased text, used as a case-insensitive key.
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }
}

/// Tokenize PL/SQL source. Fails on an unterminated string or comment.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    while let Some(lexeme) = scanner.next_lexeme() {
        let lexeme = lexeme?;
        if let LexemeClass::Token(kind) = lexeme.class {
            tokens.push(Token::new(
                kind,
                &scanner.source()[lexeme.start..lexeme.end],
                lexeme.start,
            ));
        }
    }
    tracing::debug!("tokenized {} bytes into {} tokens", source.len(), tokens.len());
    Ok(tokens)
}

/// Tokenize for partial-input tooling: an unterminated string or comment
/// becomes one trailing token covering the rest of the input.
pub fn tokenize_partial(source: &str) -> (Vec<Token>, Option<LexError>) {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    while let Some(lexeme) = scanner.next_lexeme() {
        match lexeme {
            Ok(lexeme) => {
                if let LexemeClass::Token(kind) = lexeme.class {
                    tokens.push(Token::new(kind, &source[lexeme.start..lexeme.end], lexeme.start));
                }
            }
            Err(err) => {
                let offset = err.offset();
                tokens.push(Token::new(TokenKind::Trailing, &source[offset..], offset));
                return (tokens, Some(err));
            }
        }
    }
    (tokens, None)
}

/// Contents of a string literal token: `'it''s'` → `it's`,
/// `q'[a'b]'` → `a'b`, `N'x'` → `x`. `None` if `text` is not a string
/// literal.
pub fn unquote(text: &str) -> Option<String> {
    let rest = text
        .strip_prefix(['n', 'N'])
        .filter(|r| r.starts_with(['\'', 'q', 'Q']))
        .unwrap_or(text);

    if let Some(body) = rest.strip_prefix(['q', 'Q']) {
        let body = body.strip_prefix('\'')?.strip_suffix('\'')?;
        let open = body.chars().next()?;
        let close = match open {
            '[' => ']',
            '{' => '}',
            '(' => ')',
            '<' => '>',
            other => other,
        };
        let inner = body.get(open.len_utf8()..)?.strip_suffix(close)?;
        return Some(inner.to_string());
    }

    let inner = rest.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}

/// Render tokens back to text with collapsed, normalized spacing.
pub fn render(tokens: &[Token]) -> String {
    render_texts(tokens.iter().map(|t| (t.kind, t.text.as_str())))
}

/// Render `(kind, text)` pairs with the same spacing rules as [`render`].
pub(crate) fn render_texts<'a>(parts: impl IntoIterator<Item = (TokenKind, &'a str)>) -> String {
    let mut out = String::new();
    let mut before_prev: Option<(TokenKind, &str)> = None;
    let mut prev: Option<(TokenKind, &str)> = None;
    for part in parts {
        if let Some(p) = prev {
            if needs_space(before_prev, p, part) {
                out.push(' ');
            }
        }
        out.push_str(part.1);
        before_prev = prev;
        prev = Some(part);
    }
    out
}

fn needs_space(
    before_prev: Option<(TokenKind, &str)>,
    prev: (TokenKind, &str),
    next: (TokenKind, &str),
) -> bool {
    use TokenKind::*;

    let (pk, pt) = prev;
    let (nk, nt) = next;

    if matches!((nk, nt), (Punctuation, "," | ")" | ";" | ".")) {
        return false;
    }
    if matches!((pk, pt), (Punctuation, "(" | ".")) {
        return false;
    }
    if matches!((pk, pt), (Operator, "%" | ".." | "<<" | "@"))
        || matches!((nk, nt), (Operator, "%" | ".." | ">>" | "@"))
    {
        return false;
    }
    // Function call or qualified call: `NVL(`, `pkg.proc(`.
    if nt == "(" && nk == Punctuation && matches!(pk, Identifier | BindVariable) {
        return false;
    }
    // Unary sign after an operator, an opening paren, a comma or a keyword.
    if pk == Operator && matches!(pt, "-" | "+") {
        let unary = match before_prev {
            None => true,
            Some((bk, bt)) => matches!(bk, Operator | Keyword) || matches!(bt, "(" | ","),
        };
        if unary {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_basic_assignment() {
        use TokenKind::*;
        assert_eq!(
            kinds(":new.total := NVL(v_sum, 0);"),
            vec![
                (BindVariable, ":new.total".to_string()),
                (Operator, ":=".to_string()),
                (Identifier, "NVL".to_string()),
                (Punctuation, "(".to_string()),
                (Identifier, "v_sum".to_string()),
                (Punctuation, ",".to_string()),
                (NumericLiteral, "0".to_string()),
                (Punctuation, ")".to_string()),
                (Punctuation, ";".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_safety() {
        for src in ["'foo -- bar'", "'a/*b'", "'it''s'", "''''", "q'[it's -- fine]'"] {
            let tokens = tokenize(src).unwrap();
            assert_eq!(tokens.len(), 1, "{src}");
            assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
            assert_eq!(tokens[0].text, src);
        }
    }

    #[test]
    fn test_doubled_quote_keeps_string_open() {
        let tokens = tokenize("x := 'it''s; -- not a comment'; y := 1;").unwrap();
        let strings: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::StringLiteral)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].text, "'it''s; -- not a comment'");
        assert_eq!(tokens.iter().filter(|t| t.is_punct(';')).count(), 2);
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = tokenize("a -- line\n/* block\n */ b").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(tokens[1].offset, 23);
    }

    #[test]
    fn test_block_comment_does_not_nest() {
        let tokens = tokenize("/* a /* b */ c */").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "*", "/"]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("BEGIN x := 'oops; END;").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { offset: 11, .. }));
    }

    #[test]
    fn test_unterminated_comment() {
        let err = tokenize("BEGIN /* never closed").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedComment { offset: 6, line: 1, column: 7 }));
    }

    #[test]
    fn test_partial_recovery() {
        let (tokens, err) = tokenize_partial("x := 'abc");
        assert!(err.is_some());
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Trailing);
        assert_eq!(last.text, "'abc");
    }

    #[test]
    fn test_bind_variables() {
        let tokens = tokenize(":NEW.id :old.status :p_name :=").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::BindVariable);
        assert_eq!(tokens[0].text, ":NEW.id");
        assert_eq!(tokens[1].text, ":old.status");
        assert_eq!(tokens[2].text, ":p_name");
        assert!(tokens[3].is_op(":="));
    }

    #[test]
    fn test_numeric_range() {
        use TokenKind::*;
        assert_eq!(
            kinds("1..10 3.14 1e5"),
            vec![
                (NumericLiteral, "1".to_string()),
                (Operator, "..".to_string()),
                (NumericLiteral, "10".to_string()),
                (NumericLiteral, "3.14".to_string()),
                (NumericLiteral, "1e5".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = tokenize("begin End ELSIF v_begin").unwrap();
        assert!(tokens[0].is_keyword("BEGIN"));
        assert!(tokens[1].is_keyword("end"));
        assert!(tokens[2].is_keyword("elsif"));
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_render_normalizes_spacing() {
        let tokens = tokenize(
            "SELECT  COUNT ( * )\n INTO v_n FROM t\tWHERE x=1 AND y = '--not a comment'",
        )
        .unwrap();
        assert_eq!(
            render(&tokens),
            "SELECT COUNT(*) INTO v_n FROM t WHERE x = 1 AND y = '--not a comment'"
        );
    }

    #[test]
    fn test_render_attributes_and_ranges() {
        let tokens = tokenize("emp.sal % TYPE; FOR i IN 1 .. 10; x := - 1; <<outer>>").unwrap();
        assert_eq!(
            render(&tokens),
            "emp.sal%TYPE; FOR i IN 1..10; x := -1; <<outer>>"
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'it''s'").as_deref(), Some("it's"));
        assert_eq!(unquote("''").as_deref(), Some(""));
        assert_eq!(unquote("q'[it's]'").as_deref(), Some("it's"));
        assert_eq!(unquote("Q'!a!'").as_deref(), Some("a"));
        assert_eq!(unquote("N'abc'").as_deref(), Some("abc"));
        assert_eq!(unquote("abc"), None);
    }

    #[test]
    fn test_line_col() {
        let src = "a\nbc\n  d";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 3), (2, 2));
        assert_eq!(line_col(src, 7), (3, 3));
    }
}
