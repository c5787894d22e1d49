//! Comment stripping on top of the tokenizer's scanner.

use super::scanner::{LexemeClass, Scanner};
use crate::error::LexError;

/// Remove `--` and `/* */` comments from `source`.
///
/// Comment bytes become spaces and newlines are kept, so byte offsets
/// into the result match offsets into the input. Quoted strings are
/// left untouched.
pub fn strip_comments(source: &str) -> Result<String, LexError> {
    let mut out = String::with_capacity(source.len());
    let mut scanner = Scanner::new(source);
    while let Some(lexeme) = scanner.next_lexeme() {
        let lexeme = lexeme?;
        let text = &source[lexeme.start..lexeme.end];
        match lexeme.class {
            LexemeClass::Comment => {
                out.extend(text.chars().flat_map(|c| {
                    let keep = if c == '\n' { '\n' } else { ' ' };
                    std::iter::repeat(keep).take(c.len_utf8())
                }));
            }
            LexemeClass::Whitespace | LexemeClass::Token(_) => out.push_str(text),
        }
    }
    Ok(out)
}
