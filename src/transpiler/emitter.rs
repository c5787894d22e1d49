use std::fmt::{Result, Write};

/// Line-oriented writer with block indentation.
pub struct Emitter {
    indent_level: usize,
    indent_width: usize,
    buffer: String,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Emitter {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_level: 0,
            indent_width,
            buffer: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.buffer
    }

    fn indent(&mut self) -> Result {
        for _ in 0..self.indent_level * self.indent_width {
            self.buffer.write_char(' ')?;
        }
        Ok(())
    }

    /// Write one indented line. Embedded newlines start new lines at the
    /// same indentation, except inside quoted literals, whose text is
    /// written as is.
    pub fn line(&mut self, text: &str) -> Result {
        for (part, starts_quoted, ends_quoted) in logical_lines(text) {
            let part = if ends_quoted { part } else { part.trim_end() };
            if !starts_quoted {
                if part.trim().is_empty() {
                    writeln!(self.buffer)?;
                    continue;
                }
                self.indent()?;
            }
            writeln!(self.buffer, "{}", part)?;
        }
        Ok(())
    }

    pub fn comment(&mut self, text: &str) -> Result {
        for part in text.lines() {
            self.indent()?;
            writeln!(self.buffer, "-- {}", part.trim())?;
        }
        Ok(())
    }

    pub fn blank(&mut self) -> Result {
        writeln!(self.buffer)
    }

    pub fn push(&mut self) {
        self.indent_level += 1;
    }

    pub fn pop(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}

/// Split at newlines outside `'...'` literals and `"..."` identifiers.
/// Each part says whether it starts and ends inside a quoted run.
fn logical_lines(text: &str) -> Vec<(&str, bool, bool)> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut starts_quoted = false;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (_, '\n') => {
                parts.push((&text[start..i], starts_quoted, quote.is_some()));
                start = i + 1;
                starts_quoted = quote.is_some();
            }
            _ => {}
        }
    }
    parts.push((&text[start..], starts_quoted, quote.is_some()));
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indentation() {
        let mut e = Emitter::new(2);
        e.line("BEGIN").unwrap();
        e.push();
        e.line("x := 1;").unwrap();
        e.comment("note").unwrap();
        e.pop();
        e.line("END;").unwrap();
        assert_eq!(e.finish(), "BEGIN\n  x := 1;\n  -- note\nEND;\n");
    }

    #[test]
    fn test_multiline_text_keeps_indent() {
        let mut e = Emitter::new(4);
        e.push();
        e.line("a\nb").unwrap();
        assert_eq!(e.finish(), "    a\n    b\n");
    }

    #[test]
    fn test_multiline_literal_is_written_verbatim() {
        let mut e = Emitter::new(4);
        e.push();
        e.line("v := 'line1\nline2  \n\n   end' ||\n'x';").unwrap();
        assert_eq!(e.finish(), "    v := 'line1\nline2  \n\n   end' ||\n    'x';\n");
    }
}
