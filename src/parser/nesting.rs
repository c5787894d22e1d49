//! Nesting tracker for statement and section boundaries.
//!
//! Tracks parenthesis depth plus the open `BEGIN`, `IF`, `CASE` and `LOOP`
//! constructs. A `;`, `THEN`, `ELSE`, `WHEN` or `EXCEPTION` is only a
//! boundary for the construct being parsed when everything opened after
//! that construct's start has been closed again.
//!
//! Open constructs are kept as a stack so that a bare `END` closes a
//! `CASE` expression (`CASE WHEN a THEN 1 ELSE 2 END`) instead of the
//! enclosing `BEGIN`.

use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Begin,
    If,
    Case,
    Loop,
}

#[derive(Debug, Clone, Default)]
pub struct NestingTracker {
    parens: usize,
    frames: Vec<Frame>,
}

impl NestingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for the token at `i`. Returns how many tokens were
    /// consumed: 2 for `END IF`, `END LOOP`, `END CASE`, else 1.
    pub fn advance(&mut self, tokens: &[Token], i: usize) -> usize {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Punctuation if token.text == "(" => {
                self.parens += 1;
                1
            }
            TokenKind::Punctuation if token.text == ")" => {
                self.parens = self.parens.saturating_sub(1);
                1
            }
            TokenKind::Keyword => {
                if token.is_keyword("BEGIN") {
                    self.frames.push(Frame::Begin);
                } else if token.is_keyword("IF") {
                    self.frames.push(Frame::If);
                } else if token.is_keyword("CASE") {
                    self.frames.push(Frame::Case);
                } else if token.is_keyword("LOOP") {
                    self.frames.push(Frame::Loop);
                } else if token.is_keyword("END") {
                    let closes = tokens.get(i + 1).and_then(|next| {
                        if next.is_keyword("IF") {
                            Some(Frame::If)
                        } else if next.is_keyword("LOOP") {
                            Some(Frame::Loop)
                        } else if next.is_keyword("CASE") {
                            Some(Frame::Case)
                        } else {
                            None
                        }
                    });
                    match closes {
                        Some(frame) => {
                            self.close(frame);
                            return 2;
                        }
                        None => {
                            self.frames.pop();
                        }
                    }
                }
                1
            }
            _ => 1,
        }
    }

    /// Close the innermost `frame`, discarding anything left open inside it.
    fn close(&mut self, frame: Frame) {
        if let Some(pos) = self.frames.iter().rposition(|f| *f == frame) {
            self.frames.truncate(pos);
        }
    }

    fn depth_of(&self, frame: Frame) -> usize {
        self.frames.iter().filter(|f| **f == frame).count()
    }

    pub fn paren_depth(&self) -> usize {
        self.parens
    }

    pub fn begin_depth(&self) -> usize {
        self.depth_of(Frame::Begin)
    }

    pub fn if_depth(&self) -> usize {
        self.depth_of(Frame::If)
    }

    pub fn case_depth(&self) -> usize {
        self.depth_of(Frame::Case)
    }

    pub fn loop_depth(&self) -> usize {
        self.depth_of(Frame::Loop)
    }

    /// All counters are zero.
    pub fn is_balanced(&self) -> bool {
        self.parens == 0 && self.frames.is_empty()
    }

    /// Exactly one `BEGIN` is open and nothing else.
    pub fn in_outer_block(&self) -> bool {
        self.parens == 0 && self.frames == [Frame::Begin]
    }
}

/// First index at or after `start` where a tracker started at `start` is
/// balanced and `stop` holds.
pub fn find_at_depth(
    tokens: &[Token],
    start: usize,
    mut stop: impl FnMut(&[Token], usize) -> bool,
) -> Option<usize> {
    let mut tracker = NestingTracker::new();
    let mut i = start;
    while i < tokens.len() {
        if tracker.is_balanced() && stop(tokens, i) {
            return Some(i);
        }
        i += tracker.advance(tokens, i);
    }
    None
}

/// Like [`find_at_depth`] for `keyword`, but only where a statement can
/// start: at `start` itself or right after a `;`. Skips `EXIT WHEN`.
pub fn find_clause(tokens: &[Token], start: usize, keywords: &[&str]) -> Option<usize> {
    find_at_depth(tokens, start, |t, i| {
        (i == start || t[i - 1].is_punct(';')) && keywords.iter().any(|kw| t[i].is_keyword(kw))
    })
}

/// Split at top-level commas.
pub fn split_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(comma) = find_at_depth(tokens, start, |t, i| t[i].is_punct(',')) {
        parts.push(&tokens[start..comma]);
        start = comma + 1;
    }
    parts.push(&tokens[start..]);
    parts
}

/// Index of the `)` matching the `(` at `open`.
pub fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_statement_end_skips_nested_constructs() {
        let tokens = tokenize(
            "IF a THEN x := 1; LOOP y := (2); END LOOP; END IF; z := 3;",
        )
        .unwrap();
        let end = find_at_depth(&tokens, 0, |t, i| t[i].is_punct(';')).unwrap();
        assert!(tokens[end - 1].is_keyword("IF"));
        assert!(tokens[end - 2].is_keyword("END"));
    }

    #[test]
    fn test_case_expression_closed_by_bare_end() {
        let tokens = tokenize("BEGIN x := CASE WHEN a THEN 1 ELSE 2 END; END;").unwrap();
        let mut tracker = NestingTracker::new();
        let mut i = 0;
        let mut depths = Vec::new();
        while i < tokens.len() {
            i += tracker.advance(&tokens, i);
            depths.push(tracker.begin_depth());
        }
        assert!(tracker.is_balanced());
        assert_eq!(depths.last(), Some(&0));
    }

    #[test]
    fn test_counters() {
        let tokens = tokenize("BEGIN IF a THEN CASE x WHEN 1 THEN LOOP f(").unwrap();
        let mut tracker = NestingTracker::new();
        let mut i = 0;
        while i < tokens.len() {
            i += tracker.advance(&tokens, i);
        }
        assert_eq!(tracker.begin_depth(), 1);
        assert_eq!(tracker.if_depth(), 1);
        assert_eq!(tracker.case_depth(), 1);
        assert_eq!(tracker.loop_depth(), 1);
        assert_eq!(tracker.paren_depth(), 1);
        assert!(!tracker.is_balanced());
    }

    #[test]
    fn test_find_clause_ignores_exit_when() {
        let tokens = tokenize("EXIT WHEN done; WHEN others").unwrap();
        let at = find_clause(&tokens, 2, &["WHEN"]).unwrap();
        assert_eq!(at, 4);
    }

    #[test]
    fn test_split_commas() {
        let tokens = tokenize("a, f(b, c), CASE WHEN d THEN 1 END").unwrap();
        let parts = split_commas(&tokens);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 6);
    }

    #[test]
    fn test_matching_paren() {
        let tokens = tokenize("(a, (b), c) d").unwrap();
        assert_eq!(matching_paren(&tokens, 0), Some(8));
        assert_eq!(matching_paren(&tokens, 3), Some(5));
        assert_eq!(matching_paren(&tokens, 4), None);
    }
}
