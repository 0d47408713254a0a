//! Character-level cursor over script source.
//!
//! Tracks line and column alongside the byte offset so every token carries a
//! position that assertion failures and syntax errors can point back to.

use super::token::Span;

/// Where the cursor stood when a token or error started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    offset: usize,
    line: u32,
    column: u32,
}

impl Mark {
    /// A zero-length span at this mark.
    #[must_use]
    pub fn point(self) -> Span {
        Span::new(self.offset, self.offset, self.line, self.column)
    }
}

pub struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    pub fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Span from `start` up to the current position.
    pub fn span_from(&self, start: Mark) -> Span {
        Span::new(start.offset, self.offset, start.line, start.column)
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `first` followed by `second`, or nothing.
    pub fn eat_pair(&mut self, first: char, second: char) -> bool {
        if self.peek() == Some(first) && self.peek_nth(1) == Some(second) {
            self.bump();
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume characters while `predicate` holds and return them.
    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset;
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
        &self.source[start..self.offset]
    }
}
