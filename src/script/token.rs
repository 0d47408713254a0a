//! Tokens produced by the script lexer.

use std::fmt;

/// A location in script source.
///
/// Byte offsets are kept for slicing; line and column are what users see in
/// error messages and assertion origins. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

impl Span {
    /// A zero-length span at the start of source, for errors without position.
    pub const ZERO: Span = Span {
        start: 0,
        end: 0,
        line: 1,
        column: 1,
    };

    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Extend this span so it ends where `other` ends.
    #[must_use]
    pub fn to(self, other: Span) -> Span {
        Span { end: other.end, ..self }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lexical token with its location in source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of token, with associated data where relevant.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Opening parenthesis `(`.
    LeftParen,

    /// Closing parenthesis `)`.
    RightParen,

    /// A bare word: `test`, `assert_eq`, `TypeError`, `true`, `undefined`.
    Keyword(String),

    /// A string literal with escape sequences resolved.
    ///
    /// Stored as raw bytes since `(bytes ...)` fixtures may hold any byte.
    String(Vec<u8>),

    /// A numeric literal, including `nan`, `inf` and signed zero.
    Number(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Keyword(kw) => write!(f, "{kw}"),
            TokenKind::String(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            TokenKind::Number(n) if n.is_nan() => write!(f, "nan"),
            TokenKind::Number(n) if n.is_infinite() => write!(f, "{}inf", if *n < 0.0 { "-" } else { "" }),
            TokenKind::Number(n) if *n == 0.0 && n.is_sign_negative() => write!(f, "-0"),
            TokenKind::Number(n) => write!(f, "{n}"),
        }
    }
}
