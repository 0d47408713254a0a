//! S-expression reader for harness scripts.
//!
//! Reading happens in two phases. The lexer's tokens are first matched into
//! a tree of atoms and lists (syntax only); the command parser then walks the
//! tree and assigns meaning. Parsing a list can therefore inspect all of its
//! children without speculative token consumption.
//!
//! # Example
//!
//! ```
//! use apiharness::script::sexpr::read_all;
//!
//! let forms = read_all(r#"(test "adds" (assert_eq 2 2)) (promise_test "later" (resolve))"#).unwrap();
//! assert_eq!(forms.len(), 2);
//! assert_eq!(forms[0].as_list().unwrap().head_keyword(), Some("test"));
//! ```

use super::error::ScriptError;
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};
use std::fmt;
use std::iter::Peekable;

/// An S-expression: either an atom (single token) or a parenthesised list.
#[derive(Debug, Clone)]
pub enum SExpr {
    Atom(Token),

    /// The span covers the entire list including the parentheses.
    List { span: Span, items: Vec<SExpr> },
}

impl SExpr {
    pub fn span(&self) -> Span {
        match self {
            SExpr::Atom(token) => token.span,
            SExpr::List { span, .. } => *span,
        }
    }

    pub fn as_atom(&self) -> Option<&Token> {
        match self {
            SExpr::Atom(token) => Some(token),
            SExpr::List { .. } => None,
        }
    }

    pub fn as_list(&self) -> Option<SExprList<'_>> {
        match self {
            SExpr::Atom(_) => None,
            SExpr::List { span, items } => Some(SExprList { span: *span, items }),
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::Keyword(kw),
                ..
            }) => Some(kw),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string atom holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::String(bytes),
                ..
            }) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Returns the raw bytes if this is a string atom.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::String(bytes),
                ..
            }) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::Number(n),
                ..
            }) => Some(*n),
            _ => None,
        }
    }

    pub fn is_list_headed_by(&self, keyword: &str) -> bool {
        self.as_list()
            .map(|list| list.head_keyword() == Some(keyword))
            .unwrap_or(false)
    }

    pub fn expect_list(&self) -> Result<SExprList<'_>, ScriptError> {
        self.as_list()
            .ok_or_else(|| ScriptError::syntax("expected list", self.span()))
    }

    pub fn expect_keyword(&self) -> Result<&str, ScriptError> {
        self.as_keyword()
            .ok_or_else(|| ScriptError::syntax("expected keyword", self.span()))
    }

    pub fn expect_str(&self) -> Result<&str, ScriptError> {
        self.as_str()
            .ok_or_else(|| ScriptError::syntax("expected string literal", self.span()))
    }
}

/// A borrowed view of a list, with accessors for the `(keyword arg ...)` shape
/// every script form takes.
#[derive(Debug, Clone, Copy)]
pub struct SExprList<'a> {
    pub span: Span,
    pub items: &'a [SExpr],
}

impl<'a> SExprList<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<&'a SExpr> {
        self.items.first()
    }

    pub fn get(&self, index: usize) -> Option<&'a SExpr> {
        self.items.get(index)
    }

    pub fn head_keyword(&self) -> Option<&'a str> {
        self.head().and_then(|s| s.as_keyword())
    }

    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = &'a SExpr> {
        self.items.iter().skip(start)
    }

    /// Returns the item at `index`, or a syntax error naming what was expected there.
    pub fn require(&self, index: usize, what: &str) -> Result<&'a SExpr, ScriptError> {
        self.get(index).ok_or_else(|| {
            let form = self.head_keyword().unwrap_or("form");
            ScriptError::syntax(format!("{form}: expected {what}"), self.span)
        })
    }

    /// Fails if the list has more than `max` items.
    pub fn expect_at_most(&self, max: usize) -> Result<(), ScriptError> {
        match self.get(max) {
            Some(extra) => Err(ScriptError::syntax(
                format!("{}: unexpected extra operand", self.head_keyword().unwrap_or("form")),
                extra.span(),
            )),
            None => Ok(()),
        }
    }
}

/// Reads every top-level S-expression in `source`.
///
/// # Errors
///
/// Returns an error on lexical errors or unbalanced parentheses.
pub fn read_all(source: &str) -> Result<Vec<SExpr>, ScriptError> {
    let mut tokens = Lexer::new(source).peekable();
    let mut results = Vec::new();

    while tokens.peek().is_some() {
        results.push(read_sexpr(&mut tokens)?);
    }

    Ok(results)
}

/// Reads exactly one S-expression; trailing input is an error.
pub fn read(source: &str) -> Result<SExpr, ScriptError> {
    let mut tokens = Lexer::new(source).peekable();
    let sexpr = read_sexpr(&mut tokens)?;

    match tokens.next() {
        Some(Ok(token)) => Err(ScriptError::read("unexpected token after expression", token.span)),
        Some(Err(e)) => Err(e),
        None => Ok(sexpr),
    }
}

fn read_sexpr<I>(tokens: &mut Peekable<I>) -> Result<SExpr, ScriptError>
where
    I: Iterator<Item = Result<Token, ScriptError>>,
{
    let token = match tokens.next() {
        Some(token) => token?,
        None => return Err(ScriptError::read("unexpected end of input", Span::ZERO)),
    };

    match token.kind {
        TokenKind::LeftParen => {
            let open = token.span;
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    Some(Ok(Token {
                        kind: TokenKind::RightParen,
                        span,
                    })) => {
                        let span = open.to(*span);
                        tokens.next();
                        return Ok(SExpr::List { span, items });
                    }
                    Some(Err(e)) => return Err(e.clone()),
                    Some(Ok(_)) => items.push(read_sexpr(tokens)?),
                    None => return Err(ScriptError::read("unclosed parenthesis", open)),
                }
            }
        }
        TokenKind::RightParen => Err(ScriptError::read("unexpected ')'", token.span)),
        _ => Ok(SExpr::Atom(token)),
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(token) => write!(f, "{token}"),
            SExpr::List { items, .. } => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_nested_list() {
        let sexpr = read(r#"(test "t" (assert_eq 1 1) (throw TypeError "x"))"#).unwrap();
        let list = sexpr.as_list().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.head_keyword(), Some("test"));
        assert_eq!(list.get(1).unwrap().as_str(), Some("t"));
        assert!(list.get(2).unwrap().is_list_headed_by("assert_eq"));
        assert!(list.get(3).unwrap().is_list_headed_by("throw"));
    }

    #[test]
    fn list_span_covers_parens() {
        let sexpr = read("(a (b c))").unwrap();
        let outer = sexpr.as_list().unwrap();
        assert_eq!((outer.span.start, outer.span.end), (0, 9));
        let inner = outer.get(1).unwrap().as_list().unwrap();
        assert_eq!((inner.span.start, inner.span.end), (3, 8));
    }

    #[test]
    fn read_all_multiple_forms() {
        let forms = read_all("(a) (b) ;; trailing comment\n(c)").unwrap();
        assert_eq!(forms.len(), 3);
        assert!(forms[2].is_list_headed_by("c"));
    }

    #[test]
    fn read_all_empty_source() {
        assert!(read_all("  ;; nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn error_unclosed_paren() {
        let err = read_all("(test \"x\"").unwrap_err();
        assert!(err.message().contains("unclosed"));
    }

    #[test]
    fn error_unexpected_rparen() {
        let err = read_all(")").unwrap_err();
        assert!(err.message().contains("unexpected ')'"));
    }

    #[test]
    fn error_trailing_tokens() {
        let err = read("(a) b").unwrap_err();
        assert!(err.message().contains("unexpected token"));
    }

    #[test]
    fn require_reports_form_name() {
        let sexpr = read("(len)").unwrap();
        let err = sexpr.as_list().unwrap().require(1, "operand").unwrap_err();
        assert_eq!(err.message(), "len: expected operand");
    }

    #[test]
    fn expect_at_most_points_at_extra_item() {
        let sexpr = read("(pending 1)").unwrap();
        let err = sexpr.as_list().unwrap().expect_at_most(1).unwrap_err();
        assert_eq!(err.span().column, 10);
    }

    #[test]
    fn display_roundtrip() {
        let sexpr = read(r#"(assert_eq -0 "s")"#).unwrap();
        assert_eq!(sexpr.to_string(), r#"(assert_eq -0 "s")"#);
    }
}
