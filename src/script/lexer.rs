//! Lexer for harness scripts.
//!
//! Produces tokens lazily through the `Iterator` trait. The token set is
//! small: parentheses, string literals, numbers and bare words. Comments use
//! the WebAssembly text format conventions, `;;` to end of line and nestable `(; ... ;)`.
//!
//! # Example
//!
//! ```
//! use apiharness::script::{Lexer, TokenKind};
//!
//! let tokens: Vec<_> = Lexer::new("(assert_eq -0 0)").collect::<Result<_, _>>().unwrap();
//! assert!(matches!(tokens[1].kind, TokenKind::Keyword(ref k) if k == "assert_eq"));
//! assert!(matches!(tokens[2].kind, TokenKind::Number(n) if n == 0.0 && n.is_sign_negative()));
//! ```

use super::cursor::{Cursor, Mark};
use super::error::ScriptError;
use super::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Numeric literal grammar: optional sign, then a decimal with optional
/// fraction and exponent, or one of the special values `inf` / `nan`.
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][+-]?[0-9]+)?|inf|nan)$").expect("number pattern compiles")
});

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Tokenise the entire source, returning all tokens or the first error.
    pub fn tokenise(source: &str) -> Result<Vec<Token>, ScriptError> {
        Lexer::new(source).collect()
    }

    fn error_at(&self, message: impl Into<String>, at: Mark) -> ScriptError {
        ScriptError::lex(message, at.point())
    }

    fn error_from(&self, message: impl Into<String>, start: Mark) -> ScriptError {
        ScriptError::lex(message, self.cursor.span_from(start))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.skip_whitespace_and_comments() {
            return Some(Err(e));
        }
        let first = self.cursor.peek()?;

        let start = self.cursor.mark();
        Some(self.lex_token(first, start).map(|kind| Token::new(kind, self.cursor.span_from(start))))
    }
}

impl<'a> Lexer<'a> {
    fn lex_token(&mut self, first: char, start: Mark) -> Result<TokenKind, ScriptError> {
        match first {
            '(' => {
                self.cursor.bump();
                Ok(TokenKind::LeftParen)
            }
            ')' => {
                self.cursor.bump();
                Ok(TokenKind::RightParen)
            }
            '"' => {
                let kind = self.lex_string()?;
                self.check_token_boundary(start)?;
                Ok(kind)
            }
            c if is_wordchar(c) => {
                let word = self.cursor.eat_while(is_wordchar);
                if NUMBER.is_match(word) {
                    parse_number(word).ok_or_else(|| self.error_from(format!("invalid number: {word}"), start))
                } else {
                    Ok(TokenKind::Keyword(word.to_string()))
                }
            }
            c => {
                self.cursor.bump();
                Err(self.error_at(format!("unexpected character: {c:?}"), start))
            }
        }
    }

    /// Strings must be followed by whitespace, a parenthesis, a comment or EOF.
    fn check_token_boundary(&self, start: Mark) -> Result<(), ScriptError> {
        match self.cursor.peek() {
            None => Ok(()),
            Some(c) if c.is_whitespace() => Ok(()),
            Some('(' | ')' | ';') => Ok(()),
            Some(_) => Err(self.error_from("missing separator after string literal", start)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ScriptError> {
        loop {
            self.cursor.eat_while(char::is_whitespace);
            let start = self.cursor.mark();
            if self.cursor.eat_pair(';', ';') {
                self.cursor.eat_while(|c| c != '\n');
            } else if self.cursor.eat_pair('(', ';') {
                self.skip_block_comment(start)?;
            } else {
                return Ok(());
            }
        }
    }

    /// Called with the opening `(;` already consumed.
    fn skip_block_comment(&mut self, start: Mark) -> Result<(), ScriptError> {
        let mut depth = 1;
        while depth > 0 {
            if self.cursor.eat_pair('(', ';') {
                depth += 1;
            } else if self.cursor.eat_pair(';', ')') {
                depth -= 1;
            } else if self.cursor.bump().is_none() {
                return Err(self.error_from("unterminated block comment", start));
            }
        }
        Ok(())
    }

    fn lex_string(&mut self) -> Result<TokenKind, ScriptError> {
        let start = self.cursor.mark();
        self.cursor.bump();

        let mut bytes = Vec::new();
        loop {
            match self.cursor.bump() {
                None => return Err(self.error_from("unterminated string literal", start)),
                Some('"') => break,
                Some('\\') => self.lex_escape(&mut bytes)?,
                Some(c) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        Ok(TokenKind::String(bytes))
    }

    /// Escapes follow the WebAssembly text format: `\t \n \r \" \' \\`, two hex digits
    /// for a raw byte, and `\u{...}` for a code point.
    fn lex_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), ScriptError> {
        let at = self.cursor.mark();
        let c = self
            .cursor
            .bump()
            .ok_or_else(|| self.error_at("unterminated escape sequence", at))?;

        match c {
            't' => bytes.push(b'\t'),
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            '"' => bytes.push(b'"'),
            '\'' => bytes.push(b'\''),
            '\\' => bytes.push(b'\\'),
            'u' => self.lex_unicode_escape(bytes)?,
            c if c.is_ascii_hexdigit() => {
                let low_at = self.cursor.mark();
                let low = self
                    .cursor
                    .bump()
                    .and_then(|l| l.to_digit(16))
                    .ok_or_else(|| self.error_at("invalid hex escape", low_at))?;
                let high = c.to_digit(16).unwrap_or(0);
                bytes.push(((high << 4) | low) as u8);
            }
            _ => return Err(self.error_at(format!("invalid escape sequence: \\{c}"), at)),
        }
        Ok(())
    }

    fn lex_unicode_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), ScriptError> {
        let at = self.cursor.mark();
        if self.cursor.bump() != Some('{') {
            return Err(self.error_at("expected '{' after \\u", at));
        }

        let digits_start = self.cursor.mark();
        let digits = self.cursor.eat_while(|c| c.is_ascii_hexdigit());
        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_at(format!("invalid unicode escape: {digits:?}"), digits_start))?;

        let close = self.cursor.mark();
        if self.cursor.bump() != Some('}') {
            return Err(self.error_at("expected '}' in unicode escape", close));
        }

        let mut buf = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }
}

fn is_wordchar(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';')
}

/// Parse a word already known to match [`NUMBER`]. The sign is applied after
/// parsing the magnitude so `-0` keeps its sign bit.
fn parse_number(word: &str) -> Option<TokenKind> {
    let (negative, magnitude) = match word.as_bytes().first() {
        Some(b'-') => (true, &word[1..]),
        Some(b'+') => (false, &word[1..]),
        _ => (false, word),
    };
    let value = match magnitude {
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        digits => digits.replace('_', "").parse::<f64>().ok()?,
    };
    Some(TokenKind::Number(if negative { -value } else { value }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenise(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn parens_and_keywords() {
        assert_eq!(
            kinds("(test)"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Keyword("test".into()),
                TokenKind::RightParen
            ]
        );
    }

    #[test]
    fn numbers_keep_signed_zero() {
        let toks = kinds("0 -0 +0");
        let signs: Vec<bool> = toks
            .iter()
            .map(|k| match k {
                TokenKind::Number(n) => n.is_sign_negative(),
                other => panic!("expected number, got {other:?}"),
            })
            .collect();
        assert_eq!(signs, vec![false, true, false]);
    }

    #[test]
    fn special_numbers() {
        let toks = kinds("nan inf -inf 1_000 2.5e3");
        assert!(matches!(toks[0], TokenKind::Number(n) if n.is_nan()));
        assert!(matches!(toks[1], TokenKind::Number(n) if n == f64::INFINITY));
        assert!(matches!(toks[2], TokenKind::Number(n) if n == f64::NEG_INFINITY));
        assert!(matches!(toks[3], TokenKind::Number(n) if n == 1000.0));
        assert!(matches!(toks[4], TokenKind::Number(n) if n == 2500.0));
    }

    #[test]
    fn words_that_look_numeric_stay_keywords() {
        assert_eq!(kinds("1x"), vec![TokenKind::Keyword("1x".into())]);
        assert_eq!(kinds("-"), vec![TokenKind::Keyword("-".into())]);
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#""\00asm\01" "a\nb" "\u{26A1}""#);
        assert_eq!(toks[0], TokenKind::String(b"\0asm\x01".to_vec()));
        assert_eq!(toks[1], TokenKind::String(b"a\nb".to_vec()));
        assert_eq!(toks[2], TokenKind::String("\u{26A1}".as_bytes().to_vec()));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds(";; header\n(; block (; nested ;) ;) (a)");
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn spans_track_lines() {
        let toks = Lexer::tokenise("(a\n  b)").unwrap();
        assert_eq!(toks[2].span.line, 2);
        assert_eq!(toks[2].span.column, 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::tokenise("\"open").unwrap_err();
        assert!(err.message().contains("unterminated string"));
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert!(Lexer::tokenise("(; never closed").is_err());
    }

    #[test]
    fn string_needs_separator() {
        assert!(Lexer::tokenise(r#""a""b""#).is_err());
    }
}
