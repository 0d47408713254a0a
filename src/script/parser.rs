//! Parser for harness scripts.
//!
//! Uses the S-expression reader to turn a script into commands. Regular
//! expressions in matchers are compiled here so a bad pattern is reported
//! with its position before any test runs.

use super::command::*;
use super::error::ScriptError;
use super::sexpr::{self, SExpr, SExprList};
use super::token::{Span, TokenKind};
use crate::fixture::Fixture;
use crate::harness::{ErrorKind, MessageMatcher, Value};
use regex::Regex;

fn syntax_err(message: impl Into<String>, span: Span) -> ScriptError {
    ScriptError::syntax(message, span)
}

/// Parse script source into commands.
///
/// # Errors
///
/// Returns the first lexical, structural or syntax error, with its position.
pub fn parse_script(source: &str) -> Result<Script, ScriptError> {
    let commands = sexpr::read_all(source)?
        .iter()
        .map(parse_command)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Script { commands })
}

fn parse_command(sexpr: &SExpr) -> Result<Command, ScriptError> {
    let list = sexpr
        .as_list()
        .ok_or_else(|| syntax_err("expected top-level form", sexpr.span()))?;
    let keyword = list
        .head_keyword()
        .ok_or_else(|| syntax_err("expected form keyword", list.span))?;

    match keyword {
        "test" => {
            let description = list.require(1, "description")?.expect_str()?.to_string();
            let body = list.iter_from(2).map(parse_stmt).collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Test {
                span: list.span,
                description,
                body,
            })
        }
        "promise_test" => {
            let description = list.require(1, "description")?.expect_str()?.to_string();
            let body = parse_deferred(list.require(2, "deferred body")?)?;
            list.expect_at_most(3)?;
            Ok(Command::PromiseTest {
                span: list.span,
                description,
                body,
            })
        }
        _ => parse_stmt(sexpr).map(Command::Stmt),
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn parse_stmt(sexpr: &SExpr) -> Result<Stmt, ScriptError> {
    let list = sexpr.expect_list()?;
    let span = list.span;

    match list.head_keyword() {
        Some("assert") => {
            let condition = parse_expr(list.require(1, "condition")?)?;
            let message = list.require(2, "message")?.expect_str()?.to_string();
            list.expect_at_most(3)?;
            Ok(Stmt::Assert {
                span,
                condition,
                message,
            })
        }
        Some("assert_eq" | "assert_equals") => {
            let observed = parse_expr(list.require(1, "observed value")?)?;
            let expected = parse_expr(list.require(2, "expected value")?)?;
            list.expect_at_most(3)?;
            Ok(Stmt::AssertEq {
                span,
                observed,
                expected,
            })
        }
        Some(kw @ ("assert_true" | "assert_false")) => {
            let observed = parse_expr(list.require(1, "observed value")?)?;
            list.expect_at_most(2)?;
            Ok(Stmt::AssertEq {
                span,
                observed,
                expected: Expr::Literal(Value::Bool(kw == "assert_true")),
            })
        }
        Some("assert_error") => {
            let body = parse_stmt(list.require(1, "body")?)?;
            let kind = parse_kind(list.require(2, "error kind")?)?;
            let matcher = parse_matcher(list.require(3, "message matcher")?)?;
            list.expect_at_most(4)?;
            Ok(Stmt::AssertError {
                span,
                body: Box::new(body),
                kind,
                matcher,
            })
        }
        Some("throw") => {
            let kind = parse_kind(list.require(1, "error kind")?)?;
            let message = list.require(2, "message")?.expect_str()?.to_string();
            list.expect_at_most(3)?;
            Ok(Stmt::Throw { span, kind, message })
        }
        Some("fixture" | "len" | "bytes") => Ok(Stmt::Expr {
            span,
            expr: parse_expr(sexpr)?,
        }),
        Some(other) => Err(syntax_err(format!("unknown form: {other}"), span)),
        None => Err(syntax_err("expected form keyword", span)),
    }
}

fn parse_kind(sexpr: &SExpr) -> Result<ErrorKind, ScriptError> {
    sexpr
        .expect_keyword()?
        .parse::<ErrorKind>()
        .map_err(|e| syntax_err(e, sexpr.span()))
}

/// `"exact message"` or `(regex "pattern")`.
fn parse_matcher(sexpr: &SExpr) -> Result<MessageMatcher, ScriptError> {
    if let Some(text) = sexpr.as_str() {
        return Ok(MessageMatcher::Exact(text.to_string()));
    }
    let list = sexpr
        .as_list()
        .filter(|l| l.head_keyword() == Some("regex"))
        .ok_or_else(|| syntax_err("expected message string or (regex ...)", sexpr.span()))?;
    let pattern = list.require(1, "pattern")?.expect_str()?;
    list.expect_at_most(2)?;
    Regex::new(pattern)
        .map(MessageMatcher::Pattern)
        .map_err(|e| syntax_err(format!("invalid regex: {e}"), list.span))
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn parse_expr(sexpr: &SExpr) -> Result<Expr, ScriptError> {
    match sexpr {
        SExpr::Atom(token) => match &token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            TokenKind::String(bytes) => std::str::from_utf8(bytes)
                .map(|s| Expr::Literal(Value::Str(s.to_string())))
                .map_err(|_| syntax_err("string is not valid UTF-8, use (bytes ...)", token.span)),
            TokenKind::Keyword(kw) => match kw.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "undefined" => Ok(Expr::Literal(Value::Undefined)),
                other => Err(syntax_err(format!("unknown value: {other}"), token.span)),
            },
            TokenKind::LeftParen | TokenKind::RightParen => Err(syntax_err("expected expression", token.span)),
        },
        SExpr::List { .. } => {
            let list = sexpr.expect_list()?;
            parse_expr_list(list)
        }
    }
}

fn parse_expr_list(list: SExprList<'_>) -> Result<Expr, ScriptError> {
    let span = list.span;
    match list.head_keyword() {
        Some("bytes") => {
            let mut bytes = Vec::new();
            for item in list.iter_from(1) {
                let chunk = item
                    .as_bytes()
                    .ok_or_else(|| syntax_err("expected string literal in bytes", item.span()))?;
                bytes.extend_from_slice(chunk);
            }
            Ok(Expr::Literal(Value::Bytes(Fixture::from(bytes))))
        }
        Some("fixture") => {
            let name = list.require(1, "fixture name")?.expect_str()?.to_string();
            list.expect_at_most(2)?;
            Ok(Expr::Fixture { span, name })
        }
        Some("len") => {
            let operand = parse_expr(list.require(1, "operand")?)?;
            list.expect_at_most(2)?;
            Ok(Expr::Len {
                span,
                operand: Box::new(operand),
            })
        }
        Some(other) => Err(syntax_err(format!("unknown expression: {other}"), span)),
        None => Err(syntax_err("expected expression keyword", span)),
    }
}

// ---------------------------------------------------------------------------
// Deferred expressions
// ---------------------------------------------------------------------------

fn parse_deferred(sexpr: &SExpr) -> Result<DeferredExpr, ScriptError> {
    let list = sexpr.expect_list()?;
    let span = list.span;

    match list.head_keyword() {
        Some("resolve") => {
            let value = list.get(1).map(parse_expr).transpose()?;
            list.expect_at_most(2)?;
            Ok(DeferredExpr::Resolve { span, value })
        }
        Some("reject") => {
            // The kind is optional: `(reject "message")` rejects with an `Error`.
            let (kind, message_at) = match list.get(1).and_then(SExpr::as_keyword) {
                Some(_) => (parse_kind(list.require(1, "error kind")?)?, 2),
                None => (ErrorKind::Error, 1),
            };
            let message = list.require(message_at, "message")?.expect_str()?.to_string();
            list.expect_at_most(message_at + 1)?;
            Ok(DeferredExpr::Reject { span, kind, message })
        }
        Some("delay") => {
            let turns = parse_turns(list.require(1, "turn count")?)?;
            let inner = parse_deferred(list.require(2, "deferred")?)?;
            list.expect_at_most(3)?;
            Ok(DeferredExpr::Delay {
                span,
                turns,
                inner: Box::new(inner),
            })
        }
        Some("then") => {
            let inner = parse_deferred(list.require(1, "deferred")?)?;
            let body = list.iter_from(2).map(parse_stmt).collect::<Result<Vec<_>, _>>()?;
            Ok(DeferredExpr::Then {
                span,
                inner: Box::new(inner),
                body,
            })
        }
        Some("pending") => {
            list.expect_at_most(1)?;
            Ok(DeferredExpr::Pending { span })
        }
        Some(other) => Err(syntax_err(format!("unknown deferred form: {other}"), span)),
        None => Err(syntax_err("expected deferred form keyword", span)),
    }
}

fn parse_turns(sexpr: &SExpr) -> Result<u32, ScriptError> {
    let n = sexpr
        .as_number()
        .ok_or_else(|| syntax_err("expected turn count", sexpr.span()))?;
    if n.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&n) {
        return Err(syntax_err(format!("invalid turn count: {n}"), sexpr.span()));
    }
    Ok(n as u32)
}
