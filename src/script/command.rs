//! AST for harness scripts (`.hts`).
//!
//! A script is a sequence of commands: synchronous tests, deferred tests and
//! bare statements. Fixture lookups and other evaluation happen when the
//! script runs, not when it is parsed, so a script referring to a fixture
//! that is missing still parses and the lookup fails inside its test.

use super::token::Span;
use crate::harness::{ErrorKind, MessageMatcher, Value};

#[derive(Debug, Clone)]
pub struct Script {
    pub commands: Vec<Command>,
}

impl Script {
    /// Number of `test` and `promise_test` commands.
    pub fn test_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Test { .. } | Command::PromiseTest { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    /// `(test "description" stmt*)`
    Test {
        span: Span,
        description: String,
        body: Vec<Stmt>,
    },

    /// `(promise_test "description" deferred)`
    PromiseTest {
        span: Span,
        description: String,
        body: DeferredExpr,
    },

    /// A bare statement at top level. Each assertion in it is counted on its own.
    Stmt(Stmt),
}

impl Command {
    pub fn span(&self) -> Span {
        match self {
            Command::Test { span, .. } | Command::PromiseTest { span, .. } => *span,
            Command::Stmt(stmt) => stmt.span(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `(assert expr "message")`
    Assert { span: Span, condition: Expr, message: String },

    /// `(assert_eq observed expected)`, also written `assert_equals`.
    /// `assert_true` and `assert_false` parse to this with a boolean `expected`.
    AssertEq { span: Span, observed: Expr, expected: Expr },

    /// `(assert_error stmt Kind matcher)`
    AssertError {
        span: Span,
        body: Box<Stmt>,
        kind: ErrorKind,
        matcher: MessageMatcher,
    },

    /// `(throw Kind "message")`
    Throw { span: Span, kind: ErrorKind, message: String },

    /// An expression evaluated for its side effect, i.e. whether it raises.
    Expr { span: Span, expr: Expr },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assert { span, .. }
            | Stmt::AssertEq { span, .. }
            | Stmt::AssertError { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Expr { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// Numbers, strings, `true`/`false`/`undefined` and `(bytes ...)`.
    Literal(Value),

    /// `(fixture "name")`
    Fixture { span: Span, name: String },

    /// `(len expr)`
    Len { span: Span, operand: Box<Expr> },
}

#[derive(Debug, Clone)]
pub enum DeferredExpr {
    /// `(resolve expr?)`
    Resolve { span: Span, value: Option<Expr> },

    /// `(reject Kind? "message")`
    Reject { span: Span, kind: ErrorKind, message: String },

    /// `(delay turns deferred)`
    Delay {
        span: Span,
        turns: u32,
        inner: Box<DeferredExpr>,
    },

    /// `(then deferred stmt*)`
    Then {
        span: Span,
        inner: Box<DeferredExpr>,
        body: Vec<Stmt>,
    },

    /// `(pending)`
    Pending { span: Span },
}

impl DeferredExpr {
    pub fn span(&self) -> Span {
        match self {
            DeferredExpr::Resolve { span, .. }
            | DeferredExpr::Reject { span, .. }
            | DeferredExpr::Delay { span, .. }
            | DeferredExpr::Then { span, .. }
            | DeferredExpr::Pending { span } => *span,
        }
    }
}
