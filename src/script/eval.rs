//! Runs parsed scripts against a [`Harness`].
//!
//! `test` bodies run through the synchronous runner in the harness's
//! configured mode. `promise_test` bodies are turned into [`Deferred`]s whose
//! settlement is driven by the harness's scheduler. Bare top-level
//! statements always count per assertion.

use super::command::{Command, DeferredExpr, Expr, Script, Stmt};
use super::parser::parse_script;
use super::token::Span;
use crate::error::HarnessError;
use crate::fixture::Fixtures;
use crate::harness::{
    run_test, schedule_after, Deferred, ErrorKind, Harness, Origin, RunMode, Scheduler, TestContext, Thrown, Value,
};
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Read and parse a script file.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be read and
/// [`HarnessError::Script`] if it does not parse.
pub fn load_script(path: &Path) -> Result<Script, HarnessError> {
    let source = fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&source).map_err(|source| HarnessError::Script {
        path: path.to_path_buf(),
        source,
    })
}

/// Evaluation environment shared by every job a script schedules.
struct Env {
    file: Rc<str>,
    fixtures: Fixtures,
}

pub struct ScriptRunner {
    env: Rc<Env>,
}

impl ScriptRunner {
    /// `file` is the name assertion origins are reported against.
    pub fn new(file: impl Into<Rc<str>>, fixtures: Fixtures) -> Self {
        Self {
            env: Rc::new(Env {
                file: file.into(),
                fixtures,
            }),
        }
    }

    /// Register every command of `script` with `harness`. Synchronous tests
    /// complete before this returns; deferred tests settle when the harness
    /// is drained.
    pub fn run(&self, harness: &Harness, script: &Script) {
        tracing::debug!(file = %self.env.file, commands = script.commands.len(), "running script");
        for command in &script.commands {
            self.run_command(harness, command);
        }
    }

    fn run_command(&self, harness: &Harness, command: &Command) {
        let env = &self.env;
        match command {
            Command::Test { description, body, .. } => {
                harness.test(description, |ctx| env.run_body(ctx, body));
            }
            Command::PromiseTest { description, body, .. } => {
                harness.promise_test(description, |scheduler| Ok(eval_deferred(env, scheduler, body)));
            }
            Command::Stmt(stmt) => {
                let location = env.origin(stmt.span()).to_string();
                run_test(harness.aggregator(), RunMode::PerAssertion, &location, |ctx| {
                    env.exec_stmt(ctx, stmt)
                });
            }
        }
    }
}

impl Env {
    fn origin(&self, span: Span) -> Origin {
        Origin::Script {
            file: Rc::clone(&self.file),
            line: span.line,
            column: span.column,
        }
    }

    /// Statements run in order; the first raise ends the body.
    fn run_body(&self, ctx: &mut TestContext<'_>, body: &[Stmt]) -> Result<(), Thrown> {
        body.iter().try_for_each(|stmt| self.exec_stmt(ctx, stmt))
    }

    fn exec_stmt(&self, ctx: &mut TestContext<'_>, stmt: &Stmt) -> Result<(), Thrown> {
        match stmt {
            Stmt::Assert {
                span,
                condition,
                message,
            } => {
                let value = self.eval_expr(condition)?;
                ctx.assert_at(value.is_truthy(), message, self.origin(*span));
            }
            Stmt::AssertEq {
                span,
                observed,
                expected,
            } => {
                let observed = self.eval_expr(observed)?;
                let expected = self.eval_expr(expected)?;
                ctx.assert_equals_at(observed, expected, self.origin(*span));
            }
            Stmt::AssertError {
                span,
                body,
                kind,
                matcher,
            } => {
                let origin = self.origin(*span);
                ctx.assert_error_message_at(|ctx| self.exec_stmt(ctx, body), *kind, matcher.clone(), origin);
            }
            Stmt::Throw { kind, message, .. } => return Err(Thrown::new(*kind, message.clone())),
            Stmt::Expr { expr, .. } => {
                self.eval_expr(expr)?;
            }
        }
        Ok(())
    }

    fn eval_expr(&self, expr: &Expr) -> Result<Value, Thrown> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Fixture { name, .. } => self
                .fixtures
                .get(name)
                .cloned()
                .map(Value::Bytes)
                .ok_or_else(|| Thrown::new(ErrorKind::ReferenceError, format!("unknown fixture: {name}"))),
            Expr::Len { operand, .. } => match self.eval_expr(operand)? {
                Value::Bytes(bytes) => Ok(Value::Number(bytes.len() as f64)),
                Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
                other => Err(Thrown::type_error(format!(
                    "len: expected bytes or string, got {}",
                    other.type_name()
                ))),
            },
        }
    }
}

/// Build the deferred for a `promise_test` body. Evaluation errors never
/// escape: they reject the returned deferred.
fn eval_deferred(env: &Rc<Env>, scheduler: &Rc<dyn Scheduler>, expr: &DeferredExpr) -> Deferred<Value, Thrown> {
    match expr {
        DeferredExpr::Resolve { value: None, .. } => Deferred::resolved(scheduler, Value::Undefined),
        DeferredExpr::Resolve { value: Some(value), .. } => match env.eval_expr(value) {
            Ok(value) => Deferred::resolved(scheduler, value),
            Err(thrown) => Deferred::rejected(scheduler, thrown),
        },
        DeferredExpr::Reject { kind, message, .. } => Deferred::rejected(scheduler, Thrown::new(*kind, message.clone())),
        DeferredExpr::Pending { .. } => Deferred::new(scheduler),
        DeferredExpr::Delay { turns, inner, .. } => {
            let outer: Deferred<Value, Thrown> = Deferred::new(scheduler);
            let (env, job_scheduler) = (Rc::clone(env), Rc::clone(scheduler));
            let (inner, target) = (inner.clone(), outer.clone());
            schedule_after(
                scheduler,
                *turns,
                Box::new(move || {
                    let settled = eval_deferred(&env, &job_scheduler, &inner);
                    if let Err(e) = settled.forward_to(&target) {
                        target.reject(Thrown::error(e.to_string()));
                    }
                }),
            );
            outer
        }
        DeferredExpr::Then { inner, body, .. } => {
            let upstream = eval_deferred(env, scheduler, inner);
            let (env, body) = (Rc::clone(env), body.clone());
            upstream
                .then(move |_| {
                    let mut ctx = TestContext::detached();
                    let raised = env.run_body(&mut ctx, &body);
                    match ctx.first_failure() {
                        Some(failure) => Err(Thrown::error(failure)),
                        None => raised.map(|()| Value::Undefined),
                    }
                })
                .unwrap_or_else(|e| Deferred::rejected(scheduler, Thrown::error(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::harness::CapturedOutput;

    fn run(source: &str, config: HarnessConfig) -> (crate::harness::Summary, String) {
        let script = parse_script(source).unwrap();
        let out = CapturedOutput::new();
        let mut harness = Harness::new(config, Box::new(out.clone()));
        let mut fixtures = Fixtures::new();
        fixtures.insert("empty", b"\0asm\x01\0\0\0".to_vec());
        ScriptRunner::new("inline.hts", fixtures).run(&harness, &script);
        let summary = harness.drain_and_report().unwrap();
        (summary, out.contents())
    }

    #[test]
    fn sync_tests_count_once_each() {
        let (summary, output) = run(
            r#"
            (test "passes" (assert_eq 1 1) (assert_true true))
            (test "fails" (assert_eq 1 2) (assert_eq 3 4))
            "#,
            HarnessConfig::default(),
        );
        assert_eq!((summary.successes, summary.failures), (1, 1));
        assert!(output.contains("FAIL: fails: Assertion failure: Expected 2, observed 1\n    at inline.hts:3:27"));
    }

    #[test]
    fn top_level_statements_count_per_assertion() {
        let (summary, _) = run(
            r#"(assert_eq nan nan) (assert_eq 0 -0) (assert true "yes")"#,
            HarnessConfig::default(),
        );
        assert_eq!((summary.successes, summary.failures), (2, 1));
    }

    #[test]
    fn top_level_raise_is_tagged_with_location() {
        let (_, output) = run(r#"(throw RangeError "too big")"#, HarnessConfig::default());
        assert!(output.contains("FAIL: inline.hts:1:1: RangeError: too big"));
    }

    #[test]
    fn fixtures_and_len() {
        let (summary, _) = run(
            r#"
            (test "fixture length" (assert_eq (len (fixture "empty")) 8))
            (test "fixture equality" (assert_eq (fixture "empty") (bytes "\00asm" "\01\00\00\00")))
            (test "missing fixture" (assert_error (fixture "nope") ReferenceError "unknown fixture: nope"))
            (test "len type" (assert_error (len 3) TypeError (regex "got number$")))
            "#,
            HarnessConfig::default(),
        );
        assert_eq!((summary.successes, summary.failures), (4, 0));
    }

    #[test]
    fn deferred_tests_settle_in_order() {
        let (summary, output) = run(
            r#"
            (promise_test "A" (delay 2 (resolve)))
            (promise_test "B" (delay 3 (resolve)))
            (promise_test "C" (resolve))
            "#,
            HarnessConfig {
                verbose: true,
                ..HarnessConfig::default()
            },
        );
        assert_eq!(summary.successes, 3);
        assert!(output.starts_with("C: PASS.\nA: PASS.\nB: PASS.\n"));
    }

    #[test]
    fn then_body_failure_rejects() {
        let (summary, output) = run(
            r#"
            (promise_test "then passes" (then (resolve 1) (assert_eq (len "abc") 3)))
            (promise_test "then fails" (then (delay 1 (resolve)) (assert false "late check")))
            (promise_test "upstream" (then (reject CompileError "bad") (assert true "never")))
            "#,
            HarnessConfig::default(),
        );
        assert_eq!((summary.successes, summary.failures), (1, 2));
        assert!(output.contains("FAIL: then fails: Error: Assertion failure: late check"));
        assert!(output.contains("FAIL: upstream: CompileError: bad"));
    }

    #[test]
    fn pending_is_ignored_by_default() {
        let (summary, _) = run(r#"(promise_test "hangs" (pending))"#, HarnessConfig::default());
        assert_eq!((summary.successes, summary.failures), (0, 0));
    }

    #[test]
    fn per_assertion_mode_for_tests() {
        let (summary, _) = run(
            r#"(test "each" (assert true "a") (assert true "b") (assert false "c"))"#,
            HarnessConfig {
                mode: RunMode::PerAssertion,
                ..HarnessConfig::default()
            },
        );
        assert_eq!((summary.successes, summary.failures), (2, 1));
    }

    #[test]
    fn load_script_reports_missing_file() {
        let err = load_script(Path::new("tests/scripts/does-not-exist.hts")).unwrap_err();
        assert!(matches!(err, HarnessError::Io { .. }));
    }
}
