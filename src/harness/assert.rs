//! Assertion library.
//!
//! Assertions never unwind out of a test body. Each one produces exactly one
//! outcome: in [`RunMode::PerAssertion`] it goes straight to the aggregator,
//! in [`RunMode::Outcome`] failures are collected on the [`TestContext`] and
//! the runner turns the first one into the test's failure.

use super::aggregator::Aggregator;
use super::value::{ErrorKind, Thrown, Value};
use crate::config::RunMode;
use regex::Regex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::rc::Rc;

/// Where an assertion was written, reported after a failed `assert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Rust(&'static Location<'static>),
    Script { file: Rc<str>, line: u32, column: u32 },
}

impl Origin {
    #[track_caller]
    pub fn caller() -> Self {
        Origin::Rust(Location::caller())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Rust(location) => write!(f, "{}:{}:{}", location.file(), location.line(), location.column()),
            Origin::Script { file, line, column } => write!(f, "{file}:{line}:{column}"),
        }
    }
}

/// How the message of a raised error is checked by `assert_error_message`.
#[derive(Debug, Clone)]
pub enum MessageMatcher {
    Exact(String),
    Pattern(Regex),
}

impl MessageMatcher {
    pub fn matches(&self, message: &str) -> bool {
        match self {
            MessageMatcher::Exact(expected) => expected == message,
            MessageMatcher::Pattern(re) => re.is_match(message),
        }
    }
}

impl fmt::Display for MessageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageMatcher::Exact(expected) => f.write_str(expected),
            MessageMatcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for MessageMatcher {
    fn from(s: &str) -> Self {
        MessageMatcher::Exact(s.to_string())
    }
}

impl From<String> for MessageMatcher {
    fn from(s: String) -> Self {
        MessageMatcher::Exact(s)
    }
}

impl From<Regex> for MessageMatcher {
    fn from(re: Regex) -> Self {
        MessageMatcher::Pattern(re)
    }
}

/// The assertion surface handed to a synchronous test body.
pub struct TestContext<'a> {
    aggregator: Option<&'a Aggregator>,
    mode: RunMode,
    failures: Vec<String>,
}

impl<'a> TestContext<'a> {
    pub fn new(aggregator: &'a Aggregator, mode: RunMode) -> Self {
        Self {
            aggregator: Some(aggregator),
            mode,
            failures: Vec::new(),
        }
    }

    /// A context that only collects failures, for bodies whose outcome is
    /// decided by the caller rather than recorded directly.
    pub fn detached() -> Self {
        Self {
            aggregator: None,
            mode: RunMode::Outcome,
            failures: Vec::new(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Failures collected so far. Always empty in per-assertion mode, where
    /// failures are recorded as they happen.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn first_failure(&self) -> Option<&str> {
        self.failures.first().map(String::as_str)
    }

    pub fn into_failures(self) -> Vec<String> {
        self.failures
    }

    /// Passes when `condition` holds. A failure reads
    /// `Assertion failure: <message>` followed by the caller's location.
    #[track_caller]
    pub fn assert(&mut self, condition: bool, message: &str) -> bool {
        self.assert_at(condition, message, Origin::caller())
    }

    pub fn assert_at(&mut self, condition: bool, message: &str, origin: Origin) -> bool {
        if condition {
            self.pass(message);
        } else {
            self.fail(format!("Assertion failure: {message}\n    at {origin}"));
        }
        condition
    }

    #[track_caller]
    pub fn assert_equals(&mut self, observed: impl Into<Value>, expected: impl Into<Value>) -> bool {
        self.assert_equals_at(observed.into(), expected.into(), Origin::caller())
    }

    /// NaN is only equal to NaN, and a zero is only equal to a zero of the
    /// same sign. Everything else is strict equality.
    pub fn assert_equals_at(&mut self, observed: Value, expected: Value, origin: Origin) -> bool {
        let equal = match (&expected, &observed) {
            (Value::Number(e), Value::Number(o)) if e.is_nan() => o.is_nan(),
            (Value::Number(e), _) if e.is_nan() => false,
            (Value::Number(e), Value::Number(o)) if *e == 0.0 => 1.0 / e == 1.0 / o,
            _ => observed.strict_eq(&expected),
        };
        self.assert_at(equal, &format!("Expected {expected}, observed {observed}"), origin)
    }

    #[track_caller]
    pub fn assert_true(&mut self, observed: impl Into<Value>) -> bool {
        self.assert_equals_at(observed.into(), Value::Bool(true), Origin::caller())
    }

    #[track_caller]
    pub fn assert_false(&mut self, observed: impl Into<Value>) -> bool {
        self.assert_equals_at(observed.into(), Value::Bool(false), Origin::caller())
    }

    /// Runs `body` and expects it to raise an error of `kind` whose message
    /// satisfies `matcher`. A panic in `body` counts as a raise of kind
    /// [`ErrorKind::Error`]. Exactly one outcome is recorded.
    #[track_caller]
    pub fn assert_error_message<T>(
        &mut self,
        body: impl FnOnce(&mut TestContext<'a>) -> Result<T, Thrown>,
        kind: ErrorKind,
        matcher: impl Into<MessageMatcher>,
    ) -> bool {
        self.assert_error_message_at(body, kind, matcher.into(), Origin::caller())
    }

    pub fn assert_error_message_at<T>(
        &mut self,
        body: impl FnOnce(&mut TestContext<'a>) -> Result<T, Thrown>,
        kind: ErrorKind,
        matcher: MessageMatcher,
        origin: Origin,
    ) -> bool {
        let raised = match panic::catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(Ok(_)) => None,
            Ok(Err(thrown)) => Some(thrown),
            Err(payload) => Some(Thrown::from_panic(payload)),
        };

        match raised {
            None => self.assert_at(false, &format!("expected exception {kind}, no exception thrown"), origin),
            Some(thrown) if thrown.kind != kind => {
                self.assert_at(false, &format!("expected exception {kind}, got {thrown}"), origin)
            }
            Some(thrown) => {
                let matched = matcher.matches(&thrown.message);
                let message = if matched {
                    format!("expected exception {kind}, got {thrown}")
                } else {
                    format!("expected {matcher}, got {}", thrown.message)
                };
                self.assert_at(matched, &message, origin)
            }
        }
    }

    fn pass(&mut self, tag: &str) {
        if let (RunMode::PerAssertion, Some(aggregator)) = (self.mode, self.aggregator) {
            aggregator.record_success(tag);
        }
    }

    fn fail(&mut self, description: String) {
        match (self.mode, self.aggregator) {
            (RunMode::PerAssertion, Some(aggregator)) => aggregator.record_failure(&description),
            _ => self.failures.push(description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::aggregator::CapturedOutput;

    fn aggregator() -> (Aggregator, CapturedOutput) {
        let out = CapturedOutput::new();
        (Aggregator::new(Box::new(out.clone()), false), out)
    }

    #[test]
    fn assert_failure_includes_origin() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        assert!(!ctx.assert(false, "memory is shared"));
        assert_eq!(agg.failures(), 1);
        let text = out.contents();
        assert!(text.starts_with("FAIL: Assertion failure: memory is shared\n    at "));
        assert!(text.contains("assert.rs:"));
    }

    #[test]
    fn script_origin_display() {
        let origin = Origin::Script {
            file: Rc::from("table.hts"),
            line: 4,
            column: 9,
        };
        assert_eq!(origin.to_string(), "table.hts:4:9");
    }

    #[test]
    fn nan_equals_nan() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        assert!(ctx.assert_equals(f64::NAN, f64::NAN));
        assert!(!ctx.assert_equals(1.0, f64::NAN));
        assert!(!ctx.assert_equals("NaN", f64::NAN));
        assert_eq!((agg.successes(), agg.failures()), (1, 2));
    }

    #[test]
    fn zero_sign_matters() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        assert!(!ctx.assert_equals(0.0, -0.0));
        assert!(!ctx.assert_equals(-0.0, 0.0));
        assert!(ctx.assert_equals(-0.0, -0.0));
        assert!(ctx.assert_equals(0, 0.0));
        assert!(!ctx.assert_equals(false, 0));
    }

    #[test]
    fn equals_message_names_both_values() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        ctx.assert_equals(2, 1);
        assert!(out.contents().starts_with("FAIL: Assertion failure: Expected 1, observed 2\n"));
    }

    #[test]
    fn assert_true_and_false_are_strict() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        assert!(ctx.assert_true(true));
        assert!(!ctx.assert_true(1));
        assert!(ctx.assert_false(false));
        assert!(!ctx.assert_false(Value::Undefined));
    }

    #[test]
    fn error_message_match() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        let passed = ctx.assert_error_message(
            |_| Err::<(), _>(Thrown::type_error("first argument must be a module")),
            ErrorKind::TypeError,
            "first argument must be a module",
        );
        assert!(passed);
        assert_eq!((agg.successes(), agg.failures()), (1, 0));
    }

    #[test]
    fn error_message_pattern() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        let re = Regex::new("^out of bounds").unwrap();
        assert!(ctx.assert_error_message(
            |_| Err::<(), _>(Thrown::range_error("out of bounds table access")),
            ErrorKind::RangeError,
            re,
        ));
    }

    #[test]
    fn wrong_kind_fails_even_though_something_was_raised() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        assert!(!ctx.assert_error_message(
            |_| Err::<(), _>(Thrown::range_error("bad")),
            ErrorKind::TypeError,
            "bad",
        ));
        assert_eq!(agg.failures(), 1);
        assert!(out
            .contents()
            .contains("expected exception TypeError, got RangeError: bad"));
    }

    #[test]
    fn wrong_message_reports_matcher() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        let re = Regex::new("^grow").unwrap();
        ctx.assert_error_message(|_| Err::<(), _>(Thrown::range_error("shrink")), ErrorKind::RangeError, re);
        assert!(out.contents().contains("expected /^grow/, got shrink"));
    }

    #[test]
    fn no_raise_is_distinguishable() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        ctx.assert_error_message(|_| Ok(42), ErrorKind::TypeError, "x");
        let text = out.contents();
        assert!(text.contains("expected exception TypeError, no exception thrown"));
        assert!(!text.contains(", got "));
    }

    #[test]
    fn panic_counts_as_error_raise() {
        let (agg, _) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::PerAssertion);
        let re = Regex::new("index out of bounds").unwrap();
        assert!(ctx.assert_error_message(
            |_| {
                let v: Vec<u8> = Vec::new();
                let i = v.len() + 3;
                Ok(v[i])
            },
            ErrorKind::Error,
            re,
        ));
    }

    #[test]
    fn detached_context_only_collects() {
        let mut ctx = TestContext::detached();
        assert!(ctx.assert_true(true));
        assert!(!ctx.assert(false, "unreachable export"));
        assert_eq!(ctx.into_failures().len(), 1);
    }

    #[test]
    fn outcome_mode_collects_instead_of_recording() {
        let (agg, out) = aggregator();
        let mut ctx = TestContext::new(&agg, RunMode::Outcome);
        ctx.assert(true, "fine");
        ctx.assert_equals(1, 2);
        ctx.assert(false, "second");
        assert_eq!((agg.successes(), agg.failures()), (0, 0));
        assert_eq!(out.contents(), "");
        assert_eq!(ctx.failures().len(), 2);
        assert!(ctx
            .first_failure()
            .unwrap()
            .starts_with("Assertion failure: Expected 2, observed 1"));
    }
}
