//! A small test-harness runtime for embedding API conformance checks.
//!
//! apiharness loads test scripts, runs the synchronous and deferred tests
//! they declare, counts passes and failures, and prints a tally. Deferred
//! tests settle through an explicit job queue that is drained exactly once,
//! so results are deterministic on a single thread.
//!
//! # Modules
//!
//! - [`harness`] -- Assertions, the result aggregator, the test runners, deferred computations and the job queue.
//! - [`script`] -- The `.hts` script format: lexer, S-expression reader, parser and evaluator.
//! - [`fixture`] -- Opaque binary fixtures handed to test bodies.
//! - [`config`] -- Run configuration.
//! - [`error`] -- Driver-level errors.
//!
//! # Example
//!
//! Run a script against an in-memory output stream:
//!
//! ```
//! use apiharness::config::HarnessConfig;
//! use apiharness::fixture::Fixtures;
//! use apiharness::harness::{CapturedOutput, Harness};
//! use apiharness::script::{parse_script, ScriptRunner};
//!
//! let script = parse_script(r#"
//!     (test "nan" (assert_eq nan nan))
//!     (test "signed zero" (assert_eq 0 -0))
//!     (promise_test "deferred" (delay 2 (resolve)))
//! "#).unwrap();
//!
//! let out = CapturedOutput::new();
//! let mut harness = Harness::new(HarnessConfig::default(), Box::new(out.clone()));
//! ScriptRunner::new("example.hts", Fixtures::new()).run(&harness, &script);
//! let summary = harness.drain_and_report().unwrap();
//!
//! assert_eq!((summary.successes, summary.failures), (2, 1));
//! assert!(out.contents().ends_with("DONE.\nSuccesses: 2\nFailures: 1\n"));
//! ```

pub mod config;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod script;
