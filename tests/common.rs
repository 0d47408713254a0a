//! Common test utilities shared between integration tests

#![allow(dead_code)]

use apiharness::config::HarnessConfig;
use apiharness::fixture::Fixtures;
use apiharness::harness::{CapturedOutput, Harness, Summary};
use apiharness::script::{parse_script, ScriptRunner};
use std::path::Path;

/// Harness writing into a captured buffer.
pub fn captured_harness(config: HarnessConfig) -> (Harness, CapturedOutput) {
    let out = CapturedOutput::new();
    (Harness::new(config, Box::new(out.clone())), out)
}

/// Fixtures checked in under `tests/fixtures`.
pub fn test_fixtures() -> Fixtures {
    Fixtures::load_dir(Path::new("tests/fixtures")).expect("tests/fixtures is readable")
}

/// Parse, run and drain `source`, returning the tally and everything printed.
pub fn run_source(source: &str, config: HarnessConfig) -> (Summary, String) {
    let script = parse_script(source).expect("script parses");
    let (mut harness, out) = captured_harness(config);
    ScriptRunner::new("inline.hts", test_fixtures()).run(&harness, &script);
    let summary = harness.drain_and_report().expect("first drain succeeds");
    (summary, out.contents())
}
