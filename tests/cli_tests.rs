#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::PredicateBooleanExt;
    use predicates::str::contains;

    fn apiharness() -> Command {
        let mut cmd = Command::cargo_bin("apiharness").unwrap();
        cmd.env_remove("APIHARNESS_VERBOSE").env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn runs_a_script_and_prints_the_tally() {
        apiharness()
            .arg("tests/scripts/assertions.hts")
            .assert()
            .success()
            .stdout(contains("Running tests/scripts/assertions.hts\n"))
            .stdout(contains("DONE.\nSuccesses: 8\nFailures: 0\n"));
    }

    #[test]
    fn appends_the_script_extension() {
        apiharness()
            .arg("tests/scripts/assertions")
            .assert()
            .success()
            .stdout(contains("Running tests/scripts/assertions.hts"));
    }

    #[test]
    fn verbose_prints_passes() {
        apiharness()
            .args(["-s", "tests/scripts/assertions.hts"])
            .assert()
            .success()
            .stdout(contains("NaN equals NaN: PASS.\n"));
    }

    #[test]
    fn failures_do_not_change_exit_status_by_default() {
        apiharness()
            .arg("tests/scripts/failures.hts")
            .assert()
            .success()
            .stdout(contains("FAIL: signed zeros differ: Assertion failure: Expected -0, observed 0"))
            .stdout(contains("Successes: 1\nFailures: 5\n"));
    }

    #[test]
    fn exit_code_flag_reports_failures() {
        apiharness()
            .args(["--exit-code", "tests/scripts/failures.hts"])
            .assert()
            .code(1);
        apiharness()
            .args(["--exit-code", "tests/scripts/assertions.hts"])
            .assert()
            .success();
    }

    #[test]
    fn json_summary() {
        apiharness()
            .args(["--format", "json", "tests/scripts/failures.hts"])
            .assert()
            .success()
            .stdout(contains("{\"successes\":1,\"failures\":5}\n"))
            .stdout(contains("DONE.").not());
    }

    #[test]
    fn per_assertion_mode() {
        apiharness()
            .args(["--per-assertion", "tests/scripts/assertions.hts"])
            .assert()
            .success()
            .stdout(contains("Successes: 10\nFailures: 0\n"));
    }

    #[test]
    fn fixtures_directory() {
        apiharness()
            .args(["--fixtures", "tests/fixtures", "tests/scripts/fixtures.hts"])
            .assert()
            .success()
            .stdout(contains("Successes: 4\nFailures: 0\n"));
    }

    #[test]
    fn fail_unsettled() {
        apiharness()
            .args(["--fail-unsettled", "tests/scripts/deferred.hts"])
            .assert()
            .success()
            .stdout(contains("FAIL: never settles: deferred computation never settled"))
            .stdout(contains("Successes: 5\nFailures: 3\n"));
    }

    #[test]
    fn drain_limit() {
        apiharness()
            .args(["--max-jobs", "2", "tests/scripts/deferred.hts"])
            .assert()
            .success()
            .stdout(contains("FAIL: job queue did not reach a fixed point: stopped after 2 jobs"));
    }

    #[test]
    fn missing_script_is_fatal() {
        apiharness()
            .arg("tests/scripts/no-such-script")
            .assert()
            .failure()
            .stderr(contains("failed to load script tests/scripts/no-such-script.hts"))
            .stdout(contains("DONE.").not());
    }

    #[test]
    fn help_explains_panic_reporting() {
        apiharness()
            .arg("--help")
            .assert()
            .success()
            .stdout(contains("RUST_LOG=debug"));
    }

    #[test]
    fn malformed_script_is_fatal() {
        apiharness()
            .arg("tests/malformed/unclosed.hts")
            .assert()
            .failure()
            .stderr(contains("unclosed parenthesis").and(contains("line 1, column 1")));
    }
}
