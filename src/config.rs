//! Run configuration shared by the driver and the CLI.

use serde::Serialize;

/// Jobs the drain step may run before it gives up on reaching a fixed point.
pub const DEFAULT_MAX_JOBS: usize = 1 << 20;

/// How a synchronous test body's assertions are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One success or one failure per test, decided by whether the body
    /// raised. A failing assertion counts as a raise.
    #[default]
    Outcome,
    /// Every assertion reports to the aggregator itself; the test only adds
    /// a failure when its body raised.
    PerAssertion,
}

/// What to do with deferred tests that never settled once the queue is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsettledPolicy {
    /// Record nothing, log a warning.
    #[default]
    Ignore,
    /// Record one failure per unsettled test.
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessConfig {
    pub verbose: bool,
    pub mode: RunMode,
    pub max_jobs: usize,
    pub unsettled: UnsettledPolicy,
    pub format: ReportFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            mode: RunMode::default(),
            max_jobs: DEFAULT_MAX_JOBS,
            unsettled: UnsettledPolicy::default(),
            format: ReportFormat::default(),
        }
    }
}
