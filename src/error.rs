//! Errors surfaced by the driver.
//!
//! These are harness-level problems: they are reported to the caller rather
//! than counted as test failures. Failures of the code under test go through
//! the aggregator instead.

use crate::script::ScriptError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("the job queue has already been drained")]
    AlreadyDrained,
    #[error("job queue did not reach a fixed point: stopped after {limit} jobs with {pending} still pending")]
    DrainLimitExceeded { limit: usize, pending: usize },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: ScriptError,
    },
}
