//! The harness entry point: owns the aggregator and the job queue for one run.

use super::aggregator::{Aggregator, Summary};
use super::assert::TestContext;
use super::deferred::Deferred;
use super::queue::{self, JobQueue, Scheduler};
use super::runner::{self, DeferredRunner};
use super::value::Thrown;
use crate::config::{HarnessConfig, UnsettledPolicy};
use crate::error::HarnessError;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// One harness run.
///
/// Register tests with [`Harness::test`] and [`Harness::promise_test`], then
/// call [`Harness::drain_and_report`] exactly once.
///
/// ```
/// use apiharness::config::HarnessConfig;
/// use apiharness::harness::{CapturedOutput, Deferred, Harness, Thrown};
///
/// let out = CapturedOutput::new();
/// let mut harness = Harness::new(HarnessConfig::default(), Box::new(out.clone()));
/// harness.test("sync", |ctx| {
///     ctx.assert_equals(1, 1);
///     Ok(())
/// });
/// harness.promise_test("async", |s| Ok(Deferred::<(), Thrown>::resolved(s, ())));
/// let summary = harness.drain_and_report().unwrap();
/// assert_eq!((summary.successes, summary.failures), (2, 0));
/// assert!(out.contents().ends_with("DONE.\nSuccesses: 2\nFailures: 0\n"));
/// ```
pub struct Harness {
    config: HarnessConfig,
    aggregator: Rc<Aggregator>,
    scheduler: Rc<dyn Scheduler>,
    deferred: DeferredRunner,
    drained: bool,
}

impl Harness {
    pub fn new(config: HarnessConfig, out: Box<dyn Write>) -> Self {
        Self::with_scheduler(config, out, JobQueue::shared())
    }

    pub fn with_scheduler(config: HarnessConfig, out: Box<dyn Write>, scheduler: Rc<dyn Scheduler>) -> Self {
        let aggregator = Rc::new(Aggregator::with_format(out, config.verbose, config.format));
        let deferred = DeferredRunner::new(Rc::clone(&aggregator), Rc::clone(&scheduler));
        Self {
            config,
            aggregator,
            scheduler,
            deferred,
            drained: false,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Run a synchronous test in the configured mode.
    pub fn test(&self, description: &str, body: impl FnOnce(&mut TestContext<'_>) -> Result<(), Thrown>) -> bool {
        runner::run_test(&self.aggregator, self.config.mode, description, body)
    }

    /// Register a deferred test. Its outcome is recorded during the drain.
    pub fn promise_test<T, E>(
        &self,
        description: &str,
        body: impl FnOnce(&Rc<dyn Scheduler>) -> Result<Deferred<T, E>, Thrown>,
    ) -> bool
    where
        T: 'static,
        E: fmt::Display + 'static,
    {
        self.deferred.run_deferred_test(description, body)
    }

    /// Descriptions of deferred tests that have not settled yet.
    pub fn unsettled(&self) -> Vec<String> {
        self.deferred.unsettled()
    }

    /// Drain the job queue to a fixed point, then print the summary.
    ///
    /// Drain problems are counted as failures rather than returned: each
    /// panicking job is one failure, hitting the job limit is one failure,
    /// and with [`UnsettledPolicy::Fail`] each unsettled deferred test is one
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AlreadyDrained`] on every call after the first.
    pub fn drain_and_report(&mut self) -> Result<Summary, HarnessError> {
        if self.drained {
            return Err(HarnessError::AlreadyDrained);
        }
        self.drained = true;

        match queue::drain(self.scheduler.as_ref(), self.config.max_jobs) {
            Ok(report) => {
                for message in &report.panics {
                    self.aggregator.record_failure(&format!("job: {message}"));
                }
            }
            Err(e) => self.aggregator.record_failure(&e.to_string()),
        }

        for description in self.deferred.unsettled() {
            match self.config.unsettled {
                UnsettledPolicy::Ignore => {
                    tracing::warn!(test = %description, "deferred test never settled");
                }
                UnsettledPolicy::Fail => {
                    self.aggregator
                        .record_failure(&format!("{description}: deferred computation never settled"));
                }
            }
        }

        Ok(self.aggregator.summarize())
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .field("pending_jobs", &self.scheduler.pending())
            .field("deferred", &self.deferred)
            .field("drained", &self.drained)
            .finish()
    }
}
