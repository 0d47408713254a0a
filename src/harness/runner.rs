//! Synchronous and deferred test runners.

use super::aggregator::Aggregator;
use super::assert::TestContext;
use super::deferred::Deferred;
use super::queue::Scheduler;
use super::value::Thrown;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

pub use crate::config::RunMode;

/// Send panic reports to `tracing` at debug level instead of stderr.
///
/// Every panic the runners and the drain catch is already recorded as a
/// failure, so the default hook's report would only repeat it.
pub fn route_panics_to_tracing() {
    panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        tracing::debug!(%location, "{info}");
    }));
}

/// Run a synchronous test body to completion and record its outcome.
///
/// Raised errors and panics never escape: each becomes a single failure
/// reading `<description>: <error>`. Returns whether the test passed.
pub fn run_test(
    aggregator: &Aggregator,
    mode: RunMode,
    description: &str,
    body: impl FnOnce(&mut TestContext<'_>) -> Result<(), Thrown>,
) -> bool {
    tracing::debug!(test = description, ?mode, "running test");
    let mut ctx = TestContext::new(aggregator, mode);
    let raised = match panic::catch_unwind(AssertUnwindSafe(|| body(&mut ctx))) {
        Ok(Ok(())) => None,
        Ok(Err(thrown)) => Some(thrown.to_string()),
        Err(payload) => Some(Thrown::from_panic(payload).to_string()),
    };

    let reason = match mode {
        RunMode::Outcome => ctx.first_failure().map(str::to_string).or(raised),
        RunMode::PerAssertion => raised,
    };

    match reason {
        Some(reason) => {
            aggregator.record_failure(&format!("{description}: {reason}"));
            false
        }
        None => {
            if mode == RunMode::Outcome {
                aggregator.record_success(description);
            }
            true
        }
    }
}

/// Registers deferred tests and tracks which of them are still waiting to
/// settle.
pub struct DeferredRunner {
    aggregator: Rc<Aggregator>,
    scheduler: Rc<dyn Scheduler>,
    outstanding: Rc<RefCell<BTreeMap<u64, String>>>,
    next_id: Cell<u64>,
}

impl DeferredRunner {
    pub fn new(aggregator: Rc<Aggregator>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            aggregator,
            scheduler,
            outstanding: Rc::default(),
            next_id: Cell::new(0),
        }
    }

    /// Invoke `body` and hook the deferred it returns up to the aggregator.
    ///
    /// Nothing is recorded until the queue is drained, unless `body` raises
    /// (or panics) before producing a deferred, or the deferred already has
    /// continuations; both record a failure straight away. Returns whether
    /// the test was registered.
    pub fn run_deferred_test<T, E>(
        &self,
        description: &str,
        body: impl FnOnce(&Rc<dyn Scheduler>) -> Result<Deferred<T, E>, Thrown>,
    ) -> bool
    where
        T: 'static,
        E: fmt::Display + 'static,
    {
        let deferred = match panic::catch_unwind(AssertUnwindSafe(|| body(&self.scheduler))) {
            Ok(Ok(deferred)) => deferred,
            Ok(Err(thrown)) => {
                self.aggregator.record_failure(&format!("{description}: {thrown}"));
                return false;
            }
            Err(payload) => {
                let thrown = Thrown::from_panic(payload);
                self.aggregator.record_failure(&format!("{description}: {thrown}"));
                return false;
            }
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (aggregator, outstanding, tag) = (
            Rc::clone(&self.aggregator),
            Rc::clone(&self.outstanding),
            description.to_string(),
        );
        let on_success = move |_: T| {
            outstanding.borrow_mut().remove(&id);
            aggregator.record_success(&tag);
        };

        let (aggregator, outstanding, tag) = (
            Rc::clone(&self.aggregator),
            Rc::clone(&self.outstanding),
            description.to_string(),
        );
        let on_failure = move |reason: E| {
            outstanding.borrow_mut().remove(&id);
            aggregator.record_failure(&format!("{tag}: {reason}"));
        };

        self.outstanding.borrow_mut().insert(id, description.to_string());
        if let Err(e) = deferred.on_settled(on_success, on_failure) {
            self.outstanding.borrow_mut().remove(&id);
            self.aggregator.record_failure(&format!("{description}: {e}"));
            return false;
        }

        tracing::debug!(test = description, id, state = ?deferred.state(), "registered deferred test");
        true
    }

    /// Descriptions of registered deferred tests whose continuations have
    /// not run, in registration order.
    pub fn unsettled(&self) -> Vec<String> {
        self.outstanding.borrow().values().cloned().collect()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.borrow().len()
    }
}

impl fmt::Debug for DeferredRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRunner")
            .field("outstanding", &self.outstanding())
            .field("registered", &self.next_id.get())
            .finish()
    }
}
