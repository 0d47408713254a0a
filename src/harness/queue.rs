//! Pending continuation queue and the drain step.
//!
//! Everything deferred in a run happens through a [`Scheduler`]: settlement
//! continuations, delayed settlements, follow-up jobs enqueued by jobs. Jobs
//! only run when the driver drains the queue, so the order of a run is fully
//! determined by the order jobs were enqueued.

use super::value::Thrown;
use crate::error::HarnessError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

pub type Job = Box<dyn FnOnce()>;

/// A single-threaded FIFO of jobs.
pub trait Scheduler {
    fn enqueue(&self, job: Job);

    /// Run the oldest job. Returns `false` if the queue was empty.
    fn run_next(&self) -> bool;

    fn pending(&self) -> usize;
}

#[derive(Default)]
pub struct JobQueue {
    jobs: RefCell<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<dyn Scheduler> {
        Rc::new(Self::new())
    }
}

impl Scheduler for JobQueue {
    fn enqueue(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }

    fn run_next(&self) -> bool {
        // The borrow must end before the job runs: jobs enqueue more jobs.
        let job = self.jobs.borrow_mut().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        self.jobs.borrow().len()
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("pending", &self.pending()).finish()
    }
}

/// Enqueue `job` so that it runs after `turns` further trips through the
/// queue. `turns == 0` behaves like a plain `enqueue`.
pub fn schedule_after(scheduler: &Rc<dyn Scheduler>, turns: u32, job: Job) {
    if turns == 0 {
        scheduler.enqueue(job);
        return;
    }
    let next = Rc::clone(scheduler);
    scheduler.enqueue(Box::new(move || schedule_after(&next, turns - 1, job)));
}

/// What a completed drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub jobs_run: usize,
    /// Messages of jobs that panicked, in the order they ran.
    pub panics: Vec<String>,
}

/// Run jobs until the queue is empty, including jobs enqueued along the way.
///
/// A panicking job is caught and noted in the report; the drain carries on
/// with the next job.
///
/// # Errors
///
/// Returns [`HarnessError::DrainLimitExceeded`] if jobs are still pending
/// after `max_jobs` have run.
pub fn drain(scheduler: &dyn Scheduler, max_jobs: usize) -> Result<DrainReport, HarnessError> {
    let mut report = DrainReport::default();

    while scheduler.pending() > 0 {
        if report.jobs_run >= max_jobs {
            let pending = scheduler.pending();
            tracing::warn!(limit = max_jobs, pending, "drain limit reached");
            return Err(HarnessError::DrainLimitExceeded {
                limit: max_jobs,
                pending,
            });
        }

        tracing::trace!(job = report.jobs_run, pending = scheduler.pending(), "running job");
        match panic::catch_unwind(AssertUnwindSafe(|| scheduler.run_next())) {
            Ok(_) => {}
            Err(payload) => {
                let message = Thrown::from_panic(payload).message;
                tracing::error!(job = report.jobs_run, %message, "job panicked");
                report.panics.push(message);
            }
        }
        report.jobs_run += 1;
    }

    tracing::debug!(jobs = report.jobs_run, panics = report.panics.len(), "job queue drained");
    Ok(report)
}
