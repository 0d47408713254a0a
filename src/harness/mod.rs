//! The harness core: assertions, result aggregation, test runners, deferred
//! computations and the job queue they settle through.
//!
//! Everything here is single-threaded. Shared state lives behind `Rc` with
//! `Cell`/`RefCell` interior mutability; nothing is global.

pub mod aggregator;
pub mod assert;
pub mod deferred;
pub mod driver;
pub mod queue;
pub mod runner;
pub mod value;

pub use aggregator::{Aggregator, CapturedOutput, Summary};
pub use assert::{MessageMatcher, Origin, TestContext};
pub use deferred::{Deferred, DeferredError, DeferredState};
pub use driver::Harness;
pub use queue::{drain, schedule_after, DrainReport, Job, JobQueue, Scheduler};
pub use runner::{route_panics_to_tracing, run_test, DeferredRunner, RunMode};
pub use value::{ErrorKind, Thrown, Value};
