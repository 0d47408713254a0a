//! Deferred computations.
//!
//! A [`Deferred`] settles at most once, to a success value or a failure
//! reason. It has one success slot and one failure slot for continuations.
//! Continuations never run inline: settling (or registering against an
//! already settled deferred) enqueues the matching continuation on the
//! scheduler, so they run in settlement order once the queue is drained.

use super::queue::Scheduler;
use super::value::Thrown;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeferredError {
    #[error("a success continuation is already registered")]
    SuccessAlreadyRegistered,
    #[error("a failure continuation is already registered")]
    FailureAlreadyRegistered,
}

/// Observable state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    Pending,
    Settled,
    Failed,
}

enum State<T, E> {
    Pending,
    Settled(T),
    Failed(E),
    /// The outcome has been moved into its continuation.
    Delivered(DeferredState),
}

enum Slot<A> {
    Empty,
    Waiting(Box<dyn FnOnce(A)>),
    Taken,
}

impl<A> Slot<A> {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    /// Take a waiting continuation, leaving the slot marked as used.
    fn take_waiting(&mut self) -> Option<Box<dyn FnOnce(A)>> {
        match std::mem::replace(self, Slot::Empty) {
            Slot::Waiting(f) => {
                *self = Slot::Taken;
                Some(f)
            }
            other => {
                *self = other;
                None
            }
        }
    }
}

struct Inner<T, E> {
    state: State<T, E>,
    on_success: Slot<T>,
    on_failure: Slot<E>,
}

pub struct Deferred<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    scheduler: Rc<dyn Scheduler>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            scheduler: Rc::clone(&self.scheduler),
        }
    }
}

impl<T: 'static, E: 'static> Deferred<T, E> {
    pub fn new(scheduler: &Rc<dyn Scheduler>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                on_success: Slot::Empty,
                on_failure: Slot::Empty,
            })),
            scheduler: Rc::clone(scheduler),
        }
    }

    pub fn resolved(scheduler: &Rc<dyn Scheduler>, value: T) -> Self {
        let deferred = Self::new(scheduler);
        deferred.resolve(value);
        deferred
    }

    pub fn rejected(scheduler: &Rc<dyn Scheduler>, reason: E) -> Self {
        let deferred = Self::new(scheduler);
        deferred.reject(reason);
        deferred
    }

    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn state(&self) -> DeferredState {
        match &self.inner.borrow().state {
            State::Pending => DeferredState::Pending,
            State::Settled(_) => DeferredState::Settled,
            State::Failed(_) => DeferredState::Failed,
            State::Delivered(state) => *state,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state() != DeferredState::Pending
    }

    /// Settle with a success value. Returns `false`, dropping `value`, if
    /// already settled.
    pub fn resolve(&self, value: T) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, State::Pending) {
            return false;
        }
        inner.on_failure.take_waiting();
        match inner.on_success.take_waiting() {
            Some(continuation) => {
                inner.state = State::Delivered(DeferredState::Settled);
                drop(inner);
                self.scheduler.enqueue(Box::new(move || continuation(value)));
            }
            None => inner.state = State::Settled(value),
        }
        true
    }

    /// Settle with a failure reason. Returns `false`, dropping `reason`, if
    /// already settled.
    pub fn reject(&self, reason: E) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, State::Pending) {
            return false;
        }
        inner.on_success.take_waiting();
        match inner.on_failure.take_waiting() {
            Some(continuation) => {
                inner.state = State::Delivered(DeferredState::Failed);
                drop(inner);
                self.scheduler.enqueue(Box::new(move || continuation(reason)));
            }
            None => inner.state = State::Failed(reason),
        }
        true
    }

    /// Register the success continuation. If the deferred already succeeded
    /// it is enqueued straight away; if it failed, `f` is dropped unrun.
    ///
    /// # Errors
    ///
    /// Only one success continuation may ever be registered.
    pub fn on_success(&self, f: impl FnOnce(T) + 'static) -> Result<(), DeferredError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.on_success.is_empty() {
            return Err(DeferredError::SuccessAlreadyRegistered);
        }
        match std::mem::replace(&mut inner.state, State::Pending) {
            State::Pending => {
                inner.on_success = Slot::Waiting(Box::new(f));
            }
            State::Settled(value) => {
                inner.on_success = Slot::Taken;
                inner.state = State::Delivered(DeferredState::Settled);
                drop(inner);
                self.scheduler.enqueue(Box::new(move || f(value)));
            }
            other => {
                inner.on_success = Slot::Taken;
                inner.state = other;
            }
        }
        Ok(())
    }

    /// Register the failure continuation. Mirrors [`Deferred::on_success`].
    ///
    /// # Errors
    ///
    /// Only one failure continuation may ever be registered.
    pub fn on_failure(&self, f: impl FnOnce(E) + 'static) -> Result<(), DeferredError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.on_failure.is_empty() {
            return Err(DeferredError::FailureAlreadyRegistered);
        }
        match std::mem::replace(&mut inner.state, State::Pending) {
            State::Pending => {
                inner.on_failure = Slot::Waiting(Box::new(f));
            }
            State::Failed(reason) => {
                inner.on_failure = Slot::Taken;
                inner.state = State::Delivered(DeferredState::Failed);
                drop(inner);
                self.scheduler.enqueue(Box::new(move || f(reason)));
            }
            other => {
                inner.on_failure = Slot::Taken;
                inner.state = other;
            }
        }
        Ok(())
    }

    /// Register both continuations at once. Either both are registered or,
    /// on error, neither is.
    ///
    /// # Errors
    ///
    /// Fails if either slot is already taken.
    pub fn on_settled(
        &self,
        on_success: impl FnOnce(T) + 'static,
        on_failure: impl FnOnce(E) + 'static,
    ) -> Result<(), DeferredError> {
        {
            let inner = self.inner.borrow();
            if !inner.on_success.is_empty() {
                return Err(DeferredError::SuccessAlreadyRegistered);
            }
            if !inner.on_failure.is_empty() {
                return Err(DeferredError::FailureAlreadyRegistered);
            }
        }
        self.on_success(on_success)?;
        self.on_failure(on_failure)
    }

    /// Settle `target` with whatever `self` settles to.
    ///
    /// # Errors
    ///
    /// Fails if either slot of `self` is already taken.
    pub fn forward_to(&self, target: &Deferred<T, E>) -> Result<(), DeferredError> {
        let (ok, err) = (target.clone(), target.clone());
        self.on_settled(
            move |value| {
                ok.resolve(value);
            },
            move |reason| {
                err.reject(reason);
            },
        )
    }

    /// Chain a computation on success. Failures of `self`, errors returned
    /// by `f` and panics in `f` all reject the returned deferred; a panic
    /// rejects with an `Error`-kind [`Thrown`].
    ///
    /// # Errors
    ///
    /// Fails without registering anything if either slot of `self` is taken.
    pub fn then<U: 'static>(
        &self,
        f: impl FnOnce(T) -> Result<U, E> + 'static,
    ) -> Result<Deferred<U, E>, DeferredError>
    where
        E: From<Thrown>,
    {
        let next = Deferred::new(&self.scheduler);
        let on_ok = next.clone();
        let on_err = next.clone();
        self.on_settled(
            move |value| match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                Ok(Ok(u)) => {
                    on_ok.resolve(u);
                }
                Ok(Err(e)) => {
                    on_ok.reject(e);
                }
                Err(payload) => {
                    on_ok.reject(E::from(Thrown::from_panic(payload)));
                }
            },
            move |reason| {
                on_err.reject(reason);
            },
        )?;
        Ok(next)
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::queue::{drain, schedule_after, JobQueue};

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push(log: &Log, entry: impl Into<String>) {
        log.borrow_mut().push(entry.into());
    }

    #[test]
    fn continuation_waits_for_drain() {
        let queue = JobQueue::shared();
        let seen = log();
        let d: Deferred<i32, String> = Deferred::new(&queue);
        let sink = Rc::clone(&seen);
        d.on_success(move |v| push(&sink, format!("ok {v}"))).unwrap();
        assert!(d.resolve(7));
        assert!(seen.borrow().is_empty());
        drain(queue.as_ref(), 16).unwrap();
        assert_eq!(*seen.borrow(), vec!["ok 7"]);
    }

    #[test]
    fn settles_at_most_once() {
        let queue = JobQueue::shared();
        let d: Deferred<i32, String> = Deferred::new(&queue);
        assert!(!d.is_settled());
        assert!(d.reject("first".into()));
        assert!(d.is_settled());
        assert!(!d.resolve(1));
        assert!(!d.reject("second".into()));
        assert_eq!(d.state(), DeferredState::Failed);
    }

    #[test]
    fn late_registration_sees_outcome() {
        let queue = JobQueue::shared();
        let seen = log();
        let d: Deferred<i32, String> = Deferred::rejected(&queue, "nope".into());
        let ok = Rc::clone(&seen);
        let err = Rc::clone(&seen);
        d.on_success(move |_| push(&ok, "ok")).unwrap();
        d.on_failure(move |e| push(&err, format!("err {e}"))).unwrap();
        drain(queue.as_ref(), 16).unwrap();
        assert_eq!(*seen.borrow(), vec!["err nope"]);
    }

    #[test]
    fn only_one_continuation_per_slot() {
        let queue = JobQueue::shared();
        let d: Deferred<(), Thrown> = Deferred::new(&queue);
        d.on_success(|_| {}).unwrap();
        assert_eq!(d.on_success(|_| {}), Err(DeferredError::SuccessAlreadyRegistered));
        d.on_failure(|_| {}).unwrap();
        assert_eq!(d.on_failure(|_| {}), Err(DeferredError::FailureAlreadyRegistered));
        assert_eq!(d.then(|_| Ok(())).unwrap_err(), DeferredError::SuccessAlreadyRegistered);
    }

    #[test]
    fn continuations_follow_settlement_order() {
        let queue = JobQueue::shared();
        let seen = log();
        let mut deferreds = Vec::new();
        for name in ["A", "B", "C"] {
            let d: Deferred<&'static str, ()> = Deferred::new(&queue);
            let sink = Rc::clone(&seen);
            d.on_success(move |v| push(&sink, v)).unwrap();
            deferreds.push((name, d));
        }
        for ((name, d), turns) in deferreds.into_iter().zip([2, 3, 0]) {
            schedule_after(
                &queue,
                turns,
                Box::new(move || {
                    d.resolve(name);
                }),
            );
        }
        drain(queue.as_ref(), 64).unwrap();
        assert_eq!(*seen.borrow(), vec!["C", "A", "B"]);
    }

    #[test]
    fn then_chains_and_propagates() {
        let queue = JobQueue::shared();
        let seen = log();

        let doubled = Deferred::<i32, Thrown>::resolved(&queue, 21).then(|v| Ok(v * 2)).unwrap();
        let sink = Rc::clone(&seen);
        doubled.on_success(move |v| push(&sink, format!("{v}"))).unwrap();

        let failed = Deferred::<i32, Thrown>::resolved(&queue, 1)
            .then(|_| Err::<i32, _>(Thrown::error("in then")))
            .unwrap();
        let sink = Rc::clone(&seen);
        failed.on_failure(move |e| push(&sink, e.message)).unwrap();

        let upstream = Deferred::<i32, Thrown>::rejected(&queue, Thrown::link_error("upstream"))
            .then(|v| Ok(v + 1))
            .unwrap();
        let sink = Rc::clone(&seen);
        upstream.on_failure(move |e| push(&sink, e.message)).unwrap();

        drain(queue.as_ref(), 64).unwrap();
        assert_eq!(*seen.borrow(), vec!["42", "in then", "upstream"]);
    }

    #[test]
    fn panic_in_then_rejects_downstream() {
        let queue = JobQueue::shared();
        let seen = log();
        let chained = Deferred::<i32, Thrown>::resolved(&queue, 1)
            .then(|_: i32| -> Result<i32, Thrown> { panic!("continuation bug") })
            .unwrap();
        let sink = Rc::clone(&seen);
        chained.on_failure(move |e| push(&sink, e.to_string())).unwrap();

        let report = drain(queue.as_ref(), 16).unwrap();
        assert!(report.panics.is_empty());
        assert_eq!(chained.state(), DeferredState::Failed);
        assert_eq!(*seen.borrow(), vec!["Error: panicked: continuation bug"]);
    }

    #[test]
    fn forward_to_follows_source() {
        let queue = JobQueue::shared();
        let source: Deferred<i32, String> = Deferred::new(&queue);
        let target: Deferred<i32, String> = Deferred::new(&queue);
        source.forward_to(&target).unwrap();
        source.reject("gone".into());
        assert_eq!(target.state(), DeferredState::Pending);
        drain(queue.as_ref(), 16).unwrap();
        assert_eq!(target.state(), DeferredState::Failed);
    }

    #[test]
    fn unsettled_never_runs_continuations() {
        let queue = JobQueue::shared();
        let seen = log();
        let d: Deferred<(), ()> = Deferred::new(&queue);
        let sink = Rc::clone(&seen);
        d.on_success(move |_| push(&sink, "ok")).unwrap();
        drain(queue.as_ref(), 16).unwrap();
        assert!(seen.borrow().is_empty());
        assert_eq!(d.state(), DeferredState::Pending);
    }
}
