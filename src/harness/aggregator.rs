//! Pass/fail counters and result output.
//!
//! The aggregator is the single source of truth for a run. Every runner and
//! assertion reports through it; nothing else writes test results.

use crate::config::ReportFormat;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

/// Final tally of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub successes: u64,
    pub failures: u64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DONE.")?;
        writeln!(f, "Successes: {}", self.successes)?;
        write!(f, "Failures: {}", self.failures)
    }
}

pub struct Aggregator {
    successes: Cell<u64>,
    failures: Cell<u64>,
    verbose: bool,
    format: ReportFormat,
    out: RefCell<Box<dyn Write>>,
}

impl Aggregator {
    pub fn new(out: Box<dyn Write>, verbose: bool) -> Self {
        Self::with_format(out, verbose, ReportFormat::Plain)
    }

    pub fn with_format(out: Box<dyn Write>, verbose: bool, format: ReportFormat) -> Self {
        Self {
            successes: Cell::new(0),
            failures: Cell::new(0),
            verbose,
            format,
            out: RefCell::new(out),
        }
    }

    /// An aggregator writing to stdout.
    pub fn stdout(verbose: bool) -> Self {
        Self::new(Box::new(io::stdout()), verbose)
    }

    pub fn record_success(&self, tag: &str) {
        self.successes.set(self.successes.get() + 1);
        if self.verbose {
            self.emit(format_args!("{tag}: PASS.\n"), false);
        }
    }

    /// Failures are flushed immediately so they survive a later abort.
    pub fn record_failure(&self, message: &str) {
        self.failures.set(self.failures.get() + 1);
        self.emit(format_args!("FAIL: {message}\n"), true);
    }

    pub fn successes(&self) -> u64 {
        self.successes.get()
    }

    pub fn failures(&self) -> u64 {
        self.failures.get()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            successes: self.successes(),
            failures: self.failures(),
        }
    }

    /// Write the tally. Safe to call any number of times.
    pub fn summarize(&self) -> Summary {
        let summary = self.summary();
        match self.format {
            ReportFormat::Plain => self.emit(format_args!("{summary}\n"), true),
            ReportFormat::Json => match serde_json::to_string(&summary) {
                Ok(json) => self.emit(format_args!("{json}\n"), true),
                Err(e) => tracing::warn!(error = %e, "failed to serialize summary"),
            },
        }
        summary
    }

    fn emit(&self, args: fmt::Arguments<'_>, flush: bool) {
        let mut out = self.out.borrow_mut();
        let result = out.write_fmt(args).and_then(|_| if flush { out.flush() } else { Ok(()) });
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write test output");
        }
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("successes", &self.successes.get())
            .field("failures", &self.failures.get())
            .field("verbose", &self.verbose)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// In-memory output sink. Clones share the same buffer, so one clone can be
/// handed to an [`Aggregator`] and the other read back afterwards.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput(Rc<RefCell<Vec<u8>>>);

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
