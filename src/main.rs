//! `apiharness`: run a harness script and print the tally.

use anyhow::{Context, Result};
use apiharness::config::{HarnessConfig, ReportFormat, RunMode, UnsettledPolicy, DEFAULT_MAX_JOBS};
use apiharness::fixture::Fixtures;
use apiharness::harness::{route_panics_to_tracing, Harness};
use apiharness::script::{load_script, ScriptRunner};
use clap::{Parser, ValueEnum};
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const SCRIPT_EXTENSION: &str = "hts";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Plain,
    Json,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Plain => ReportFormat::Plain,
            Format::Json => ReportFormat::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run embedding API conformance scripts",
    after_help = "Panics inside tests are recorded as failures. Set RUST_LOG=debug to see where they happened."
)]
struct Args {
    /// Script to run; `.hts` is appended when missing
    script: PathBuf,

    /// Print a line for every passing test
    #[arg(short = 's', long, env = "APIHARNESS_VERBOSE")]
    verbose: bool,

    /// Count every assertion inside `test` bodies instead of one outcome per test
    #[arg(long)]
    per_assertion: bool,

    /// Directory of `.wasm` fixtures, available to scripts by file stem
    #[arg(long, value_name = "DIR")]
    fixtures: Option<PathBuf>,

    /// Jobs the drain may run before giving up
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_JOBS)]
    max_jobs: usize,

    /// Record a failure for every deferred test that never settles
    #[arg(long)]
    fail_unsettled: bool,

    /// Summary format
    #[arg(long, value_enum, default_value = "plain")]
    format: Format,

    /// Exit with status 1 when any failure was recorded
    #[arg(long)]
    exit_code: bool,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            verbose: self.verbose,
            mode: if self.per_assertion {
                RunMode::PerAssertion
            } else {
                RunMode::Outcome
            },
            max_jobs: self.max_jobs,
            unsettled: if self.fail_unsettled {
                UnsettledPolicy::Fail
            } else {
                UnsettledPolicy::Ignore
            },
            format: self.format.into(),
        }
    }

    fn script_path(&self) -> PathBuf {
        let mut path = self.script.clone();
        if path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
            let mut name = path.clone().into_os_string();
            name.push(".");
            name.push(SCRIPT_EXTENSION);
            path = PathBuf::from(name);
        }
        path
    }
}

fn initialize_tracing() {
    let format = env::var("APIHARNESS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);

    match format.as_str() {
        "json" => subscriber.json().init(),
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.compact().init(),
    }
}

fn main() -> Result<ExitCode> {
    initialize_tracing();
    route_panics_to_tracing();
    let args = Args::parse();
    let config = args.config();
    tracing::debug!(?config, "starting");

    let path = args.script_path();
    println!("Running {}", path.display());

    let script = load_script(&path).with_context(|| format!("failed to load script {}", path.display()))?;
    let fixtures = match &args.fixtures {
        Some(dir) => {
            Fixtures::load_dir(dir).with_context(|| format!("failed to load fixtures from {}", dir.display()))?
        }
        None => Fixtures::new(),
    };

    let mut harness = Harness::new(config, Box::new(io::stdout()));
    ScriptRunner::new(path.display().to_string(), fixtures).run(&harness, &script);
    let summary = harness.drain_and_report()?;

    if args.exit_code && summary.failures > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
