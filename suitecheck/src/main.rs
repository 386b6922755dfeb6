//! Test-suite driver.
//!
//! Runs the selected suites, compares their results with the baseline in
//! `result_file`, and with `--reset` accepts the current failures as the new
//! baseline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use suitecheck::core::suite::{Selection, Suite};
use suitecheck::core::verdict::Verdict;
use suitecheck::exit_codes;
use suitecheck::io::config::{Config, DEFAULT_CONFIG_FILE, load_config};
use suitecheck::io::store::BaselineStore;
use suitecheck::io::test_runner::ProcessTestRunner;
use suitecheck::logging;
use suitecheck::reconcile::Reconciliation;
use suitecheck::run::{RunReport, RunRequest, run_suites};

#[derive(Parser, Debug)]
#[command(
    name = "suitecheck",
    version,
    about = "Run test suites and check their results against a baseline"
)]
struct Cli {
    /// Reset test results to new results of failed tests.
    #[arg(short, long)]
    reset: bool,

    /// Select tests by name (section in the registry). Overrides --suite.
    #[arg(short, long)]
    name: Option<String>,

    /// Select suites.
    #[arg(
        short,
        long,
        value_enum,
        num_args = 1..,
        default_values_t = [Suite::Unittests, Suite::Builtin]
    )]
    suite: Vec<Suite>,

    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

impl Cli {
    fn request(&self) -> RunRequest {
        let selection = match &self.name {
            Some(name) => Selection::Named(name.clone()),
            None => Selection::Suites(self.suite.clone()),
        };
        RunRequest {
            selection,
            reset: self.reset,
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let store = BaselineStore::new(cfg.store_paths());
    let runner = ProcessTestRunner {
        timeout: cfg.case_timeout(),
        output_limit_bytes: cfg.output_limit_bytes,
    };

    let report = run_suites(&cfg, &store, &runner, &cli.request())?;
    print_report(&cfg, &report);

    Ok(if report.success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn print_report(cfg: &Config, report: &RunReport) {
    for case in &report.cases {
        println!("{} ... {}", case.key, case.verdict.label());
        match &case.verdict {
            Verdict::Diverged { expected, observed } => {
                println!("    expected: {}", expected.payload());
                println!("    observed: {}", observed.payload());
            }
            Verdict::Failed if !case.observation.stderr.trim().is_empty() => {
                eprintln!("{}", case.observation.stderr.trim_end());
            }
            _ => {}
        }
    }

    println!(
        "run: cases={} passed={} failed={}",
        report.cases.len(),
        report.cases.len() - report.failed(),
        report.failed()
    );

    match &report.reconciliation {
        None => {}
        Some(Ok(Reconciliation::NothingToReconcile)) => {
            println!("reset: nothing to reconcile");
        }
        Some(Ok(Reconciliation::Merged(summary))) => {
            println!(
                "reset: records={} replaced={} unmatched={}",
                summary.records,
                summary.replaced,
                summary.unmatched.len()
            );
            for key in &summary.unmatched {
                eprintln!("warning: failure {} has no baseline record, dropped", key);
            }
            if !summary.failures_removed {
                eprintln!(
                    "warning: could not remove {}",
                    cfg.failed_file.display()
                );
            }
        }
        Some(Err(err)) => {
            eprintln!("warning: reset failed, baseline unchanged: {}", err);
        }
    }
}
