//! Run coordination: plan cases, execute them, judge them, optionally reset.

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::core::record::Record;
use crate::core::suite::{CaseKind, Selection, TestCase, plan_cases};
use crate::core::verdict::{Verdict, judge_against_baseline, judge_exit_status};
use crate::io::config::Config;
use crate::io::registry::Registry;
use crate::io::store::{BaselineStore, ResourceError};
use crate::io::test_runner::{Observation, TestRunner};
use crate::reconcile::{Reconciler, Reconciliation};

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub selection: Selection,
    /// Accept this run's failures into the baseline once the run finishes.
    pub reset: bool,
}

/// Outcome of one executed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub key: String,
    pub verdict: Verdict,
    pub observation: Observation,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunReport {
    pub cases: Vec<CaseResult>,
    /// Present only when a reset was requested.
    pub reconciliation: Option<Result<Reconciliation, ResourceError>>,
}

impl RunReport {
    /// True iff every case passed. Reconciliation never affects this.
    pub fn success(&self) -> bool {
        self.cases.iter().all(|case| case.verdict.passed())
    }

    pub fn failed(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| !case.verdict.passed())
            .count()
    }
}

/// Resolve the request's selection against config and (when needed) the registry.
pub fn plan_request(cfg: &Config, request: &RunRequest) -> Result<Vec<TestCase>> {
    let registry = if request.selection.needs_registry() {
        Registry::load(&cfg.registry_file)?
    } else {
        Registry::default()
    };
    plan_cases(
        &request.selection,
        &registry.sections,
        &cfg.unittests.command,
    )
    .context("select test cases")
}

/// Execute `cases` in order and judge each one.
///
/// Stale failures are cleared first so the failure file reflects only this
/// run. Observations without a baseline record are appended to the baseline
/// after all cases ran; diverging observations go to the failure file as they
/// happen.
#[instrument(skip_all, fields(cases = cases.len(), reset = reset))]
pub fn run_cases<R: TestRunner>(
    store: &BaselineStore,
    runner: &R,
    cases: &[TestCase],
    reset: bool,
) -> Result<RunReport> {
    store.clear_failures().context("clear stale failures")?;

    let mut results = Vec::with_capacity(cases.len());
    let mut new_records: Vec<Record> = Vec::new();
    for case in cases {
        debug!(key = %case.key, "running case");
        let observation = runner
            .run(case)
            .with_context(|| format!("run case {}", case.key))?;
        let verdict = judge_case(store, case, &observation)?;
        match &verdict {
            Verdict::Recorded(record) => new_records.push(record.clone()),
            Verdict::Diverged { observed, .. } => store
                .append_failure(observed)
                .with_context(|| format!("record failure for {}", case.key))?,
            Verdict::Passed | Verdict::Failed | Verdict::Matched => {}
        }
        results.push(CaseResult {
            key: case.key.clone(),
            verdict,
            observation,
        });
    }

    store
        .append_baseline(&new_records)
        .context("record new baseline entries")?;
    if !new_records.is_empty() {
        info!(count = new_records.len(), "new baseline records appended");
    }

    let mut report = RunReport {
        cases: results,
        reconciliation: None,
    };
    info!(
        cases = report.cases.len(),
        failed = report.failed(),
        "run finished"
    );

    if reset {
        let outcome = Reconciler::new(store).reconcile();
        if let Err(err) = &outcome {
            error!(err = %err, "reconciliation failed, baseline unchanged");
        }
        report.reconciliation = Some(outcome);
    }
    Ok(report)
}

/// Plan and run a request end to end.
pub fn run_suites<R: TestRunner>(
    cfg: &Config,
    store: &BaselineStore,
    runner: &R,
    request: &RunRequest,
) -> Result<RunReport> {
    let cases = plan_request(cfg, request)?;
    if cases.is_empty() {
        warn!(selection = ?request.selection, "selection matched no test cases");
    }
    run_cases(store, runner, &cases, request.reset)
}

fn judge_case(store: &BaselineStore, case: &TestCase, observation: &Observation) -> Result<Verdict> {
    let verdict = match case.kind {
        CaseKind::ExitStatus => judge_exit_status(observation.succeeded()),
        CaseKind::Baseline => {
            let expected = store
                .find_baseline(&case.key)
                .with_context(|| format!("look up baseline for {}", case.key))?;
            judge_against_baseline(expected, observation.record(&case.key))
        }
    };
    debug!(key = %case.key, verdict = verdict.label(), "case judged");
    Ok(verdict)
}
