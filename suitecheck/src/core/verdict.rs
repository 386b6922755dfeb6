//! Judging a single observed outcome.

use crate::core::record::Record;

/// Classification of one executed test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Exit-status case that succeeded.
    Passed,
    /// Exit-status case that failed.
    Failed,
    /// Observed record equals the baseline record.
    Matched,
    /// No baseline record for this key yet; the observation becomes the baseline.
    Recorded(Record),
    /// Observed record differs from the baseline.
    Diverged { expected: Record, observed: Record },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        !matches!(self, Verdict::Failed | Verdict::Diverged { .. })
    }

    /// Short label for per-case output.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed | Verdict::Matched => "ok",
            Verdict::Recorded(_) => "new",
            Verdict::Failed | Verdict::Diverged { .. } => "FAIL",
        }
    }
}

/// Compare an observation with the first baseline record for its key.
pub fn judge_against_baseline(expected: Option<Record>, observed: Record) -> Verdict {
    match expected {
        None => Verdict::Recorded(observed),
        Some(expected) if expected.payload() == observed.payload() => Verdict::Matched,
        Some(expected) => Verdict::Diverged { expected, observed },
    }
}

/// Judge an exit-status case.
pub fn judge_exit_status(succeeded: bool) -> Verdict {
    if succeeded {
        Verdict::Passed
    } else {
        Verdict::Failed
    }
}
