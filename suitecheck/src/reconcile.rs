//! Accepting observed failures as the new baseline (`--reset`).
//!
//! The failure file is merged into the baseline in a single atomic rewrite,
//! then deleted. If the rewrite fails nothing changes on disk, so the
//! operation can simply be retried.

use tracing::{info, instrument, warn};

use crate::core::merge::{FailureIndex, MergeRecords, MergeSummary};
use crate::io::store::{BaselineStore, ResourceError};

/// Result of a reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No failure file existed; the baseline was not touched.
    NothingToReconcile,
    /// The failure file was merged into the baseline.
    Merged(MergeSummary),
}

/// Removes the failure file once its records are in the baseline.
type RemoveFailures = fn(&BaselineStore) -> Result<(), ResourceError>;

pub struct Reconciler<'a> {
    store: &'a BaselineStore,
    remove_failures: RemoveFailures,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a BaselineStore) -> Self {
        Self {
            store,
            remove_failures: BaselineStore::delete_failures,
        }
    }

    #[cfg(test)]
    fn with_remove_failures(mut self, remove_failures: RemoveFailures) -> Self {
        self.remove_failures = remove_failures;
        self
    }

    #[instrument(skip_all, fields(baseline = %self.store.paths().result_file.display()))]
    pub fn reconcile(&self) -> Result<Reconciliation, ResourceError> {
        let Some(failures) = self.store.load_failures()? else {
            info!("no failures to reconcile");
            return Ok(Reconciliation::NothingToReconcile);
        };
        let index = FailureIndex::from_records(failures);

        let stream = self.store.stream_baseline()?;
        let mut merge = MergeRecords::new(stream, &index);
        self.store.replace_baseline(&mut merge)?;
        let mut summary = merge.finish();

        for key in &summary.unmatched {
            warn!(key = %key, "failure has no baseline record, dropped");
        }

        match (self.remove_failures)(self.store) {
            Ok(()) => summary.failures_removed = true,
            Err(err) if err.is_not_found() => summary.failures_removed = true,
            Err(err) => warn!(err = %err, "baseline reconciled but failure file was not removed"),
        }

        info!(
            records = summary.records,
            replaced = summary.replaced,
            unmatched = summary.unmatched.len(),
            "baseline reconciled"
        );
        Ok(Reconciliation::Merged(summary))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use super::*;
    use crate::test_support::{read_lines, store_in, write_lines};

    #[test]
    fn replaces_failed_record_and_removes_failure_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        write_lines(
            &store.paths().result_file,
            &["a : PASS", "b : FAIL old", "c : PASS"],
        );
        write_lines(&store.paths().failed_file, &["b : FAIL new"]);

        let outcome = Reconciler::new(&store).reconcile().expect("reconcile");

        assert_eq!(
            read_lines(&store.paths().result_file),
            vec!["a : PASS", "b : FAIL new", "c : PASS"]
        );
        assert!(!store.failures_exist());
        assert_eq!(
            outcome,
            Reconciliation::Merged(MergeSummary {
                records: 3,
                replaced: 1,
                unmatched: Vec::new(),
                failures_removed: true,
            })
        );
    }

    #[test]
    fn absent_failures_leave_baseline_byte_identical() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        // No trailing newline: a rewrite would add one.
        fs::write(&store.paths().result_file, "a : PASS").expect("write baseline");

        let outcome = Reconciler::new(&store).reconcile().expect("reconcile");

        assert_eq!(outcome, Reconciliation::NothingToReconcile);
        assert_eq!(
            fs::read(&store.paths().result_file).expect("read"),
            b"a : PASS"
        );
    }

    #[test]
    fn unmatched_failure_is_dropped_not_appended() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        write_lines(&store.paths().result_file, &["a : PASS"]);
        write_lines(&store.paths().failed_file, &["z : FAIL"]);

        let outcome = Reconciler::new(&store).reconcile().expect("reconcile");

        assert_eq!(read_lines(&store.paths().result_file), vec!["a : PASS"]);
        assert!(!store.failures_exist());
        let Reconciliation::Merged(summary) = outcome else {
            panic!("expected merge, got {outcome:?}");
        };
        assert_eq!(summary.unmatched, vec!["z".to_string()]);
        assert_eq!(summary.replaced, 0);
    }

    #[test]
    fn second_reconcile_is_noop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        write_lines(&store.paths().result_file, &["a : old", "b : PASS"]);
        write_lines(&store.paths().failed_file, &["a : new"]);

        let reconciler = Reconciler::new(&store);
        reconciler.reconcile().expect("first reconcile");
        let after_first = fs::read(&store.paths().result_file).expect("read");
        let second = reconciler.reconcile().expect("second reconcile");

        assert_eq!(second, Reconciliation::NothingToReconcile);
        assert_eq!(
            fs::read(&store.paths().result_file).expect("read"),
            after_first
        );
    }

    #[test]
    fn preserves_order_for_many_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        let baseline: Vec<String> = (0..200).map(|i| format!("t{i:03} : exit 0 : old")).collect();
        let baseline_refs: Vec<&str> = baseline.iter().map(String::as_str).collect();
        write_lines(&store.paths().result_file, &baseline_refs);
        // Failures listed out of baseline order.
        write_lines(
            &store.paths().failed_file,
            &["t150 : exit 1 : new", "t007 : exit 1 : new", "t099 : exit 1 : new"],
        );

        Reconciler::new(&store).reconcile().expect("reconcile");

        let lines = read_lines(&store.paths().result_file);
        assert_eq!(lines.len(), 200);
        for (i, line) in lines.iter().enumerate() {
            let key = format!("t{i:03}");
            assert!(line.starts_with(&key), "line {i} out of order: {line}");
            if matches!(i, 7 | 99 | 150) {
                assert_eq!(line, &format!("{key} : exit 1 : new"));
            } else {
                assert_eq!(line, &baseline[i]);
            }
        }
    }

    #[test]
    fn read_failure_mid_rewrite_keeps_baseline_and_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        // Invalid UTF-8 on the second line makes the stream fail after the
        // first record was already written to the temp file.
        let mut baseline = b"a : old\n".to_vec();
        baseline.extend_from_slice(b"b : \xff\xfe\n");
        baseline.extend_from_slice(b"c : PASS\n");
        fs::write(&store.paths().result_file, &baseline).expect("write baseline");
        write_lines(&store.paths().failed_file, &["a : new"]);
        let failures_before = fs::read(&store.paths().failed_file).expect("read");

        let err = Reconciler::new(&store).reconcile().expect_err("stream error");

        assert!(matches!(err, ResourceError::Read { .. }));
        assert_eq!(
            fs::read(&store.paths().result_file).expect("read"),
            baseline
        );
        assert_eq!(
            fs::read(&store.paths().failed_file).expect("read"),
            failures_before
        );
        let entries = fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(entries, 2, "no temp file may be left behind");
    }

    fn deny_remove(store: &BaselineStore) -> Result<(), ResourceError> {
        Err(ResourceError::Remove {
            path: store.paths().failed_file.clone(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        })
    }

    #[test]
    fn undeletable_failure_file_still_merges() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        write_lines(&store.paths().result_file, &["a : old", "b : PASS"]);
        write_lines(&store.paths().failed_file, &["a : new"]);

        let outcome = Reconciler::new(&store)
            .with_remove_failures(deny_remove)
            .reconcile()
            .expect("merge succeeds");

        assert_eq!(
            outcome,
            Reconciliation::Merged(MergeSummary {
                records: 2,
                replaced: 1,
                unmatched: Vec::new(),
                failures_removed: false,
            })
        );
        assert_eq!(
            read_lines(&store.paths().result_file),
            vec!["a : new", "b : PASS"]
        );
        assert!(store.failures_exist());

        // The leftover failure file is already merged; merging it again
        // changes nothing and finally removes it.
        let after_first = fs::read(&store.paths().result_file).expect("read");
        let second = Reconciler::new(&store).reconcile().expect("second reconcile");
        let Reconciliation::Merged(summary) = second else {
            panic!("expected merge, got {second:?}");
        };
        assert!(summary.failures_removed);
        assert_eq!(
            fs::read(&store.paths().result_file).expect("read"),
            after_first
        );
        assert!(!store.failures_exist());
    }

    #[test]
    fn missing_baseline_fails_closed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        write_lines(&store.paths().failed_file, &["a : FAIL"]);

        let err = Reconciler::new(&store).reconcile().expect_err("no baseline");

        assert!(matches!(err, ResourceError::MissingBaseline(_)));
        assert!(store.failures_exist());
        assert!(!store.paths().result_file.exists());
    }
}
