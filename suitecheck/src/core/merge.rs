//! Pure merge logic for accepting failure records into a baseline.
//!
//! No I/O: the store supplies the record streams, this module decides which
//! line each baseline position emits.

use std::collections::{BTreeSet, HashMap};

use crate::core::record::Record;

/// Failure records indexed by key.
///
/// Duplicate keys resolve last-write-wins. Blank lines carry no test and are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureIndex {
    by_key: HashMap<String, Record>,
    /// Keys in order of first appearance, for deterministic reporting.
    order: Vec<String>,
}

impl FailureIndex {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut index = Self::default();
        for record in records {
            if record.is_blank() {
                continue;
            }
            let key = record.key().to_string();
            if index.by_key.insert(key.clone(), record).is_none() {
                index.order.push(key);
            }
        }
        index
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Counts gathered while merging a baseline stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Baseline records emitted (equal to the baseline's record count).
    pub records: usize,
    /// Baseline records replaced by a failure record.
    pub replaced: usize,
    /// Failure keys with no baseline record, in failure-file order.
    pub unmatched: Vec<String>,
    /// Whether the failure file was removed after the merge.
    pub failures_removed: bool,
}

/// Iterator adapter that swaps baseline records for failure records 1:1.
///
/// Errors from the inner stream pass through untouched so the writer can
/// abort. Call [`MergeRecords::finish`] once the stream is drained.
pub struct MergeRecords<'a, I> {
    inner: I,
    index: &'a FailureIndex,
    matched: BTreeSet<&'a str>,
    records: usize,
    replaced: usize,
}

impl<'a, I> MergeRecords<'a, I> {
    pub fn new(inner: I, index: &'a FailureIndex) -> Self {
        Self {
            inner,
            index,
            matched: BTreeSet::new(),
            records: 0,
            replaced: 0,
        }
    }

    pub fn finish(self) -> MergeSummary {
        let unmatched = self
            .index
            .keys()
            .filter(|key| !self.matched.contains(key))
            .map(str::to_string)
            .collect();
        MergeSummary {
            records: self.records,
            replaced: self.replaced,
            unmatched,
            failures_removed: false,
        }
    }
}

impl<'a, I, E> Iterator for MergeRecords<'a, I>
where
    I: Iterator<Item = Result<Record, E>>,
{
    type Item = Result<Record, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err)),
        };
        self.records += 1;
        let index: &'a FailureIndex = self.index;
        match index.by_key.get_key_value(record.key()) {
            Some((key, failure)) => {
                self.matched.insert(key.as_str());
                self.replaced += 1;
                Some(Ok(failure.clone()))
            }
            None => Some(Ok(record)),
        }
    }
}
