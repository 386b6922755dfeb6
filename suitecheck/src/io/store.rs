//! Baseline and failure files on disk.
//!
//! The baseline (`result_file`) is long-lived and only rewritten through
//! [`BaselineStore::replace_baseline`], which swaps in a fully written temp
//! file. The failure file (`failed_file`) is transient: it exists only while
//! there are unaccepted failures.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::record::Record;

/// Errors from reading, writing, or removing result files.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("replace {}: {source}", .path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("baseline {} does not exist", .0.display())]
    MissingBaseline(PathBuf),
}

impl ResourceError {
    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            ResourceError::Read { source, .. }
            | ResourceError::Write { source, .. }
            | ResourceError::Replace { source, .. }
            | ResourceError::Remove { source, .. } => source.kind() == io::ErrorKind::NotFound,
            ResourceError::MissingBaseline(_) => true,
        }
    }
}

/// Locations of the result files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub result_file: PathBuf,
    pub failed_file: PathBuf,
}

/// Access to one baseline and its failure file.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    paths: StorePaths,
}

/// Lazy line-by-line reader over the baseline.
pub struct BaselineStream {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl Iterator for BaselineStream {
    type Item = Result<Record, ResourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        Some(
            line.map(|line| Record::parse(&line))
                .map_err(|source| ResourceError::Read {
                    path: self.path.clone(),
                    source,
                }),
        )
    }
}

impl BaselineStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn failures_exist(&self) -> bool {
        self.paths.failed_file.is_file()
    }

    /// Read the failure file, or `None` if it does not exist.
    #[instrument(skip_all, fields(path = %self.paths.failed_file.display()))]
    pub fn load_failures(&self) -> Result<Option<Vec<Record>>, ResourceError> {
        let path = &self.paths.failed_file;
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no failure file");
                return Ok(None);
            }
            Err(source) => {
                return Err(ResourceError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };
        let records: Vec<Record> = contents.lines().map(Record::parse).collect();
        debug!(records = records.len(), "failure file loaded");
        Ok(Some(records))
    }

    /// Open the baseline for streaming.
    pub fn stream_baseline(&self) -> Result<BaselineStream, ResourceError> {
        let path = &self.paths.result_file;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ResourceError::MissingBaseline(path.clone()));
            }
            Err(source) => {
                return Err(ResourceError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };
        Ok(BaselineStream {
            path: path.clone(),
            lines: BufReader::new(file).lines(),
        })
    }

    /// First baseline record with `key`, or `None` (also when no baseline exists yet).
    pub fn find_baseline(&self, key: &str) -> Result<Option<Record>, ResourceError> {
        let stream = match self.stream_baseline() {
            Ok(stream) => stream,
            Err(ResourceError::MissingBaseline(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        for record in stream {
            let record = record?;
            if record.key() == key {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Atomically replace the baseline with `records` (temp file + rename).
    ///
    /// The first error from `records` or from writing aborts the replacement;
    /// the baseline is left exactly as it was.
    #[instrument(skip_all, fields(path = %self.paths.result_file.display()))]
    pub fn replace_baseline<I>(&self, records: I) -> Result<usize, ResourceError>
    where
        I: IntoIterator<Item = Result<Record, ResourceError>>,
    {
        let path = &self.paths.result_file;
        let parent = parent_dir(path);
        let write_err = |source| ResourceError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(parent).map_err(write_err)?;
        let tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        let mut writer = BufWriter::new(tmp);
        let mut written = 0usize;
        for record in records {
            let record = record?;
            writeln!(writer, "{}", record.line()).map_err(write_err)?;
            written += 1;
        }
        let tmp = writer
            .into_inner()
            .map_err(|err| write_err(err.into_error()))?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|err| ResourceError::Replace {
            path: path.clone(),
            source: err.error,
        })?;
        debug!(written, "baseline replaced");
        Ok(written)
    }

    /// Add records after the existing baseline, creating it if needed.
    ///
    /// An existing baseline is rewritten through [`Self::replace_baseline`],
    /// so its records stay intact even if its last line has no terminator.
    pub fn append_baseline(&self, records: &[Record]) -> Result<(), ResourceError> {
        if records.is_empty() {
            return Ok(());
        }
        let existing = match self.stream_baseline() {
            Ok(stream) => stream,
            Err(ResourceError::MissingBaseline(_)) => {
                return append_lines(&self.paths.result_file, records);
            }
            Err(err) => return Err(err),
        };
        self.replace_baseline(existing.chain(records.iter().cloned().map(Ok)))?;
        Ok(())
    }

    pub fn append_failure(&self, record: &Record) -> Result<(), ResourceError> {
        append_lines(&self.paths.failed_file, std::slice::from_ref(record))
    }

    /// Remove the failure file.
    pub fn delete_failures(&self) -> Result<(), ResourceError> {
        let path = &self.paths.failed_file;
        fs::remove_file(path).map_err(|source| ResourceError::Remove {
            path: path.clone(),
            source,
        })
    }

    /// Remove a stale failure file if one exists.
    pub fn clear_failures(&self) -> Result<(), ResourceError> {
        match self.delete_failures() {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn append_lines(path: &Path, records: &[Record]) -> Result<(), ResourceError> {
    let write_err = |source| ResourceError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(parent_dir(path)).map_err(write_err)?;
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    let unterminated = ends_without_newline(&mut file).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    if unterminated {
        writer.write_all(b"\n").map_err(write_err)?;
    }
    for record in records {
        writeln!(writer, "{}", record.line()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;
    Ok(())
}

/// True when the file is non-empty and its last byte is not `\n`.
fn ends_without_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
