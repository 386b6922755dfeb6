//! Line-oriented result records (`key : payload`).
//!
//! A record is one line of a baseline or failure file. The key is everything
//! before the first separator; the payload is the rest of the line and may
//! contain the separator itself.

use std::fmt;

/// Literal token between a record's key and its payload.
pub const SEPARATOR: &str = " : ";

/// One recorded test outcome.
///
/// The original line text is kept verbatim so a record can be re-emitted
/// exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    line: String,
}

impl Record {
    /// Build a record from a key and payload.
    pub fn new(key: &str, payload: &str) -> Self {
        Self {
            line: format!("{key}{SEPARATOR}{payload}"),
        }
    }

    /// Parse one line. Never fails: a line without a separator is a record
    /// whose key is the whole line and whose payload is empty.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        Self {
            line: line.to_string(),
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn key(&self) -> &str {
        self.split().0
    }

    pub fn payload(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        let line = self.line.trim_start();
        match line.split_once(SEPARATOR) {
            Some((key, payload)) => (key.trim_end(), payload.trim_end()),
            None => (line.trim_end(), ""),
        }
    }

    /// True for lines with no visible content.
    pub fn is_blank(&self) -> bool {
        self.line.trim().is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}
