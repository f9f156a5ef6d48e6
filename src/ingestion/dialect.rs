//! Delimiter detection for delimited-text inputs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::JoinResult;

const CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// How a delimited-text file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl Dialect {
    /// Build a CSV reader for this dialect. Files always carry a header row.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut b = csv::ReaderBuilder::new();
        b.has_headers(true).delimiter(self.delimiter);
        b
    }

    /// Build a CSV writer for this dialect.
    pub fn writer_builder(&self) -> csv::WriterBuilder {
        let mut b = csv::WriterBuilder::new();
        b.delimiter(self.delimiter);
        b
    }
}

/// Detect the delimiter of `path` from its first two lines.
///
/// Falls back to `,` (with a warning) when no candidate delimiter appears consistently.
pub fn sniff_dialect(path: impl AsRef<Path>) -> JoinResult<Dialect> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = String::new();
    let mut first = String::new();
    reader.read_line(&mut header)?;
    reader.read_line(&mut first)?;

    match sniff_lines(&header, &first) {
        Some(delimiter) => Ok(Dialect { delimiter }),
        None => {
            log::warn!(
                "cannot determine delimiter of {}, using ','",
                path.display()
            );
            Ok(Dialect::default())
        }
    }
}

/// Pick the first candidate present in the header and, when a data line exists, present the same
/// number of times in it.
fn sniff_lines(header: &str, first: &str) -> Option<u8> {
    let count = |line: &str, d: u8| line.bytes().filter(|b| *b == d).count();
    let has_data = !first.trim().is_empty();
    CANDIDATES.into_iter().find(|&d| {
        let n = count(header, d);
        n > 0 && (!has_data || count(first, d) == n)
    })
}
