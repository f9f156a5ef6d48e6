//! Promotion of string-typed key columns that only ever hold numbers.

use crate::cancel::Cancellation;
use crate::dataset::Dataset;
use crate::error::JoinResult;
use crate::ingestion::{resolve_header, Dialect};
use crate::types::DataType;

use super::key_indices;

/// What coercion did to one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionReport {
    /// Key columns whose type was promoted from `str` to `float64`.
    pub promoted: Vec<String>,
    /// Data rows read before the scan finished (it stops once no candidate remains).
    pub rows_scanned: u64,
}

/// Scan `dataset`'s file once and promote every `str` key column whose non-empty values all parse
/// as floats to [`DataType::Float64`].
///
/// The header is validated against the declared schema on the way. A column that does not coerce
/// is left untouched; that is not an error.
pub fn coerce(dataset: &mut Dataset, dialect: Dialect, cancel: &Cancellation) -> JoinResult<CoercionReport> {
    let mut rdr = dialect.reader_builder().from_path(&dataset.path)?;
    let headers = rdr.headers()?.clone();
    let types = resolve_header(&headers, &dataset.schema)?;
    let names: Vec<&str> = headers.iter().collect();
    let idx = key_indices(&names, &dataset.key)?;

    // (header index, column name) of every key column still eligible for promotion.
    let mut candidates: Vec<(usize, String)> = idx
        .iter()
        .zip(&dataset.key)
        .filter(|(i, _)| types[**i] == DataType::Str)
        .map(|(i, name)| (*i, name.clone()))
        .collect();
    candidates.dedup();

    let mut rows_scanned = 0u64;
    let mut record = csv::StringRecord::new();
    while !candidates.is_empty() && rdr.read_record(&mut record)? {
        cancel.check()?;
        rows_scanned += 1;
        candidates.retain(|(i, _)| {
            let raw = record.get(*i).unwrap_or("").trim();
            raw.is_empty() || raw.parse::<f64>().is_ok()
        });
    }

    let promoted: Vec<String> = candidates.into_iter().map(|(_, name)| name).collect();
    for name in &promoted {
        dataset.schema.set_type(name, DataType::Float64);
    }
    Ok(CoercionReport {
        promoted,
        rows_scanned,
    })
}
