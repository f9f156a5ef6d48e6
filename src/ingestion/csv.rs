//! CSV loading for shard files.

use std::path::Path;

use crate::error::{JoinError, JoinResult};
use crate::schema::TableSchema;
use crate::types::{DataType, StorageType, Table, Value};

use super::dialect::Dialect;

/// Resolve a file header against a schema descriptor.
///
/// Rules:
///
/// - every header column must be declared in the schema
/// - every declared column must appear in the header (order can differ)
///
/// Returns the declared type of each header column, in header order.
pub fn resolve_header(headers: &csv::StringRecord, schema: &TableSchema) -> JoinResult<Vec<DataType>> {
    let mut types = Vec::with_capacity(headers.len());
    for h in headers.iter() {
        match schema.lookup(h) {
            Some((t, _)) => types.push(t),
            None => {
                return Err(JoinError::schema(format!(
                    "column '{h}' not found in schema. headers={:?}",
                    headers.iter().collect::<Vec<_>>()
                )));
            }
        }
    }
    if let Some((missing, _, _)) = schema.columns().find(|(n, _, _)| !headers.iter().any(|h| h == *n)) {
        return Err(JoinError::schema(format!(
            "missing required column '{missing}'. headers={:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }
    Ok(types)
}

/// Load a whole delimited file into a typed [`Table`].
///
/// Each value is parsed according to the storage type of its declared column.
pub fn load_table(path: impl AsRef<Path>, dialect: Dialect, schema: &TableSchema) -> JoinResult<Table> {
    let mut rdr = dialect.reader_builder().from_path(path)?;
    load_table_from_reader(&mut rdr, schema)
}

/// Load a typed [`Table`] from an existing CSV reader.
pub fn load_table_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &TableSchema,
) -> JoinResult<Table> {
    let headers = rdr.headers()?.clone();
    let types: Vec<StorageType> = resolve_header(&headers, schema)?
        .iter()
        .map(DataType::storage)
        .collect();
    let columns: Vec<String> = headers.iter().map(str::to_owned).collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(columns.len());
        for (i, (column, storage)) in columns.iter().zip(&types).enumerate() {
            let raw = record.get(i).unwrap_or("");
            row.push(parse_typed_value(user_row, column, *storage, raw)?);
        }
        rows.push(row);
    }

    Ok(Table::new(columns, types, rows))
}

/// Parse one raw cell into a [`Value`].
///
/// String cells keep their raw text; an empty cell is [`Value::Null`]. Numeric and bool cells are
/// trimmed first, and a blank one is [`Value::Null`].
pub fn parse_typed_value(row: usize, column: &str, storage: StorageType, raw: &str) -> JoinResult<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() && storage != StorageType::Utf8 {
        return Ok(Value::Null);
    }

    let parse_err = |message: String| JoinError::ParseError {
        row,
        column: column.to_owned(),
        raw: raw.to_owned(),
        message,
    };

    match storage {
        StorageType::Utf8 => Ok(Value::Utf8(raw.to_owned())),
        StorageType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| parse_err(e.to_string())),
        StorageType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| parse_err(e.to_string())),
        StorageType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(parse_err),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
