//! Spilling per-shard results and concatenating them into the final output file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{JoinError, JoinResult};
use crate::schema::OutputSchema;
use crate::types::Table;

/// A joined shard written to a header-less part file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardOutput {
    pub index: usize,
    pub columns: Vec<String>,
    pub rows: usize,
    pub path: PathBuf,
}

/// Write `table`'s rows (no header) to `path` as comma-separated values.
pub fn write_part(index: usize, table: &Table, path: &Path) -> JoinResult<ShardOutput> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    let mut cells: Vec<String> = Vec::with_capacity(table.columns.len());
    for row in &table.rows {
        cells.clear();
        cells.extend(row.iter().map(|v| v.render()));
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(ShardOutput {
        index,
        columns: table.columns.clone(),
        rows: table.row_count(),
        path: path.to_path_buf(),
    })
}

/// The assembled output, not yet visible at its final path.
#[derive(Debug)]
pub struct AssembledOutput {
    pub columns: Vec<String>,
    pub rows: usize,
    file: NamedTempFile,
}

impl AssembledOutput {
    /// Atomically move the output into place.
    pub fn commit(self, path: &Path) -> JoinResult<()> {
        self.file.persist(path).map_err(|e| JoinError::Io(e.error))?;
        Ok(())
    }
}

/// Concatenate part files in increasing shard index under a single header.
///
/// The header comes from the first part; every other part must have the same columns. The result
/// is staged next to `output_path` and only appears there on [`AssembledOutput::commit`].
pub fn assemble(parts: &[ShardOutput], output_path: &Path) -> JoinResult<AssembledOutput> {
    let mut ordered: Vec<&ShardOutput> = parts.iter().collect();
    ordered.sort_by_key(|p| p.index);
    let first = ordered
        .first()
        .ok_or_else(|| JoinError::config("no shard output to assemble"))?;
    let columns = first.columns.clone();

    let mut file = NamedTempFile::new_in(staging_dir(output_path))?;
    {
        let mut wtr = csv::WriterBuilder::new().from_writer(BufWriter::new(file.as_file_mut()));
        wtr.write_record(&columns)?;
        let mut out = wtr.into_inner().map_err(|e| JoinError::Io(e.into_error()))?;

        for part in &ordered {
            if part.columns != columns {
                return Err(JoinError::schema(format!(
                    "shard {} has columns {:?}, expected {:?}",
                    part.index, part.columns, columns
                )));
            }
            if part.rows == 0 {
                continue;
            }
            let mut src = File::open(&part.path)?;
            io::copy(&mut src, &mut out)?;
        }
        out.flush()?;
    }

    Ok(AssembledOutput {
        columns,
        rows: ordered.iter().map(|p| p.rows).sum(),
        file,
    })
}

/// The output schema descriptor, written but not yet visible at its final path.
#[derive(Debug)]
pub struct StagedSchema {
    file: NamedTempFile,
}

impl StagedSchema {
    /// Atomically move the descriptor into place.
    pub fn commit(self, path: &Path) -> JoinResult<()> {
        self.file.persist(path).map_err(|e| JoinError::Io(e.error))?;
        Ok(())
    }
}

/// Write the output schema descriptor as pretty JSON next to `path`. Nothing appears at `path`
/// until [`StagedSchema::commit`].
pub fn stage_schema(schema: &OutputSchema, path: &Path) -> JoinResult<StagedSchema> {
    let mut file = NamedTempFile::new_in(staging_dir(path))?;
    {
        let mut w = BufWriter::new(file.as_file_mut());
        serde_json::to_writer_pretty(&mut w, schema)?;
        w.flush()?;
    }
    Ok(StagedSchema { file })
}

fn staging_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{assemble, stage_schema, write_part};
    use crate::schema::OutputSchema;
    use crate::types::{StorageType, Table, Value};

    fn table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            vec!["id".into(), "score".into()],
            vec![StorageType::Int64, StorageType::Float64],
            rows,
        )
    }

    #[test]
    fn header_written_once_and_parts_in_shard_order() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_part(
            1,
            &table(vec![vec![Value::Int64(2), Value::Float64(2.0)]]),
            &dir.path().join("p1"),
        )
        .unwrap();
        let p0 = write_part(
            0,
            &table(vec![vec![Value::Int64(1), Value::Null]]),
            &dir.path().join("p0"),
        )
        .unwrap();
        let p2 = write_part(2, &table(vec![]), &dir.path().join("p2")).unwrap();

        let out_path = dir.path().join("out.csv");
        let out = assemble(&[p1, p2, p0], &out_path).unwrap();
        assert_eq!(out.rows, 2);
        assert!(!out_path.exists());
        out.commit(&out_path).unwrap();

        assert_eq!(fs::read_to_string(&out_path).unwrap(), "id,score\n1,\n2,2.0\n");
    }

    #[test]
    fn all_empty_shards_yield_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let parts: Vec<_> = (0..3)
            .map(|i| write_part(i, &table(vec![]), &dir.path().join(format!("p{i}"))).unwrap())
            .collect();
        let out_path = dir.path().join("out.csv");
        assemble(&parts, &out_path).unwrap().commit(&out_path).unwrap();
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "id,score\n");
    }

    #[test]
    fn staged_schema_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let schema = OutputSchema {
            ids: vec!["id".into()],
            id_types: vec!["int64".into()],
            ..Default::default()
        };

        drop(stage_schema(&schema, &path).unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        stage_schema(&schema, &path).unwrap().commit(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"idTypes\""));
    }

    #[test]
    fn dropped_output_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let part = write_part(0, &table(vec![]), &dir.path().join("p0")).unwrap();
        let out_path = dir.path().join("out.csv");
        drop(assemble(&[part], &out_path).unwrap());
        assert!(!out_path.exists());
        // Only the part file remains.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
