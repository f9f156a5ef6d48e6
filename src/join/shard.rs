//! Hash partitioning of one dataset into shard files.

use std::path::{Path, PathBuf};

use crate::cancel::Cancellation;
use crate::dataset::Dataset;
use crate::error::JoinResult;
use crate::ingestion::{parse_typed_value, resolve_header, Dialect};
use crate::types::StorageType;

use super::key::{shard_index, KeyAtom};
use super::key_indices;

/// The shard files of one dataset, indexed by shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardSet {
    /// One file per shard index. For a single shard this is the original input file.
    pub files: Vec<PathBuf>,
    /// Dialect of every file in the set (the input's dialect).
    pub dialect: Dialect,
    /// Data rows written, or `None` when the input was passed through untouched.
    pub rows: Option<u64>,
}

impl ShardSet {
    pub fn shard_count(&self) -> usize {
        self.files.len()
    }
}

/// Path of shard `shard` of dataset `dataset` inside `scratch`.
pub fn shard_path(scratch: &Path, dataset: usize, shard: usize) -> PathBuf {
    scratch.join(format!("input{dataset}-shard{shard:05}.csv"))
}

/// Split `ds` into `shard_count` files under `scratch`.
///
/// Every shard file starts with the input's header line, even if it receives no rows. Each row goes
/// to `hash(canonical key) % shard_count`, so rows with equal keys from any dataset land in the same
/// shard index. With `shard_count == 1` the original file is returned as-is.
pub fn shard_dataset(
    dataset_index: usize,
    ds: &Dataset,
    dialect: Dialect,
    shard_count: usize,
    scratch: &Path,
    cancel: &Cancellation,
) -> JoinResult<ShardSet> {
    if shard_count <= 1 {
        return Ok(ShardSet {
            files: vec![ds.path.clone()],
            dialect,
            rows: None,
        });
    }

    let mut rdr = dialect.reader_builder().from_path(&ds.path)?;
    let headers = rdr.headers()?.clone();
    let types = resolve_header(&headers, &ds.schema)?;
    let names: Vec<&str> = headers.iter().collect();
    let key_idx = key_indices(&names, &ds.key)?;
    let key_types: Vec<StorageType> = key_idx.iter().map(|&i| types[i].storage()).collect();

    let files: Vec<PathBuf> = (0..shard_count)
        .map(|s| shard_path(scratch, dataset_index, s))
        .collect();
    let mut writers = Vec::with_capacity(shard_count);
    for path in &files {
        let mut w = dialect.writer_builder().from_path(path)?;
        w.write_record(&headers)?;
        writers.push(w);
    }

    let mut rows = 0u64;
    let mut record = csv::StringRecord::new();
    let mut key: Vec<KeyAtom> = Vec::with_capacity(key_idx.len());
    while rdr.read_record(&mut record)? {
        cancel.check()?;
        rows += 1;
        // +1 for the header, +1 for 1-based numbering.
        let user_row = rows as usize + 1;

        key.clear();
        for (&i, storage) in key_idx.iter().zip(&key_types) {
            let raw = record.get(i).unwrap_or("");
            let value = parse_typed_value(user_row, &headers[i], *storage, raw)?;
            key.push(KeyAtom::from_value(&value));
        }
        writers[shard_index(&key, shard_count)].write_record(&record)?;
    }

    for w in &mut writers {
        w.flush()?;
    }

    Ok(ShardSet {
        files,
        dialect,
        rows: Some(rows),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::shard_dataset;
    use crate::cancel::Cancellation;
    use crate::dataset::Dataset;
    use crate::error::JoinError;
    use crate::ingestion::Dialect;
    use crate::join::key::{shard_index, KeyAtom};
    use crate::schema::TableSchema;
    use crate::types::DataType;

    fn dataset(dir: &std::path::Path, name: &str, body: &str, id_type: DataType) -> Dataset {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        let schema = TableSchema {
            ids: vec!["id".into()],
            features: vec!["v".into()],
            id_types: vec![id_type],
            feature_types: vec![DataType::Str],
            ..Default::default()
        };
        Dataset::new(path, schema, vec!["id".into()])
    }

    #[test]
    fn single_shard_passes_input_through() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let ds = dataset(dir.path(), "a.csv", "id,v\n1,x\n", DataType::Int);
        let set = shard_dataset(0, &ds, Dialect::default(), 1, scratch.path(), &Cancellation::new()).unwrap();
        assert_eq!(set.files, vec![ds.path.clone()]);
        assert_eq!(set.rows, None);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn every_shard_gets_header_and_rows_follow_the_hash() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let body: String = std::iter::once("id,v\n".to_string())
            .chain((0..50).map(|i| format!("{i},row{i}\n")))
            .collect();
        let ds = dataset(dir.path(), "a.csv", &body, DataType::Int);

        let set = shard_dataset(0, &ds, Dialect::default(), 8, scratch.path(), &Cancellation::new()).unwrap();
        assert_eq!(set.shard_count(), 8);
        assert_eq!(set.rows, Some(50));

        let mut total = 0;
        for (s, file) in set.files.iter().enumerate() {
            let text = fs::read_to_string(file).unwrap();
            let mut lines = text.lines();
            assert_eq!(lines.next(), Some("id,v"));
            for line in lines {
                let id: i64 = line.split(',').next().unwrap().parse().unwrap();
                assert_eq!(shard_index(&[KeyAtom::Int(id)], 8), s);
                total += 1;
            }
        }
        assert_eq!(total, 50);
    }

    #[test]
    fn float_and_int_typed_keys_agree_on_shard() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let a = dataset(dir.path(), "a.csv", "id,v\n7,a\n", DataType::Int);
        let b = dataset(dir.path(), "b.csv", "id,v\n7.0,b\n", DataType::Float);

        let sa = shard_dataset(0, &a, Dialect::default(), 4, scratch.path(), &Cancellation::new()).unwrap();
        let sb = shard_dataset(1, &b, Dialect::default(), 4, scratch.path(), &Cancellation::new()).unwrap();
        let nonempty = |files: &[std::path::PathBuf]| {
            files
                .iter()
                .position(|f| fs::read_to_string(f).unwrap().lines().count() > 1)
                .unwrap()
        };
        assert_eq!(nonempty(&sa.files), nonempty(&sb.files));
    }

    #[test]
    fn unparseable_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let ds = dataset(dir.path(), "a.csv", "id,v\n1,a\nnope,b\n", DataType::Int);
        let err = shard_dataset(0, &ds, Dialect::default(), 2, scratch.path(), &Cancellation::new()).unwrap_err();
        match err {
            JoinError::ParseError { row, column, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "id");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let ds = dataset(dir.path(), "a.csv", "id,v\n1,a\n", DataType::Int);
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = shard_dataset(0, &ds, Dialect::default(), 2, scratch.path(), &cancel).unwrap_err();
        assert!(matches!(err, JoinError::Cancelled));
    }
}
