//! Per-shard k-way inner equi-join.

use std::collections::HashMap;
use std::path::Path;

use crate::cancel::Cancellation;
use crate::error::{JoinError, JoinResult};
use crate::ingestion::{load_table, Dialect};
use crate::schema::TableSchema;
use crate::types::Table;

use super::key::{canonical_key, is_joinable, KeyTuple};
use super::key_indices;

/// One dataset's contribution to a shard join.
#[derive(Debug, Clone, Copy)]
pub struct ShardInput<'a> {
    pub path: &'a Path,
    pub dialect: Dialect,
    pub schema: &'a TableSchema,
    pub key: &'a [String],
}

/// Join one shard: load dataset 0's shard, then merge each following dataset's shard into it.
///
/// Only the running result and the shard currently being merged are held in memory.
pub fn join_shard(inputs: &[ShardInput<'_>], cancel: &Cancellation) -> JoinResult<Table> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| JoinError::config("shard join needs at least one input"))?;
    check_arity(inputs.iter().map(|i| i.key.len()))?;

    let mut left = load_table(first.path, first.dialect, first.schema)?;
    let left_key = table_key_indices(&left, first.key)?;
    for input in rest {
        cancel.check()?;
        let right = load_table(input.path, input.dialect, input.schema)?;
        let right_key = table_key_indices(&right, input.key)?;
        left = merge(left, &left_key, &right, &right_key);
    }
    Ok(left)
}

/// Inner-join in-memory tables in order: `t0 ⋈ t1 ⋈ … ⋈ tk`, where table `i` joins on `keys[i]`
/// against `keys[0]`'s columns of the running result.
pub fn join_tables(tables: Vec<Table>, keys: &[Vec<String>]) -> JoinResult<Table> {
    if tables.len() != keys.len() {
        return Err(JoinError::config(format!(
            "{} table(s) but {} join key(s)",
            tables.len(),
            keys.len()
        )));
    }
    check_arity(keys.iter().map(Vec::len))?;

    let mut tables = tables.into_iter();
    let mut left = tables
        .next()
        .ok_or_else(|| JoinError::config("join needs at least one table"))?;
    let left_key = table_key_indices(&left, &keys[0])?;
    for (right, key) in tables.zip(&keys[1..]) {
        let right_key = table_key_indices(&right, key)?;
        left = merge(left, &left_key, &right, &right_key);
    }
    Ok(left)
}

fn check_arity(mut arities: impl Iterator<Item = usize>) -> JoinResult<()> {
    let Some(expected) = arities.next() else {
        return Ok(());
    };
    for (i, actual) in arities.enumerate() {
        if actual != expected {
            return Err(JoinError::JoinArity {
                dataset: i + 1,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

fn table_key_indices(table: &Table, key: &[String]) -> JoinResult<Vec<usize>> {
    key_indices(&table.columns, key)
}

/// Inner hash join. Output keeps left row order; for each left row, right matches follow right row
/// order. Output columns are the left columns followed by the right columns, except that a right
/// key column named like the left key column it is compared with is not repeated.
fn merge(left: Table, left_key: &[usize], right: &Table, right_key: &[usize]) -> Table {
    let kept: Vec<usize> = (0..right.columns.len())
        .filter(|j| {
            !right_key
                .iter()
                .zip(left_key)
                .any(|(r, l)| r == j && right.columns[*r] == left.columns[*l])
        })
        .collect();

    let mut index: HashMap<KeyTuple, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        let key = canonical_key(row, right_key);
        if is_joinable(&key) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut rows = Vec::new();
    for row in left.rows {
        let key = canonical_key(&row, left_key);
        let Some(matches) = index.get(&key) else {
            continue;
        };
        for &m in matches {
            let mut out = Vec::with_capacity(row.len() + kept.len());
            out.extend(row.iter().cloned());
            out.extend(kept.iter().map(|&j| right.rows[m][j].clone()));
            rows.push(out);
        }
    }

    let mut columns = left.columns;
    columns.extend(kept.iter().map(|&j| right.columns[j].clone()));
    let mut types = left.types;
    types.extend(kept.iter().map(|&j| right.types[j]));
    Table::new(columns, types, rows)
}

#[cfg(test)]
mod tests {
    use super::join_tables;
    use crate::error::JoinError;
    use crate::types::{StorageType, Table, Value};

    fn table(columns: &[&str], types: Vec<StorageType>, rows: Vec<Vec<Value>>) -> Table {
        Table::new(columns.iter().map(|c| c.to_string()).collect(), types, rows)
    }

    fn keys(k: &[&[&str]]) -> Vec<Vec<String>> {
        k.iter().map(|l| l.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[test]
    fn inner_join_keeps_left_order_and_concatenates_columns() {
        let a = table(
            &["id", "x"],
            vec![StorageType::Int64, StorageType::Utf8],
            vec![
                vec![Value::Int64(3), Value::Utf8("c".into())],
                vec![Value::Int64(1), Value::Utf8("a".into())],
                vec![Value::Int64(2), Value::Utf8("b".into())],
            ],
        );
        let b = table(
            &["ID", "y"],
            vec![StorageType::Float64, StorageType::Int64],
            vec![
                vec![Value::Float64(1.0), Value::Int64(10)],
                vec![Value::Float64(3.0), Value::Int64(30)],
                vec![Value::Float64(3.0), Value::Int64(31)],
                vec![Value::Float64(9.0), Value::Int64(90)],
            ],
        );

        let out = join_tables(vec![a, b], &keys(&[&["id"], &["ID"]])).unwrap();
        assert_eq!(out.columns, vec!["id", "x", "ID", "y"]);
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Int64(3), Value::Utf8("c".into()), Value::Float64(3.0), Value::Int64(30)],
                vec![Value::Int64(3), Value::Utf8("c".into()), Value::Float64(3.0), Value::Int64(31)],
                vec![Value::Int64(1), Value::Utf8("a".into()), Value::Float64(1.0), Value::Int64(10)],
            ]
        );
    }

    #[test]
    fn three_way_join_matches_every_dataset() {
        let mk = |name: &str, ids: &[i64]| {
            table(
                &[name],
                vec![StorageType::Int64],
                ids.iter().map(|i| vec![Value::Int64(*i)]).collect(),
            )
        };
        let out = join_tables(
            vec![mk("a", &[1, 2, 3]), mk("b", &[2, 3, 4]), mk("c", &[3, 2, 5])],
            &keys(&[&["a"], &["b"], &["c"]]),
        )
        .unwrap();
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Int64(2), Value::Int64(2), Value::Int64(2)],
                vec![Value::Int64(3), Value::Int64(3), Value::Int64(3)],
            ]
        );
    }

    #[test]
    fn null_keys_never_match() {
        let a = table(&["k"], vec![StorageType::Utf8], vec![vec![Value::Null]]);
        let b = table(&["k2"], vec![StorageType::Utf8], vec![vec![Value::Null]]);
        let out = join_tables(vec![a, b], &keys(&[&["k"], &["k2"]])).unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.columns, vec!["k", "k2"]);
    }

    #[test]
    fn shared_key_column_name_appears_once() {
        let a = table(
            &["id", "x"],
            vec![StorageType::Int64, StorageType::Utf8],
            vec![vec![Value::Int64(1), Value::Utf8("a".into())]],
        );
        let b = table(
            &["y", "id"],
            vec![StorageType::Utf8, StorageType::Int64],
            vec![vec![Value::Utf8("b".into()), Value::Int64(1)]],
        );
        let out = join_tables(vec![a, b], &keys(&[&["id"], &["id"]])).unwrap();
        assert_eq!(out.columns, vec!["id", "x", "y"]);
        assert_eq!(
            out.rows,
            vec![vec![Value::Int64(1), Value::Utf8("a".into()), Value::Utf8("b".into())]]
        );
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let a = table(&["k", "j"], vec![StorageType::Utf8; 2], vec![]);
        let b = table(&["k"], vec![StorageType::Utf8], vec![]);
        let err = join_tables(vec![a, b], &keys(&[&["k", "j"], &["k"]])).unwrap_err();
        assert!(matches!(
            err,
            JoinError::JoinArity {
                dataset: 1,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn unknown_key_column_is_a_schema_error() {
        let a = table(&["k"], vec![StorageType::Utf8], vec![]);
        let b = table(&["k"], vec![StorageType::Utf8], vec![]);
        let err = join_tables(vec![a, b], &keys(&[&["k"], &["missing"]])).unwrap_err();
        assert!(matches!(err, JoinError::Schema { .. }));
    }
}
