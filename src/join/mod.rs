//! The stages of a partitioned join.
//!
//! Each stage is usable on its own; [`crate::execution::PartitionedJoinEngine`] wires them together
//! and runs them in parallel.
//!
//! - [`coerce()`]: promote numeric-only `str` key columns to `float64`
//! - [`shard_dataset()`]: hash-partition one dataset into shard files
//! - [`join_shard()`]: k-way inner equi-join of one shard index
//! - [`assemble()`]: concatenate per-shard results under one header
//!
//! ## Example: join two in-memory tables
//!
//! ```rust
//! use partitioned_join::join::join_tables;
//! use partitioned_join::types::{StorageType, Table, Value};
//!
//! let left = Table::new(
//!     vec!["ID".into(), "AGE".into()],
//!     vec![StorageType::Float64, StorageType::Int64],
//!     vec![
//!         vec![Value::Float64(1.0), Value::Int64(30)],
//!         vec![Value::Float64(2.0), Value::Int64(40)],
//!     ],
//! );
//! let right = Table::new(
//!     vec!["id".into()],
//!     vec![StorageType::Int64],
//!     vec![vec![Value::Int64(2)]],
//! );
//!
//! let keys = vec![vec!["ID".to_string()], vec!["id".to_string()]];
//! let joined = join_tables(vec![left, right], &keys).unwrap();
//! assert_eq!(joined.columns, vec!["ID", "AGE", "id"]);
//! assert_eq!(joined.row_count(), 1);
//! ```

pub mod assemble;
pub mod coerce;
pub mod key;
pub mod shard;
pub mod worker;

pub use assemble::{assemble, stage_schema, write_part, AssembledOutput, ShardOutput, StagedSchema};
pub use coerce::{coerce, CoercionReport};
pub use key::{canonical_key, key_hash, shard_index, KeyAtom, KeyTuple};
pub use shard::{shard_dataset, ShardSet};
pub use worker::{join_shard, join_tables, ShardInput};

use crate::error::{JoinError, JoinResult};

/// Positions of the `key` columns within `columns`.
pub(crate) fn key_indices<S: AsRef<str>>(columns: &[S], key: &[String]) -> JoinResult<Vec<usize>> {
    key.iter()
        .map(|k| {
            columns.iter().position(|c| c.as_ref() == k).ok_or_else(|| {
                JoinError::schema(format!(
                    "join key column '{k}' not found. columns={:?}",
                    columns.iter().map(|c| c.as_ref()).collect::<Vec<&str>>()
                ))
            })
        })
        .collect()
}
