//! `partitioned-join` joins 2 to 10 large delimited-text files on a declared key, without ever
//! holding more than one shard of each input in memory.
//!
//! Every input is hash-partitioned on its canonicalized join key into the same number of shard
//! files, so rows with equal keys from different inputs always land in the same shard index. Each
//! shard index is then joined independently (and in parallel), and the per-shard results are
//! concatenated in shard order into one output file plus a merged schema descriptor.
//!
//! The primary entrypoint is [`execution::PartitionedJoinEngine::run`], which takes a
//! [`dataset::JoinRequest`]. Requests are usually built from a JSON task file via [`config`].
//!
//! ## Pipeline
//!
//! 1. key validation: every join key has the arity of dataset 0's key
//! 2. type coercion: numeric-only `str` key columns become `float64`
//! 3. sharding: one pass per input, rows routed by `xxh3(key) % shard_count`
//! 4. shard join: inner equi-join per shard index, bounded in-flight
//! 5. assembly: header once, then shard results in increasing shard index
//! 6. schema emit: merged descriptor reconciled against the output columns
//!
//! ## Quick example: run a join from a task file
//!
//! ```no_run
//! use partitioned_join::config::load_task_config;
//! use partitioned_join::execution::{JoinOptions, PartitionedJoinEngine};
//!
//! # fn main() -> Result<(), partitioned_join::JoinError> {
//! let request = load_task_config("task.json")?.into_request()?;
//! let engine = PartitionedJoinEngine::new(JoinOptions::default())?;
//! let report = engine.run(request)?;
//! println!("rows={} shards={}", report.output_rows, report.shard_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Building a request in code
//!
//! ```no_run
//! use partitioned_join::dataset::{Dataset, JoinRequest, OutputSpec};
//! use partitioned_join::execution::{JoinOptions, PartitionedJoinEngine};
//! use partitioned_join::schema::TableSchema;
//! use partitioned_join::types::DataType;
//!
//! # fn main() -> Result<(), partitioned_join::JoinError> {
//! let alice = TableSchema {
//!     ids: vec!["id".into()],
//!     features: vec!["age".into()],
//!     id_types: vec![DataType::Int],
//!     feature_types: vec![DataType::Float],
//!     ..Default::default()
//! };
//! let bob = TableSchema {
//!     ids: vec!["uid".into()],
//!     labels: vec!["y".into()],
//!     id_types: vec![DataType::Str],
//!     label_types: vec![DataType::Bool],
//!     ..Default::default()
//! };
//! let request = JoinRequest {
//!     datasets: vec![
//!         Dataset::new("alice.csv", alice, vec!["id".into()]),
//!         Dataset::new("bob.csv", bob, vec!["uid".into()]),
//!     ],
//!     output: OutputSpec {
//!         data_path: "joined.csv".into(),
//!         schema_path: "joined_schema.json".into(),
//!     },
//! };
//!
//! let opts = JoinOptions {
//!     shard_size_limit_bytes: 64 * 1024 * 1024,
//!     max_in_flight_shards: 2,
//!     ..Default::default()
//! };
//! PartitionedJoinEngine::new(opts)?.run(request)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`execution`]: the engine, options, observer hooks and metrics
//! - [`join`]: the individual stages (coerce, shard, join, assemble)
//! - [`schema`]: schema descriptors and their merge
//! - [`ingestion`]: CSV dialect sniffing and typed loading
//! - [`config`]: JSON task configuration
//! - [`error`]: error types used across the crate

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod join;
pub mod schema;
pub mod types;

pub use error::{JoinError, JoinResult};
