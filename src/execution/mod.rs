//! Execution engine that runs a partitioned join end to end with configurable parallelism.
//!
//! This module sits "above" [`crate::join`] and provides:
//!
//! - the stage pipeline (`KeyValidation → TypeCoercion → Sharding → ShardJoin → Assembly →
//!   SchemaEmit`)
//! - a bounded worker pool plus an in-flight throttle for shard joins
//! - cancellation of sibling tasks on the first failure, and scratch-file cleanup on every path
//! - real-time metrics + observer hooks for monitoring

mod observer;
mod semaphore;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use tempfile::TempDir;

use crate::cancel::{first_error, Cancellation};
use crate::dataset::{Dataset, JoinRequest};
use crate::error::{JoinError, JoinResult};
use crate::ingestion::{sniff_dialect, Dialect};
use crate::join::{
    assemble, coerce, join_shard, shard_dataset, stage_schema, write_part, CoercionReport, ShardInput,
    ShardOutput, ShardSet,
};
use crate::schema::{OutputSchema, SchemaRegistry};

pub use observer::{
    severity_for_error, JoinEvent, JoinMetrics, JoinMetricsSnapshot, JoinObserver, JoinSeverity, LogObserver,
    Stage,
};

use semaphore::Semaphore;

/// Default upper bound on the byte size of one shard of the largest input.
pub const DEFAULT_SHARD_SIZE_LIMIT_BYTES: u64 = 200 * 1024 * 1024;

/// Configuration for the [`PartitionedJoinEngine`].
#[derive(Debug, Clone)]
pub struct JoinOptions {
    /// Target shard size. The shard count is `ceil(largest input bytes / shard_size_limit_bytes)`.
    pub shard_size_limit_bytes: u64,
    /// Use exactly this many shards instead of deriving the count from input sizes.
    pub shard_count: Option<usize>,
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on shards joined (and held in memory) at the same time.
    pub max_in_flight_shards: usize,
    /// Directory that receives the run's scratch directory. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
}

impl Default for JoinOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            shard_size_limit_bytes: DEFAULT_SHARD_SIZE_LIMIT_BYTES,
            shard_count: None,
            num_threads: Some(n),
            max_in_flight_shards: n.max(1),
            work_dir: None,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinReport {
    pub shard_count: usize,
    pub output_rows: usize,
    pub output_schema: OutputSchema,
    /// Coercion outcome per dataset, in dataset order.
    pub coercions: Vec<CoercionReport>,
    pub metrics: JoinMetricsSnapshot,
}

/// Shard count for inputs of the given sizes.
///
/// Fails with [`JoinError::SizeComputation`] if any input is empty or its size cannot be read.
pub fn compute_shard_count<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
    shard_size_limit_bytes: u64,
) -> JoinResult<(usize, u64)> {
    let mut largest = 0u64;
    for path in paths {
        let len = fs::metadata(path)
            .map_err(|e| JoinError::SizeComputation {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .len();
        if len == 0 {
            return Err(JoinError::SizeComputation {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            });
        }
        largest = largest.max(len);
    }
    let limit = shard_size_limit_bytes.max(1);
    let count = largest.div_ceil(limit).max(1);
    Ok((usize::try_from(count).unwrap_or(usize::MAX), largest))
}

/// Runs [`JoinRequest`]s on a dedicated thread pool.
pub struct PartitionedJoinEngine {
    pool: ThreadPool,
    opts: JoinOptions,
    observer: Option<Arc<dyn JoinObserver>>,
    metrics: Arc<JoinMetrics>,
}

impl PartitionedJoinEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails with [`JoinError::Config`] if `shard_size_limit_bytes == 0`, `max_in_flight_shards == 0`,
    /// `num_threads == Some(0)` or `shard_count == Some(0)`.
    pub fn new(opts: JoinOptions) -> JoinResult<Self> {
        if opts.shard_size_limit_bytes == 0 {
            return Err(JoinError::config("shard_size_limit_bytes must be > 0"));
        }
        if opts.max_in_flight_shards == 0 {
            return Err(JoinError::config("max_in_flight_shards must be > 0"));
        }
        if opts.num_threads == Some(0) {
            return Err(JoinError::config("num_threads must be > 0 when set"));
        }
        if opts.shard_count == Some(0) {
            return Err(JoinError::config("shard_count must be > 0 when set"));
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| JoinError::config(format!("failed to build thread pool: {e}")))?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(JoinMetrics::new()),
        })
    }

    /// Attach an observer for join events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn JoinObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time metrics.
    pub fn metrics(&self) -> Arc<JoinMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run a join to completion.
    ///
    /// On success the output file and schema descriptor are in place. On any error neither is
    /// replaced, and every scratch file of the run has been removed.
    pub fn run(&self, request: JoinRequest) -> JoinResult<JoinReport> {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(JoinEvent::RunStarted {
            datasets: request.datasets.len(),
        });

        let mut stage = Stage::Init;
        let result = self.pool.install(|| self.run_stages(request, &mut stage));
        self.metrics.end_run(start.elapsed());

        match result {
            Ok(mut report) => {
                report.metrics = self.metrics.snapshot();
                self.emit(JoinEvent::RunFinished {
                    elapsed: start.elapsed(),
                    metrics: report.metrics.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                self.emit(JoinEvent::RunFailed {
                    stage,
                    severity: severity_for_error(&e),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_stages(&self, mut request: JoinRequest, stage: &mut Stage) -> JoinResult<JoinReport> {
        self.enter(stage, Stage::KeyValidation);
        request.validate()?;

        self.enter(stage, Stage::TypeCoercion);
        let (derived, largest) = compute_shard_count(
            request.datasets.iter().map(|d| d.path.as_path()),
            self.opts.shard_size_limit_bytes,
        )?;
        let shard_count = self.opts.shard_count.unwrap_or(derived);
        self.emit(JoinEvent::ShardCountDecided {
            shard_count,
            largest_input_bytes: largest,
        });

        let cancel = Cancellation::new();
        let coercions = first_error(
            request
                .datasets
                .par_iter_mut()
                .map(|ds| cancel.observe(prepare_dataset(ds, &cancel)))
                .collect(),
        )?;
        for (i, report) in coercions.iter().enumerate() {
            self.emit(JoinEvent::DatasetCoerced {
                dataset: i,
                promoted: report.promoted.clone(),
            });
        }
        let merged = SchemaRegistry::merge(request.datasets.iter().map(|d| &d.schema))?;

        self.enter(stage, Stage::Sharding);
        let scratch = self.scratch_dir()?;
        let datasets = &request.datasets;
        let shard_sets: Vec<ShardSet> = first_error(
            datasets
                .par_iter()
                .enumerate()
                .map(|(i, ds)| {
                    let dialect = ds.dialect.unwrap_or_default();
                    let set = cancel.observe(shard_dataset(i, ds, dialect, shard_count, scratch.path(), &cancel))?;
                    if let Some(rows) = set.rows {
                        self.metrics.on_rows_sharded(rows);
                    }
                    self.emit(JoinEvent::DatasetSharded {
                        dataset: i,
                        rows: set.rows,
                    });
                    Ok(set)
                })
                .collect(),
        )?;

        self.enter(stage, Stage::ShardJoin);
        let sem = Semaphore::new(self.opts.max_in_flight_shards);
        let parts: Vec<ShardOutput> = first_error(
            (0..shard_count)
                .into_par_iter()
                .map(|s| cancel.observe(self.join_one(s, datasets, &shard_sets, scratch.path(), &sem, &cancel)))
                .collect(),
        )?;

        self.enter(stage, Stage::Assembly);
        let assembled = assemble(&parts, &request.output.data_path)?;
        self.emit(JoinEvent::Assembled {
            rows: assembled.rows,
            path: request.output.data_path.clone(),
        });

        self.enter(stage, Stage::SchemaEmit);
        let output_schema = merged.reconcile(&assembled.columns)?;
        let output_rows = assembled.rows;
        let staged_schema = stage_schema(&output_schema, &request.output.schema_path)?;
        assembled.commit(&request.output.data_path)?;
        staged_schema.commit(&request.output.schema_path)?;

        self.enter(stage, Stage::Done);
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!("failed to remove scratch dir {}: {e}", scratch_path.display());
        }

        Ok(JoinReport {
            shard_count,
            output_rows,
            output_schema,
            coercions,
            metrics: self.metrics.snapshot(),
        })
    }

    fn join_one(
        &self,
        shard: usize,
        datasets: &[Dataset],
        shard_sets: &[ShardSet],
        scratch: &Path,
        sem: &Semaphore,
        cancel: &Cancellation,
    ) -> JoinResult<ShardOutput> {
        cancel.check()?;
        let (_permit, waited) = sem.acquire();
        if waited > Duration::ZERO {
            self.metrics.on_throttle_wait(waited);
            self.emit(JoinEvent::ThrottleWaited { duration: waited });
        }
        cancel.check()?;

        self.metrics.on_shard_start();
        self.emit(JoinEvent::ShardStarted { shard });

        let inputs: Vec<ShardInput<'_>> = datasets
            .iter()
            .zip(shard_sets)
            .map(|(ds, set)| ShardInput {
                path: &set.files[shard],
                dialect: set.dialect,
                schema: &ds.schema,
                key: &ds.key,
            })
            .collect();
        let joined = join_shard(&inputs, cancel);
        release_shard_files(shard, shard_sets);

        let part = joined.and_then(|table| write_part(shard, &table, &part_path(scratch, shard)));
        let rows = part.as_ref().map(|p| p.rows).unwrap_or(0);
        self.metrics.on_shard_end(rows);
        let part = part?;
        self.emit(JoinEvent::ShardFinished {
            shard,
            output_rows: rows,
        });
        Ok(part)
    }

    fn scratch_dir(&self) -> JoinResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("partitioned-join-");
        let dir = match &self.opts.work_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn enter(&self, current: &mut Stage, next: Stage) {
        debug_assert!(next > *current, "stage {next} entered after {current}");
        *current = next;
        self.emit(JoinEvent::StageStarted { stage: next });
    }

    fn emit(&self, event: JoinEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

/// Sniff the dialect (unless forced) and coerce key column types.
fn prepare_dataset(ds: &mut Dataset, cancel: &Cancellation) -> JoinResult<CoercionReport> {
    let dialect: Dialect = match ds.dialect {
        Some(d) => d,
        None => sniff_dialect(&ds.path)?,
    };
    ds.dialect = Some(dialect);
    coerce(ds, dialect, cancel)
}

/// Delete this shard index's scratch files once joined. Pass-through inputs are never touched.
fn release_shard_files(shard: usize, shard_sets: &[ShardSet]) {
    for set in shard_sets.iter().filter(|s| s.rows.is_some()) {
        let path = &set.files[shard];
        if let Err(e) = fs::remove_file(path) {
            log::warn!("failed to remove shard file {}: {e}", path.display());
        }
    }
}

fn part_path(scratch: &Path, shard: usize) -> PathBuf {
    scratch.join(format!("part{shard:05}.csv"))
}
