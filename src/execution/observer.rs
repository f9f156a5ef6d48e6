use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::JoinError;

/// Pipeline stage of a run. Stages are entered in declaration order and never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    KeyValidation,
    TypeCoercion,
    Sharding,
    ShardJoin,
    Assembly,
    SchemaEmit,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::KeyValidation => "key-validation",
            Stage::TypeCoercion => "type-coercion",
            Stage::Sharding => "sharding",
            Stage::ShardJoin => "shard-join",
            Stage::Assembly => "assembly",
            Stage::SchemaEmit => "schema-emit",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Severity classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinSeverity {
    /// Invalid input or configuration.
    Error,
    /// I/O or other infrastructure failure.
    Critical,
}

/// Classify an error for observers.
pub fn severity_for_error(e: &JoinError) -> JoinSeverity {
    match e {
        JoinError::Io(_) => JoinSeverity::Critical,
        JoinError::Csv(err) => match err.kind() {
            csv::ErrorKind::Io(_) => JoinSeverity::Critical,
            _ => JoinSeverity::Error,
        },
        JoinError::Json(err) if err.is_io() => JoinSeverity::Critical,
        JoinError::Json(_) => JoinSeverity::Error,
        JoinError::SizeComputation { .. } => JoinSeverity::Critical,
        JoinError::Config { .. }
        | JoinError::Schema { .. }
        | JoinError::JoinArity { .. }
        | JoinError::ParseError { .. }
        | JoinError::Cancelled => JoinSeverity::Error,
    }
}

/// Events emitted by the engine during a run.
#[derive(Debug, Clone)]
pub enum JoinEvent {
    RunStarted { datasets: usize },
    StageStarted { stage: Stage },
    ShardCountDecided { shard_count: usize, largest_input_bytes: u64 },
    DatasetCoerced { dataset: usize, promoted: Vec<String> },
    DatasetSharded { dataset: usize, rows: Option<u64> },
    ThrottleWaited { duration: Duration },
    ShardStarted { shard: usize },
    ShardFinished { shard: usize, output_rows: usize },
    Assembled { rows: usize, path: PathBuf },
    RunFinished {
        elapsed: Duration,
        metrics: JoinMetricsSnapshot,
    },
    RunFailed {
        stage: Stage,
        severity: JoinSeverity,
        message: String,
    },
}

/// Observer hook for join events.
pub trait JoinObserver: Send + Sync {
    fn on_event(&self, event: &JoinEvent);
}

/// Forwards join events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl JoinObserver for LogObserver {
    fn on_event(&self, event: &JoinEvent) {
        match event {
            JoinEvent::RunStarted { datasets } => log::info!("joining {datasets} inputs"),
            JoinEvent::StageStarted { stage } => log::info!("stage {stage}"),
            JoinEvent::ShardCountDecided {
                shard_count,
                largest_input_bytes,
            } => log::info!("inputs split into {shard_count} shard(s) (largest input {largest_input_bytes} bytes)"),
            JoinEvent::DatasetCoerced { dataset, promoted } => {
                if !promoted.is_empty() {
                    log::info!("input {dataset}: key column(s) {promoted:?} coerced to float64");
                }
            }
            JoinEvent::DatasetSharded { dataset, rows } => match rows {
                Some(rows) => log::debug!("input {dataset}: {rows} row(s) sharded"),
                None => log::debug!("input {dataset}: single shard, file used as-is"),
            },
            JoinEvent::ThrottleWaited { duration } => log::debug!("shard join throttled for {duration:?}"),
            JoinEvent::ShardStarted { shard } => log::debug!("shard {shard} started"),
            JoinEvent::ShardFinished { shard, output_rows } => {
                log::debug!("shard {shard} joined {output_rows} row(s)")
            }
            JoinEvent::Assembled { rows, path } => {
                log::info!("assembled {rows} row(s) into {}", path.display())
            }
            JoinEvent::RunFinished { elapsed, metrics } => {
                log::info!("join finished in {elapsed:?}: {metrics}")
            }
            JoinEvent::RunFailed {
                stage,
                severity,
                message,
            } => log::error!("[{severity:?}] join failed during {stage}: {message}"),
        }
    }
}

/// Real-time counters for a run.
///
/// The engine updates these during execution; callers can snapshot them at any time.
pub struct JoinMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_sharded: AtomicU64,
    rows_joined: AtomicU64,
    shards_started: AtomicU64,
    shards_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_shards: AtomicUsize,
    max_active_shards: AtomicUsize,
}

impl JoinMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_sharded: AtomicU64::new(0),
            rows_joined: AtomicU64::new(0),
            shards_started: AtomicU64::new(0),
            shards_finished: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_shards: AtomicUsize::new(0),
            max_active_shards: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_sharded.store(0, Ordering::SeqCst);
        self.rows_joined.store(0, Ordering::SeqCst);
        self.shards_started.store(0, Ordering::SeqCst);
        self.shards_finished.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_shards.store(0, Ordering::SeqCst);
        self.max_active_shards.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_rows_sharded(&self, rows: u64) {
        let _ = self.rows_sharded.fetch_add(rows, Ordering::SeqCst);
    }

    pub fn on_shard_start(&self) {
        let _ = self.shards_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_shards.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_shards, now);
    }

    pub fn on_shard_end(&self, output_rows: usize) {
        let _ = self.rows_joined.fetch_add(output_rows as u64, Ordering::SeqCst);
        let _ = self.shards_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_shards.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> JoinMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        JoinMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            rows_sharded: self.rows_sharded.load(Ordering::SeqCst),
            rows_joined: self.rows_joined.load(Ordering::SeqCst),
            shards_started: self.shards_started.load(Ordering::SeqCst),
            shards_finished: self.shards_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_shards: self.max_active_shards.load(Ordering::SeqCst),
        }
    }
}

impl Default for JoinMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let _ = dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`JoinMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub rows_sharded: u64,
    pub rows_joined: u64,
    pub shards_started: u64,
    pub shards_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_shards: usize,
}

impl fmt::Display for JoinMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows_sharded={}, rows_joined={}, shards={}/{}, max_active_shards={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.rows_sharded,
            self.rows_joined,
            self.shards_finished,
            self.shards_started,
            self.max_active_shards,
            self.throttle_wait,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{severity_for_error, JoinMetrics, JoinSeverity, Stage};
    use crate::error::JoinError;

    #[test]
    fn io_failures_are_critical() {
        let io = JoinError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(severity_for_error(&io), JoinSeverity::Critical);
        assert_eq!(
            severity_for_error(&JoinError::JoinArity {
                dataset: 1,
                expected: 2,
                actual: 1
            }),
            JoinSeverity::Error
        );
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::KeyValidation < Stage::TypeCoercion);
        assert!(Stage::Assembly < Stage::SchemaEmit);
        assert_eq!(Stage::ShardJoin.to_string(), "shard-join");
    }

    #[test]
    fn metrics_track_max_active_shards() {
        let m = JoinMetrics::new();
        m.begin_run();
        m.on_shard_start();
        m.on_shard_start();
        m.on_shard_end(3);
        m.on_shard_start();
        m.on_shard_end(0);
        m.on_shard_end(4);
        let snap = m.snapshot();
        assert_eq!(snap.max_active_shards, 2);
        assert_eq!(snap.rows_joined, 7);
        assert_eq!(snap.shards_started, 3);
        assert_eq!(snap.shards_finished, 3);
        assert_eq!(snap.run_id, 1);
    }
}
