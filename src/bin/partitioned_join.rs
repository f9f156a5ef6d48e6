//! Run a partitioned join described by a JSON task file.
//!
//! ## Usage
//!
//! ```bash
//! partitioned-join task.json
//!
//! # Smaller shards, bounded parallelism, scratch on a fast disk
//! partitioned-join task.json --shard-size-limit 67108864 --threads 4 --work-dir /mnt/scratch
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use log::info;

use partitioned_join::config::load_task_config;
use partitioned_join::execution::{JoinOptions, LogObserver, PartitionedJoinEngine};
use partitioned_join::JoinResult;

#[derive(Parser)]
#[command(name = "partitioned-join")]
#[command(about = "Hash-partitioned multi-way equi-join of delimited-text files")]
#[command(version)]
struct Cli {
    /// Task configuration (JSON)
    config: PathBuf,

    /// Target shard size in bytes (default: 200 MiB)
    #[arg(long)]
    shard_size_limit: Option<u64>,

    /// Use exactly this many shards
    #[arg(long)]
    shards: Option<usize>,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Maximum shards joined at the same time (default: thread count)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Directory for scratch files (default: system temp dir)
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> JoinOptions {
        let mut opts = JoinOptions::default();
        if let Some(limit) = self.shard_size_limit {
            opts.shard_size_limit_bytes = limit;
        }
        if let Some(threads) = self.threads {
            opts.num_threads = Some(threads);
            opts.max_in_flight_shards = threads;
        }
        if let Some(n) = self.max_in_flight {
            opts.max_in_flight_shards = n;
        }
        opts.shard_count = self.shards;
        opts.work_dir = self.work_dir.clone();
        opts
    }
}

fn run(cli: &Cli) -> JoinResult<()> {
    let request = load_task_config(&cli.config)?.into_request()?;
    let engine = PartitionedJoinEngine::new(cli.options())?.with_observer(Arc::new(LogObserver));
    let report = engine.run(request)?;
    info!(
        "wrote {} row(s) from {} shard(s); schema: {} id(s), {} feature(s), {} label(s)",
        report.output_rows,
        report.shard_count,
        report.output_schema.ids.len(),
        report.output_schema.features.len(),
        report.output_schema.labels.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
