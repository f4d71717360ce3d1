use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use cacheload::{
    ConfigError, FaultConfig, InMemoryCache, JsonReporter, LoadTestEngine, Reporter, RunConfig,
    RunReport, TextReporter, TrafficPattern, ValueSizeRange,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cacheload")]
#[command(about = "Drive sustained read/write traffic against a key-value cache")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    cache: CacheArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load test for a fixed duration and print the report
    Run(RunArgs),
    /// Overwrite a single key repeatedly with random values
    Set(SetArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Batched,
    SingleKey,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON run configuration; flags below are ignored when given
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How long to drive traffic, in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    #[arg(long, value_enum, default_value_t = Pattern::Batched)]
    pattern: Pattern,

    /// Concurrent workers (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    #[arg(long, default_value_t = 100)]
    min_value_size: usize,

    #[arg(long, default_value_t = 1000)]
    max_value_size: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    key: String,

    #[arg(short, long, default_value_t = 1)]
    iterations: usize,

    #[arg(long, default_value_t = 100)]
    min_value_size: usize,

    #[arg(long, default_value_t = 1000)]
    max_value_size: usize,
}

/// Faults injected into the in-process cache
#[derive(Args, Debug)]
struct CacheArgs {
    /// Probability that a read misses
    #[arg(long, global = true, default_value_t = 0.0)]
    miss_rate: f64,

    /// Probability that a read fails
    #[arg(long, global = true, default_value_t = 0.0)]
    error_rate: f64,

    /// Simulated round trip per call, in microseconds
    #[arg(long, global = true, default_value_t = 0)]
    latency_us: u64,

    /// Accept writes without storing them
    #[arg(long, global = true)]
    drop_writes: bool,
}

impl TryFrom<&CacheArgs> for FaultConfig {
    type Error = ConfigError;

    fn try_from(args: &CacheArgs) -> Result<Self, Self::Error> {
        let faults = FaultConfig::builder()
            .miss_rate(args.miss_rate)
            .error_rate(args.error_rate)
            .latency(Duration::from_micros(args.latency_us))
            .drop_writes(args.drop_writes)
            .build();
        faults.validate()?;
        Ok(faults)
    }
}

impl RunArgs {
    fn to_config(&self) -> anyhow::Result<RunConfig> {
        if let Some(path) = &self.config {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()));
        }

        let pattern = match self.pattern {
            Pattern::Batched => TrafficPattern::Batched {
                batch_size: self.batch_size,
                max_retries: self.max_retries,
            },
            Pattern::SingleKey => TrafficPattern::SingleKey,
        };
        Ok(RunConfig::builder()
            .value_size(ValueSizeRange::new(self.min_value_size, self.max_value_size)?)
            .workers(self.workers.unwrap_or_else(num_cpus::get))
            .pattern(pattern)
            .build())
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let faults = FaultConfig::try_from(&cli.cache).context("invalid fault injection flags")?;
    let cache = Arc::new(InMemoryCache::with_faults(faults));
    let engine = LoadTestEngine::new(cache);

    match cli.command {
        Command::Run(args) => {
            let config = args.to_config()?;
            let outcome = engine
                .run_for(&config, Duration::from_secs(args.duration))
                .await?;
            let report = RunReport::collect(&config, engine.execution(), engine.latency(), &outcome);
            if args.json {
                JsonReporter { pretty: true }.report(&report).await?;
            } else {
                TextReporter.report(&report).await?;
            }
        }
        Command::Set(args) => {
            let range = ValueSizeRange::new(args.min_value_size, args.max_value_size)?;
            let records = tokio::task::spawn_blocking(move || {
                engine.run_set(&args.key, range, args.iterations)
            })
            .await??;
            for record in records {
                println!(
                    "key={}, encodedKey={}, iteration={}, value_len={}, stored={}",
                    record.key, record.encoded_key, record.iteration, record.value_len, record.stored
                );
            }
        }
    }
    Ok(())
}
