use anyhow::Result;
use clap::Parser;
use primeharvest::types::{
    DEFAULT_LOOPS, DEFAULT_OUT_DIR, DEFAULT_PRIMES_PER_BATCH, DEFAULT_PRIME_MAX,
    DEFAULT_PRIME_MIN, DEFAULT_THREADS,
};
use primeharvest::{HarvestConfigBuilder, HarvestEngine, Harvester};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// primeharvest: find and output prime numbers to binary files
#[derive(Parser, Debug)]
#[command(name = "primeharvest", about)]
struct Cli {
    /// Output directory (must already exist)
    #[arg(short = 'o', long, default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// Prime range begin
    #[arg(short = 'b', long, default_value_t = DEFAULT_PRIME_MIN)]
    begin: u64,

    /// Prime range end
    #[arg(short = 'e', long, default_value_t = DEFAULT_PRIME_MAX)]
    end: u64,

    /// Thread count
    #[arg(short = 't', long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Loops per thread (one batch file per loop)
    #[arg(short = 'l', long, default_value_t = DEFAULT_LOOPS)]
    loops: usize,

    /// Primes per batch
    #[arg(short = 'p', long, default_value_t = DEFAULT_PRIMES_PER_BATCH)]
    primes: usize,

    /// Fixed master seed for reproducible runs
    #[arg(short = 's', long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // 帮助信息和用法错误一律以状态码 1 退出。
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let config = HarvestConfigBuilder::default()
        .out_dir(cli.out_dir)
        .prime_min(cli.begin)
        .prime_max(cli.end)
        .threads(cli.threads)
        .loops(cli.loops)
        .primes_per_batch(cli.primes)
        .seed(cli.seed)
        .build_validated()?;

    let summary = Harvester::new(config).harvest()?;
    if summary.fallbacks() > 0 {
        tracing::warn!(
            fallbacks = summary.fallbacks(),
            "some start points came from the fallback draw"
        );
    }
    Ok(())
}
