use std::time::Duration;

use clap::Parser;
use tracing::Level;

use crate::{
    config::{BATCH_SIZE, ENGINE_HOST, ENGINE_PORT, SimConfig, TICK_PERIOD, WORKER_POOL_SIZE},
    simulate::run_simulation,
    utils::{plain_subscriber, shutdown_token},
};

/// Synthetic order flow generator for the matching engine
#[derive(Parser, Debug)]
#[command(name = "Order Simulator")]
#[command(
    version = "0.1",
    about = "Streams batches of random orders to a matching engine over TCP"
)]
pub struct Cli {
    /// Engine host
    #[arg(long, default_value = ENGINE_HOST)]
    pub host: String,

    /// Engine port
    #[arg(long, default_value_t = ENGINE_PORT)]
    pub port: u16,

    /// Orders written per connection
    #[arg(long, default_value_t = BATCH_SIZE)]
    pub batch_size: usize,

    /// Time between ticks, in microseconds
    #[arg(long, default_value_t = TICK_PERIOD.as_micros() as u64)]
    pub period_us: u64,

    /// Ticks allowed in flight at once
    #[arg(long, default_value_t = WORKER_POOL_SIZE)]
    pub workers: usize,

    /// Stop after this many ticks (runs until Ctrl-C when omitted)
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Seed for the order generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Give up on a connection attempt after this many milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// trace, debug, info, warn or error
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl From<Cli> for SimConfig {
    fn from(cli: Cli) -> Self {
        SimConfig {
            host: cli.host,
            port: cli.port,
            batch_size: cli.batch_size,
            period: Duration::from_micros(cli.period_us),
            workers: cli.workers,
            max_ticks: cli.max_ticks,
            seed: cli.seed,
            connect_timeout: cli.connect_timeout_ms.map(Duration::from_millis),
        }
    }
}

pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing::subscriber::set_global_default(plain_subscriber(cli.log_level, std::io::stdout))?;

    let cfg = SimConfig::from(cli);
    let summary = run_simulation(cfg, shutdown_token()).await?;
    if summary.ticks > 0 && summary.completed == 0 {
        tracing::warn!("no batch reached the engine");
    }
    Ok(())
}
