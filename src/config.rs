use std::time::Duration;

use anyhow::ensure;

pub const ENGINE_HOST: &str = "localhost";
pub const ENGINE_PORT: u16 = 8080;
pub const BATCH_SIZE: usize = 100;
pub const TICK_PERIOD: Duration = Duration::from_micros(50);
pub const WORKER_POOL_SIZE: usize = 10;

/// Parameters for one simulator run.
///
/// - `host`/`port`: the engine endpoint every tick connects to.
/// - `batch_size`: orders written per connection.
/// - `period`: nominal time between two ticks (fixed rate, first tick immediate).
/// - `workers`: how many ticks may be in flight at once.
/// - `max_ticks`: stop after this many firings; `None` runs until cancelled.
/// - `seed`: seed for the shared order generator; `None` seeds from the OS.
/// - `connect_timeout`: bound on connection setup; `None` leaves it to the OS.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub host: String,
    pub port: u16,
    pub batch_size: usize,
    pub period: Duration,
    pub workers: usize,
    pub max_ticks: Option<u64>,
    pub seed: Option<u64>,
    pub connect_timeout: Option<Duration>,
}

impl SimConfig {
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.host.is_empty(), "host must not be empty");
        ensure!(self.batch_size > 0, "batch size must be > 0");
        ensure!(!self.period.is_zero(), "tick period must be > 0");
        ensure!(self.workers > 0, "worker pool must have at least one worker");
        if let Some(timeout) = self.connect_timeout {
            ensure!(!timeout.is_zero(), "connect timeout must be > 0");
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            host: ENGINE_HOST.to_string(),
            port: ENGINE_PORT,
            batch_size: BATCH_SIZE,
            period: TICK_PERIOD,
            workers: WORKER_POOL_SIZE,
            max_ticks: None,
            seed: None,
            connect_timeout: None,
        }
    }
}
