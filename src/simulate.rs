//! Load generator that streams random orders at the matching engine.
//!
//! Every scheduler tick runs [`BatchSender::run_tick`]:
//! 1. Opens a fresh TCP connection to the engine (never reused).
//! 2. Writes `batch_size` random orders, one `<side>,<qty>,<price>\r\n` line each,
//!    logging `Sent at <epoch-millis>` after every line.
//! 3. Closes the connection, whether the batch finished or not.
//!
//! Any connect or write error ends the tick with a single
//! `Error establishing connection: <message>` line. Nothing is retried and the
//! engine is never told a batch came up short.
//!
//! # Usage
//! Supply a `CancellationToken` (e.g. tied to Ctrl-C) for clean shutdown.

use std::{io, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::SimConfig,
    errors::SimulatorError,
    orders::OrderGenerator,
    scheduler::{RunSummary, Scheduler, TickOutcome},
    utils::epoch_millis,
};

/// Write `batch_size` generated orders to `writer`, one line per write.
///
/// Returns the number of lines written. On failure the error records how many
/// lines made it out before the failing write.
pub async fn send_batch<W>(
    writer: &mut W,
    generator: &OrderGenerator,
    batch_size: usize,
) -> Result<usize, SimulatorError>
where
    W: AsyncWrite + Unpin,
{
    for sent in 0..batch_size {
        let line = generator.next_order().encode();
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SimulatorError::attempt(sent, e))?;
        info!("Sent at {}", epoch_millis());
    }
    writer
        .flush()
        .await
        .map_err(|e| SimulatorError::attempt(batch_size, e))?;
    Ok(batch_size)
}

/// Send one batch over `conn` and close it.
///
/// `conn` is owned here so it is dropped, and the socket released, on every
/// path out of this function.
async fn stream_batch<W>(
    mut conn: W,
    generator: &OrderGenerator,
    batch_size: usize,
) -> Result<usize, SimulatorError>
where
    W: AsyncWrite + Unpin,
{
    let sent = send_batch(&mut conn, generator, batch_size).await?;
    if let Err(err) = conn.shutdown().await {
        debug!("shutdown after full batch failed: {}", err);
    }
    Ok(sent)
}

/// Everything a tick needs. Cheap to clone; the generator is shared.
#[derive(Clone)]
pub struct BatchSender {
    target: String,
    batch_size: usize,
    connect_timeout: Option<Duration>,
    generator: Arc<OrderGenerator>,
}

impl BatchSender {
    pub fn new(
        target: impl Into<String>,
        batch_size: usize,
        connect_timeout: Option<Duration>,
        generator: Arc<OrderGenerator>,
    ) -> Self {
        Self {
            target: target.into(),
            batch_size,
            connect_timeout,
            generator,
        }
    }

    pub fn from_config(cfg: &SimConfig, generator: Arc<OrderGenerator>) -> Self {
        Self::new(cfg.target(), cfg.batch_size, cfg.connect_timeout, generator)
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let connecting = TcpStream::connect(self.target.as_str());
        match self.connect_timeout {
            Some(limit) => time::timeout(limit, connecting).await.map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out after {:?}", self.target, limit),
                )
            })?,
            None => connecting.await,
        }
    }

    /// Connect and send one batch, surfacing the first failure.
    pub async fn deliver(&self) -> Result<usize, SimulatorError> {
        let stream = self
            .connect()
            .await
            .map_err(|e| SimulatorError::attempt(0, e))?;
        debug!("connected to {}", self.target);
        stream_batch(stream, &self.generator, self.batch_size).await
    }

    /// One scheduled firing. Never fails: errors are logged and folded into
    /// the returned outcome.
    pub async fn run_tick(&self) -> TickOutcome {
        match self.deliver().await {
            Ok(sent) => TickOutcome::Completed { sent },
            Err(err) => {
                warn!("Error establishing connection: {}", err);
                TickOutcome::Failed { sent: err.sent() }
            }
        }
    }
}

/// Run the load generator until `cancel_token` fires or `cfg.max_ticks` is reached.
///
/// # Errors
/// Returns an error only if `cfg` is invalid; per-tick failures are logged and
/// counted in the returned [`RunSummary`].
pub async fn run_simulation(
    cfg: SimConfig,
    cancel_token: CancellationToken,
) -> anyhow::Result<RunSummary> {
    cfg.validate()?;
    let generator = Arc::new(match cfg.seed {
        Some(seed) => OrderGenerator::seeded(seed),
        None => OrderGenerator::from_entropy(),
    });
    let sender = BatchSender::from_config(&cfg, generator);
    info!(
        "sending batches of {} orders to {} every {:?}",
        cfg.batch_size,
        cfg.target(),
        cfg.period
    );

    let scheduler =
        Scheduler::new(cfg.period, cfg.workers, cancel_token).with_max_ticks(cfg.max_ticks);
    let summary = scheduler
        .run(|_| {
            let sender = sender.clone();
            async move { sender.run_tick().await }
        })
        .await;

    info!("--- done --- {}", summary);
    Ok(summary)
}
