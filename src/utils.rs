//utils for graceful shutdown and timestamps that can be used on
//any module in the project
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    //spawn once to listen for ctrl-c
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, stopping scheduler");
                tc.cancel();
            }
            // without a handler the run simply continues until process exit
            Err(err) => tracing::warn!("failed to install ctrl+C handler: {}", err),
        }
    });
    token
}

/// Wall-clock milliseconds since the unix epoch, 0 if the clock is before it.
pub fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Bare message lines (`Sent at …`, `Error establishing connection: …`) with
/// no timestamp, level or target prefix.
pub fn plain_subscriber<W>(level: Level, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false)
        .finish()
}
