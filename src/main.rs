//! Receiver service entry point.

use anyhow::{Context, Result};
use tracing::info;

use receiver::config::ReceiverConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    let config = ReceiverConfig::load().context("failed to load configuration")?;
    let _logging_guard =
        receiver::logging::init(&config.logging).context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "receiver starting");
    receiver::app::run(config).await
}
