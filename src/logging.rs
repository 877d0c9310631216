//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Console output is always on. When [`LoggingConfig::dir`] is set, a JSON
//! file layer with daily rotation is added.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Holds the non-blocking writer guard for file logging.
///
/// Must be kept alive for the duration of the process. Dropping it flushes
/// pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Initialise logging for the service.
///
/// The filter comes from `RUST_LOG` and falls back to `config.level`.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (json_layer, guard) = match config.dir.as_deref() {
        Some(dir) => {
            let (layer, guard) = json_file_layer(dir)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(LoggingGuard { _guard: guard })
}

type JsonFileLayer<S> = tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::JsonFields,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Json>,
    tracing_appender::non_blocking::NonBlocking,
>;

/// Build the JSON layer writing to `{dir}/receiver.log.YYYY-MM-DD`.
fn json_file_layer<S>(dir: &Path) -> anyhow::Result<(JsonFileLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(dir).map_err(|e| {
        anyhow::anyhow!("failed to create logs directory {}: {e}", dir.display())
    })?;

    let file_appender = tracing_appender::rolling::daily(dir, "receiver.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);
    Ok((layer, guard))
}
