//! Application wiring: context, route table, and server lifecycle.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ReceiverConfig;
use crate::handlers;
use crate::publisher::{AmqpPublisher, Publisher};
use crate::store::{self, MessageStore};

/// Collaborators shared by every request.
///
/// Built once at startup and handed to the router; there is no global state.
#[derive(Clone)]
pub struct AppContext {
    /// Message persistence.
    pub store: Arc<dyn MessageStore>,
    /// Broker notification.
    pub publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}

impl AppContext {
    /// Bundle a store and a publisher.
    pub fn new(store: Arc<dyn MessageStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self { store, publisher }
    }
}

/// Build the route table.
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/message/:id", get(handlers::get_message))
        .route(
            "/messages",
            get(handlers::list_all_messages).post(handlers::create_message),
        )
        .route("/messages/", get(handlers::list_all_messages))
        .route("/messages/:count", get(handlers::list_messages))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// Connect collaborators and serve until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the broker settings are
/// invalid, or the listener cannot bind.
pub async fn run(config: ReceiverConfig) -> Result<()> {
    let store = store::connect(&config.database)
        .await
        .context("failed to open message store")?;
    let publisher =
        AmqpPublisher::new(&config.broker).context("failed to configure broker publisher")?;
    info!(?publisher, "broker publisher configured");

    let context = Arc::new(AppContext::new(store, Arc::new(publisher)));

    let addr = config.app.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    serve(listener, context, shutdown_signal()).await
}

/// Serve the router on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve(
    listener: TcpListener,
    context: Arc<AppContext>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let local = listener.local_addr().context("listener has no address")?;
    info!(addr = %local, "receiver listening");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    info!("receiver stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("received shutdown signal, initiating graceful shutdown");
}
