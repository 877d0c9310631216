//! Broker notification for newly persisted messages.
//!
//! The [`Publisher`] trait abstracts over the broker. The production
//! implementation [`AmqpPublisher`] opens one AMQP connection per call and
//! publishes a persistent message to the direct exchange [`EXCHANGE`].

pub mod amqp;

use async_trait::async_trait;

pub use self::amqp::AmqpPublisher;

/// Name of the direct exchange every notification goes to.
pub const EXCHANGE: &str = "messages";

/// Core publish interface.
///
/// Implementations must be `Send + Sync`; one instance serves every request.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` under `routing_key`.
    ///
    /// Returns only after the broker has accepted the message.
    ///
    /// # Errors
    ///
    /// [`PublishError::Connect`] when the broker cannot be reached or refuses
    /// the credentials; [`PublishError::Publish`] for any later failure.
    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), PublishError>;
}

/// Errors from a publish attempt, each carrying the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Could not connect or authenticate to the broker.
    #[error("broker connect error: {0}")]
    Connect(String),

    /// Connected, but channel, exchange, publish, or close failed.
    #[error("broker publish error: {0}")]
    Publish(String),
}
