//! AMQP publisher with one connection per publish call.
//!
//! Each call runs connect → channel → confirm select → exchange declare →
//! publish (awaiting the confirm) → close. Every round trip is bounded by the
//! broker timeout. The connection is closed explicitly after every attempt;
//! if the caller drops the future instead, dropping the `Connection` closes it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info, warn};

use super::{PublishError, Publisher, EXCHANGE};
use crate::config::BrokerConfig;

/// AMQP `delivery-mode` value asking the broker to persist the message.
const PERSISTENT: u8 = 2;

/// AMQP reply code for a normal connection close.
const REPLY_SUCCESS: u16 = 200;

/// Publisher that owns no connection between calls.
///
/// Holds only immutable settings, so concurrent calls never share state.
pub struct AmqpPublisher {
    uri: String,
    endpoint: String,
    timeout: Duration,
}

impl std::fmt::Debug for AmqpPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpPublisher")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AmqpPublisher {
    /// Build a publisher from broker settings.
    ///
    /// No connection is opened here.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings do not form a valid AMQP URI.
    pub fn new(config: &BrokerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            uri: config.amqp_uri()?,
            endpoint: format!("{}:{}", config.host, config.port),
            timeout: config.timeout(),
        })
    }

    async fn connect(&self) -> Result<Connection, PublishError> {
        let connecting = Connection::connect(&self.uri, ConnectionProperties::default());
        match tokio::time::timeout(self.timeout, connecting).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(PublishError::Connect(e.to_string())),
            Err(_) => Err(PublishError::Connect(format!(
                "timed out after {:?} connecting to {}",
                self.timeout, self.endpoint
            ))),
        }
    }

    /// Steps 2 and 3: channel, exchange, publish, confirm.
    async fn send(
        &self,
        conn: &Connection,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), PublishError> {
        let channel = round_trip(self.timeout, "open channel", conn.create_channel()).await?;
        round_trip(
            self.timeout,
            "enable publisher confirms",
            channel.confirm_select(ConfirmSelectOptions::default()),
        )
        .await?;
        round_trip(
            self.timeout,
            "declare exchange",
            channel.exchange_declare(
                EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            ),
        )
        .await?;

        let confirmation = round_trip(self.timeout, "publish", async {
            channel
                .basic_publish(
                    EXCHANGE,
                    routing_key,
                    BasicPublishOptions::default(),
                    payload.as_bytes(),
                    BasicProperties::default().with_delivery_mode(PERSISTENT),
                )
                .await?
                .await
        })
        .await?;

        if confirmation.is_nack() {
            return Err(PublishError::Publish(
                "broker rejected the message (nack)".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), PublishError> {
        let conn = self.connect().await?;
        debug!(endpoint = %self.endpoint, "broker connection opened");

        let sent = self.send(&conn, routing_key, payload).await;
        let closed = close(conn, self.timeout).await;

        match (sent, closed) {
            (Ok(()), Ok(())) => {
                info!(exchange = EXCHANGE, routing_key, "message published");
                Ok(())
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "broker connection close failed after publish error");
                Err(e)
            }
        }
    }
}

/// Run one broker round trip under `limit`, classifying failures as publish errors.
async fn round_trip<T, F>(limit: Duration, step: &'static str, fut: F) -> Result<T, PublishError>
where
    F: Future<Output = lapin::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PublishError::Publish(format!("{step}: {e}"))),
        Err(_) => Err(PublishError::Publish(format!(
            "{step}: timed out after {limit:?}"
        ))),
    }
}

/// Step 4: close the connection under `limit`.
async fn close(conn: Connection, limit: Duration) -> Result<(), PublishError> {
    round_trip(limit, "close connection", conn.close(REPLY_SUCCESS, "OK")).await?;
    debug!("broker connection closed");
    Ok(())
}
