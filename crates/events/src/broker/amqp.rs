//! RabbitMQ transport backed by `lapin`.
//!
//! [`AmqpBroker`] holds one connection and one channel. `lapin::Channel` is
//! `Clone + Send + Sync`, so a single channel is shared by all concurrent
//! publishers.
//!
//! The channel runs in publisher-confirm mode: a publish returns only after
//! the broker acks it, and a nack surfaces as [`BrokerError::Rejected`].
//! A channel closed by the broker (for example after a failed declaration)
//! is not reopened; later operations fail until the process restarts.

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use super::{Broker, BrokerError};
use crate::config::BrokerConfig;
use crate::topology::{BindingSpec, ExchangeKind, ExchangeSpec, QueueArgument, QueueSpec};

/// Content type set on every published message.
const CONTENT_TYPE_JSON: &str = "application/json";

/// AMQP delivery mode 2 = persistent.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Reply code used when closing the channel and connection.
const REPLY_SUCCESS: u16 = 200;

/// A connected RabbitMQ broker.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Open a connection and a channel using the given configuration.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let connection = Connection::connect(&config.uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        tracing::info!(uri = %config.redacted_uri(), "Connected to AMQP broker");
        Ok(Self {
            connection,
            channel,
        })
    }

    /// Close the channel and then the connection.
    pub async fn close(&self) -> Result<(), BrokerError> {
        self.channel.close(REPLY_SUCCESS, "shutdown").await?;
        self.connection.close(REPLY_SUCCESS, "shutdown").await?;
        tracing::info!("AMQP connection closed");
        Ok(())
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        let kind = match spec.kind {
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        };
        let options = ExchangeDeclareOptions {
            durable: spec.durable,
            ..ExchangeDeclareOptions::default()
        };

        self.channel
            .exchange_declare(&spec.name, kind, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let options = QueueDeclareOptions {
            durable: spec.durable,
            ..QueueDeclareOptions::default()
        };

        self.channel
            .queue_declare(&spec.name, options, queue_arguments(spec))
            .await?;
        Ok(())
    }

    async fn bind_queue(&self, spec: &BindingSpec) -> Result<(), BrokerError> {
        self.channel
            .queue_bind(
                &spec.queue,
                &spec.exchange,
                &spec.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(CONTENT_TYPE_JSON))
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_message_id(ShortString::from(uuid::Uuid::new_v4().to_string()))
            .with_timestamp(chrono::Utc::now().timestamp().max(0) as u64);

        let confirmation = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;
        check_confirmation(confirmation, exchange, routing_key)
    }
}

/// Map a publisher confirm onto a publish result.
fn check_confirmation(
    confirmation: Confirmation,
    exchange: &str,
    routing_key: &str,
) -> Result<(), BrokerError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(BrokerError::Rejected(format!(
            "broker nacked message to '{exchange}' with key '{routing_key}'"
        ))),
        Confirmation::NotRequested => {
            tracing::warn!(exchange, routing_key, "Publish not confirmed; confirm mode is off");
            Ok(())
        }
    }
}

/// Translate a queue spec's arguments into an AMQP field table.
fn queue_arguments(spec: &QueueSpec) -> FieldTable {
    let mut table = FieldTable::default();
    for (name, value) in spec.arguments() {
        let value = match value {
            QueueArgument::Text(text) => AMQPValue::LongString(LongString::from(text)),
            QueueArgument::Millis(ms) => AMQPValue::LongInt(i32::try_from(ms).unwrap_or(i32::MAX)),
        };
        table.insert(ShortString::from(name), value);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
