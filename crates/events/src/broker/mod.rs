//! Broker transport abstraction.
//!
//! [`Broker`] is the only seam between the router and the wire. Declarations
//! must be idempotent: re-declaring an identical entity is a no-op, while a
//! declaration that conflicts with an existing entity fails with
//! [`BrokerError::PreconditionFailed`].

pub mod amqp;
pub mod memory;

use async_trait::async_trait;

use crate::topology::{BindingSpec, ExchangeSpec, QueueSpec};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// AMQP protocol or connection failure reported by `lapin`.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// A declaration conflicts with an existing entity of the same name.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The target exchange or queue does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The broker could not be reached or refused the operation.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker negatively acknowledged a published message.
    #[error("Publish rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// A message broker that can declare topology and publish messages.
///
/// Implementations must be safe to share across tasks (`Arc<dyn Broker>`).
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare an exchange, creating it if absent.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError>;

    /// Declare a queue with its TTL / dead-letter arguments.
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError>;

    /// Bind a queue to an exchange under a routing-key pattern.
    async fn bind_queue(&self, spec: &BindingSpec) -> Result<(), BrokerError>;

    /// Publish a JSON payload to `exchange` with `routing_key`.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError>;
}
