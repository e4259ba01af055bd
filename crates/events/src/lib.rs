//! Coldchain message routing.
//!
//! This crate owns everything between a generated reading and the broker:
//!
//! - [`Topology`]: the static exchange / queue / binding / dead-letter layout.
//! - [`Broker`]: the transport seam, with [`AmqpBroker`] (RabbitMQ via
//!   `lapin`) and [`InMemoryBroker`] (in-process simulation).
//! - [`MessageRouter`]: provisions the topology and publishes readings,
//!   alerts and log events under the right routing keys.
//! - [`DispatchReport`]: the per-publish record handed back to callers.

pub mod broker;
pub mod config;
pub mod dispatch;
pub mod router;
pub mod topology;

pub use broker::amqp::AmqpBroker;
pub use broker::memory::InMemoryBroker;
pub use broker::{Broker, BrokerError};
pub use config::{BrokerBackend, BrokerConfig};
pub use dispatch::{DeliveryRecord, DispatchReport};
pub use router::{MessageRouter, RouterError};
pub use topology::Topology;
