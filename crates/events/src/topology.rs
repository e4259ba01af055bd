//! Static broker topology: one topic exchange, three routed queues and a
//! dead-letter queue.
//!
//! Pure data. Consumed by [`MessageRouter::provision_topology`] to declare
//! the entities and by the publish paths to pick exchange and routing key.
//!
//! [`MessageRouter::provision_topology`]: crate::router::MessageRouter::provision_topology

use std::time::Duration;

pub const EXCHANGE: &str = "refrigeration.exchange";

pub const DATA_QUEUE: &str = "refrigeration.data";
pub const LOGS_QUEUE: &str = "refrigeration.logs";
pub const ALERTS_QUEUE: &str = "refrigeration.alerts";
pub const DEAD_LETTER_QUEUE: &str = "refrigeration.dlq";

pub const DATA_ROUTING_KEY: &str = "refrigeration.data";
pub const LOGS_ROUTING_KEY: &str = "refrigeration.logs";
pub const ALERTS_ROUTING_KEY: &str = "refrigeration.alerts";

/// The default (nameless) exchange routes by queue name.
pub const DEFAULT_EXCHANGE: &str = "";

pub const DATA_TTL: Duration = Duration::from_millis(3_600_000);
pub const LOGS_TTL: Duration = Duration::from_millis(7_200_000);
pub const ALERTS_TTL: Duration = Duration::from_millis(1_800_000);

/// AMQP queue argument names.
pub const ARG_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
pub const ARG_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";
pub const ARG_MESSAGE_TTL: &str = "x-message-ttl";

// ---------------------------------------------------------------------------
// Entity specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes on `*` / `#` wildcard patterns.
    Topic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Where expired or rejected messages are re-published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub exchange: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub message_ttl: Option<Duration>,
    pub dead_letter: Option<DeadLetter>,
}

/// A queue declaration argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueArgument {
    Text(String),
    Millis(u32),
}

impl QueueSpec {
    /// Declaration arguments in AMQP form (`x-dead-letter-*`, `x-message-ttl`).
    pub fn arguments(&self) -> Vec<(&'static str, QueueArgument)> {
        let mut args = Vec::new();
        if let Some(dl) = &self.dead_letter {
            args.push((
                ARG_DEAD_LETTER_EXCHANGE,
                QueueArgument::Text(dl.exchange.clone()),
            ));
            args.push((
                ARG_DEAD_LETTER_ROUTING_KEY,
                QueueArgument::Text(dl.routing_key.clone()),
            ));
        }
        if let Some(ttl) = self.message_ttl {
            let millis = u32::try_from(ttl.as_millis()).unwrap_or(u32::MAX);
            args.push((ARG_MESSAGE_TTL, QueueArgument::Millis(millis)));
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Complete topology declared at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: ExchangeSpec,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
    pub data_routing_key: String,
    pub logs_routing_key: String,
    pub alerts_routing_key: String,
}

impl Topology {
    /// The refrigeration topology.
    ///
    /// ```text
    /// refrigeration.exchange (topic, durable)
    ///   ├─ refrigeration.data    ttl 1h   ─┐
    ///   ├─ refrigeration.logs    ttl 2h   ─┼─ dead-letter via "" → refrigeration.dlq
    ///   └─ refrigeration.alerts  ttl 30m  ─┘
    /// ```
    pub fn refrigeration() -> Self {
        let routed = [
            (DATA_QUEUE, DATA_ROUTING_KEY, DATA_TTL),
            (LOGS_QUEUE, LOGS_ROUTING_KEY, LOGS_TTL),
            (ALERTS_QUEUE, ALERTS_ROUTING_KEY, ALERTS_TTL),
        ];

        let mut queues: Vec<QueueSpec> = routed
            .iter()
            .map(|(queue, _, ttl)| QueueSpec {
                name: queue.to_string(),
                durable: true,
                message_ttl: Some(*ttl),
                dead_letter: Some(DeadLetter {
                    exchange: DEFAULT_EXCHANGE.to_string(),
                    routing_key: DEAD_LETTER_QUEUE.to_string(),
                }),
            })
            .collect();
        queues.push(QueueSpec {
            name: DEAD_LETTER_QUEUE.to_string(),
            durable: true,
            message_ttl: None,
            dead_letter: None,
        });

        let bindings = routed
            .iter()
            .map(|(queue, key, _)| BindingSpec {
                queue: queue.to_string(),
                exchange: EXCHANGE.to_string(),
                routing_key: key.to_string(),
            })
            .collect();

        Self {
            exchange: ExchangeSpec {
                name: EXCHANGE.to_string(),
                kind: ExchangeKind::Topic,
                durable: true,
            },
            queues,
            bindings,
            data_routing_key: DATA_ROUTING_KEY.to_string(),
            logs_routing_key: LOGS_ROUTING_KEY.to_string(),
            alerts_routing_key: ALERTS_ROUTING_KEY.to_string(),
        }
    }

    /// Look up a queue by name.
    pub fn queue(&self, name: &str) -> Option<&QueueSpec> {
        self.queues.iter().find(|q| q.name == name)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::refrigeration()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
