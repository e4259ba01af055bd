//! Records of what a dispatch actually published.

use serde::Serialize;

/// Outcome of a single publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    /// Routing key the message was sent with.
    pub routing_key: String,
    /// What was sent, e.g. `"reading"`, `"alert:critical_pressure"`, `"log:WARN"`.
    pub event: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryRecord {
    pub fn delivered(routing_key: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            event: event.into(),
            delivered: true,
            error: None,
        }
    }

    pub fn failed(
        routing_key: impl Into<String>,
        event: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            event: event.into(),
            delivered: false,
            error: Some(error.to_string()),
        }
    }
}

/// Ordered list of every publish attempted during one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub deliveries: Vec<DeliveryRecord>,
}

impl DispatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeliveryRecord) {
        self.deliveries.push(record);
    }

    /// Append all records of `other`, keeping order.
    pub fn merge(&mut self, other: DispatchReport) {
        self.deliveries.extend(other.deliveries);
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.delivered).count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.delivered_count()
    }
}
