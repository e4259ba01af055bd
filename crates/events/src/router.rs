//! Message router: provisions the topology and publishes readings, alerts
//! and log events onto it.
//!
//! The primary path (a reading) is fail-visible: [`MessageRouter::publish_reading`]
//! returns an error. Secondary paths (alerts, logs) are best-effort: each
//! publish is attempted independently, failures are logged and recorded in a
//! [`DispatchReport`], and nothing is propagated to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coldchain_core::alert::AlertEvent;
use coldchain_core::error::CoreError;
use coldchain_core::evaluator;
use coldchain_core::log_event::{LogEvent, LogLevel};
use coldchain_core::reading::SystemReading;
use coldchain_core::status::OperationalStatus;
use coldchain_core::types::Details;
use serde::Serialize;

use crate::broker::{Broker, BrokerError};
use crate::dispatch::{DeliveryRecord, DispatchReport};
use crate::topology::Topology;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Declaring part of the topology failed. Fatal at startup.
    #[error("Failed to provision {entity}: {source}")]
    Provisioning {
        entity: String,
        #[source]
        source: BrokerError,
    },

    /// The broker rejected or could not take a message.
    #[error("Failed to publish to '{routing_key}': {source}")]
    Publish {
        routing_key: String,
        #[source]
        source: BrokerError,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The reading violates its own invariants and was not published.
    #[error(transparent)]
    InvalidReading(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// MessageRouter
// ---------------------------------------------------------------------------

/// Routes refrigeration events onto the broker.
///
/// Stateless per call apart from the one-time provisioned flag. Designed to
/// be shared as `Arc<MessageRouter>`.
pub struct MessageRouter {
    broker: Arc<dyn Broker>,
    topology: Topology,
    provisioned: AtomicBool,
}

impl MessageRouter {
    /// Router over the refrigeration topology.
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            topology: Topology::refrigeration(),
            provisioned: AtomicBool::new(false),
        }
    }

    /// Whether [`provision_topology`](Self::provision_topology) has succeeded
    /// at least once.
    pub fn is_provisioned(&self) -> bool {
        self.provisioned.load(Ordering::Acquire)
    }

    /// Declare the exchange, every queue and every binding.
    ///
    /// Safe to call repeatedly: declarations are idempotent at the broker.
    /// The first failure aborts provisioning; no partial-topology recovery is
    /// attempted.
    pub async fn provision_topology(&self) -> Result<(), RouterError> {
        let exchange = &self.topology.exchange;
        self.broker
            .declare_exchange(exchange)
            .await
            .map_err(|source| RouterError::Provisioning {
                entity: format!("exchange '{}'", exchange.name),
                source,
            })?;

        for queue in &self.topology.queues {
            self.broker
                .declare_queue(queue)
                .await
                .map_err(|source| RouterError::Provisioning {
                    entity: format!("queue '{}'", queue.name),
                    source,
                })?;
            tracing::debug!(
                queue = %queue.name,
                ttl_ms = queue.message_ttl.map(|t| t.as_millis() as u64),
                "Queue declared"
            );
        }

        for binding in &self.topology.bindings {
            self.broker
                .bind_queue(binding)
                .await
                .map_err(|source| RouterError::Provisioning {
                    entity: format!(
                        "binding '{}' -> '{}' ({})",
                        binding.exchange, binding.queue, binding.routing_key
                    ),
                    source,
                })?;
        }

        let first = !self.provisioned.swap(true, Ordering::AcqRel);
        tracing::info!(
            exchange = %exchange.name,
            queues = self.topology.queues.len(),
            bindings = self.topology.bindings.len(),
            first,
            "Broker topology provisioned"
        );
        Ok(())
    }

    // -- primary path -------------------------------------------------------

    /// Publish a reading under the data routing key.
    pub async fn publish_reading(
        &self,
        reading: &SystemReading,
    ) -> Result<DeliveryRecord, RouterError> {
        reading.check()?;
        let routing_key = &self.topology.data_routing_key;

        self.send(routing_key, "reading", reading)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    system_id = %reading.system_id,
                    error = %e,
                    "Failed to publish reading"
                );
            })?;

        tracing::info!(
            system_id = %reading.system_id,
            routing_key = %routing_key,
            "Reading published"
        );
        Ok(DeliveryRecord::delivered(routing_key, "reading"))
    }

    // -- secondary paths ----------------------------------------------------

    /// Evaluate `reading` and publish every resulting alert.
    ///
    /// Each alert is attempted regardless of earlier failures.
    pub async fn publish_alerts(&self, reading: &SystemReading) -> DispatchReport {
        let mut report = DispatchReport::new();
        for alert in evaluator::evaluate(reading) {
            report.push(self.publish_alert(&alert).await);
        }
        report
    }

    /// Publish a single alert. Failures are recorded, never returned.
    pub async fn publish_alert(&self, alert: &AlertEvent) -> DeliveryRecord {
        let routing_key = &self.topology.alerts_routing_key;
        let label = format!("alert:{}", alert.kind.as_str());

        match self.send(routing_key, "alert", alert).await {
            Ok(()) => {
                tracing::warn!(
                    system_id = %alert.system_id,
                    kind = alert.kind.as_str(),
                    severity = ?alert.severity,
                    "Alert published"
                );
                DeliveryRecord::delivered(routing_key, label)
            }
            Err(e) => {
                tracing::error!(
                    system_id = %alert.system_id,
                    kind = alert.kind.as_str(),
                    error = %e,
                    "Failed to publish alert"
                );
                DeliveryRecord::failed(routing_key, label, e)
            }
        }
    }

    /// Publish a log event. Failures are recorded, never returned.
    pub async fn publish_log(
        &self,
        system_id: &str,
        level: LogLevel,
        message: &str,
        details: Details,
    ) -> DeliveryRecord {
        self.publish_log_event(&LogEvent::new(system_id, level, message).with_details(details))
            .await
    }

    pub async fn publish_log_event(&self, event: &LogEvent) -> DeliveryRecord {
        let routing_key = &self.topology.logs_routing_key;
        let label = format!("log:{}", level_label(event.level));

        match self.send(routing_key, "log event", event).await {
            Ok(()) => {
                tracing::debug!(system_id = %event.system_id, "Log event published");
                DeliveryRecord::delivered(routing_key, label)
            }
            Err(e) => {
                tracing::error!(
                    system_id = %event.system_id,
                    error = %e,
                    "Failed to publish log event"
                );
                DeliveryRecord::failed(routing_key, label, e)
            }
        }
    }

    // -- full pipeline ------------------------------------------------------

    /// Publish a freshly generated reading together with everything derived
    /// from it:
    ///
    /// 1. the reading (fails the dispatch if it cannot be published),
    /// 2. an INFO log carrying the reading's metrics plus `details`,
    /// 3. every alert the reading triggers,
    /// 4. a WARN log when the unit is not operational,
    /// 5. an ERROR log when the temperature is out of range.
    pub async fn dispatch_reading(
        &self,
        reading: &SystemReading,
        details: Details,
    ) -> Result<DispatchReport, RouterError> {
        let mut report = DispatchReport::new();
        report.push(self.publish_reading(reading).await?);

        tracing::info!(
            system_id = %reading.system_id,
            timestamp = %reading.timestamp,
            temperature = format!("{:.2}", reading.temperature),
            pressure = format!("{:.2}", reading.pressure),
            humidity = format!("{:.2}", reading.humidity),
            status = %reading.status,
            energy_consumption = format!("{:.2}", reading.energy_consumption),
            compressor_speed = format!("{:.0}", reading.compressor_speed),
            "System data generated"
        );

        let mut details = details;
        details.extend(reading_details(reading));
        let id = reading.system_id.as_str();

        report.push(
            self.publish_log(id, LogLevel::Info, "System data generated successfully", details.clone())
                .await,
        );

        report.merge(self.publish_alerts(reading).await);

        if reading.status != OperationalStatus::Operational {
            tracing::warn!(
                system_id = %id,
                status = %reading.status,
                "System in non-operational status: {}",
                reading.status.description()
            );
            let message = format!(
                "System in non-operational status: {}",
                reading.status.description()
            );
            report.push(
                self.publish_log(id, LogLevel::Warn, &message, details.clone())
                    .await,
            );
        }

        if reading.temperature_out_of_range() {
            tracing::error!(
                system_id = %id,
                temperature = format!("{:.2}", reading.temperature),
                "Temperature outside safe range"
            );
            let message = format!(
                "Critical temperature detected: {:.2}°C",
                reading.temperature
            );
            report.push(self.publish_log(id, LogLevel::Error, &message, details).await);
        }

        Ok(report)
    }

    /// Serialize and publish on the topology's exchange.
    async fn send<T: Serialize + ?Sized>(
        &self,
        routing_key: &str,
        what: &'static str,
        body: &T,
    ) -> Result<(), RouterError> {
        let payload =
            serde_json::to_vec(body).map_err(|source| RouterError::Serialize { what, source })?;
        self.broker
            .publish(&self.topology.exchange.name, routing_key, &payload)
            .await
            .map_err(|source| RouterError::Publish {
                routing_key: routing_key.to_string(),
                source,
            })
    }
}

/// Metric details attached to log events about a reading.
pub fn reading_details(reading: &SystemReading) -> Details {
    let mut details = Details::new();
    details.insert("temperature".into(), reading.temperature.into());
    details.insert("pressure".into(), reading.pressure.into());
    details.insert("humidity".into(), reading.humidity.into());
    details.insert("status".into(), reading.status.to_string().into());
    details.insert(
        "energy_consumption".into(),
        reading.energy_consumption.into(),
    );
    details.insert("compressor_speed".into(), reading.compressor_speed.into());
    details
}

fn level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
        LogLevel::Debug => "DEBUG",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::broker::memory::InMemoryBroker;
    use crate::topology::{
        ALERTS_QUEUE, ALERTS_ROUTING_KEY, DATA_QUEUE, DATA_ROUTING_KEY, LOGS_QUEUE,
        LOGS_ROUTING_KEY,
    };

    fn make_reading(
        temperature: f64,
        pressure: f64,
        status: OperationalStatus,
        energy: f64,
    ) -> SystemReading {
        SystemReading {
            system_id: "SYS-007".to_string(),
            system_name: "Blast Freezing Tunnel Motor B".to_string(),
            location: "Machine Room - Panel 4".to_string(),
            timestamp: Utc::now(),
            temperature,
            pressure,
            humidity: 70.0,
            status,
            energy_consumption: energy,
            compressor_speed: 2400.0,
            note: Some("Continuous monitoring active".to_string()),
        }
    }

    async fn setup() -> (Arc<InMemoryBroker>, MessageRouter) {
        let broker = Arc::new(InMemoryBroker::new());
        let router = MessageRouter::new(broker.clone());
        router.provision_topology().await.unwrap();
        (broker, router)
    }

    #[tokio::test]
    async fn provisioning_twice_creates_no_duplicates() {
        let broker = Arc::new(InMemoryBroker::new());
        let router = MessageRouter::new(broker.clone());
        assert!(!router.is_provisioned());

        router.provision_topology().await.unwrap();
        router.provision_topology().await.unwrap();

        assert!(router.is_provisioned());
        assert_eq!(broker.exchange_count().await, 1);
        assert_eq!(broker.queue_count().await, 4);
        assert_eq!(broker.binding_count().await, 3);
    }

    #[tokio::test]
    async fn provisioning_failure_is_surfaced() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.set_offline(true).await;
        let router = MessageRouter::new(broker);

        let err = router.provision_topology().await.unwrap_err();
        assert_matches!(err, RouterError::Provisioning { ref entity, .. } if entity.contains("exchange"));
        assert!(!router.is_provisioned());
    }

    #[tokio::test]
    async fn reading_goes_to_data_queue() {
        let (broker, router) = setup().await;
        let reading = make_reading(-10.0, 5.0, OperationalStatus::Operational, 10.0);

        let record = router.publish_reading(&reading).await.unwrap();
        assert!(record.delivered);
        assert_eq!(record.routing_key, DATA_ROUTING_KEY);

        let messages = broker.messages(DATA_QUEUE).await;
        assert_eq!(messages.len(), 1);
        let json = messages[0].json().unwrap();
        assert_eq!(json["system_id"], "SYS-007");
        assert_eq!(json["status"], "operational");
        assert_eq!(json["compressor_speed"], 2400.0);
    }

    #[tokio::test]
    async fn reading_publish_failure_is_returned() {
        let (broker, router) = setup().await;
        broker.fail_routing_key(DATA_ROUTING_KEY).await;
        let reading = make_reading(-10.0, 5.0, OperationalStatus::Operational, 10.0);

        assert_matches!(
            router.publish_reading(&reading).await,
            Err(RouterError::Publish { ref routing_key, .. }) if routing_key == DATA_ROUTING_KEY
        );
    }

    #[tokio::test]
    async fn invalid_reading_is_not_published() {
        let (broker, router) = setup().await;
        let reading = make_reading(120.0, 5.0, OperationalStatus::Operational, 10.0);

        assert_matches!(
            router.publish_reading(&reading).await,
            Err(RouterError::InvalidReading(_))
        );
        assert!(broker.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn one_failed_alert_does_not_stop_the_others() {
        let (broker, router) = setup().await;
        // Temperature, pressure and status alerts: three publishes.
        let reading = make_reading(2.0, 25.0, OperationalStatus::Stopped, 10.0);
        broker.fail_attempt(1).await;

        let report = router.publish_alerts(&reading).await;

        let attempts = broker.attempts().await;
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| a.routing_key == ALERTS_ROUTING_KEY));
        assert_eq!(report.deliveries.len(), 3);
        assert_eq!(report.delivered_count(), 2);
        assert!(!report.deliveries[1].delivered);
        assert_eq!(report.deliveries[1].event, "alert:critical_pressure");
        assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, 2);
    }

    #[tokio::test]
    async fn alerts_are_published_in_evaluation_order() {
        let (broker, router) = setup().await;
        let reading = make_reading(10.0, 25.0, OperationalStatus::Critical, 50.0);

        let report = router.publish_alerts(&reading).await;
        let events: Vec<_> = report.deliveries.iter().map(|d| d.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "alert:critical_temperature",
                "alert:critical_pressure",
                "alert:critical_status",
                "alert:high_energy_consumption",
            ]
        );

        let kinds: Vec<_> = broker
            .messages(ALERTS_QUEUE)
            .await
            .iter()
            .map(|m| m.json().unwrap()["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds[2], "critical_status");
    }

    #[tokio::test]
    async fn log_failure_is_recorded_not_returned() {
        let (broker, router) = setup().await;
        broker.fail_routing_key(LOGS_ROUTING_KEY).await;

        let record = router
            .publish_log("SYS-007", LogLevel::Info, "hello", Details::new())
            .await;

        assert!(!record.delivered);
        assert!(record.error.is_some());
        assert_eq!(broker.queue_depth(LOGS_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn log_event_payload_is_field_named() {
        let (broker, router) = setup().await;
        let mut details = Details::new();
        details.insert("endpoint".into(), "test".into());

        router
            .publish_log("SYS-007", LogLevel::Warn, "careful", details)
            .await;

        let json = broker.messages(LOGS_QUEUE).await[0].json().unwrap();
        assert_eq!(json["system_id"], "SYS-007");
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["message"], "careful");
        assert_eq!(json["details"]["endpoint"], "test");
        assert_eq!(json["origin"], "refrigeration-service");
    }

    #[tokio::test]
    async fn dispatch_of_healthy_reading_sends_reading_and_info_log() {
        let (broker, router) = setup().await;
        let reading = make_reading(-10.0, 5.0, OperationalStatus::Operational, 10.0);

        let report = router.dispatch_reading(&reading, Details::new()).await.unwrap();

        let events: Vec<_> = report.deliveries.iter().map(|d| d.event.as_str()).collect();
        assert_eq!(events, vec!["reading", "log:INFO"]);
        assert_eq!(broker.queue_depth(DATA_QUEUE).await, 1);
        assert_eq!(broker.queue_depth(LOGS_QUEUE).await, 1);
        assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, 0);
    }

    #[tokio::test]
    async fn dispatch_of_unhealthy_reading_adds_alerts_and_escalated_logs() {
        let (broker, router) = setup().await;
        let reading = make_reading(3.0, 5.0, OperationalStatus::Alert, 10.0);
        let mut details = Details::new();
        details.insert("endpoint".into(), "generate".into());

        let report = router.dispatch_reading(&reading, details).await.unwrap();

        let events: Vec<_> = report.deliveries.iter().map(|d| d.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "reading",
                "log:INFO",
                "alert:critical_temperature",
                "alert:system_alert_status",
                "log:WARN",
                "log:ERROR",
            ]
        );
        assert_eq!(broker.queue_depth(LOGS_QUEUE).await, 3);

        let info = broker.messages(LOGS_QUEUE).await[0].json().unwrap();
        assert_eq!(info["details"]["endpoint"], "generate");
        assert_eq!(info["details"]["status"], "ALERT");
        assert_eq!(info["details"]["temperature"], 3.0);
    }

    #[tokio::test]
    async fn dispatch_fails_fast_when_reading_cannot_be_published() {
        let (broker, router) = setup().await;
        broker.fail_routing_key(DATA_ROUTING_KEY).await;
        let reading = make_reading(3.0, 5.0, OperationalStatus::Critical, 45.0);

        assert!(router.dispatch_reading(&reading, Details::new()).await.is_err());
        assert_eq!(broker.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_survives_secondary_failures() {
        let (broker, router) = setup().await;
        broker.fail_routing_key(LOGS_ROUTING_KEY).await;
        broker.fail_routing_key(ALERTS_ROUTING_KEY).await;
        let reading = make_reading(3.0, 5.0, OperationalStatus::Critical, 45.0);

        let report = router.dispatch_reading(&reading, Details::new()).await.unwrap();

        assert!(report.deliveries[0].delivered);
        assert_eq!(report.delivered_count(), 1);
        // reading + INFO + 3 alerts + WARN + ERROR
        assert_eq!(report.deliveries.len(), 7);
        assert_eq!(broker.attempts().await.len(), 7);
    }
}
