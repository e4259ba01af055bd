//! Alert events derived from threshold violations in a reading.

use serde::{Deserialize, Serialize};

use crate::status::OperationalStatus;
use crate::types::Timestamp;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Which rule produced the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CriticalTemperature,
    CriticalPressure,
    CriticalStatus,
    SystemStopped,
    SystemAlertStatus,
    HighEnergyConsumption,
}

impl AlertKind {
    /// Stable snake_case label, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriticalTemperature => "critical_temperature",
            Self::CriticalPressure => "critical_pressure",
            Self::CriticalStatus => "critical_status",
            Self::SystemStopped => "system_stopped",
            Self::SystemAlertStatus => "system_alert_status",
            Self::HighEnergyConsumption => "high_energy_consumption",
        }
    }
}

/// An alert raised for a single reading.
///
/// Only built by [`crate::evaluator::evaluate`]. Carries a copy of the
/// triggering reading's temperature, pressure and status for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub system_id: String,
    pub kind: AlertKind,
    pub description: String,
    pub severity: Severity,
    pub timestamp: Timestamp,
    pub temperature: f64,
    pub pressure: f64,
    pub status: OperationalStatus,
}
