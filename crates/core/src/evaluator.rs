//! Threshold evaluation for refrigeration readings.
//!
//! Pure logic: no I/O, no randomness. The alert timestamp is taken from the
//! reading, so evaluating the same reading twice yields identical output.

use crate::alert::{AlertEvent, AlertKind, Severity};
use crate::reading::SystemReading;
use crate::status::OperationalStatus;

/// Energy consumption above this (kWh) raises an alert.
pub const ENERGY_ALERT_THRESHOLD: f64 = 40.0;

/// Evaluate a reading and return every alert it triggers.
///
/// Checks run independently and in a fixed order: temperature, pressure,
/// status (at most one of critical / stopped / alert), energy. Nothing is
/// suppressed or deduplicated.
pub fn evaluate(reading: &SystemReading) -> Vec<AlertEvent> {
    let mut alerts = Vec::new();

    if reading.temperature_out_of_range() {
        alerts.push(raise(
            reading,
            AlertKind::CriticalTemperature,
            Severity::High,
            format!("Temperature outside safe range: {:.2}°C", reading.temperature),
        ));
    }

    if reading.pressure_out_of_range() {
        alerts.push(raise(
            reading,
            AlertKind::CriticalPressure,
            Severity::High,
            format!("Pressure outside safe range: {:.2} Bar", reading.pressure),
        ));
    }

    if let Some((kind, severity, prefix)) = status_rule(reading.status) {
        alerts.push(raise(
            reading,
            kind,
            severity,
            format!("{prefix}: {}", reading.status.description()),
        ));
    }

    if reading.energy_consumption > ENERGY_ALERT_THRESHOLD {
        alerts.push(raise(
            reading,
            AlertKind::HighEnergyConsumption,
            Severity::Medium,
            format!(
                "High energy consumption: {:.2} kWh",
                reading.energy_consumption
            ),
        ));
    }

    alerts
}

/// Status-based rule. Maintenance and Operational raise nothing.
fn status_rule(status: OperationalStatus) -> Option<(AlertKind, Severity, &'static str)> {
    match status {
        OperationalStatus::Critical => Some((
            AlertKind::CriticalStatus,
            Severity::Critical,
            "System in critical state",
        )),
        OperationalStatus::Stopped => {
            Some((AlertKind::SystemStopped, Severity::High, "System stopped"))
        }
        OperationalStatus::Alert => Some((
            AlertKind::SystemAlertStatus,
            Severity::Medium,
            "System in alert",
        )),
        OperationalStatus::Maintenance | OperationalStatus::Operational => None,
    }
}

fn raise(
    reading: &SystemReading,
    kind: AlertKind,
    severity: Severity,
    description: String,
) -> AlertEvent {
    AlertEvent {
        system_id: reading.system_id.clone(),
        kind,
        description,
        severity,
        timestamp: reading.timestamp,
        temperature: reading.temperature,
        pressure: reading.pressure,
        status: reading.status,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
