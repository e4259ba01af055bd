//! Operational log entries routed onto the logs queue.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{Details, Timestamp};

/// Fixed origin tag stamped on every log event.
pub const LOG_ORIGIN: &str = "refrigeration-service";

/// Severity level of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

/// An operational log entry about one system (or a pseudo-system such as
/// a batch run).
///
/// Constructed via [`LogEvent::new`] and optionally enriched with
/// [`with_details`](LogEvent::with_details) / [`with_detail`](LogEvent::with_detail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub system_id: String,
    pub level: LogLevel,
    pub message: String,
    /// Arbitrary key/value context, serialized as a JSON object.
    pub details: Details,
    pub timestamp: Timestamp,
    pub origin: String,
}

impl LogEvent {
    /// Create a log event stamped with the current time and no details.
    pub fn new(system_id: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            level,
            message: message.into(),
            details: Details::new(),
            timestamp: Utc::now(),
            origin: LOG_ORIGIN.to_string(),
        }
    }

    /// Replace the detail map.
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    /// Add a single detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
