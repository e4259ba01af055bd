//! Operational status of a refrigeration unit.

use serde::{Deserialize, Serialize};

/// Operational status carried by every reading.
///
/// Each reading draws its status independently (see
/// [`OperationalStatus::from_draw`]); there are no transitions between
/// states over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    Operational,
    Maintenance,
    Alert,
    Critical,
    Stopped,
}

/// Human-readable description per status.
const DESCRIPTIONS: [(OperationalStatus, &str); 5] = [
    (OperationalStatus::Operational, "System operating normally"),
    (OperationalStatus::Maintenance, "System under maintenance"),
    (OperationalStatus::Alert, "System has active alerts"),
    (OperationalStatus::Critical, "System in critical state"),
    (OperationalStatus::Stopped, "System stopped"),
];

/// Cumulative upper bounds for the status draw. A draw `p` maps to the first
/// entry whose bound is strictly greater than `p`; anything past the last
/// bound is [`OperationalStatus::Stopped`].
const DRAW_TABLE: [(f64, OperationalStatus); 4] = [
    (0.70, OperationalStatus::Operational),
    (0.85, OperationalStatus::Alert),
    (0.95, OperationalStatus::Maintenance),
    (0.99, OperationalStatus::Critical),
];

impl OperationalStatus {
    /// All variants in declaration order.
    pub const ALL: [OperationalStatus; 5] = [
        Self::Operational,
        Self::Maintenance,
        Self::Alert,
        Self::Critical,
        Self::Stopped,
    ];

    /// Fixed description for this status.
    pub fn description(self) -> &'static str {
        DESCRIPTIONS
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, text)| *text)
            .unwrap_or_default()
    }

    /// Map a uniform draw in `[0, 1]` onto a status using the weighted
    /// cumulative table (70% / 15% / 10% / 4% / 1%).
    pub fn from_draw(p: f64) -> Self {
        DRAW_TABLE
            .iter()
            .find(|(bound, _)| p < *bound)
            .map(|(_, status)| *status)
            .unwrap_or(Self::Stopped)
    }
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Operational => "OPERATIONAL",
            Self::Maintenance => "MAINTENANCE",
            Self::Alert => "ALERT",
            Self::Critical => "CRITICAL",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
