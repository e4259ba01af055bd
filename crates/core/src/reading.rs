//! Point-in-time snapshot of a refrigeration unit.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::status::OperationalStatus;
use crate::types::Timestamp;

/// A single telemetry reading for one refrigeration system.
///
/// Readings are created fresh on every generation request and never
/// mutated afterwards. The field-level invariants are declared with
/// `validator` attributes and checked by [`SystemReading::check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SystemReading {
    #[validate(custom(function = "not_blank"))]
    pub system_id: String,

    #[validate(custom(function = "not_blank"))]
    pub system_name: String,

    pub location: String,

    pub timestamp: Timestamp,

    /// Degrees Celsius.
    #[validate(range(min = -50.0, max = 50.0))]
    pub temperature: f64,

    /// Bar.
    #[validate(range(min = 0.0, max = 100.0))]
    pub pressure: f64,

    /// Relative humidity, percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub humidity: f64,

    pub status: OperationalStatus,

    /// kWh.
    #[validate(range(min = 0.0))]
    pub energy_consumption: f64,

    /// RPM.
    #[validate(range(min = 0.0, max = 10000.0))]
    pub compressor_speed: f64,

    pub note: Option<String>,
}

impl SystemReading {
    /// Verify every field invariant, returning `CoreError::InvalidArgument`
    /// listing the offending fields.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<String> =
                errors.field_errors().keys().map(|k| k.to_string()).collect();
            fields.sort_unstable();
            CoreError::InvalidArgument(format!(
                "reading for '{}' violates invariants: {}",
                self.system_id,
                fields.join(", ")
            ))
        })
    }

    /// Whether the temperature is outside the safe operating band.
    pub fn temperature_out_of_range(&self) -> bool {
        self.temperature > TEMPERATURE_MAX_SAFE || self.temperature < TEMPERATURE_MIN_SAFE
    }

    /// Whether the pressure is outside the safe operating band.
    pub fn pressure_out_of_range(&self) -> bool {
        self.pressure > PRESSURE_MAX_SAFE || self.pressure < PRESSURE_MIN_SAFE
    }
}

/// Upper bound of the safe temperature band (°C).
pub const TEMPERATURE_MAX_SAFE: f64 = 0.0;
/// Lower bound of the safe temperature band (°C).
pub const TEMPERATURE_MIN_SAFE: f64 = -30.0;
/// Upper bound of the safe pressure band (Bar).
pub const PRESSURE_MAX_SAFE: f64 = 20.0;
/// Lower bound of the safe pressure band (Bar).
pub const PRESSURE_MIN_SAFE: f64 = 0.5;

/// Reject empty or whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
