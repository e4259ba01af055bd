//! Synthetic telemetry generator.
//!
//! Pure producer: every function takes its entropy source and timestamp
//! explicitly so callers (and tests) control both. The numeric fields and the
//! status are drawn independently of each other, so an `Operational` unit can
//! report a dangerous temperature and vice versa.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreError;
use crate::reading::SystemReading;
use crate::status::OperationalStatus;
use crate::types::Timestamp;

/// Smallest accepted batch size.
pub const MIN_BATCH: usize = 1;
/// Largest accepted batch size.
pub const MAX_BATCH: usize = 50;

const SYSTEM_NAMES: [&str; 6] = [
    "Immersion Chiller Motor 1",
    "Immersion Chiller Motor 2",
    "Pre-Cooler Motor A",
    "Blast Freezing Tunnel Motor B",
    "Frozen Storage Chamber Motor C1",
    "Chilled Storage Chamber Motor C2",
];

const LOCATIONS: [&str; 6] = [
    "Machine Room - Panel 1",
    "Machine Room - Panel 2",
    "Machine Room - Panel 3",
    "Machine Room - Panel 4",
    "Machine Room - Panel 5",
    "Machine Room - Panel 6",
];

/// `None` is a legitimate outcome and is drawn with the same weight.
const NOTES: [Option<&str>; 6] = [
    Some("System running within normal parameters"),
    Some("Slight temperature variation detected"),
    Some("Preventive maintenance scheduled for next week"),
    Some("Compressor operating at optimal efficiency"),
    Some("Continuous monitoring active"),
    None,
];

/// `base + U(0,1) * span` for each sensor.
const TEMPERATURE: (f64, f64) = (-25.0, 30.0);
const PRESSURE: (f64, f64) = (1.0, 14.0);
const HUMIDITY: (f64, f64) = (40.0, 50.0);
const ENERGY: (f64, f64) = (5.0, 45.0);
const COMPRESSOR_SPEED: (f64, f64) = (1000.0, 2500.0);

fn sample<R: Rng + ?Sized>(rng: &mut R, (base, span): (f64, f64)) -> f64 {
    base + rng.random::<f64>() * span
}

fn pick<'a, R: Rng + ?Sized, T>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

/// Produce one reading for `system_id`, stamped with `at`.
pub fn generate_reading<R: Rng + ?Sized>(
    system_id: &str,
    rng: &mut R,
    at: Timestamp,
) -> Result<SystemReading, CoreError> {
    if system_id.trim().is_empty() {
        return Err(CoreError::InvalidArgument(
            "system id must not be blank".to_string(),
        ));
    }

    let system_name = pick(rng, &SYSTEM_NAMES).to_string();
    let location = pick(rng, &LOCATIONS).to_string();
    let temperature = sample(rng, TEMPERATURE);
    let pressure = sample(rng, PRESSURE);
    let humidity = sample(rng, HUMIDITY);
    let status = OperationalStatus::from_draw(rng.random::<f64>());
    let energy_consumption = sample(rng, ENERGY);
    let compressor_speed = sample(rng, COMPRESSOR_SPEED);
    let note = pick(rng, &NOTES).map(str::to_string);

    Ok(SystemReading {
        system_id: system_id.to_string(),
        system_name,
        location,
        timestamp: at,
        temperature,
        pressure,
        humidity,
        status,
        energy_consumption,
        compressor_speed,
        note,
    })
}

/// Produce `count` readings with ids `SYS-001`, `SYS-002`, ... in order.
///
/// `count` must lie in `[MIN_BATCH, MAX_BATCH]`.
pub fn generate_batch<R: Rng + ?Sized>(
    count: usize,
    rng: &mut R,
    at: Timestamp,
) -> Result<Vec<SystemReading>, CoreError> {
    if !(MIN_BATCH..=MAX_BATCH).contains(&count) {
        return Err(CoreError::InvalidArgument(format!(
            "batch size must be between {MIN_BATCH} and {MAX_BATCH}, got {count}"
        )));
    }

    (1..=count)
        .map(|i| generate_reading(&batch_system_id(i), rng, at))
        .collect()
}

/// Zero-padded batch id, e.g. `SYS-007`.
pub fn batch_system_id(index: usize) -> String {
    format!("SYS-{index:03}")
}

// ---------------------------------------------------------------------------
// TelemetryGenerator
// ---------------------------------------------------------------------------

/// Owns an entropy source so a long-lived caller can keep drawing from it.
///
/// Timestamps are still supplied per call.
#[derive(Debug)]
pub struct TelemetryGenerator<R = StdRng> {
    rng: R,
}

impl TelemetryGenerator<StdRng> {
    /// Deterministic generator, for reproducible simulation runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> TelemetryGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(&mut self, system_id: &str, at: Timestamp) -> Result<SystemReading, CoreError> {
        generate_reading(system_id, &mut self.rng, at)
    }

    pub fn generate_batch(
        &mut self,
        count: usize,
        at: Timestamp,
    ) -> Result<Vec<SystemReading>, CoreError> {
        generate_batch(count, &mut self.rng, at)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
