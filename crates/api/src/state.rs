use std::sync::Arc;

use coldchain_core::generator::TelemetryGenerator;
use coldchain_events::MessageRouter;
use tokio::sync::Mutex;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Publishes readings, alerts and log events to the broker.
    pub router: Arc<MessageRouter>,
    /// Telemetry source. Locked only for the duration of a generate call.
    pub generator: Arc<Mutex<TelemetryGenerator>>,
}

impl AppState {
    pub fn new(config: ServerConfig, router: Arc<MessageRouter>) -> Self {
        let generator = match config.simulation_seed {
            Some(seed) => TelemetryGenerator::seeded(seed),
            None => TelemetryGenerator::from_entropy(),
        };
        Self {
            config: Arc::new(config),
            router,
            generator: Arc::new(Mutex::new(generator)),
        }
    }
}
