use std::net::SocketAddr;
use std::sync::Arc;

use coldchain_events::broker::memory::EXPIRY_SWEEP_PERIOD;
use coldchain_events::{
    AmqpBroker, Broker, BrokerBackend, BrokerConfig, InMemoryBroker, MessageRouter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coldchain_api::config::ServerConfig;
use coldchain_api::router::build_app_router;
use coldchain_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "coldchain_api=debug,coldchain_events=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let broker_config = BrokerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?broker_config.backend,
        seeded = config.simulation_seed.is_some(),
        "Loaded server configuration"
    );

    // --- Broker ---
    let (broker, amqp, sweep_handle): (
        Arc<dyn Broker>,
        Option<Arc<AmqpBroker>>,
        Option<tokio::task::JoinHandle<()>>,
    ) = match broker_config.backend {
        BrokerBackend::Amqp => {
            let amqp = Arc::new(
                AmqpBroker::connect(&broker_config)
                    .await
                    .expect("Failed to connect to AMQP broker"),
            );
            let broker: Arc<dyn Broker> = amqp.clone();
            (broker, Some(amqp), None)
        }
        BrokerBackend::Memory => {
            tracing::warn!("Using in-memory broker; messages never leave this process");
            let memory = Arc::new(InMemoryBroker::new());
            let sweep_handle = memory.spawn_expiry_sweep(EXPIRY_SWEEP_PERIOD);
            let broker: Arc<dyn Broker> = memory;
            (broker, None, Some(sweep_handle))
        }
    };

    let router = Arc::new(MessageRouter::new(broker));
    router
        .provision_topology()
        .await
        .expect("Failed to provision broker topology");

    // --- App state ---
    let state = AppState::new(config.clone(), router);
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(handle) = sweep_handle {
        handle.abort();
    }

    if let Some(amqp) = amqp {
        if let Err(e) = amqp.close().await {
            tracing::warn!(error = %e, "Failed to close AMQP connection cleanly");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix) to start graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
