mod config;
mod conversation;
mod errors;
mod intake;
mod job_roles;
mod models;
mod routes;
mod scoring;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ScoringBackend};
use crate::conversation::CannedResponder;
use crate::job_roles::InMemoryJobRoles;
use crate::routes::build_router;
use crate::scoring::gateway::OracleGateway;
use crate::scoring::oracle::{HttpOracle, ScoringOracle, SimulatedOracle};
use crate::session::{EventBus, ScreeningSession};
use crate::state::AppState;

const SIMULATED_JITTER_MS: u64 = 900;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; bad values abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Scoring oracle and gateway
    let oracle: Arc<dyn ScoringOracle> = match &config.scoring_backend {
        ScoringBackend::Simulated => Arc::new(SimulatedOracle::new(
            config.simulated_latency,
            SIMULATED_JITTER_MS,
        )),
        ScoringBackend::Http { url } => Arc::new(HttpOracle::new(url.clone())),
    };
    let screening = config.screening_config();
    info!(
        "Scoring oracle: {} (threshold {}, timeout {:?})",
        oracle.backend(),
        screening.threshold,
        screening.scoring_timeout
    );
    let gateway = Arc::new(OracleGateway::new(oracle, &screening));

    // Session engine and its event bus
    let session = ScreeningSession::new(
        &screening,
        gateway,
        Arc::new(CannedResponder),
        EventBus::new(config.event_bus_capacity),
    );
    spawn_event_logger(&session);

    let state = AppState {
        session,
        job_roles: Arc::new(InMemoryJobRoles::seeded()),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the operator UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Logs every session event at debug level for the lifetime of the process.
fn spawn_event_logger(session: &ScreeningSession) {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!("Session event: {json}"),
                    Err(e) => warn!("Unserializable session event {event:?}: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {skipped} event(s) skipped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
