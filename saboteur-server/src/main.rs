use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use saboteur_server::api::router;
use saboteur_server::clock::SystemClock;
use saboteur_server::config::Config;
use saboteur_server::sabotage_engine::SabotageEngine;
use saboteur_server::scheduler::TokioScheduler;
use saboteur_server::ticker::tick_loop;
use saboteur_server::{AppState, OutboxMessenger, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting saboteur game server");

    let config = Config::from_env().context("Failed to load configuration from environment variables")?;

    let outbox = Arc::new(OutboxMessenger::new());
    let sabotage = Arc::new(SabotageEngine::new(
        Arc::new(TokioScheduler),
        config.critical_sabotage_timeout,
        config.sabotage_fix_quorum,
    ));
    let store = SessionStore::start(
        outbox.clone(),
        sabotage,
        Arc::new(SystemClock),
        config.store_options(),
    );

    let app_state = Arc::new(AppState {
        store: Arc::clone(&store),
        outbox,
    });
    let app = router(app_state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    tokio::spawn(tick_loop(
        store,
        config.tick_interval,
        config.session_idle_timeout,
    ));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
