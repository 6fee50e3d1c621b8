use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use grammo_api_server::{
    build_router,
    config::Settings,
    logging,
    services::{agent::DEFAULT_SYSTEM_PROMPT, session::marker, HostedChatModel, SessionRegistry},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (fails fast without a model credential)
    let settings = Settings::load()?;

    logging::init(&settings.logging);
    info!("Starting Grammo API Server ({:?} mode)...", settings.server.mode);

    let model = Arc::new(HostedChatModel::new(settings.llm.clone())?);
    let markers = marker::from_config(&settings.marker).await?;

    let system_prompt = settings
        .prompts
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let registry = Arc::new(SessionRegistry::new(
        model,
        markers,
        system_prompt,
        settings.llm.max_history_messages,
    ));

    let sweeper = spawn_idle_sweeper(
        registry.clone(),
        Duration::from_secs(settings.session.sweep_interval_secs.max(1)),
        Duration::from_secs(settings.session.idle_timeout_secs),
    );

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let app = build_router(AppState::new(settings, registry.clone()));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    registry.shutdown().await;
    info!("Server stopped");

    Ok(())
}

fn spawn_idle_sweeper(
    registry: Arc<SessionRegistry>,
    every: Duration,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.sweep_idle(max_idle).await;
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
