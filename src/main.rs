use ad_platform_gateway::api::{create_router, AppState};
use ad_platform_gateway::config::Settings;
use ad_platform_gateway::observability::{init_logging, init_metrics, LogConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    init_logging(&LogConfig::from_settings(&settings.application))?;
    info!("Configuration loaded");

    let addr = format!("{}:{}", settings.application.host, settings.application.port);

    let mut state = AppState::new(settings)?;
    match init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!("Metrics recorder not installed: {}", e),
    }
    state.start_background_jobs();

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ad platform gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
