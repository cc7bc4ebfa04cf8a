use anyhow::Result;
use axum::Router;
use meter_insight::{api, config::Config, state::AppState, telemetry};
use telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let app_state = AppState::new(cfg.clone());

    let app: Router = api::router(app_state, &cfg);

    let addr = cfg.server.socket_addr()?;
    info!(%addr, "starting Meter Insight");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}
