pub mod anomaly;
pub mod error;
pub mod forecast;
pub mod health;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, state::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .nest("/api/v1", v1_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(
                    cfg.server.max_upload_bytes,
                ))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}

fn v1_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/anomaly/detect/upload", post(anomaly::detect_upload))
        .route("/anomaly/detect/manual", post(anomaly::detect_manual))
        .route("/forecast/buildings", get(forecast::list_buildings))
        .route("/forecast/run", post(forecast::run_forecast))
        .with_state(state)
}
