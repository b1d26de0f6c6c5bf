mod diagnose;
mod health;
mod metrics;
mod predict;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(diagnose::upload_form))
        .route("/diagnose", post(diagnose::diagnose))
        .route("/predict", post(predict::predict))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
