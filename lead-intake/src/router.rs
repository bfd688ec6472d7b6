use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crm_common::metrics::setup_metrics_routes;
use crm_common::notify::Notifier;
use crm_common::store::Store;
use crm_common::time::Clock;

use crate::api::IntakeError;
use crate::ingest;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    /// Fixed distribution list for new-lead notifications.
    pub recipients: Vec<String>,
}

async fn index() -> &'static str {
    "lead-intake"
}

// vendor tooling branches on `code`, so even the wrong-method rejection
// carries the standard error body
async fn method_not_allowed() -> IntakeError {
    IntakeError::MethodNotAllowed
}

pub fn router(state: AppState, metrics: bool) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route(
            "/intake/adf",
            post(ingest::ingest_adf).fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when lead-intake is used as a library (during tests etc)
    // does not work well.
    if metrics {
        setup_metrics_routes(router)
    } else {
        router
    }
}
