use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crm_common::metrics;

use crate::sweep::Sweeper;

pub fn app(sweeper: Arc<Sweeper>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/sweep", routing::post(run_sweep))
        .route(
            "/metrics",
            routing::get(move || match metrics {
                Some(ref recorder_handle) => std::future::ready(recorder_handle.render()),
                None => std::future::ready("no metrics recorder installed".to_owned()),
            }),
        )
        .layer(axum::middleware::from_fn(metrics::track_metrics))
        .with_state(sweeper)
}

pub async fn index() -> &'static str {
    "lead-reconciler"
}

/// On-demand sweep trigger. No payload either way, the job is convergence.
async fn run_sweep(State(sweeper): State<Arc<Sweeper>>) -> StatusCode {
    match sweeper.sweep().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!("on-demand sweep failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
