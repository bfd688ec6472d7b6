use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::{routing, Json, Router};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crm_common::store::Store;

use crate::api::{ApiError, MergeRequest, MergeResponse};
use crate::auth::{AuthError, TokenValidator};
use crate::merge;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub validator: Arc<dyn TokenValidator>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/contacts/merge", routing::post(merge_contacts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn index() -> &'static str {
    "contact-api"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[instrument(skip_all, fields(primary_id, duplicate_id))]
async fn merge_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MergeResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::MissingCredential)?;
    state.validator.validate(token).await.map_err(|e| match e {
        AuthError::InvalidCredential => ApiError::InvalidCredential,
        AuthError::ProviderUnavailable(message) => ApiError::AuthProvider(message),
    })?;

    let request: MergeRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    tracing::Span::current().record(
        "primary_id",
        tracing::field::display(request.primary_contact.id),
    );
    tracing::Span::current().record(
        "duplicate_id",
        tracing::field::display(request.duplicate_contact.id),
    );

    let merged = merge::merge_contacts(
        state.store.as_ref(),
        &request.primary_contact,
        &request.duplicate_contact,
    )
    .await?;

    Ok(Json(MergeResponse { contact: merged }))
}
