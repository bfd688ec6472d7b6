use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_common::model::Contact;

use crate::merge::MergeError;

/// Both snapshots are sent whole, as read by the caller immediately before
/// the merge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub primary_contact: Contact,
    pub duplicate_contact: Contact,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResponse {
    pub contact: Contact,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no bearer credential provided")]
    MissingCredential,
    #[error("credential rejected")]
    InvalidCredential,
    #[error("identity provider unavailable: {0}")]
    AuthProvider(String),
    #[error("invalid merge request body: {0}")]
    InvalidBody(String),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingCredential => "missing_credential",
            ApiError::InvalidCredential => "invalid_credential",
            ApiError::AuthProvider(_) => "auth_provider_unavailable",
            ApiError::InvalidBody(_) => "invalid_body",
            ApiError::Merge(MergeError::SameContact) => "same_contact",
            ApiError::Merge(MergeError::PrimaryUpdate(_)) => "merge_failed",
            // distinct from merge_failed: the primary already holds the
            // merged data, only the duplicate is still visible
            ApiError::Merge(MergeError::Tombstone(_)) => "tombstone_failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingCredential | ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody(_) | ApiError::Merge(MergeError::SameContact) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::AuthProvider(_)
            | ApiError::Merge(MergeError::PrimaryUpdate(_))
            | ApiError::Merge(MergeError::Tombstone(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_owned(),
        };

        (status, Json(body)).into_response()
    }
}
