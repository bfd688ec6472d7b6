use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_common::model::Lead;
use crm_common::store::StoreError;

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadCreated {
    pub lead: Lead,
}

/// Wire shape of every rejection. `code` is the machine-checkable reason
/// that vendor-integration tooling branches on.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_dealerships: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("only POST is accepted on this route")]
    MethodNotAllowed,
    #[error("request body is empty")]
    EmptyBody,
    #[error("request body is not an ADF document")]
    MissingAdfRoot,
    #[error("failed to parse ADF XML: {0}")]
    MalformedXml(String),

    // each missing substructure is reported individually: vendor feeds are a
    // managed integration and failure diagnosis depends on knowing which one
    #[error("ADF document has no prospect element")]
    MissingProspect,
    #[error("prospect has no customer contact block")]
    MissingCustomer,
    #[error("prospect has no vehicle block")]
    MissingVehicle,
    #[error("prospect has no vendor block")]
    MissingVendor,

    #[error("no dealership matches vendor name {name:?}")]
    DealershipNotFound { name: String, known: Vec<String> },
    #[error("vendor name {0:?} matches more than one dealership")]
    AmbiguousDealership(String),

    #[error("store operation failed")]
    Store(#[from] StoreError),
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::MethodNotAllowed => "method_not_allowed",
            IntakeError::EmptyBody => "empty_body",
            IntakeError::MissingAdfRoot => "missing_adf_root",
            IntakeError::MalformedXml(_) => "malformed_xml",
            IntakeError::MissingProspect => "missing_prospect",
            IntakeError::MissingCustomer => "missing_customer",
            IntakeError::MissingVehicle => "missing_vehicle",
            IntakeError::MissingVendor => "missing_vendor",
            IntakeError::DealershipNotFound { .. } => "dealership_not_found",
            IntakeError::AmbiguousDealership(_) => "ambiguous_dealership",
            IntakeError::Store(_) => "store_failure",
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let code = self.code();
        metrics::counter!("intake_requests_rejected_total", &[("reason", code)]).increment(1);

        let (status, known_dealerships, details) = match &self {
            IntakeError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, None, None),
            IntakeError::DealershipNotFound { known, .. } => {
                // deliberate onboarding affordance: the directory is not secret
                (StatusCode::BAD_REQUEST, Some(known.clone()), None)
            }
            IntakeError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                Some(err.to_string()),
            ),
            _ => (StatusCode::BAD_REQUEST, None, None),
        };

        let body = ErrorBody {
            error: self.to_string(),
            code: code.to_owned(),
            known_dealerships,
            details,
        };

        (status, Json(body)).into_response()
    }
}
