use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{api::models::ErrorResponse, error::Error as CoreError};

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body or query string could not be decoded
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
                CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                CoreError::PartialIngestion { .. }
                | CoreError::Configuration(_)
                | CoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation_error",
            ApiError::Core(e) => e.kind(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        let (stored, failed) = match &self {
            ApiError::Core(CoreError::PartialIngestion { stored, failed }) => (
                Some(stored.iter().map(|s| s.to_string()).collect()),
                Some(
                    failed
                        .iter()
                        .map(|(store, message)| json!({ "store": store, "error": message }))
                        .collect(),
                ),
            ),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
            code: status.as_u16(),
            stored,
            failed,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
