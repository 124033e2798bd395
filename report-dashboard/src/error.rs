use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use report_core::aggregate::UnknownAggregation;
use report_core::compose::UnknownRenderMode;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("dataset `{0}` not found")]
    DatasetNotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Core(#[from] report_core::Error),
    #[error("failed to fingerprint hexbin points: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl From<UnknownAggregation> for ApiError {
    fn from(e: UnknownAggregation) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<UnknownRenderMode> for ApiError {
    fn from(e: UnknownRenderMode) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DatasetNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Core(_) => StatusCode::BAD_REQUEST,
            ApiError::Fingerprint(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
