use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadsync_shared::LeadSyncError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] LeadSyncError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(err) => match err {
                LeadSyncError::PassInProgress => StatusCode::CONFLICT,
                LeadSyncError::Validation { .. } => StatusCode::BAD_REQUEST,
                LeadSyncError::Network(_) | LeadSyncError::Notification(_) => {
                    StatusCode::BAD_GATEWAY
                }
                LeadSyncError::Config { .. }
                | LeadSyncError::Storage(_)
                | LeadSyncError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!(status = code.as_u16(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (code, Json(body)).into_response()
    }
}
