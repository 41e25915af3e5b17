use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use profscope::error::CaptureError;

#[derive(thiserror::Error, Debug)]
pub enum ProfScopeServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("capture already in progress")]
    CaptureInProgress,
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CaptureError> for ProfScopeServerError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::InProgress => Self::CaptureInProgress,
            CaptureError::Sampling(error) => Self::Capture(error.to_string()),
        }
    }
}

impl From<minijinja::Error> for ProfScopeServerError {
    fn from(error: minijinja::Error) -> Self {
        Self::Internal(format!("Failed to render page: {error}"))
    }
}

impl From<tokio::task::JoinError> for ProfScopeServerError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Request worker failed: {error}"))
    }
}

impl IntoResponse for ProfScopeServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ProfScopeServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ProfScopeServerError::CaptureInProgress => (
                StatusCode::CONFLICT,
                "capture already in progress".to_owned(),
            ),
            ProfScopeServerError::Capture(msg) | ProfScopeServerError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ProfScopeServerError::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
        };

        (status, message).into_response()
    }
}
