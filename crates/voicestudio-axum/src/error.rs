//! Axum-specific error types and mappings.
//!
//! Every error renders as `{"detail": "<message>"}`, the body clients show
//! verbatim.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use voicestudio_core::{DesignError, ErrorBody, InstallError};

/// Status for work abandoned because the client went away.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

impl From<InstallError> for HttpError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::UnknownPackage(_) => Self::NotFound(err.to_string()),
            InstallError::Failed(msg) => Self::Internal(msg),
        }
    }
}

impl From<DesignError> for HttpError {
    fn from(err: DesignError) -> Self {
        match err {
            DesignError::Unavailable => Self::BadRequest(err.to_string()),
            DesignError::Cancelled => Self::Cancelled,
            DesignError::UnknownModel(_) | DesignError::Failed(_) => {
                Self::Internal(format!("Preview generation failed: {err}"))
            }
        }
    }
}
