//! Error to HTTP status mapping

use super::ApiResponse;
use crate::access::AccessError;
use crate::ledger::{StoreError, UsageStatus};
use crate::pipeline::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub usage: Option<UsageStatus>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            usage: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not logged in")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        let status = match &e {
            AccessError::EmptyEmail => StatusCode::BAD_REQUEST,
            AccessError::UnknownUser => StatusCode::UNAUTHORIZED,
            AccessError::BadBootstrapKey | AccessError::NotAdmin | AccessError::NotApproved => {
                StatusCode::FORBIDDEN
            }
            AccessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Access(e) => e.into(),
            PipelineError::InvalidInput(msg) => Self::bad_request(msg),
            PipelineError::QuotaExceeded(status) => {
                let mut err = Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    PipelineError::QuotaExceeded(status.clone()).to_string(),
                );
                err.usage = Some(status);
                err
            }
            e @ PipelineError::Narrative(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            e @ (PipelineError::Render(_) | PipelineError::Task(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.message);
        }
        let body = ApiResponse {
            success: false,
            data: self.usage,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}
