//! API error type with IntoResponse
//!
//! Every failure becomes `{"error": "<safe message>"}` with a status taken
//! from the error class. Driver diagnostics are logged by the executor and
//! never reach this layer.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::QueryError;
use crate::models::ValidationError;

/// API error with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request parameter failed validation (400)
    Validation(ValidationError),

    /// Query string or body could not be parsed (400)
    BadRequest { message: String },

    /// Connection or execution failure (status by class)
    Query(QueryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Query(e) => match e {
                QueryError::Validation(_) => StatusCode::BAD_REQUEST,
                QueryError::Connection { .. } | QueryError::PoolExhausted { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                QueryError::Constraint => StatusCode::CONFLICT,
                QueryError::NotFound => StatusCode::NOT_FOUND,
                QueryError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                QueryError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest { message } => message.clone(),
            Self::Query(QueryError::Unknown) => "an internal error occurred".to_owned(),
            Self::Query(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Validation(v) => Self::Validation(v),
            other => Self::Query(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}
