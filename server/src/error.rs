//! Request error taxonomy and its HTTP mapping.
//!
//! Every handler failure funnels into `ApiError`; the `IntoResponse` impl is
//! the single place status codes and the `{error, message}` body shape are
//! decided.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range caller input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Curve configuration rejected; names the offending field.
    #[error("invalid curve config: {field}: {reason}")]
    InvalidCurveConfig { field: &'static str, reason: String },

    /// A dependency the request needs (upload service, RPC, store) failed.
    #[error("{dependency} failure: {reason}")]
    Upstream {
        dependency: &'static str,
        reason: String,
    },

    /// The durable counter could not hand out an index. Fatal.
    #[error("failed to allocate config index: {0}")]
    IndexAllocation(String),

    /// Detached-signature check failed (claim-fees).
    #[error("invalid signature")]
    SignatureVerification,

    /// No registry entry for the requested pool (claim-fees).
    #[error("unknown pool")]
    UnknownPool,

    /// Missing required deployment configuration.
    #[error("server misconfiguration: {0}")]
    Misconfiguration(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidCurveConfig { .. } | ApiError::UnknownPool => {
                StatusCode::BAD_REQUEST
            }
            ApiError::SignatureVerification => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { .. }
            | ApiError::IndexAllocation(_)
            | ApiError::Misconfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for the response body.
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::InvalidCurveConfig { .. } => "invalid_curve_config",
            ApiError::Upstream { .. } => "upstream_dependency_error",
            ApiError::IndexAllocation(_) => "index_allocation_error",
            ApiError::SignatureVerification => "invalid_signature",
            ApiError::UnknownPool => "unknown_pool",
            ApiError::Misconfiguration(_) => "server_misconfiguration",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            match &self {
                ApiError::Upstream { dependency, reason } => {
                    error!(dependency, %reason, "upstream dependency failed");
                }
                other => error!(error = %other, "request failed"),
            }
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: Some(self.to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}
