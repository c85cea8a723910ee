//! Error type for the dispatcher API.
//!
//! [`ApiError`] wraps every failure a handler can return and renders it
//! as the standard envelope `{success: false, data: null, message,
//! error}` where `error` is a stable machine tag.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dispatch_core::DispatchError;
use tracing::error;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain operation failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A request body or query failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The request could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for the error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Dispatch(err) => match err {
                DispatchError::IncidentNotFound(_)
                | DispatchError::AmbulanceNotFound(_)
                | DispatchError::HospitalNotFound(_)
                | DispatchError::HazardNotFound(_) => StatusCode::NOT_FOUND,
                DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                DispatchError::InvalidTransition { .. }
                | DispatchError::AmbulanceUnavailable { .. }
                | DispatchError::IncidentNotAssignable { .. }
                | DispatchError::AlreadyDispatched { .. }
                | DispatchError::Conflict(_) => StatusCode::CONFLICT,
                DispatchError::NoCandidateAvailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DispatchError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable tag for the error.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Dispatch(err) => err.kind(),
            Self::Validation(_) | Self::BadRequest(_) => "INVALID_REQUEST",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "data": null,
            "message": self.to_string(),
            "error": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use dispatch_types::IncidentId;

    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let incident_id = IncidentId::new();
        let cases = [
            (DispatchError::IncidentNotFound(incident_id), StatusCode::NOT_FOUND),
            (
                DispatchError::AlreadyDispatched { incident_id },
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::NoCandidateAvailable { incident_id },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DispatchError::UpstreamUnavailable("triage".to_owned()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
