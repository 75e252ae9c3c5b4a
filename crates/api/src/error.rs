use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use iam_bff_keycloak::{IamError, VerifyError};

/// Body of every non-2xx answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Numeric status as a string, e.g. `"404"`.
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.as_str().to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<IamError> for ApiError {
    fn from(error: IamError) -> Self {
        let status = match &error {
            IamError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            IamError::NotFound(_) => StatusCode::NOT_FOUND,
            IamError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            IamError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            IamError::Conflict(_) => StatusCode::CONFLICT,
            IamError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IamError::Forbidden(_) => StatusCode::FORBIDDEN,
            IamError::Upstream { .. } | IamError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            error!(error = ?error, "identity operation failed");
        } else {
            warn!(error = %error, "identity operation rejected");
        }

        Self::new(status, error.to_string())
    }
}

impl From<VerifyError> for ApiError {
    fn from(error: VerifyError) -> Self {
        match error {
            VerifyError::Invalid(_) => {
                warn!(error = %error, "bearer token rejected");
                ApiError::unauthorized(error.to_string())
            }
            VerifyError::KeysUnavailable(_) => {
                error!(error = ?error, "signing keys unavailable");
                ApiError::service_unavailable(error.to_string())
            }
        }
    }
}
