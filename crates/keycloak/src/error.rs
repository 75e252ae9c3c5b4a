//! Closed error set for every identity-provider operation.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IamError {
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{step} step failed after earlier changes were applied (rolled back: {rolled_back}): {message}")]
    PartialFailure {
        step: &'static str,
        rolled_back: bool,
        message: String,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("identity provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

pub type IamResult<T> = Result<T, IamError>;

impl IamError {
    pub fn partial(step: &'static str, rolled_back: bool, cause: &IamError) -> Self {
        IamError::PartialFailure {
            step,
            rolled_back,
            message: cause.to_string(),
        }
    }

    /// Map a non-success provider status to an error. `subject` names the thing
    /// the request addressed and is used for `NotFound`.
    pub fn from_status(status: StatusCode, body: &str, subject: &str) -> Self {
        let message = provider_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

        match status {
            StatusCode::NOT_FOUND => IamError::NotFound(subject.to_string()),
            StatusCode::CONFLICT => IamError::Conflict(message),
            StatusCode::BAD_REQUEST => IamError::BadRequest(message),
            StatusCode::UNAUTHORIZED => IamError::InvalidCredentials,
            StatusCode::FORBIDDEN => IamError::Forbidden(message),
            status if status.is_server_error() => IamError::UpstreamUnavailable(message),
            status => IamError::Upstream {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Map a failed OAuth2 token-endpoint call. Rejected grants become
    /// `InvalidCredentials`, everything else follows [`IamError::from_status`].
    pub fn from_grant_status(status: StatusCode, body: &str) -> Self {
        let rejected = serde_json::from_str::<ProviderErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .is_some_and(|code| is_rejected_grant(&code));

        if rejected || status == StatusCode::UNAUTHORIZED {
            IamError::InvalidCredentials
        } else {
            IamError::from_status(status, body, "token endpoint")
        }
    }
}

pub(crate) fn is_rejected_grant(code: &str) -> bool {
    matches!(
        code,
        "invalid_grant" | "invalid_client" | "unauthorized_client"
    )
}

impl From<reqwest::Error> for IamError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            IamError::InvalidResponse(error.to_string())
        } else {
            IamError::UpstreamUnavailable(error.to_string())
        }
    }
}

impl From<serde_json::Error> for IamError {
    fn from(error: serde_json::Error) -> Self {
        IamError::InvalidResponse(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn provider_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(body) {
        if let Some(message) = parsed
            .error_message
            .or(parsed.error_description)
            .or(parsed.error)
        {
            return Some(message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(200).collect())
    }
}
