use axum::{extract::State, Json};
use iam_bff_keycloak::types::{TokenRequest, TokenResponse};

use crate::{ApiError, AppState};

/// Client-credentials login for callers holding their own service client.
#[utoipa::path(
    post,
    path = "/api/iam/token",
    tag = "Clients",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Service token", body = TokenResponse),
        (status = 401, description = "Client id or secret rejected", body = crate::ErrorResponse)
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.sessions().service_login(&payload).await?))
}
