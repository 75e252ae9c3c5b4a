//! Self-service endpoints under `/api/users/iam`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use iam_bff_keycloak::{
    types::{
        ChangePasswordRequest, IntrospectQuery, IntrospectionResponse, LoginRequest,
        RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenResponse,
        UpdateUserProfileRequest, UserProfileResponse, UserRepresentation,
    },
    Claims,
};

use crate::{ApiError, AppState};

#[utoipa::path(
    post,
    path = "/api/users/iam/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User created with its password set"),
        (status = 409, description = "Username or email already taken", body = crate::ErrorResponse),
        (status = 500, description = "Password step failed after the user was created", body = crate::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<StatusCode, ApiError> {
    state.accounts().register(&payload).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.sessions().login(&payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/iam/refresh-token",
    tag = "Users",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Refresh token expired or revoked", body = crate::ErrorResponse)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.sessions().refresh(&payload.refresh_token).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/iam/logout",
    tag = "Users",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Refresh token rejected", body = crate::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<StatusCode, ApiError> {
    state.sessions().logout(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/forgot-password",
    tag = "Users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Actions email sent and password replaced"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state.passwords().forgot_password(&payload).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/client-credentials",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Token for this service's own client", body = TokenResponse),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn client_credentials(
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.sessions().client_credentials().await?))
}

#[utoipa::path(
    get,
    path = "/api/users/iam/me",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Caller identity from the bearer token", body = UserProfileResponse),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn me(Extension(claims): Extension<Claims>) -> Json<UserProfileResponse> {
    Json(UserProfileResponse {
        name: claims.display_name().map(str::to_string),
        email: claims.email.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/api/users/iam/{username}/profile",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Stored user record", body = UserRepresentation),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserRepresentation>, ApiError> {
    Ok(Json(state.profiles().profile(&username).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/iam/{username}/profile",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUserProfileRequest>,
) -> Result<StatusCode, ApiError> {
    state.profiles().update_profile(&username, &payload).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/{username}/change-password",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Old password does not match", body = crate::ErrorResponse),
        (status = 403, description = "Reset without the old password for another user", body = crate::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    // Without the old password this is a reset, allowed only on the caller's own account.
    if payload.old_password.is_none() && !is_own_account(&claims, &username) {
        return Err(ApiError::forbidden(
            "oldPassword is required to change another user's password",
        ));
    }
    state
        .passwords()
        .change_password(&username, &payload)
        .await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/{username}/verify-email",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Verification email sent"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.profiles().send_verification_email(&username).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/users/iam/introspect",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(IntrospectQuery),
    responses(
        (status = 200, description = "Token state as seen by the provider", body = IntrospectionResponse),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn introspect(
    State(state): State<AppState>,
    Query(query): Query<IntrospectQuery>,
) -> Result<Json<IntrospectionResponse>, ApiError> {
    Ok(Json(state.sessions().introspect(&query.token).await?))
}

fn is_own_account(claims: &Claims, username: &str) -> bool {
    claims
        .preferred_username
        .as_deref()
        .is_some_and(|own| own.eq_ignore_ascii_case(username))
}
