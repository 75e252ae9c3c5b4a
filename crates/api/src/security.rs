//! Bearer-token gate in front of every route.
//!
//! A short allow-list of paths is served anonymously. Everything else needs an
//! `Authorization: Bearer` header carrying a token signed by the realm.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{ApiError, AppState, OPENAPI_PATH, SWAGGER_UI_PATH};

const ANONYMOUS_POSTS: &[&str] = &[
    "/api/users/iam/register",
    "/api/users/iam/login",
    "/api/users/iam/logout",
    "/api/users/iam/refresh-token",
    "/api/users/iam/forgot-password",
    "/api/iam/token",
];

pub fn is_anonymous(method: &Method, path: &str) -> bool {
    if path == "/health" || path == OPENAPI_PATH || path.starts_with(SWAGGER_UI_PATH) {
        return true;
    }

    method == Method::POST && ANONYMOUS_POSTS.contains(&path)
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    match parts.next() {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::unauthorized("missing bearer token")),
    }
}

/// Verifies the bearer token and stores its [`Claims`] in the request
/// extensions for handlers such as `/me`.
///
/// [`Claims`]: iam_bff_keycloak::Claims
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_anonymous(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())?;
    let claims = state.verifier().verify(token).await?;
    debug!(subject = ?claims.sub, "bearer token accepted");

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
