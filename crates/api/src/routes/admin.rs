//! User administration under `/api/admin/iam`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use iam_bff_keycloak::types::{UserPage, UserRepresentation};

use crate::{ApiError, AppState};

#[utoipa::path(
    get,
    path = "/api/admin/iam",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(UserPage),
    responses(
        (status = 200, description = "One page of realm users", body = [UserRepresentation]),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<UserPage>,
) -> Result<Json<Vec<UserRepresentation>>, ApiError> {
    Ok(Json(state.profiles().list_users(&page).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/iam/{username}",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User record", body = UserRepresentation),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserRepresentation>, ApiError> {
    Ok(Json(state.profiles().user(&username).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/iam/{username}",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts().delete(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/admin/iam/{username}/roles/{role}",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(
        ("username" = String, Path, description = "Username"),
        ("role" = String, Path, description = "Realm role name")
    ),
    responses(
        (status = 200, description = "Role assigned"),
        (status = 404, description = "Unknown user or role", body = crate::ErrorResponse)
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    Path((username, role)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.roles().assign(&username, &role).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/api/admin/iam/{username}/roles/{role}",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(
        ("username" = String, Path, description = "Username"),
        ("role" = String, Path, description = "Realm role name")
    ),
    responses(
        (status = 200, description = "Role removed"),
        (status = 404, description = "Unknown user or role", body = crate::ErrorResponse)
    )
)]
pub async fn remove_role(
    State(state): State<AppState>,
    Path((username, role)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.roles().remove(&username, &role).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/admin/iam/{username}/disable",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User disabled"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn disable_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts().set_enabled(&username, false).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/admin/iam/{username}/enable",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User enabled"),
        (status = 404, description = "Unknown user", body = crate::ErrorResponse)
    )
)]
pub async fn enable_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts().set_enabled(&username, true).await?;
    Ok(StatusCode::OK)
}
