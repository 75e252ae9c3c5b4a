//! Service-client management under `/api/iam/clients`. Every write passes
//! through the client policy in `iam-bff-keycloak`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use iam_bff_keycloak::types::{ClientRequest, ClientResponse, ClientSecret};

use crate::{ApiError, AppState};

#[utoipa::path(
    post,
    path = "/api/iam/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    request_body = ClientRequest,
    responses(
        (status = 200, description = "Client created as a confidential service client"),
        (status = 409, description = "Client id already taken", body = crate::ErrorResponse)
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<ClientRequest>,
) -> Result<StatusCode, ApiError> {
    state.clients().create(&payload).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/iam/clients",
    tag = "Clients",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All clients of the realm", body = [ClientResponse]),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn list_clients(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClientResponse>>, ApiError> {
    Ok(Json(state.clients().list().await?))
}

#[utoipa::path(
    get,
    path = "/api/iam/clients/{id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Internal client id")),
    responses(
        (status = 200, description = "Client", body = ClientResponse),
        (status = 404, description = "Unknown client", body = crate::ErrorResponse)
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    Ok(Json(state.clients().get(&id).await?))
}

#[utoipa::path(
    put,
    path = "/api/iam/clients/{id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Internal client id")),
    request_body = ClientRequest,
    responses(
        (status = 200, description = "Client updated"),
        (status = 404, description = "Unknown client", body = crate::ErrorResponse)
    )
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ClientRequest>,
) -> Result<StatusCode, ApiError> {
    state.clients().update(&id, &payload).await?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/api/iam/clients/{id}",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Internal client id")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Unknown client", body = crate::ErrorResponse)
    )
)]
pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.clients().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/iam/clients/{id}/secret",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Internal client id")),
    responses(
        (status = 200, description = "Newly generated secret", body = ClientSecret),
        (status = 404, description = "Unknown client", body = crate::ErrorResponse)
    )
)]
pub async fn regenerate_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClientSecret>, ApiError> {
    Ok(Json(state.clients().regenerate_secret(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/iam/clients/{id}/secret",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Internal client id")),
    responses(
        (status = 200, description = "Current secret", body = ClientSecret),
        (status = 404, description = "Unknown client", body = crate::ErrorResponse)
    )
)]
pub async fn get_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClientSecret>, ApiError> {
    Ok(Json(state.clients().secret(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/iam/clients/scopes/{scope_name}/check",
    tag = "Clients",
    security(("bearerAuth" = [])),
    params(("scope_name" = String, Path, description = "Client scope name")),
    responses(
        (status = 200, description = "Whether the client scope exists", body = bool),
        (status = 401, description = "Authentication required", body = crate::ErrorResponse)
    )
)]
pub async fn check_scope(
    State(state): State<AppState>,
    Path(scope_name): Path<String>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(state.clients().scope_exists(&scope_name).await?))
}
