//! HTTP surface of the IAM backend-for-frontend.
//!
//! Every route forwards to one of the services in `iam-bff-keycloak`. Bearer
//! tokens are checked by [`security::authenticate`] before any handler runs,
//! except for the anonymous allow-list.

mod docs;
mod error;
mod middleware;
mod state;

pub mod routes;
pub mod security;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";
pub const SWAGGER_UI_PATH: &str = "/swagger-ui";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Self-service
        .route("/api/users/iam/register", post(routes::users::register))
        .route("/api/users/iam/login", post(routes::users::login))
        .route(
            "/api/users/iam/refresh-token",
            post(routes::users::refresh_token),
        )
        .route("/api/users/iam/logout", post(routes::users::logout))
        .route(
            "/api/users/iam/forgot-password",
            post(routes::users::forgot_password),
        )
        .route(
            "/api/users/iam/client-credentials",
            post(routes::users::client_credentials),
        )
        .route("/api/users/iam/me", get(routes::users::me))
        .route("/api/users/iam/introspect", post(routes::users::introspect))
        .route(
            "/api/users/iam/:username/profile",
            get(routes::users::get_profile).put(routes::users::update_profile),
        )
        .route(
            "/api/users/iam/:username/change-password",
            post(routes::users::change_password),
        )
        .route(
            "/api/users/iam/:username/verify-email",
            post(routes::users::verify_email),
        )
        // User administration
        .route("/api/admin/iam", get(routes::admin::list_users))
        .route(
            "/api/admin/iam/:username",
            get(routes::admin::get_user).delete(routes::admin::delete_user),
        )
        .route(
            "/api/admin/iam/:username/roles/:role",
            post(routes::admin::assign_role).delete(routes::admin::remove_role),
        )
        .route(
            "/api/admin/iam/:username/disable",
            post(routes::admin::disable_user),
        )
        .route(
            "/api/admin/iam/:username/enable",
            post(routes::admin::enable_user),
        )
        // Service clients
        .route(
            "/api/iam/clients",
            get(routes::clients::list_clients).post(routes::clients::create_client),
        )
        .route(
            "/api/iam/clients/scopes/:scope_name/check",
            get(routes::clients::check_scope),
        )
        .route(
            "/api/iam/clients/:id",
            get(routes::clients::get_client)
                .put(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        )
        .route(
            "/api/iam/clients/:id/secret",
            get(routes::clients::get_secret).post(routes::clients::regenerate_secret),
        )
        .route("/api/iam/token", post(routes::token::issue_token))
        .merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_PATH, ApiDoc::openapi()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            security::authenticate,
        ))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
