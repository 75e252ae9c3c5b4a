use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::users::register,
        crate::routes::users::login,
        crate::routes::users::refresh_token,
        crate::routes::users::logout,
        crate::routes::users::forgot_password,
        crate::routes::users::client_credentials,
        crate::routes::users::me,
        crate::routes::users::get_profile,
        crate::routes::users::update_profile,
        crate::routes::users::change_password,
        crate::routes::users::verify_email,
        crate::routes::users::introspect,
        crate::routes::admin::list_users,
        crate::routes::admin::get_user,
        crate::routes::admin::delete_user,
        crate::routes::admin::assign_role,
        crate::routes::admin::remove_role,
        crate::routes::admin::disable_user,
        crate::routes::admin::enable_user,
        crate::routes::clients::create_client,
        crate::routes::clients::list_clients,
        crate::routes::clients::get_client,
        crate::routes::clients::update_client,
        crate::routes::clients::delete_client,
        crate::routes::clients::regenerate_secret,
        crate::routes::clients::get_secret,
        crate::routes::clients::check_scope,
        crate::routes::token::issue_token
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            iam_bff_keycloak::types::RegisterRequest,
            iam_bff_keycloak::types::LoginRequest,
            iam_bff_keycloak::types::RefreshTokenRequest,
            iam_bff_keycloak::types::ResetPasswordRequest,
            iam_bff_keycloak::types::ChangePasswordRequest,
            iam_bff_keycloak::types::UpdateUserProfileRequest,
            iam_bff_keycloak::types::TokenRequest,
            iam_bff_keycloak::types::ClientRequest,
            iam_bff_keycloak::types::TokenResponse,
            iam_bff_keycloak::types::IntrospectionResponse,
            iam_bff_keycloak::types::UserRepresentation,
            iam_bff_keycloak::types::ClientResponse,
            iam_bff_keycloak::types::ClientSecret,
            iam_bff_keycloak::types::UserProfileResponse
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Users", description = "Self-service registration, sessions and profile"),
        (name = "Admin", description = "User administration and realm roles"),
        (name = "Clients", description = "Confidential service clients and their tokens")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("JWT".to_string());
        }

        components
            .security_schemes
            .insert("bearerAuth".to_string(), scheme);
    }
}
