//! Inbound request bodies and the outbound admin payloads built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

fn default_enabled() -> bool {
    true
}

/// Self-service registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Forgot-password flow: the user receives an actions email and the new
/// password is set straight away.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub username: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: Option<String>,
    pub new_password: String,
}

/// Only these three fields are forwarded on a profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Caller-supplied service client credentials for `/api/iam/token`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IntrospectQuery {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserPage {
    /// Offset of the first user returned.
    pub first: Option<u32>,
    /// Page size.
    pub max: Option<u32>,
}

impl UserPage {
    pub const DEFAULT_FIRST: u32 = 0;
    pub const DEFAULT_MAX: u32 = 20;

    pub fn bounds(&self) -> (u32, u32) {
        (
            self.first.unwrap_or(Self::DEFAULT_FIRST),
            self.max.unwrap_or(Self::DEFAULT_MAX),
        )
    }
}

/// Inbound client definition. Protocol, authenticator type and the flow flags
/// are accepted but replaced by the server-side client policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_authenticator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_accounts_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_flow_enabled: Option<bool>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// User creation payload sent to the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<&'a str>,
    pub enabled: bool,
}

impl<'a> From<&'a RegisterRequest> for NewUser<'a> {
    fn from(request: &'a RegisterRequest) -> Self {
        Self {
            username: &request.username,
            email: &request.email,
            email_verified: request.email_verified,
            first_name: request.first_name.as_deref(),
            last_name: request.last_name.as_deref(),
            enabled: request.enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PasswordCredential<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
    pub temporary: bool,
}

impl<'a> PasswordCredential<'a> {
    pub fn permanent(value: &'a str) -> Self {
        Self {
            kind: "password",
            value,
            temporary: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EnabledFlag {
    pub enabled: bool,
}

pub type ClientPayload = serde_json::Map<String, Value>;
