//! Token grants, logout and introspection against the application realm.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::KeycloakClient;
use crate::error::{IamError, IamResult};
use crate::types::{IntrospectionResponse, LoginRequest, TokenRequest, TokenResponse};

#[derive(Clone)]
pub struct SessionService {
    keycloak: Arc<KeycloakClient>,
}

impl SessionService {
    pub fn new(keycloak: Arc<KeycloakClient>) -> Self {
        Self { keycloak }
    }

    pub async fn login(&self, request: &LoginRequest) -> IamResult<TokenResponse> {
        let username = request.username.as_str();
        let tokens = self
            .password_grant(username, &request.password)
            .await
            .inspect_err(|error| warn!(username, error = %error, "login failed"))?;

        info!(username, "user logged in");
        Ok(tokens)
    }

    /// Password grant with the service client. Also used to confirm a user's
    /// current password.
    pub async fn password_grant(&self, username: &str, password: &str) -> IamResult<TokenResponse> {
        let settings = self.keycloak.settings();
        self.keycloak
            .grant(&[
                ("grant_type", "password"),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", self.keycloak.client_secret()),
                ("username", username),
                ("password", password),
            ])
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> IamResult<TokenResponse> {
        if refresh_token.is_empty() {
            return Err(IamError::InvalidCredentials);
        }

        let settings = self.keycloak.settings();
        let tokens = self
            .keycloak
            .grant(&[
                ("grant_type", "refresh_token"),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", self.keycloak.client_secret()),
                ("refresh_token", refresh_token),
            ])
            .await
            .inspect_err(|error| warn!(error = %error, "token refresh failed"))?;

        info!("token refreshed");
        Ok(tokens)
    }

    pub async fn logout(&self, refresh_token: &str) -> IamResult<()> {
        let settings = self.keycloak.settings();
        self.keycloak
            .oidc_form(
                "logout",
                &[
                    ("client_id", settings.client_id.as_str()),
                    ("client_secret", self.keycloak.client_secret()),
                    ("refresh_token", refresh_token),
                ],
            )
            .await
            .inspect_err(|error| warn!(error = %error, "logout failed"))?;

        info!("session logged out");
        Ok(())
    }

    /// Client-credentials grant for the configured service client.
    pub async fn client_credentials(&self) -> IamResult<TokenResponse> {
        let settings = self.keycloak.settings();
        self.service_login(&TokenRequest {
            client_id: settings.client_id.clone(),
            client_secret: self.keycloak.client_secret().to_string(),
        })
        .await
    }

    /// Client-credentials grant with caller-supplied credentials.
    pub async fn service_login(&self, request: &TokenRequest) -> IamResult<TokenResponse> {
        let client_id = request.client_id.as_str();
        let tokens = self
            .keycloak
            .grant(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", request.client_secret.as_str()),
            ])
            .await
            .inspect_err(|error| warn!(client_id, error = %error, "client credentials grant failed"))?;

        info!(client_id, "service client authenticated");
        Ok(tokens)
    }

    pub async fn introspect(&self, token: &str) -> IamResult<IntrospectionResponse> {
        let settings = self.keycloak.settings();
        let response = self
            .keycloak
            .oidc_form(
                "token/introspect",
                &[
                    ("client_id", settings.client_id.as_str()),
                    ("client_secret", self.keycloak.client_secret()),
                    ("token", token),
                ],
            )
            .await?;

        let introspection = response.json::<IntrospectionResponse>().await?;
        info!(active = introspection.active, "token introspected");
        Ok(introspection)
    }
}
