//! Registration and account administration.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::client::{segment, KeycloakClient};
use crate::error::{IamError, IamResult};
use crate::types::requests::{EnabledFlag, NewUser, PasswordCredential};
use crate::types::RegisterRequest;

#[derive(Clone)]
pub struct AccountService {
    keycloak: Arc<KeycloakClient>,
}

impl AccountService {
    pub fn new(keycloak: Arc<KeycloakClient>) -> Self {
        Self { keycloak }
    }

    /// Create the user, resolve its id, then set its password. A failed
    /// password step deletes the user again.
    pub async fn register(&self, request: &RegisterRequest) -> IamResult<()> {
        validate_registration(request)?;
        let username = request.username.as_str();

        self.keycloak
            .admin_call(
                Method::POST,
                "users",
                Some(&NewUser::from(request)),
                &format!("user {username}"),
            )
            .await
            .inspect_err(|error| warn!(username, error = %error, "user creation failed"))?;

        let user_id = match self.keycloak.user_id(username).await {
            Ok(id) => id,
            Err(cause) => {
                error!(username, error = %cause, "created user could not be resolved");
                return Err(IamError::partial("lookup", false, &cause));
            }
        };

        let credential = PasswordCredential::permanent(&request.password);
        let password_path = format!("users/{}/reset-password", segment(&user_id));
        if let Err(cause) = self
            .keycloak
            .admin_call(
                Method::PUT,
                &password_path,
                Some(&credential),
                &format!("user {username}"),
            )
            .await
        {
            warn!(username, error = %cause, "setting initial password failed, removing user");
            let rolled_back = match self.delete_by_id(&user_id, username).await {
                Ok(()) => true,
                Err(delete_error) => {
                    error!(
                        username,
                        user_id = %user_id,
                        error = %delete_error,
                        "compensating delete failed, user left without password"
                    );
                    false
                }
            };
            return Err(IamError::partial("set-password", rolled_back, &cause));
        }

        info!(username, "user registered");
        Ok(())
    }

    pub async fn set_enabled(&self, username: &str, enabled: bool) -> IamResult<()> {
        let user_id = self.keycloak.user_id(username).await?;
        self.keycloak
            .admin_call(
                Method::PUT,
                &format!("users/{}", segment(&user_id)),
                Some(&EnabledFlag { enabled }),
                &format!("user {username}"),
            )
            .await
            .inspect_err(|error| warn!(username, enabled, error = %error, "account toggle failed"))?;

        info!(username, enabled, "account state changed");
        Ok(())
    }

    pub async fn delete(&self, username: &str) -> IamResult<()> {
        let user_id = self.keycloak.user_id(username).await?;
        self.delete_by_id(&user_id, username)
            .await
            .inspect_err(|error| warn!(username, error = %error, "account deletion failed"))?;

        info!(username, "account deleted");
        Ok(())
    }

    async fn delete_by_id(&self, user_id: &str, username: &str) -> IamResult<()> {
        self.keycloak
            .admin_call::<Value>(
                Method::DELETE,
                &format!("users/{}", segment(user_id)),
                None,
                &format!("user {username}"),
            )
            .await
    }
}

fn validate_registration(request: &RegisterRequest) -> IamResult<()> {
    if request.username.trim().is_empty() {
        return Err(IamError::BadRequest("username must not be empty".into()));
    }
    if request.password.is_empty() {
        return Err(IamError::BadRequest("password must not be empty".into()));
    }
    Ok(())
}
