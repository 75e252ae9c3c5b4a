use std::sync::Arc;

use reqwest::Method;
use tracing::{error, info, warn};

use crate::client::{segment, KeycloakClient};
use crate::error::{IamError, IamResult};
use crate::services::SessionService;
use crate::types::requests::PasswordCredential;
use crate::types::{ChangePasswordRequest, ResetPasswordRequest};

const UPDATE_PASSWORD_ACTION: &str = "UPDATE_PASSWORD";

#[derive(Clone)]
pub struct PasswordService {
    keycloak: Arc<KeycloakClient>,
    sessions: SessionService,
}

impl PasswordService {
    pub fn new(keycloak: Arc<KeycloakClient>, sessions: SessionService) -> Self {
        Self { keycloak, sessions }
    }

    /// Forgot-password: resolve the user, send the update-password actions
    /// email, then set the requested password.
    pub async fn forgot_password(&self, request: &ResetPasswordRequest) -> IamResult<()> {
        let username = request.username.as_str();
        if request.new_password.is_empty() {
            return Err(IamError::BadRequest("newPassword must not be empty".into()));
        }

        let user_id = self.keycloak.user_id(username).await?;
        let subject = format!("user {username}");

        self.keycloak
            .admin_call(
                Method::PUT,
                &format!("users/{}/execute-actions-email", segment(&user_id)),
                Some(&[UPDATE_PASSWORD_ACTION]),
                &subject,
            )
            .await
            .inspect_err(|error| warn!(username, error = %error, "actions email failed"))?;

        if let Err(cause) = self.set_password(&user_id, &request.new_password, &subject).await {
            error!(username, error = %cause, "password reset failed after actions email was sent");
            return Err(IamError::partial("reset-password", false, &cause));
        }

        info!(username, "password reset");
        Ok(())
    }

    /// Self-service change. A supplied `oldPassword` must grant a token first.
    pub async fn change_password(
        &self,
        username: &str,
        request: &ChangePasswordRequest,
    ) -> IamResult<()> {
        if request.new_password.is_empty() {
            return Err(IamError::BadRequest("newPassword must not be empty".into()));
        }

        if let Some(old_password) = request.old_password.as_deref() {
            self.sessions
                .password_grant(username, old_password)
                .await
                .inspect_err(|error| warn!(username, error = %error, "current password check failed"))?;
        }

        let user_id = self.keycloak.user_id(username).await?;
        self.set_password(&user_id, &request.new_password, &format!("user {username}"))
            .await
            .inspect_err(|error| warn!(username, error = %error, "password change failed"))?;

        info!(username, "password changed");
        Ok(())
    }

    async fn set_password(&self, user_id: &str, password: &str, subject: &str) -> IamResult<()> {
        self.keycloak
            .admin_call(
                Method::PUT,
                &format!("users/{}/reset-password", segment(user_id)),
                Some(&PasswordCredential::permanent(password)),
                subject,
            )
            .await
    }
}
