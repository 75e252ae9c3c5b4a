//! Profile reads and updates, verification mail and user queries.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{segment, KeycloakClient};
use crate::error::IamResult;
use crate::types::{UpdateUserProfileRequest, UserPage, UserRepresentation};

#[derive(Clone)]
pub struct ProfileService {
    keycloak: Arc<KeycloakClient>,
}

impl ProfileService {
    pub fn new(keycloak: Arc<KeycloakClient>) -> Self {
        Self { keycloak }
    }

    pub async fn profile(&self, username: &str) -> IamResult<UserRepresentation> {
        let user_id = self.keycloak.user_id(username).await?;
        self.keycloak
            .admin_get(
                &format!("users/{}", segment(&user_id)),
                &format!("user {username}"),
            )
            .await
    }

    pub async fn update_profile(
        &self,
        username: &str,
        update: &UpdateUserProfileRequest,
    ) -> IamResult<()> {
        let user_id = self.keycloak.user_id(username).await?;
        self.keycloak
            .admin_call(
                Method::PUT,
                &format!("users/{}", segment(&user_id)),
                Some(update),
                &format!("user {username}"),
            )
            .await
            .inspect_err(|error| warn!(username, error = %error, "profile update failed"))?;

        info!(username, "profile updated");
        Ok(())
    }

    pub async fn send_verification_email(&self, username: &str) -> IamResult<()> {
        let user_id = self.keycloak.user_id(username).await?;
        self.keycloak
            .admin_call::<Value>(
                Method::PUT,
                &format!("users/{}/send-verify-email", segment(&user_id)),
                None,
                &format!("user {username}"),
            )
            .await
            .inspect_err(|error| warn!(username, error = %error, "verification email failed"))?;

        info!(username, "verification email sent");
        Ok(())
    }

    pub async fn list_users(&self, page: &UserPage) -> IamResult<Vec<UserRepresentation>> {
        let (first, max) = page.bounds();
        let users: Vec<UserRepresentation> = self
            .keycloak
            .admin_get(&format!("users?first={first}&max={max}"), "users")
            .await?;

        info!(first, max, count = users.len(), "listed users");
        Ok(users)
    }

    pub async fn user(&self, username: &str) -> IamResult<UserRepresentation> {
        self.keycloak.find_user(username).await
    }
}
