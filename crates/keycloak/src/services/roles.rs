use std::sync::Arc;

use reqwest::Method;
use tracing::{info, warn};

use crate::client::{segment, KeycloakClient};
use crate::error::IamResult;
use crate::types::RoleRepresentation;

#[derive(Clone)]
pub struct RoleService {
    keycloak: Arc<KeycloakClient>,
}

impl RoleService {
    pub fn new(keycloak: Arc<KeycloakClient>) -> Self {
        Self { keycloak }
    }

    pub async fn realm_role(&self, role: &str) -> IamResult<RoleRepresentation> {
        self.keycloak
            .admin_get(&format!("roles/{}", segment(role)), &format!("role {role}"))
            .await
    }

    pub async fn assign(&self, username: &str, role: &str) -> IamResult<()> {
        self.change_mapping(Method::POST, username, role).await?;
        info!(username, role, "realm role assigned");
        Ok(())
    }

    pub async fn remove(&self, username: &str, role: &str) -> IamResult<()> {
        self.change_mapping(Method::DELETE, username, role).await?;
        info!(username, role, "realm role removed");
        Ok(())
    }

    /// Resolve user and role before touching the mapping so an unknown role
    /// never reaches the role-mapping endpoint.
    async fn change_mapping(&self, method: Method, username: &str, role: &str) -> IamResult<()> {
        let user_id = self.keycloak.user_id(username).await?;
        let representation = self
            .realm_role(role)
            .await
            .inspect_err(|error| warn!(username, role, error = %error, "role lookup failed"))?;

        self.keycloak
            .admin_call(
                method,
                &format!("users/{}/role-mappings/realm", segment(&user_id)),
                Some(&[representation]),
                &format!("user {username}"),
            )
            .await
    }
}
