//! Client registrations, secrets and scope lookups.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{segment, KeycloakClient};
use crate::error::IamResult;
use crate::policy::{client_payload, ClientWrite};
use crate::types::responses::ClientScope;
use crate::types::{ClientRequest, ClientResponse, ClientSecret};

#[derive(Clone)]
pub struct ClientService {
    keycloak: Arc<KeycloakClient>,
}

impl ClientService {
    pub fn new(keycloak: Arc<KeycloakClient>) -> Self {
        Self { keycloak }
    }

    pub async fn create(&self, request: &ClientRequest) -> IamResult<()> {
        let client_id = request.client_id.as_str();
        let payload = client_payload(request, ClientWrite::Create)?;

        self.keycloak
            .admin_call(
                Method::POST,
                "clients",
                Some(&payload),
                &format!("client {client_id}"),
            )
            .await
            .inspect_err(|error| warn!(client_id, error = %error, "client creation failed"))?;

        info!(client_id, "client created");
        Ok(())
    }

    pub async fn update(&self, id: &str, request: &ClientRequest) -> IamResult<()> {
        let payload = client_payload(request, ClientWrite::Update)?;

        self.keycloak
            .admin_call(
                Method::PUT,
                &format!("clients/{}", segment(id)),
                Some(&payload),
                &format!("client {id}"),
            )
            .await
            .inspect_err(|error| warn!(id, error = %error, "client update failed"))?;

        info!(id, client_id = %request.client_id, "client updated");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> IamResult<ClientResponse> {
        self.keycloak
            .admin_get(&format!("clients/{}", segment(id)), &format!("client {id}"))
            .await
    }

    pub async fn list(&self) -> IamResult<Vec<ClientResponse>> {
        self.keycloak.admin_get("clients", "clients").await
    }

    pub async fn delete(&self, id: &str) -> IamResult<()> {
        self.keycloak
            .admin_call::<Value>(
                Method::DELETE,
                &format!("clients/{}", segment(id)),
                None,
                &format!("client {id}"),
            )
            .await
            .inspect_err(|error| warn!(id, error = %error, "client deletion failed"))?;

        info!(id, "client deleted");
        Ok(())
    }

    /// Issue a new secret. The previous one stops working.
    pub async fn regenerate_secret(&self, id: &str) -> IamResult<ClientSecret> {
        let secret = self
            .keycloak
            .admin_json::<ClientSecret, Value>(
                Method::POST,
                &format!("clients/{}/client-secret", segment(id)),
                None,
                &format!("client {id}"),
            )
            .await?;

        info!(id, "client secret regenerated");
        Ok(secret)
    }

    pub async fn secret(&self, id: &str) -> IamResult<ClientSecret> {
        self.keycloak
            .admin_get(
                &format!("clients/{}/client-secret", segment(id)),
                &format!("client {id}"),
            )
            .await
    }

    pub async fn scope_exists(&self, scope_name: &str) -> IamResult<bool> {
        let scopes: Vec<ClientScope> = self
            .keycloak
            .admin_get("client-scopes", "client scopes")
            .await?;

        Ok(scopes.iter().any(|scope| scope.name == scope_name))
    }
}
