//! Keycloak forwarding layer for the IAM backend-for-frontend.
//!
//! - **client**: shared HTTP client, realm URLs and the admin request helper
//! - **token**: admin credential provider with expiry-aware caching
//! - **jwks**: bearer token verification against the realm signing keys
//! - **services**: one service per feature area
//! - **policy**: forced fields for client definitions

pub mod client;
pub mod error;
pub mod jwks;
pub mod policy;
pub mod services;
pub mod token;
pub mod types;

use std::sync::Arc;

pub use client::KeycloakClient;
pub use error::{IamError, IamResult};
pub use jwks::{Claims, JwksVerifier, VerifyError};
pub use services::{
    AccountService, ClientService, PasswordService, ProfileService, RoleService, SessionService,
};
pub use token::{AdminTokenProvider, CachedAdminTokenProvider};

use iam_bff_config::AppConfig;

/// Every forwarding service wired to one shared [`KeycloakClient`].
#[derive(Clone)]
pub struct IamServices {
    pub keycloak: Arc<KeycloakClient>,
    pub accounts: AccountService,
    pub sessions: SessionService,
    pub passwords: PasswordService,
    pub profiles: ProfileService,
    pub roles: RoleService,
    pub clients: ClientService,
    pub verifier: Arc<JwksVerifier>,
}

impl IamServices {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let keycloak = Arc::new(KeycloakClient::new(&config.keycloak)?);
        Ok(Self::with_client(keycloak, config))
    }

    pub fn with_client(keycloak: Arc<KeycloakClient>, config: &AppConfig) -> Self {
        let sessions = SessionService::new(keycloak.clone());
        let verifier = Arc::new(JwksVerifier::new(
            keycloak.http().clone(),
            keycloak.issuer(),
            &config.security,
        ));

        Self {
            accounts: AccountService::new(keycloak.clone()),
            passwords: PasswordService::new(keycloak.clone(), sessions.clone()),
            profiles: ProfileService::new(keycloak.clone()),
            roles: RoleService::new(keycloak.clone()),
            clients: ClientService::new(keycloak.clone()),
            sessions,
            verifier,
            keycloak,
        }
    }
}
