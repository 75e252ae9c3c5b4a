use std::sync::Arc;

use iam_bff_keycloak::{
    AccountService, ClientService, IamServices, JwksVerifier, PasswordService, ProfileService,
    RoleService, SessionService,
};

#[derive(Clone)]
pub struct AppState {
    services: Arc<IamServices>,
}

impl AppState {
    pub fn new(services: IamServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn accounts(&self) -> &AccountService {
        &self.services.accounts
    }

    pub fn sessions(&self) -> &SessionService {
        &self.services.sessions
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.services.passwords
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.services.profiles
    }

    pub fn roles(&self) -> &RoleService {
        &self.services.roles
    }

    pub fn clients(&self) -> &ClientService {
        &self.services.clients
    }

    pub fn verifier(&self) -> &JwksVerifier {
        &self.services.verifier
    }
}
