//! Forwarding services. Each one turns an inbound operation into one or more
//! sequential admin or OIDC calls on the shared [`KeycloakClient`].
//!
//! [`KeycloakClient`]: crate::KeycloakClient

pub mod accounts;
pub mod clients;
pub mod passwords;
pub mod profiles;
pub mod roles;
pub mod sessions;

pub use accounts::AccountService;
pub use clients::ClientService;
pub use passwords::PasswordService;
pub use profiles::ProfileService;
pub use roles::RoleService;
pub use sessions::SessionService;
