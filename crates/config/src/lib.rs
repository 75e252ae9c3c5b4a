use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "iam-bff.toml",
    "config/iam-bff.toml",
    "crates/config/iam-bff.toml",
    "../iam-bff.toml",
    "../config/iam-bff.toml",
];

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub keycloak: KeycloakConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Copy of the configuration with credentials blanked out, safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.keycloak.client_secret.is_some() {
            copy.keycloak.client_secret = Some(REDACTED.to_string());
        }
        if !copy.keycloak.admin_password.is_empty() {
            copy.keycloak.admin_password = REDACTED.to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8081,
        }
    }
}

/// Connection and credential settings for the Keycloak server the service fronts.
///
/// ```
/// use iam_bff_config::KeycloakConfig;
///
/// let keycloak = KeycloakConfig::default();
/// assert_eq!(keycloak.admin_client_id, "admin-cli");
/// assert_eq!(keycloak.request_timeout_seconds, 15);
/// assert!(keycloak.admin_token_cache);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    pub server_url: String,
    pub realm: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
    #[serde(default = "KeycloakConfig::default_admin_client_id")]
    pub admin_client_id: String,
    #[serde(default = "KeycloakConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "KeycloakConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "KeycloakConfig::default_token_cache")]
    pub admin_token_cache: bool,
    #[serde(default = "KeycloakConfig::default_refresh_skew")]
    pub admin_token_refresh_skew_seconds: u64,
    #[serde(default = "KeycloakConfig::default_token_ttl")]
    pub admin_token_default_ttl_seconds: u64,
}

impl KeycloakConfig {
    fn default_admin_client_id() -> String {
        "admin-cli".to_string()
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_request_timeout() -> u64 {
        15
    }

    const fn default_token_cache() -> bool {
        true
    }

    const fn default_refresh_skew() -> u64 {
        30
    }

    const fn default_token_ttl() -> u64 {
        60
    }
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            realm: "master".to_string(),
            client_id: "iam-bff".to_string(),
            client_secret: None,
            admin_username: "admin".to_string(),
            admin_password: String::new(),
            admin_client_id: Self::default_admin_client_id(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            request_timeout_seconds: Self::default_request_timeout(),
            admin_token_cache: Self::default_token_cache(),
            admin_token_refresh_skew_seconds: Self::default_refresh_skew(),
            admin_token_default_ttl_seconds: Self::default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "SecurityConfig::default_jwks_cache")]
    pub jwks_cache_seconds: u64,
    #[serde(default = "SecurityConfig::default_leeway")]
    pub leeway_seconds: u64,
    /// Accepted `aud` values. Empty disables the audience check.
    #[serde(default)]
    pub audience: Vec<String>,
}

impl SecurityConfig {
    const fn default_jwks_cache() -> u64 {
        300
    }

    const fn default_leeway() -> u64 {
        30
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwks_cache_seconds: Self::default_jwks_cache(),
            leeway_seconds: Self::default_leeway(),
            audience: Vec::new(),
        }
    }
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use iam_bff_config::load;
///
/// std::env::remove_var("IAM_BFF_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.keycloak.realm.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();
    let keycloak = &defaults.keycloak;
    let security = &defaults.security;

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("keycloak.server_url", keycloak.server_url.clone())?
        .set_default("keycloak.realm", keycloak.realm.clone())?
        .set_default("keycloak.client_id", keycloak.client_id.clone())?
        .set_default("keycloak.admin_username", keycloak.admin_username.clone())?
        .set_default("keycloak.admin_password", keycloak.admin_password.clone())?
        .set_default("keycloak.admin_client_id", keycloak.admin_client_id.clone())?
        .set_default(
            "keycloak.connect_timeout_seconds",
            as_i64(keycloak.connect_timeout_seconds),
        )?
        .set_default(
            "keycloak.request_timeout_seconds",
            as_i64(keycloak.request_timeout_seconds),
        )?
        .set_default("keycloak.admin_token_cache", keycloak.admin_token_cache)?
        .set_default(
            "keycloak.admin_token_refresh_skew_seconds",
            as_i64(keycloak.admin_token_refresh_skew_seconds),
        )?
        .set_default(
            "keycloak.admin_token_default_ttl_seconds",
            as_i64(keycloak.admin_token_default_ttl_seconds),
        )?
        .set_default("security.jwks_cache_seconds", as_i64(security.jwks_cache_seconds))?
        .set_default("security.leeway_seconds", as_i64(security.leeway_seconds))?;

    let environment_overrides = config::Environment::with_prefix("IAM_BFF")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("security.audience")
        .try_parsing(true);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("IAM_BFF_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via IAM_BFF_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    let trimmed = config.keycloak.server_url.trim_end_matches('/').len();
    config.keycloak.server_url.truncate(trimmed);

    debug!(config = ?config.redacted(), "loaded service configuration");
    Ok(config)
}
