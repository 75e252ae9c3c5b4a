//! Admin credential acquisition.
//!
//! The admin API is authorised with a bearer token obtained through a password
//! grant against the master realm. [`CachedAdminTokenProvider`] keeps the last
//! token until it comes within the refresh skew of its expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, ClientId, RequestTokenError, ResourceOwnerPassword,
    ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use iam_bff_config::KeycloakConfig;

use crate::error::{IamError, IamResult};

/// Supplies bearer tokens for the identity provider's admin API.
#[async_trait]
pub trait AdminTokenProvider: Send + Sync {
    async fn admin_token(&self) -> IamResult<String>;

    /// Drop the stored token if it is still `rejected`, so the next call
    /// fetches a new one. A token already replaced by another caller is kept.
    async fn invalidate(&self, rejected: &str);

    /// Whether tokens handed out may have been issued for an earlier call.
    fn reuses_tokens(&self) -> bool;
}

struct CachedToken {
    secret: String,
    expires_at: Instant,
}

pub struct CachedAdminTokenProvider {
    oauth: BasicClient,
    http: reqwest::Client,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
    cache_enabled: bool,
    refresh_skew: Duration,
    default_ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
    fetches: AtomicU64,
}

impl CachedAdminTokenProvider {
    pub fn new(config: &KeycloakConfig, http: reqwest::Client) -> anyhow::Result<Self> {
        let base = config.server_url.trim_end_matches('/');
        let auth_url = AuthUrl::new(format!(
            "{base}/realms/master/protocol/openid-connect/auth"
        ))
        .context("invalid keycloak server url")?;
        let token_url = TokenUrl::new(format!(
            "{base}/realms/master/protocol/openid-connect/token"
        ))
        .context("invalid keycloak server url")?;

        let oauth = BasicClient::new(
            ClientId::new(config.admin_client_id.clone()),
            None,
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            oauth,
            http,
            username: ResourceOwnerUsername::new(config.admin_username.clone()),
            password: ResourceOwnerPassword::new(config.admin_password.clone()),
            cache_enabled: config.admin_token_cache,
            refresh_skew: Duration::from_secs(config.admin_token_refresh_skew_seconds),
            default_ttl: Duration::from_secs(config.admin_token_default_ttl_seconds),
            cached: Mutex::new(None),
            fetches: AtomicU64::new(0),
        })
    }

    /// Number of token-endpoint round trips made so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn fetch(&self) -> IamResult<CachedToken> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let response: BasicTokenResponse = self
            .oauth
            .exchange_password(&self.username, &self.password)
            .request_async(|request| execute(&self.http, request))
            .await
            .map_err(map_token_error)?;

        let ttl = response.expires_in().unwrap_or(self.default_ttl);
        debug!(ttl_seconds = ttl.as_secs(), "fetched admin token");

        Ok(CachedToken {
            secret: response.access_token().secret().clone(),
            expires_at: Instant::now() + ttl,
        })
    }
}

#[async_trait]
impl AdminTokenProvider for CachedAdminTokenProvider {
    async fn admin_token(&self) -> IamResult<String> {
        if !self.cache_enabled {
            return Ok(self.fetch().await?.secret);
        }

        // Held across the fetch so concurrent callers wait for one round trip.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + self.refresh_skew < token.expires_at {
                return Ok(token.secret.clone());
            }
        }

        let token = self.fetch().await?;
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }

    async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().is_some_and(|token| token.secret == rejected) {
            *cached = None;
            info!("admin token invalidated");
        }
    }

    fn reuses_tokens(&self) -> bool {
        self.cache_enabled
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed token request: {0}")]
    Malformed(String),
}

/// Runs an oauth2 token request on the shared reqwest client so the admin
/// grant obeys the configured timeouts.
async fn execute(
    http: &reqwest::Client,
    request: oauth2::HttpRequest,
) -> Result<oauth2::HttpResponse, TransportError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|error| TransportError::Malformed(error.to_string()))?;

    let mut builder = http.request(method, request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.body(request.body).send().await?;

    let status_code = oauth2::http::StatusCode::from_u16(response.status().as_u16())
        .map_err(|error| TransportError::Malformed(error.to_string()))?;

    let mut headers = oauth2::http::HeaderMap::new();
    for (name, value) in response.headers() {
        let name = oauth2::http::HeaderName::from_bytes(name.as_str().as_bytes());
        let value = oauth2::http::HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }

    let body = response.bytes().await?.to_vec();

    Ok(oauth2::HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn map_token_error(
    error: RequestTokenError<TransportError, oauth2::basic::BasicErrorResponse>,
) -> IamError {
    match error {
        RequestTokenError::ServerResponse(response) => match response.error() {
            BasicErrorResponseType::InvalidGrant
            | BasicErrorResponseType::InvalidClient
            | BasicErrorResponseType::UnauthorizedClient => {
                warn!("admin credentials rejected by identity provider");
                IamError::InvalidCredentials
            }
            other => IamError::Upstream {
                status: 400,
                message: other.to_string(),
            },
        },
        RequestTokenError::Request(error) => {
            warn!(error = %error, "admin token request failed");
            IamError::UpstreamUnavailable(error.to_string())
        }
        RequestTokenError::Parse(error, _) => IamError::InvalidResponse(error.to_string()),
        RequestTokenError::Other(message) => IamError::Upstream {
            status: 502,
            message,
        },
    }
}
