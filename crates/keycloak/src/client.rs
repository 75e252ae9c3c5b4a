use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use iam_bff_config::KeycloakConfig;

use crate::error::{IamError, IamResult};
use crate::token::{AdminTokenProvider, CachedAdminTokenProvider};
use crate::types::{TokenResponse, UserRepresentation};

/// Shared handle on the identity provider: one HTTP client, the realm
/// coordinates, and the admin credential source.
pub struct KeycloakClient {
    http: reqwest::Client,
    settings: KeycloakConfig,
    tokens: Arc<dyn AdminTokenProvider>,
}

impl KeycloakClient {
    pub fn new(config: &KeycloakConfig) -> anyhow::Result<Self> {
        let http = build_http_client(config)?;
        let tokens = CachedAdminTokenProvider::new(config, http.clone())?;
        Ok(Self::with_token_provider(config, http, Arc::new(tokens)))
    }

    pub fn with_token_provider(
        config: &KeycloakConfig,
        http: reqwest::Client,
        tokens: Arc<dyn AdminTokenProvider>,
    ) -> Self {
        let mut settings = config.clone();
        let trimmed = settings.server_url.trim_end_matches('/').len();
        settings.server_url.truncate(trimmed);

        Self {
            http,
            settings,
            tokens,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn settings(&self) -> &KeycloakConfig {
        &self.settings
    }

    pub fn tokens(&self) -> &Arc<dyn AdminTokenProvider> {
        &self.tokens
    }

    /// `{server}/realms/{realm}`, the `iss` of tokens minted for the realm.
    pub fn issuer(&self) -> String {
        format!(
            "{}/realms/{}",
            self.settings.server_url,
            urlencoding::encode(&self.settings.realm)
        )
    }

    pub fn oidc_url(&self, endpoint: &str) -> String {
        format!("{}/protocol/openid-connect/{endpoint}", self.issuer())
    }

    /// Admin API URL for the configured realm. `path` must already have its
    /// dynamic segments encoded with [`segment`].
    pub fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/admin/realms/{}/{}",
            self.settings.server_url,
            urlencoding::encode(&self.settings.realm),
            path.trim_start_matches('/')
        )
    }

    pub fn client_secret(&self) -> &str {
        self.settings.client_secret.as_deref().unwrap_or_default()
    }

    /// Send an admin request built by `build`, authorised with the admin token.
    ///
    /// A `401` answer to a reused token invalidates it and replays the request
    /// once with a fresh token. Non-success statuses map through
    /// [`IamError::from_status`] with `subject` naming the target.
    pub async fn send_admin<F>(&self, subject: &str, build: F) -> IamResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.tokens.admin_token().await?;
        let mut response = build(&self.http).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.tokens.reuses_tokens() {
            warn!(subject, "admin token rejected, retrying with a fresh token");
            self.tokens.invalidate(&token).await;
            let token = self.tokens.admin_token().await?;
            response = build(&self.http).bearer_auth(&token).send().await?;
        }

        ensure_success(response, subject).await
    }

    pub async fn admin_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        subject: &str,
    ) -> IamResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.admin_url(path);
        let response = self
            .send_admin(subject, |http| {
                let request = http.request(method.clone(), &url);
                match body {
                    Some(body) => request.json(body),
                    None => request,
                }
            })
            .await?;

        Ok(response.json::<T>().await?)
    }

    pub async fn admin_get<T: DeserializeOwned>(&self, path: &str, subject: &str) -> IamResult<T> {
        self.admin_json::<T, Value>(Method::GET, path, None, subject)
            .await
    }

    /// Admin call whose response body is ignored.
    pub async fn admin_call<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        subject: &str,
    ) -> IamResult<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.admin_url(path);
        self.send_admin(subject, |http| {
            let request = http.request(method.clone(), &url);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await?;
        Ok(())
    }

    /// Resolve a username to the provider's internal id.
    pub async fn find_user(&self, username: &str) -> IamResult<UserRepresentation> {
        if username.trim().is_empty() {
            return Err(IamError::BadRequest("username must not be empty".into()));
        }

        let path = format!(
            "users?username={}&exact=true",
            urlencoding::encode(username)
        );
        let subject = format!("user {username}");
        let users: Vec<UserRepresentation> = self.admin_get(&path, &subject).await?;

        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| IamError::NotFound(subject.clone()))?;
        debug!(username, id = ?user.id, "resolved user");
        Ok(user)
    }

    pub async fn user_id(&self, username: &str) -> IamResult<String> {
        let subject = format!("user {username}");
        self.find_user(username)
            .await?
            .id
            .ok_or_else(|| IamError::InvalidResponse(format!("{subject} has no id")))
    }

    /// POST a form to one of the realm's OpenID Connect endpoints.
    pub async fn oidc_form(&self, endpoint: &str, form: &[(&str, &str)]) -> IamResult<Response> {
        let response = self
            .http
            .post(self.oidc_url(endpoint))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(IamError::from_grant_status(status, &body))
    }

    /// Run a token grant against the application realm.
    pub async fn grant(&self, form: &[(&str, &str)]) -> IamResult<TokenResponse> {
        let response = self.oidc_form("token", form).await?;
        Ok(response.json::<TokenResponse>().await?)
    }
}

pub fn build_http_client(config: &KeycloakConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("iam-bff/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .build()
        .context("failed to build identity provider http client")
}

/// Percent-encode one dynamic path segment.
pub fn segment(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

async fn ensure_success(response: Response, subject: &str) -> IamResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(subject, status = status.as_u16(), body = %body, "identity provider rejected request");
    Err(IamError::from_status(status, &body, subject))
}
