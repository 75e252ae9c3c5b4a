//! Bearer token verification against the realm's published signing keys.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use iam_bff_config::SecurityConfig;

const ACCEPTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid bearer token: {0}")]
    Invalid(String),
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

/// Claims the service reads from an access token. Everything else is kept in
/// `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Claims {
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    ttl: Duration,
    leeway: u64,
    audience: Vec<String>,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(
        http: reqwest::Client,
        issuer: impl Into<String>,
        security: &SecurityConfig,
    ) -> Self {
        let issuer = issuer.into();
        Self {
            http,
            jwks_url: format!("{issuer}/protocol/openid-connect/certs"),
            issuer,
            ttl: Duration::from_secs(security.jwks_cache_seconds),
            leeway: security.leeway_seconds,
            audience: security.audience.clone(),
            cache: RwLock::new(None),
        }
    }

    /// Verify signature, expiry and issuer of `token` and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header =
            decode_header(token).map_err(|error| VerifyError::Invalid(error.to_string()))?;

        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(VerifyError::Invalid(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = self.leeway;
        if self.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audience);
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|error| VerifyError::Invalid(error.to_string()))?;

        debug!(subject = ?data.claims.sub, "bearer token verified");
        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        let refreshed = if self.is_fresh().await {
            false
        } else {
            self.refresh().await?;
            true
        };

        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        // Unknown key id: the realm may have rotated its keys. A set fetched
        // just above is already current.
        if !refreshed {
            self.refresh().await?;
            if let Some(key) = self.cached_key(kid).await? {
                return Ok(key);
            }
        }

        Err(VerifyError::Invalid("token signed by an unknown key".into()))
    }

    async fn is_fresh(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|cached| cached.fetched_at.elapsed() < self.ttl)
    }

    async fn cached_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, VerifyError> {
        match self.cache.read().await.as_ref() {
            Some(cached) => select_key(&cached.keys, kid),
            None => Ok(None),
        }
    }

    async fn refresh(&self) -> Result<(), VerifyError> {
        let keys = self.fetch().await?;
        info!(count = keys.keys.len(), url = %self.jwks_url, "signing keys refreshed");
        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|error| {
                warn!(error = %error, url = %self.jwks_url, "failed to fetch signing keys");
                VerifyError::KeysUnavailable(error.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %self.jwks_url, "signing key endpoint failed");
            return Err(VerifyError::KeysUnavailable(format!(
                "signing key endpoint returned {status}"
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|error| VerifyError::KeysUnavailable(error.to_string()))
    }
}

fn select_key(keys: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, VerifyError> {
    let jwk = match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => {
            return Err(VerifyError::Invalid(
                "token has no key id and the realm publishes several keys".into(),
            ))
        }
    };

    jwk.map(DecodingKey::from_jwk)
        .transpose()
        .map_err(|error| VerifyError::Invalid(error.to_string()))
}
