//! Verification of identity-provider ID tokens.
//!
//! Tokens are RS256 JWTs issued by Firebase Authentication. The service never
//! issues tokens itself; it only checks the signature against the provider's
//! published keys and trusts the `sub` claim of a token that passes.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Public JWKs used to sign Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Minimum time between two signing-key fetches. Unknown key ids seen inside
/// this window are rejected without contacting the provider.
pub const MIN_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token format or signature")]
    InvalidToken,

    #[error("Token signed by an unknown key: {0}")]
    UnknownKey(String),

    #[error("Failed to fetch identity provider signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),

    #[error("Failed to read identity provider credentials: {0}")]
    Credentials(#[source] std::io::Error),

    #[error("Malformed identity provider credentials: {0}")]
    CredentialsFormat(#[from] serde_json::Error),
}

/// The verified caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, VerifierError>;
}

/// The subset of a Firebase service-account file this service reads.
#[derive(Debug, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
}

impl ServiceAccount {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VerifierError> {
        let raw = std::fs::read_to_string(path).map_err(VerifierError::Credentials)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub struct FirebaseVerifier {
    project_id: String,
    leeway_secs: u64,
    jwks_url: Option<String>,
    http: reqwest::Client,
    cache: RwLock<KeyCache>,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn refresh_allowed(&self) -> bool {
        self.fetched_at.is_none_or(|at| at.elapsed() >= MIN_KEY_REFRESH_INTERVAL)
    }
}

impl FirebaseVerifier {
    pub fn new(project_id: String, leeway_secs: u64) -> Self {
        Self {
            project_id,
            leeway_secs,
            jwks_url: Some(FIREBASE_JWKS_URL.to_string()),
            http: reqwest::Client::new(),
            cache: RwLock::new(KeyCache::default()),
        }
    }

    pub fn from_service_account(account: &ServiceAccount, leeway_secs: u64) -> Self {
        Self::new(account.project_id.clone(), leeway_secs)
    }

    /// Builds a verifier over a fixed key set that never contacts the network.
    pub fn with_keys(project_id: String, leeway_secs: u64, keys: HashMap<String, DecodingKey>) -> Self {
        Self {
            project_id,
            leeway_secs,
            jwks_url: None,
            http: reqwest::Client::new(),
            cache: RwLock::new(KeyCache { keys, fetched_at: None }),
        }
    }

    /// Points key refreshes at another JWKS endpoint.
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    fn validation(&self) -> Validation {
        let issuer = format!("{FIREBASE_ISSUER_PREFIX}{}", self.project_id);

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[&self.project_id]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
        validation.leeway = self.leeway_secs;
        validation
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifierError> {
        if let Some(key) = self.cache.read().await.keys.get(kid) {
            return Ok(key.clone());
        }

        // Refreshes are serialized by the write lock.
        let mut cache = self.cache.write().await;
        if let Some(key) = cache.keys.get(kid) {
            return Ok(key.clone());
        }

        let Some(url) = self.jwks_url.as_deref() else {
            return Err(VerifierError::UnknownKey(kid.to_string()));
        };
        if !cache.refresh_allowed() {
            tracing::debug!(kid = %kid, "Unknown signing key inside refresh cooldown");
            return Err(VerifierError::UnknownKey(kid.to_string()));
        }

        // Failed fetches count toward the cooldown as well.
        cache.fetched_at = Some(Instant::now());
        cache.keys = self.fetch_keys(url).await?;

        cache.keys.get(kid).cloned().ok_or_else(|| VerifierError::UnknownKey(kid.to_string()))
    }

    async fn fetch_keys(&self, url: &str) -> Result<HashMap<String, DecodingKey>, VerifierError> {
        let jwks = self.http.get(url).send().await?.error_for_status()?.json::<JwkSet>().await?;
        let fresh = keys_from_jwk_set(&jwks);
        tracing::info!(count = fresh.len(), "Fetched identity provider signing keys");

        Ok(fresh)
    }
}

/// Converts a JWK set into decoding keys indexed by key id. Keys without a
/// `kid` or that cannot be converted are skipped.
pub fn keys_from_jwk_set(jwks: &JwkSet) -> HashMap<String, DecodingKey> {
    jwks.keys
        .iter()
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone()?;
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, key)),
                Err(err) => {
                    tracing::warn!(kid = %kid, "Skipping unusable signing key: {}", err);
                    None
                },
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifierError> {
        let header = decode_header(token).map_err(|_| VerifierError::InvalidToken)?;
        if header.alg != Algorithm::RS256 {
            return Err(VerifierError::InvalidToken);
        }
        let kid = header.kid.ok_or(VerifierError::InvalidToken)?;

        let key = self.decoding_key(&kid).await?;
        let claims = decode::<IdTokenClaims>(token, &key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifierError::TokenExpired,
                _ => VerifierError::InvalidToken,
            })?;

        if claims.sub.is_empty() {
            return Err(VerifierError::InvalidToken);
        }

        Ok(Identity { subject_id: claims.sub, email: claims.email })
    }
}
