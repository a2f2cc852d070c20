//! OIDC discovery + JWKS key resolution, grounded on the source's
//! `openidclient.Config` and `jwks_client.go`'s `PublicKeyGetter`, but
//! caching every resolved `kid` instead of a single global key.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("discovery document fetch failed: {0}")]
    DiscoveryFetch(String),
    #[error("jwks fetch failed: {0}")]
    JwksFetch(String),
    #[error("no key found for kid {0:?}")]
    UnknownKid(String),
    #[error("token header missing kid")]
    MissingKid,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<JsonWebKey>,
}

#[derive(Debug, Deserialize)]
struct JsonWebKey {
    kid: String,
    n: String,
    e: String,
    #[serde(default)]
    kty: String,
}

/// Resolves a `kid` to a `DecodingKey` via OIDC discovery + JWKS, caching
/// keys in memory (spec §4.8 step 3).
pub struct JwksKeyResolver {
    authority: String,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, Arc<DecodingKey>>>,
    discovered_issuer: RwLock<Option<String>>,
    // Serializes cache-miss fetches so concurrent misses for the same (or
    // different) kid collapse into one JWKS round-trip (spec §5: "misses
    // trigger a synchronous fetch serialized against concurrent misses for
    // the same kid").
    fetch_lock: tokio::sync::Mutex<()>,
}

impl JwksKeyResolver {
    pub fn new(authority: String, client: reqwest::Client) -> Self {
        Self {
            authority,
            client,
            cache: RwLock::new(HashMap::new()),
            discovered_issuer: RwLock::new(None),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn issuer(&self) -> Result<String, JwksError> {
        if let Some(issuer) = self.discovered_issuer.read().await.clone() {
            return Ok(issuer);
        }
        let doc = self.discover().await?;
        let issuer = doc.issuer.clone();
        *self.discovered_issuer.write().await = Some(issuer.clone());
        Ok(issuer)
    }

    async fn discover(&self) -> Result<DiscoveryDocument, JwksError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.authority.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| JwksError::DiscoveryFetch(err.to_string()))?;
        response
            .json::<DiscoveryDocument>()
            .await
            .map_err(|err| JwksError::DiscoveryFetch(err.to_string()))
    }

    pub async fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, JwksError> {
        if let Some(key) = self.cache.read().await.get(kid).cloned() {
            return Ok(key);
        }

        let _fetch_guard = self.fetch_lock.lock().await;
        // Re-check: another task may have populated this kid while we
        // waited for the fetch lock.
        if let Some(key) = self.cache.read().await.get(kid).cloned() {
            return Ok(key);
        }

        let doc = self.discover().await?;
        let jwks: Jwks = self
            .client
            .get(&doc.jwks_uri)
            .send()
            .await
            .map_err(|err| JwksError::JwksFetch(err.to_string()))?
            .json()
            .await
            .map_err(|err| JwksError::JwksFetch(err.to_string()))?;

        let mut cache = self.cache.write().await;
        for key in &jwks.keys {
            if key.kty != "RSA" && !key.kty.is_empty() {
                continue;
            }
            if let Ok(decoding_key) = DecodingKey::from_rsa_components(&key.n, &key.e) {
                cache.insert(key.kid.clone(), Arc::new(decoding_key));
            }
        }

        cache
            .get(kid)
            .cloned()
            .ok_or_else(|| JwksError::UnknownKid(kid.to_string()))
    }
}

pub fn default_validation(issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    // jsonwebtoken defaults `validate_nbf` to false; a not-yet-valid token
    // must be rejected (spec §4.8 step 4).
    validation.validate_nbf = true;
    validation
}
