//! Service-account credentials and the OAuth2 JWT-bearer token exchange.
//!
//! A fresh access token is minted on every run; nothing is cached.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use monitor_core::error::{MonitorError, Result};
use monitor_core::settings::CredentialSource;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read-only scope for the Analytics Data API.
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// ── ServiceAccountKey ─────────────────────────────────────────────────────────

/// The fields of a service-account JSON key that the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    /// Load and validate a key from `source`.
    pub fn load(source: &CredentialSource) -> Result<Self> {
        let json = match source {
            CredentialSource::Inline(blob) => decode_inline(blob)?,
            CredentialSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                MonitorError::Credentials(format!(
                    "cannot read credential file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };
        Self::from_json(&json)
    }

    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| MonitorError::Credentials(format!("invalid service-account JSON: {}", e)))?;

        if key.client_email.trim().is_empty() {
            return Err(MonitorError::Credentials(
                "service account is missing client_email".to_string(),
            ));
        }
        if key.private_key.trim().is_empty() {
            return Err(MonitorError::Credentials(
                "service account is missing private_key".to_string(),
            ));
        }
        Ok(key)
    }

    /// Build the RS256-signed assertion presented to the token endpoint.
    pub fn signed_assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| MonitorError::Credentials(format!("invalid private key: {}", e)))?;

        encode(&header, &claims, &key)
            .map_err(|e| MonitorError::Credentials(format!("failed to sign assertion: {}", e)))
    }
}

/// Decode a base64 blob into JSON text. Blobs that already look like JSON
/// are returned as-is.
fn decode_inline(blob: &str) -> Result<String> {
    let trimmed = blob.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| MonitorError::Credentials(format!("credential blob is not base64: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|_| MonitorError::Credentials("credential blob is not UTF-8".to_string()))
}

// ── Token exchange ────────────────────────────────────────────────────────────

/// Exchange a signed assertion for a bearer access token.
pub async fn fetch_access_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let assertion = key.signed_assertion(scope, now)?;

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MonitorError::Api {
            endpoint: "token endpoint".to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() {
        return Err(MonitorError::Credentials(
            "token endpoint returned an empty access token".to_string(),
        ));
    }

    debug!(client_email = %key.client_email, "obtained access token");
    Ok(token.access_token)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
