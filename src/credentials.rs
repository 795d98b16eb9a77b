//! Google service-account credentials and bearer tokens.
//!
//! Credential blobs usually arrive through an environment variable, which
//! mangles them in a couple of predictable ways. Parsing is done in two
//! passes: the blob is parsed as-is first and only repaired and re-parsed if
//! that fails. Escaped `\n` sequences in the private key are turned into real
//! newlines after a successful parse, never before.

use std::fmt::Write;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::providers::ProviderError;

/// Default Google OAuth token endpoint
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Scope needed to call Vertex AI
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
/// Refresh tokens this many seconds before they expire
const EXPIRY_SAFETY_WINDOW: i64 = 300;
/// Lifetime requested for the signed assertion
const ASSERTION_LIFETIME: i64 = 3600;

/// Fields of a service-account key file needed for the JWT bearer flow.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    /// Service account identity, used as the assertion issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Token endpoint; Google's when absent.
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Project the key belongs to.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountCredentials {
    /// Token endpoint to exchange assertions at.
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn with_normalized_key(mut self) -> Self {
        self.private_key = self.private_key.replace("\\n", "\n");
        self
    }
}

/// Which parse pass produced the credentials.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParsePass {
    /// The blob was valid JSON as supplied.
    Direct,
    /// The blob only parsed after repair.
    Sanitized,
}

/// Successfully parsed credentials.
#[derive(Clone, Debug)]
pub struct ParsedCredentials {
    /// The credentials, private key newlines normalized.
    pub credentials: ServiceAccountCredentials,
    /// Pass that succeeded.
    pub pass: ParsePass,
}

/// Errors returned when loading or using credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialError {
    /// The blob failed both the direct and the repaired parse.
    Malformed {
        /// Error from parsing the blob as supplied.
        direct: String,
        /// Error from parsing the repaired blob.
        sanitized: String,
    },
    /// The private key can't be used for RS256 signing.
    InvalidKey(String),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { direct, sanitized } => write!(
                f,
                "Invalid service account JSON: {direct} (after repair: {sanitized})"
            ),
            Self::InvalidKey(err) => write!(f, "Invalid RSA private key (PEM): {err}"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Parses a service-account JSON blob, repairing it once if needed.
pub fn parse_credentials(raw: &str) -> Result<ParsedCredentials, CredentialError> {
    let (credentials, pass) = match serde_json::from_str::<ServiceAccountCredentials>(raw) {
        Ok(credentials) => (credentials, ParsePass::Direct),
        Err(direct) => {
            debug!("Credential JSON failed direct parse, repairing: {}", direct);
            let repaired = sanitize_credential_json(raw);
            let credentials = serde_json::from_str::<ServiceAccountCredentials>(&repaired)
                .map_err(|sanitized| CredentialError::Malformed {
                    direct: direct.to_string(),
                    sanitized: sanitized.to_string(),
                })?;
            (credentials, ParsePass::Sanitized)
        }
    };
    Ok(ParsedCredentials {
        credentials: credentials.with_normalized_key(),
        pass,
    })
}

/// Repairs the damage environment variables typically do to a JSON blob:
/// surrounding whitespace, a wrapping pair of single quotes, and raw control
/// characters inside string literals. Newlines and tabs get their short
/// escapes, carriage returns are dropped and anything else below 0x20 becomes
/// `\u00XX`. Whitespace between tokens is left alone.
pub fn sanitize_credential_json(raw: &str) -> String {
    let mut trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed = trimmed[1..trimmed.len() - 1].trim();
    }

    let mut out = String::with_capacity(trimmed.len() + 64);
    let mut in_string = false;
    let mut escaped = false;
    for ch in trimmed.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            ch if u32::from(ch) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(ch));
            }
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME
}

#[derive(Clone, Debug)]
struct CachedToken {
    token: String,
    exp_unix: i64,
}

/// Fetches and caches OAuth access tokens for a service account.
///
/// Refreshes are serialized behind one async mutex, so concurrent callers
/// share a single token request.
#[derive(Debug)]
pub struct TokenSource {
    credentials: ServiceAccountCredentials,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Creates a token source; no network traffic happens until [`Self::token`].
    pub fn new(credentials: ServiceAccountCredentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Credentials backing this source.
    pub fn credentials(&self) -> &ServiceAccountCredentials {
        &self.credentials
    }

    /// Returns a valid bearer token, fetching a new one when the cached
    /// token is missing or about to expire.
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(token) = cached.as_ref()
            && token.exp_unix - EXPIRY_SAFETY_WINDOW > now
        {
            return Ok(token.token.clone());
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(self.credentials.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ProviderError::RequestRejected {
                status: status.as_u16(),
                message: format!(
                    "token endpoint: {}",
                    String::from_utf8_lossy(&body).trim()
                ),
            });
        }
        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|err| {
            ProviderError::MalformedResponse(format!("token response: {err}"))
        })?;

        debug!(
            "Fetched access token for {}, expires in {}s",
            self.credentials.client_email, parsed.expires_in
        );
        *cached = Some(CachedToken {
            token: parsed.access_token.clone(),
            exp_unix: now + parsed.expires_in,
        });
        Ok(parsed.access_token)
    }

    fn sign_assertion(&self, now: i64) -> Result<String, ProviderError> {
        let claims = Claims {
            iss: &self.credentials.client_email,
            scope: DEFAULT_SCOPE,
            aud: self.credentials.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|err| CredentialError::InvalidKey(err.to_string()))?;
        encode(&header, &claims, &key)
            .map_err(|err| CredentialError::InvalidKey(format!("failed to sign JWT: {err}")).into())
    }
}
