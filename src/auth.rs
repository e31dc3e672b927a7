//! OAuth2 native app flow against Globus Auth.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{GlobusError, Result};
use crate::models::{now_epoch_secs, CredentialRecord, TokenResponse, TokenSet};

/// Globus Auth base URL.
pub const AUTH_BASE_URL: &str = "https://auth.globus.org";

/// Redirect target for native apps: Globus displays the code for pasting.
const NATIVE_APP_REDIRECT_URI: &str = "https://auth.globus.org/v2/web/auth-code";

/// Scopes requested at login. `openid profile email` yields the Auth token
/// used for identity lookups.
const DEFAULT_SCOPES: &str =
    "openid profile email urn:globus:auth:scope:transfer.api.globus.org:all";

/// HTTP request timeout in seconds.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// PKCE verifier and its S256 challenge.
struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    fn generate() -> Self {
        let mut buf = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut buf);
        let verifier = URL_SAFE_NO_PAD.encode(buf);

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            verifier,
            challenge,
        }
    }
}

/// Client for a Globus "native app" (public client, no secret).
///
/// Holds the PKCE verifier for the flow started by [`authorize_url`], so the
/// same instance must be used for [`exchange_code`].
///
/// [`authorize_url`]: NativeAppAuthClient::authorize_url
/// [`exchange_code`]: NativeAppAuthClient::exchange_code
pub struct NativeAppAuthClient {
    client_id: String,
    base_url: String,
    http: Client,
    pkce: PkcePair,
}

impl NativeAppAuthClient {
    /// Create a client for the given app UUID against the public Globus Auth.
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(client_id, AUTH_BASE_URL)
    }

    /// Create a client against a custom Auth base URL.
    pub fn with_base_url(client_id: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client_id: client_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            pkce: PkcePair::generate(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// URL the user opens in a browser to log in and obtain a code.
    pub fn authorize_url(&self) -> Result<String> {
        let request = self
            .http
            .get(format!("{}/v2/oauth2/authorize", self.base_url))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", NATIVE_APP_REDIRECT_URI),
                ("scope", DEFAULT_SCOPES),
                ("state", "_default"),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("code_challenge", self.pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ])
            .build()?;

        Ok(request.url().to_string())
    }

    /// Exchange a pasted authorization code for a full token set.
    pub async fn exchange_code(&self, auth_code: &str) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", auth_code.trim()),
            ("redirect_uri", NATIVE_APP_REDIRECT_URI),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", self.pkce.verifier.as_str()),
        ];

        let response = self.request_token(&params).await?;
        Ok(response.into_token_set(now_epoch_secs()))
    }

    /// Redeem a refresh token for a new access token on one resource server.
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self.request_token(&params).await?;
        let mut record = response.into_record(now_epoch_secs());
        // Globus does not always rotate refresh tokens.
        if record.refresh_token.is_none() {
            record.refresh_token = Some(refresh_token.to_string());
        }
        Ok(record)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        debug!(grant_type = params[0].1, "Requesting Globus token");

        let response = self
            .http
            .post(format!("{}/v2/oauth2/token", self.base_url))
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GlobusError::TokenExchangeError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}
