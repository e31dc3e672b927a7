//! Globus Auth identity lookups.

use std::time::Duration;

use reqwest::Client;

use crate::auth::{AUTH_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::error::{GlobusError, Result};
use crate::models::{IdentitiesResponse, Identity};

/// Client for the Auth API, authorized with an `auth.globus.org` token.
#[derive(Clone)]
pub struct IdentityClient {
    base_url: String,
    token: String,
    http: Client,
}

impl IdentityClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base_url(token, AUTH_BASE_URL)
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    /// Resolve usernames (usually email addresses) to identities. With
    /// `provision`, Globus creates identities that do not exist yet.
    pub async fn get_identities(&self, usernames: &[&str], provision: bool) -> Result<Vec<Identity>> {
        let response = self
            .http
            .get(format!("{}/v2/api/identities", self.base_url))
            .bearer_auth(&self.token)
            .query(&[
                ("usernames", usernames.join(",")),
                ("provision", provision.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GlobusError::AuthApiError {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let identities: IdentitiesResponse = response.json().await?;
        Ok(identities.identities)
    }
}
