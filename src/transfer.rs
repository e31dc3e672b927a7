//! Globus Transfer API client.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::auth::REQUEST_TIMEOUT_SECS;
use crate::error::{GlobusError, Result};
use crate::models::{
    AccessRule, Endpoint, EndpointListResponse, FileEntry, FileListResponse, FilterScope,
    MkdirRequest, OperationResult, TransferErrorResponse,
};

/// Base URL for Globus Transfer API v0.10.
pub const TRANSFER_API_BASE: &str = "https://transfer.api.globus.org/v0.10";

/// Page size for endpoint searches.
const ENDPOINT_SEARCH_LIMIT: u32 = 100;

/// Client for the Transfer API, authorized with a transfer access token.
#[derive(Clone)]
pub struct TransferClient {
    base_url: String,
    token: String,
    http: Client,
}

impl TransferClient {
    /// Create a new TransferClient.
    ///
    /// # Arguments
    /// * `token` - Access token for `transfer.api.globus.org`
    pub fn new(token: String) -> Result<Self> {
        Self::with_base_url(token, TRANSFER_API_BASE)
    }

    /// Create a client against a custom base URL.
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

    /// Create a directory on an endpoint.
    pub async fn operation_mkdir(&self, endpoint_id: &str, path: &str) -> Result<OperationResult> {
        let response = self
            .http
            .post(format!(
                "{}/operation/endpoint/{}/mkdir",
                self.base_url, endpoint_id
            ))
            .bearer_auth(&self.token)
            .json(&MkdirRequest::new(path))
            .send()
            .await?;

        parse_response(response).await
    }

    /// List a directory on an endpoint.
    pub async fn operation_ls(&self, endpoint_id: &str, path: &str) -> Result<Vec<FileEntry>> {
        let response = self
            .http
            .get(format!(
                "{}/operation/endpoint/{}/ls",
                self.base_url, endpoint_id
            ))
            .bearer_auth(&self.token)
            .query(&[("path", path)])
            .send()
            .await?;

        let listing: FileListResponse = parse_response(response).await?;
        Ok(listing.data)
    }

    /// Search endpoints within a scope, following all result pages.
    pub async fn endpoint_search(&self, scope: FilterScope) -> Result<Vec<Endpoint>> {
        let mut all_endpoints = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let response = self
                .http
                .get(format!("{}/endpoint_search", self.base_url))
                .bearer_auth(&self.token)
                .query(&[
                    ("filter_scope", scope.as_str().to_string()),
                    ("offset", offset.to_string()),
                    ("limit", ENDPOINT_SEARCH_LIMIT.to_string()),
                ])
                .send()
                .await?;

            let page: EndpointListResponse = parse_response(response).await?;
            let count = page.data.len() as u32;
            all_endpoints.extend(page.data);

            if !page.has_next_page || count == 0 {
                break;
            }
            offset += count;
        }

        Ok(all_endpoints)
    }

    /// Get an endpoint document by ID.
    pub async fn get_endpoint(&self, endpoint_id: &str) -> Result<Endpoint> {
        let response = self
            .http
            .get(format!("{}/endpoint/{}", self.base_url, endpoint_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Add an access rule to an endpoint.
    pub async fn add_endpoint_acl_rule(
        &self,
        endpoint_id: &str,
        rule: &AccessRule,
    ) -> Result<OperationResult> {
        let response = self
            .http
            .post(format!("{}/endpoint/{}/access", self.base_url, endpoint_id))
            .bearer_auth(&self.token)
            .json(rule)
            .send()
            .await?;

        parse_response(response).await
    }
}

/// Decode a successful response, or turn a failed one into a Transfer API
/// error carrying the service's error code.
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<TransferErrorResponse>(&error_body) {
            return Err(GlobusError::TransferApiError {
                status: status.as_u16(),
                code: api_error.code,
                message: api_error.message,
            });
        }
        return Err(GlobusError::TransferApiError {
            status: status.as_u16(),
            code: format!("HTTP{}", status.as_u16()),
            message: error_body,
        });
    }

    Ok(response.json().await?)
}
