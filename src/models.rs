//! Data models for Globus Auth and Transfer API payloads.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Resource server name of the Transfer service.
pub const TRANSFER_RESOURCE_SERVER: &str = "transfer.api.globus.org";

/// Resource server name of the Auth service.
pub const AUTH_RESOURCE_SERVER: &str = "auth.globus.org";

/// Current time in epoch seconds.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Tokens issued for a single resource server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub resource_server: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry in epoch seconds.
    pub expires_at: i64,
    #[serde(default)]
    pub scope: String,
}

impl CredentialRecord {
    /// Seconds left before the access token expires. Negative once expired.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    pub fn is_valid(&self, now: i64) -> bool {
        self.remaining_secs(now) > 0
    }
}

/// All credential records obtained from one authorization, keyed by
/// resource server. This is what gets persisted to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub by_resource_server: BTreeMap<String, CredentialRecord>,
}

impl TokenSet {
    pub fn insert(&mut self, record: CredentialRecord) {
        self.by_resource_server
            .insert(record.resource_server.clone(), record);
    }

    pub fn get(&self, resource_server: &str) -> Option<&CredentialRecord> {
        self.by_resource_server.get(resource_server)
    }

    pub fn transfer(&self) -> Option<&CredentialRecord> {
        self.get(TRANSFER_RESOURCE_SERVER)
    }

    pub fn auth(&self) -> Option<&CredentialRecord> {
        self.get(AUTH_RESOURCE_SERVER)
    }
}

/// A single token as returned by the Globus token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub resource_server: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    /// Tokens for the additional resource servers requested in the scope.
    #[serde(default)]
    pub other_tokens: Vec<TokenResponse>,
}

impl TokenResponse {
    /// Convert into a credential record, anchoring `expires_in` at `now`.
    pub fn into_record(self, now: i64) -> CredentialRecord {
        CredentialRecord {
            resource_server: self.resource_server,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + self.expires_in,
            scope: self.scope,
        }
    }

    /// Flatten the primary token and `other_tokens` into a token set.
    pub fn into_token_set(self, now: i64) -> TokenSet {
        let mut set = TokenSet::default();
        let mut response = self;
        let others = std::mem::take(&mut response.other_tokens);
        set.insert(response.into_record(now));
        for other in others {
            set.insert(other.into_record(now));
        }
        set
    }
}

/// Kind of entry in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
    Link,
    #[serde(other)]
    Other,
}

/// One entry of an `ls` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub size: Option<u64>,
}

impl std::fmt::Display for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.entry_type {
            EntryType::File => "file",
            EntryType::Dir => "dir",
            EntryType::Link => "link",
            EntryType::Other => "-",
        };
        let size_str = match (self.entry_type, self.size) {
            (EntryType::File, Some(s)) => format_size(s),
            _ => "-".to_string(),
        };
        write!(f, "{}\t{}\t{}", kind, size_str, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the `operation/endpoint/<id>/ls` endpoint.
#[derive(Debug, Deserialize)]
pub struct FileListResponse {
    #[serde(rename = "DATA", default)]
    pub data: Vec<FileEntry>,
}

/// Endpoint (collection) document.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tlsftp_server: Option<String>,
    #[serde(default)]
    pub https_server: Option<String>,
}

impl Endpoint {
    /// Display name, falling back to the id for unnamed endpoints.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name())
    }
}

/// One page of `endpoint_search` results.
#[derive(Debug, Deserialize)]
pub struct EndpointListResponse {
    #[serde(rename = "DATA", default)]
    pub data: Vec<Endpoint>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// Scopes accepted by `endpoint_search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    SharedWithMe,
    MyEndpoints,
    SharedByMe,
}

impl FilterScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterScope::SharedWithMe => "shared-with-me",
            FilterScope::MyEndpoints => "my-endpoints",
            FilterScope::SharedByMe => "shared-by-me",
        }
    }
}

/// Body of `operation/endpoint/<id>/mkdir`.
#[derive(Debug, Serialize)]
pub struct MkdirRequest {
    #[serde(rename = "DATA_TYPE")]
    pub data_type: &'static str,
    pub path: String,
}

impl MkdirRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            data_type: "mkdir",
            path: path.into(),
        }
    }
}

/// Generic Transfer API result (`{"code": ..., "message": ...}`).
#[derive(Debug, Clone, Deserialize)]
pub struct OperationResult {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Access control rule granting an identity permissions on a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(rename = "DATA_TYPE")]
    pub data_type: String,
    pub principal_type: String,
    pub principal: String,
    pub path: String,
    pub permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_message: Option<String>,
}

impl AccessRule {
    /// Read-only rule for an identity, notifying them by email.
    pub fn read_only(principal: &str, path: &str, email: &str, message: &str) -> Self {
        Self {
            data_type: "access".to_string(),
            principal_type: "identity".to_string(),
            principal: principal.to_string(),
            path: path.to_string(),
            permissions: "r".to_string(),
            notify_email: Some(email.to_string()),
            notify_message: Some(message.to_string()),
        }
    }
}

/// A Globus Auth identity.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

/// Response from `/v2/api/identities`.
#[derive(Debug, Deserialize)]
pub struct IdentitiesResponse {
    #[serde(default)]
    pub identities: Vec<Identity>,
}

/// Transfer API error body.
#[derive(Debug, Deserialize)]
pub struct TransferErrorResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
}
