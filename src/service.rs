//! High-level operations over the Transfer and Auth clients.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::error::{GlobusError, Result};
use crate::identity::IdentityClient;
use crate::links::{dir_path, file_link, folder_link, https_host};
use crate::models::{
    AccessRule, EntryType, FileEntry, FilterScope, TokenSet, AUTH_RESOURCE_SERVER,
    TRANSFER_RESOURCE_SERVER,
};
use crate::token::{CodePrompt, TokenManager};
use crate::transfer::TransferClient;

/// Default message sent with share notifications.
pub const DEFAULT_NOTIFY_MESSAGE: &str = "A folder has been shared with you on Globus.";

/// Files and folders found in a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryContents {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// Links to the contents of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryLinks {
    pub file_links: Vec<String>,
    pub folder_links: Vec<String>,
}

/// Convenience wrapper exposing folder management and sharing on Globus.
pub struct GlobusShare {
    transfer: TransferClient,
    identity: IdentityClient,
}

impl GlobusShare {
    /// Build clients from a token set.
    pub fn from_tokens(tokens: &TokenSet) -> Result<Self> {
        let transfer_token = tokens
            .transfer()
            .ok_or_else(|| GlobusError::MissingResourceServer(TRANSFER_RESOURCE_SERVER.to_string()))?;

        let auth_token = match tokens.auth() {
            Some(record) => record.access_token.clone(),
            None => {
                debug!(
                    "No {} token, using transfer token for identity lookups",
                    AUTH_RESOURCE_SERVER
                );
                transfer_token.access_token.clone()
            }
        };

        Ok(Self::with_clients(
            TransferClient::new(transfer_token.access_token.clone())?,
            IdentityClient::new(auth_token)?,
        ))
    }

    /// Ensure a valid token through the manager and build clients from it.
    pub async fn connect<P: CodePrompt>(manager: &TokenManager<P>) -> Result<Self> {
        let tokens = manager.ensure_valid().await?;
        Self::from_tokens(&tokens)
    }

    pub fn with_clients(transfer: TransferClient, identity: IdentityClient) -> Self {
        Self { transfer, identity }
    }

    pub fn transfer(&self) -> &TransferClient {
        &self.transfer
    }

    /// Create `/<directory>/` on the endpoint.
    ///
    /// Returns true when the folder was created or the Transfer API refused
    /// the request (typically because it already exists). Any other failure
    /// is logged and reported as false.
    pub async fn create_dir(&self, directory: &str, endpoint_id: &str) -> bool {
        let path = dir_path(directory);
        match self.transfer.operation_mkdir(endpoint_id, &path).await {
            Ok(result) => {
                info!("*** Created folder: {} ({})", path, result.code);
                debug!("mkdir {}: {}", path, result.message);
                info!("{}", self.create_folder_link(directory, endpoint_id));
                true
            }
            Err(GlobusError::TransferApiError { code, message, .. }) => {
                warn!("Transfer API Error: {} - {}", code, message);
                info!("{}", self.create_folder_link(directory, endpoint_id));
                true
            }
            Err(e) => {
                error!("*** Unknown error creating {}: {}", path, e);
                false
            }
        }
    }

    /// Whether a directory exists on the endpoint.
    ///
    /// Only a "not found" listing error maps to false; every other error is
    /// returned.
    pub async fn check_folder_exists(&self, directory: &str, endpoint_id: &str) -> Result<bool> {
        match self.transfer.operation_ls(endpoint_id, directory).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Globus identity id for an email address, provisioning it if needed.
    pub async fn get_user_id(&self, email: &str) -> Result<String> {
        let identities = self.identity.get_identities(&[email], true).await?;
        let identity = identities
            .into_iter()
            .next()
            .ok_or_else(|| GlobusError::IdentityNotFound(email.to_string()))?;
        debug!("Resolved {} to identity {}", identity.username, identity.id);
        Ok(identity.id)
    }

    /// Grant read access on `/<directory>/` to the user behind `email`.
    /// Globus notifies the user by email with `notify_message`.
    pub async fn share(
        &self,
        directory: &str,
        email: &str,
        endpoint_id: &str,
        notify_message: &str,
    ) -> Result<bool> {
        if !self.check_folder_exists(directory, endpoint_id).await? {
            error!("{} does not exist", directory);
            error!("Run: globus_share create {}", directory);
            return Ok(false);
        }

        let user_id = self.get_user_id(email).await?;
        let path = dir_path(directory);
        let rule = AccessRule::read_only(&user_id, &path, email, notify_message);

        match self.transfer.add_endpoint_acl_rule(endpoint_id, &rule).await {
            Ok(result) => {
                info!("*** Path {} has been shared with {} ({})", path, email, result.code);
                info!("{}", self.create_folder_link(directory, endpoint_id));
                Ok(true)
            }
            Err(GlobusError::TransferApiError { code, message, .. }) => {
                error!("Transfer API Error: {} - {}", code, message);
                Ok(false)
            }
            Err(e) => {
                warn!("*** Path {} could not be shared with {}: {}", path, email, e);
                Ok(false)
            }
        }
    }

    /// Endpoints shared by me, keyed by display name.
    ///
    /// With `show`, also logs the endpoints shared with me and owned by me.
    pub async fn find_endpoints(&self, show: bool) -> Result<BTreeMap<String, String>> {
        if show {
            info!("Show all endpoints shared and owned by my globus user credentials");
            info!("*** Endpoints shared with me:");
            for ep in self.transfer.endpoint_search(FilterScope::SharedWithMe).await? {
                info!("*** *** {}", ep);
            }
            info!("*** Endpoints owned by me:");
            for ep in self.transfer.endpoint_search(FilterScope::MyEndpoints).await? {
                info!("*** *** {}", ep);
            }
            info!("*** Endpoints shared by me:");
        }

        let mut endpoints = BTreeMap::new();
        for ep in self.transfer.endpoint_search(FilterScope::SharedByMe).await? {
            if show {
                info!("*** *** {}", ep);
            }
            endpoints.insert(ep.name().to_string(), ep.id);
        }

        Ok(endpoints)
    }

    /// Look up an endpoint id by display name among the endpoints shared by
    /// me. Logs the available names when there is no match.
    pub async fn find_endpoint_uuid(&self, name: &str) -> Result<Option<String>> {
        let endpoints = self.find_endpoints(false).await?;

        if let Some(id) = endpoints.get(name) {
            return Ok(Some(id.clone()));
        }

        error!("{} endpoint does not exist", name);
        error!("Select one of these endpoints:");
        for key in endpoints.keys() {
            error!("*** *** {}", key);
        }
        Ok(None)
    }

    pub fn create_folder_link(&self, directory: &str, endpoint_id: &str) -> String {
        folder_link(directory, endpoint_id)
    }

    /// Entries of a directory, as returned by the endpoint.
    pub async fn list_directory(
        &self,
        directory: &str,
        endpoint_id: &str,
    ) -> Result<Vec<FileEntry>> {
        self.transfer.operation_ls(endpoint_id, directory).await
    }

    /// Split the listing of a directory into file and folder names.
    pub async fn find_files(&self, directory: &str, endpoint_id: &str) -> Result<DirectoryContents> {
        let entries = self.list_directory(directory, endpoint_id).await?;

        let mut contents = DirectoryContents::default();
        for entry in entries {
            match entry.entry_type {
                EntryType::File => {
                    info!("directory {} contains file: {}", directory, entry.name);
                    contents.files.push(entry.name);
                }
                EntryType::Dir => {
                    info!("directory {} contains dir: {}", directory, entry.name);
                    contents.folders.push(entry.name);
                }
                _ => debug!("skipping {} in {}", entry.name, directory),
            }
        }

        Ok(contents)
    }

    /// HTTPS links to the files of a directory and web app links to its
    /// subfolders.
    pub async fn create_links(&self, directory: &str, endpoint_id: &str) -> Result<DirectoryLinks> {
        let contents = self.find_files(directory, endpoint_id).await?;
        let directory = directory.trim_matches('/');

        let mut links = DirectoryLinks::default();
        if !contents.files.is_empty() {
            let endpoint = self.transfer.get_endpoint(endpoint_id).await?;
            let host = https_host(&endpoint)?;
            links.file_links = contents
                .files
                .iter()
                .map(|file| file_link(&host, directory, file))
                .collect();
        }
        links.folder_links = contents
            .folders
            .iter()
            .map(|folder| folder_link(&format!("{}/{}", directory, folder), endpoint_id))
            .collect();

        Ok(links)
    }
}
