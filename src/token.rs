//! Token persistence and lifecycle.
//!
//! [`TokenManager::ensure_valid`] guarantees a non-expired token set before
//! any remote call. Tokens are cached in a single JSON file, which is always
//! replaced whole.

use std::fs;
use std::io::{self, BufRead, ErrorKind, IsTerminal};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::auth::NativeAppAuthClient;
use crate::error::{GlobusError, Result};
use crate::models::{now_epoch_secs, TokenSet, TRANSFER_RESOURCE_SERVER};

/// Token cache file name in the home directory.
const TOKEN_FILE_NAME: &str = "globus-token.json";

/// Default location of the token cache: `~/globus-token.json`.
pub fn default_token_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(GlobusError::NoHomeDir)?;
    Ok(home.join(TOKEN_FILE_NAME))
}

/// On-disk token cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token set. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<TokenSet>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write the token set, replacing any previous file.
    pub fn save(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(tokens)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Source of the authorization code pasted by the user.
pub trait CodePrompt {
    /// Show `authorize_url` and return the code the user obtained there.
    fn prompt_code(&self, authorize_url: &str) -> Result<String>;
}

/// Console prompt. Uses an interactive line editor on a terminal and reads a
/// plain line when stdin is piped.
pub struct ConsolePrompt;

impl CodePrompt for ConsolePrompt {
    fn prompt_code(&self, authorize_url: &str) -> Result<String> {
        eprintln!();
        eprintln!("Please go to this URL and login:");
        eprintln!("{}", authorize_url);

        if !io::stdin().is_terminal() {
            return read_code(io::stdin().lock());
        }

        let code: String = dialoguer::Input::new()
            .with_prompt("Please enter the code you get after login here")
            .interact_text()
            .map_err(|e| GlobusError::PromptError(e.to_string()))?;

        Ok(code.trim().to_string())
    }
}

/// Read one line holding the authorization code.
fn read_code<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| GlobusError::PromptError(e.to_string()))?;
    if read == 0 {
        return Err(GlobusError::PromptError(
            "stdin closed before a code was entered".to_string(),
        ));
    }
    Ok(line.trim().to_string())
}

/// Keeps a valid token set available, re-authorizing when needed.
pub struct TokenManager<P: CodePrompt> {
    app_uuid: String,
    store: TokenStore,
    prompt: P,
    auth_base_url: Option<String>,
}

impl<P: CodePrompt> TokenManager<P> {
    pub fn new(app_uuid: impl Into<String>, store: TokenStore, prompt: P) -> Self {
        Self {
            app_uuid: app_uuid.into(),
            store,
            prompt,
            auth_base_url: None,
        }
    }

    /// Point the manager at a different Globus Auth deployment.
    pub fn with_auth_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.auth_base_url = Some(base_url.into());
        self
    }

    pub fn app_uuid(&self) -> &str {
        &self.app_uuid
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub(crate) fn auth_client(&self) -> Result<NativeAppAuthClient> {
        match &self.auth_base_url {
            Some(url) => NativeAppAuthClient::with_base_url(&self.app_uuid, url),
            None => NativeAppAuthClient::new(&self.app_uuid),
        }
    }

    /// Return a token set whose transfer token has not expired.
    pub async fn ensure_valid(&self) -> Result<TokenSet> {
        let mut tokens = match self.store.load()? {
            Some(tokens) => tokens,
            None => {
                error!("Globus token is missing. Creating one");
                self.login().await?
            }
        };

        let now = now_epoch_secs();
        let expired = match tokens.transfer() {
            Some(record) => !record.is_valid(now),
            None => true,
        };

        if expired {
            tokens = match self.try_refresh(&tokens).await {
                Some(refreshed) => {
                    self.store.save(&refreshed)?;
                    refreshed
                }
                None => self.login().await?,
            };
        }

        let transfer = tokens
            .transfer()
            .ok_or_else(|| GlobusError::MissingResourceServer(TRANSFER_RESOURCE_SERVER.to_string()))?;
        let hours = transfer.remaining_secs(now_epoch_secs()) as f64 / 3600.0;
        info!("Globus access token will expire in {:.2} hours", hours);

        Ok(tokens)
    }

    /// Run the interactive authorization and persist the result.
    pub async fn login(&self) -> Result<TokenSet> {
        let client = self.auth_client()?;
        let url = client.authorize_url()?;
        let code = self.prompt.prompt_code(&url)?;
        if code.is_empty() {
            return Err(GlobusError::AuthenticationError(
                "No authorization code entered".to_string(),
            ));
        }

        let tokens = client.exchange_code(&code).await?;
        if tokens.transfer().is_none() {
            return Err(GlobusError::MissingResourceServer(
                TRANSFER_RESOURCE_SERVER.to_string(),
            ));
        }

        self.store.save(&tokens)?;
        info!("Saved Globus token to {}", self.store.path().display());
        Ok(tokens)
    }

    /// Redeem the stored refresh tokens. Records without a refresh token are
    /// carried over unchanged. `None` when any redemption fails, in which
    /// case the caller falls back to logging in again.
    async fn try_refresh(&self, tokens: &TokenSet) -> Option<TokenSet> {
        let transfer = tokens.transfer()?;
        transfer.refresh_token.as_ref()?;

        let client = match self.auth_client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot create auth client for refresh: {}", e);
                return None;
            }
        };

        let mut refreshed = tokens.clone();
        for record in tokens.by_resource_server.values() {
            let Some(refresh_token) = record.refresh_token.as_deref() else {
                continue;
            };
            match client.refresh(refresh_token).await {
                Ok(new_record) => refreshed.insert(new_record),
                Err(e) => {
                    warn!(
                        "Refreshing token for {} failed: {}",
                        record.resource_server, e
                    );
                    return None;
                }
            }
        }

        info!("Refreshed expired Globus token");
        Some(refreshed)
    }
}
