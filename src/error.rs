//! Error types for the globus_share crate.

use thiserror::Error;

/// Transfer API error code returned when a path or resource does not exist.
pub const NOT_FOUND_CODE: &str = "ClientError.NotFound";

/// Errors that can occur when interacting with Globus.
#[derive(Error, Debug)]
pub enum GlobusError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to access token file: {0}")]
    TokenFileError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Transfer API error ({status}) {code}: {message}")]
    TransferApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Auth API error ({status}): {message}")]
    AuthApiError { status: u16, message: String },

    #[error("Token exchange failed: {0}")]
    TokenExchangeError(String),

    #[error("No token for resource server: {0}")]
    MissingResourceServer(String),

    #[error("No Globus identity found for: {0}")]
    IdentityNotFound(String),

    #[error("Endpoint {0} has no HTTPS server")]
    NoHttpsServer(String),

    #[error("Failed to read authorization code: {0}")]
    PromptError(String),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

impl GlobusError {
    /// Whether this is a Transfer API "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GlobusError::TransferApiError { code, .. } if code == NOT_FOUND_CODE)
    }

    /// Whether this error came back from the Transfer API itself, as opposed
    /// to transport or local failures.
    pub fn is_transfer_api_error(&self) -> bool {
        matches!(self, GlobusError::TransferApiError { .. })
    }
}

/// Result type alias for GlobusError.
pub type Result<T> = std::result::Result<T, GlobusError>;
