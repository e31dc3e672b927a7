//! globus_share - A CLI tool for creating and sharing folders on Globus.
//!
//! This library provides functionality to:
//! - Keep a Globus OAuth2 token cached on disk and re-authorize when it expires
//! - Create folders on an endpoint and check whether they exist
//! - Share folders read-only with a user identified by email
//! - Discover endpoints and build web app / HTTPS links to folder contents
//!
//! # Example
//!
//! ```no_run
//! use globus_share::{default_token_path, ConsolePrompt, GlobusShare, TokenManager, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = TokenStore::new(default_token_path()?);
//!     let manager = TokenManager::new("app-uuid", store, ConsolePrompt);
//!     let globus = GlobusShare::connect(&manager).await?;
//!
//!     if globus.create_dir("2024-01", "endpoint-uuid").await {
//!         println!("{}", globus.create_folder_link("2024-01", "endpoint-uuid"));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod identity;
pub mod links;
pub mod models;
pub mod service;
pub mod token;
pub mod transfer;

// Re-exports for convenience
pub use auth::NativeAppAuthClient;
pub use error::{GlobusError, Result};
pub use identity::IdentityClient;
pub use models::{CredentialRecord, TokenSet};
pub use service::{DirectoryContents, DirectoryLinks, GlobusShare};
pub use token::{default_token_path, CodePrompt, ConsolePrompt, TokenManager, TokenStore};
pub use transfer::TransferClient;
