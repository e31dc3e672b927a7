//! globus_share CLI - Create and share folders on a Globus endpoint.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use globus_share::links::is_uuid;
use globus_share::service::DEFAULT_NOTIFY_MESSAGE;
use globus_share::{default_token_path, ConsolePrompt, GlobusShare, TokenManager, TokenStore};

/// CLI tool for creating and sharing folders on Globus.
#[derive(Parser)]
#[command(name = "globus_share")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Globus app (native client) UUID.
    #[arg(long, env = "GLOBUS_APP_UUID")]
    app_uuid: String,

    /// Endpoint UUID or display name (can also be set via GLOBUS_ENDPOINT env var).
    #[arg(long, env = "GLOBUS_ENDPOINT")]
    endpoint: Option<String>,

    /// Token cache file (defaults to ~/globus-token.json).
    #[arg(long, env = "GLOBUS_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in again and replace the cached token.
    Login,

    /// Create a folder at the top of the endpoint.
    Create {
        /// Folder name.
        directory: String,
    },

    /// Check whether a folder exists.
    Exists {
        /// Folder name.
        directory: String,
    },

    /// Share a folder read-only with a user.
    Share {
        /// Folder name.
        directory: String,

        /// Email address of the user to share with.
        #[arg(long, short = 'e')]
        email: String,

        /// Message included in the notification email.
        #[arg(long, short = 'm', default_value = DEFAULT_NOTIFY_MESSAGE)]
        message: String,
    },

    /// List endpoints shared by me.
    Endpoints {
        /// Also show endpoints shared with me and owned by me.
        #[arg(long)]
        all: bool,
    },

    /// List files and folders in a folder.
    List {
        /// Folder name.
        directory: String,
    },

    /// Print the web app link to a folder.
    Link {
        /// Folder name.
        directory: String,
    },

    /// Print links to every file and subfolder of a folder.
    Links {
        /// Folder name.
        directory: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let token_path = match cli.token_file {
        Some(path) => path,
        None => default_token_path().context("Failed to locate token file")?,
    };
    let manager = TokenManager::new(&cli.app_uuid, TokenStore::new(&token_path), ConsolePrompt);

    if let Commands::Login = cli.command {
        manager.login().await.context("Failed to log in to Globus")?;
        println!("Token saved to {:?}", token_path);
        return Ok(());
    }

    let globus = GlobusShare::connect(&manager)
        .await
        .context("Failed to authenticate with Globus")?;

    match cli.command {
        Commands::Login => {}

        Commands::Endpoints { all } => {
            let endpoints = globus
                .find_endpoints(all)
                .await
                .context("Failed to search endpoints")?;
            if endpoints.is_empty() {
                println!("No endpoints found.");
            } else {
                println!("{:<38} {}", "ID", "NAME");
                println!("{}", "-".repeat(80));
                for (name, id) in endpoints {
                    println!("{:<38} {}", id, name);
                }
            }
        }

        Commands::Create { directory } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            if !globus.create_dir(&directory, &endpoint_id).await {
                anyhow::bail!("Failed to create folder: {}", directory);
            }
            println!("{}", globus.create_folder_link(&directory, &endpoint_id));
        }

        Commands::Exists { directory } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            let exists = globus
                .check_folder_exists(&directory, &endpoint_id)
                .await
                .with_context(|| format!("Failed to check folder: {}", directory))?;
            println!("{}", exists);
        }

        Commands::Share {
            directory,
            email,
            message,
        } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            let shared = globus
                .share(&directory, &email, &endpoint_id, &message)
                .await
                .with_context(|| format!("Failed to share {} with {}", directory, email))?;
            if !shared {
                anyhow::bail!("Folder {} was not shared with {}", directory, email);
            }
            println!("{}", globus.create_folder_link(&directory, &endpoint_id));
        }

        Commands::List { directory } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            let entries = globus
                .list_directory(&directory, &endpoint_id)
                .await
                .with_context(|| format!("Failed to list folder: {}", directory))?;

            if entries.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<6}\t{:>10}\t{}", "TYPE", "SIZE", "NAME");
                println!("{}", "-".repeat(60));
                for entry in entries {
                    println!("{}", entry);
                }
            }
        }

        Commands::Link { directory } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            println!("{}", globus.create_folder_link(&directory, &endpoint_id));
        }

        Commands::Links { directory } => {
            let endpoint_id = resolve_endpoint(&globus, cli.endpoint).await?;
            let links = globus
                .create_links(&directory, &endpoint_id)
                .await
                .with_context(|| format!("Failed to build links for: {}", directory))?;
            for link in links.folder_links.iter().chain(links.file_links.iter()) {
                println!("{}", link);
            }
        }
    }

    Ok(())
}

/// Accept an endpoint UUID as is, or look it up by display name.
async fn resolve_endpoint(globus: &GlobusShare, endpoint: Option<String>) -> Result<String> {
    let endpoint = endpoint.context("No endpoint given (use --endpoint or GLOBUS_ENDPOINT)")?;
    if is_uuid(&endpoint) {
        return Ok(endpoint);
    }

    globus
        .find_endpoint_uuid(&endpoint)
        .await
        .context("Failed to search endpoints")?
        .with_context(|| format!("Unknown endpoint: {}", endpoint))
}
