//! Vigil backup server binary
//!
//! `serve` runs the HTTP API on a runtime sized by the `nthreads` config
//! option; `adduser` provisions an account in the user store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vigil_server::{auth, AppState, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "vigil-server", version, about = "Vigil backup server")]
struct Cli {
    /// Path to the configuration file (defaults to ./vigil-server.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the backup server (the default)
    Serve,
    /// Add a user account to the store
    Adduser {
        /// Account name
        username: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vigil_server=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load_with_fallback(cli.config.as_deref())
        .context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.nthreads.max(1))
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => runtime.block_on(vigil_server::start_server(config)),
        Command::Adduser { username } => {
            let password = dialoguer::Password::new()
                .with_prompt(format!("Password for {}", username))
                .with_confirmation("Repeat password", "passwords do not match")
                .interact()
                .context("failed to read password")?;

            runtime.block_on(async move {
                let state = AppState::new(&config).await?;
                auth::create_user(&state.pool, &username, &password)
                    .await
                    .with_context(|| format!("failed to create user {}", username))?;
                println!("user {} created", username);
                Ok(())
            })
        }
    }
}
