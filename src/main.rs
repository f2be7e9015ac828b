/*!
 * Vigil - Continuous backup client
 *
 * Loads the TOML configuration, authenticates against the backup server,
 * and hands control to the reconciliation engine until the reconnection
 * budget runs out.
 */

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use vigil::{ClientConfig, ServerClient, Watcher};

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Continuous one-way directory backup client")]
struct Cli {
    /// Path to the configuration file (defaults to ./vigil.toml, then
    /// ~/.vigil/vigil.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ClientConfig::load_with_fallback(cli.config.as_deref())
        .context("failed to load configuration")?;

    vigil::logging::init_logging(cli.verbose)?;

    let password = dialoguer::Password::new()
        .with_prompt(format!("Password for {}", config.username))
        .interact()
        .context("failed to read password")?;

    let mut client = ServerClient::new(&config)?;
    client
        .login(&config.username, &password)
        .context("login failed")?;

    let mut watcher = Watcher::new(
        client,
        config.backup_path.clone(),
        Duration::from_millis(config.delay_ms),
        config.retry,
    );

    let outcome = watcher.run();

    // Budget exhausted: invalidate the session if the server is reachable.
    if let Err(e) = watcher.remote_mut().logout() {
        tracing::debug!("logout failed: {}", e);
    }

    outcome.context("watcher stopped")
}
