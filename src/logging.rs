/*!
 * Logging and tracing initialization
 */

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{Result, VigilError};

/// Initialize structured logging on stdout.
///
/// `verbose` raises the default level to DEBUG; `RUST_LOG` overrides both.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "vigil=debug" } else { "vigil=info" };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| VigilError::Config(format!("failed to create log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();

    Ok(())
}
