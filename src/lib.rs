/*!
 * Vigil - Continuous one-way directory backup
 *
 * Watches a local directory and keeps a per-user mirror on a remote server
 * in agreement with it:
 * - Parallel initial reconciliation with digest probes to skip content the
 *   server already holds
 * - Periodic change detection from an in-memory path/mtime index
 * - A small authenticated HTTP protocol (probe, backup, delete)
 * - Bounded reconnection on server loss
 */

pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod paths;
pub mod protocol;
pub mod watcher;

// Re-export commonly used types for convenience
pub use config::ClientConfig;
pub use error::{Result, VigilError};
pub use paths::RelPath;
pub use protocol::{Outcome, Remote, ServerClient};
pub use watcher::Watcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
