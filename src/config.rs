/*!
 * Client configuration loading
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VigilError};

fn default_delay_ms() -> u64 {
    5000
}

fn default_retry() -> u32 {
    10
}

/// Client configuration, loaded from a TOML file.
///
/// `token` is never read from the file; it is populated at runtime by a
/// successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or address
    pub address: String,

    /// Server port
    pub port: u16,

    /// Local directory to watch and mirror
    pub backup_path: PathBuf,

    /// Account name on the server
    pub username: String,

    /// Steady-state scan period in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Reconnection budget: how many HTTP-class failures are tolerated
    /// before the client gives up
    #[serde(default = "default_retry")]
    pub retry: u32,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VigilError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: ClientConfig = toml::from_str(&content).map_err(|e| {
            VigilError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback priority:
    /// 1. explicit `--config` path (when given)
    /// 2. ./vigil.toml
    /// 3. ~/.vigil/vigil.toml
    pub fn load_with_fallback(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = Path::new("vigil.toml");
        if local.exists() {
            return Self::load(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vigil").join("vigil.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        Err(VigilError::Config(
            "no configuration file found (looked for ./vigil.toml and ~/.vigil/vigil.toml)"
                .to_string(),
        ))
    }

    /// Base URL used for every request
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    fn validate(&self) -> Result<()> {
        if !self.backup_path.is_dir() {
            return Err(VigilError::Config(format!(
                "backup_path {} is not a directory",
                self.backup_path.display()
            )));
        }
        if self.username.is_empty() {
            return Err(VigilError::Config("username must not be empty".to_string()));
        }
        Ok(())
    }
}
