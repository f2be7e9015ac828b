//! Server configuration loading

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_nthreads() -> usize {
    4
}

/// Server configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_address")]
    pub address: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker threads of the request runtime
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,

    /// Root directory holding one sandbox per user
    pub backuppath: PathBuf,

    /// SQLite file with user accounts and live tokens
    pub dbpath: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            nthreads: default_nthreads(),
            backuppath: PathBuf::from("vigil-mirror"),
            dbpath: PathBuf::from("vigil-users.db"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Explicit `--config` path, falling back to ./vigil-server.toml, then
    /// built-in defaults.
    pub fn load_with_fallback(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new("vigil-server.toml");
        if local.exists() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    /// Ensure the mirror root exists before serving.
    pub fn prepare_environment(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.backuppath).with_context(|| {
            format!("failed to create mirror root {}", self.backuppath.display())
        })?;
        Ok(())
    }
}
