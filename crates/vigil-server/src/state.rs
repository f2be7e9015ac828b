//! Shared application state

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth;
use crate::config::ServerConfig;
use crate::mirror::Mirror;

/// State cloned into every handler: the user/token store and the mirror
/// root.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub mirror: Arc<Mirror>,
}

impl AppState {
    /// Open (or create) the user store, make sure its schema exists, and
    /// clear any token that survived on disk from a previous run.
    pub async fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", config.dbpath.display());
        let pool = SqlitePool::connect(&url).await?;

        auth::init_user_db(&pool).await?;
        auth::delete_all_tokens(&pool).await?;

        Ok(Self {
            pool,
            mirror: Arc::new(Mirror::new(config.backuppath.clone())),
        })
    }
}
