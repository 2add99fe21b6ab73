use std::{sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::{config::Config, init_db, services::tags::TagCache};

/// Everything a handler needs, shared behind an `Arc` extension.
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: Config,
    pub tag_cache: TagCache,
}

impl AppContext {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let pool = init_db(&config.database_url, config.db_max_connections).await?;
        info!("Database ready");
        Ok(Self::with_pool(config, pool))
    }

    pub fn with_pool(config: Config, pool: SqlitePool) -> Arc<Self> {
        let tag_cache = TagCache::new(Duration::from_secs(config.tag_cache_ttl_secs));
        Arc::new(Self {
            pool,
            config,
            tag_cache,
        })
    }
}
