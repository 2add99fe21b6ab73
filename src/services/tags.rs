use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db_helpers::list_tag_names;
use crate::errors::RequestError;

/// Process-wide copy of the tag vocabulary with a fixed time to live.
pub struct TagCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Vec<String>)>>,
}

impl TagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<Vec<String>> {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some((stored_at, tags)) if stored_at.elapsed() < self.ttl => Some(tags.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, tags: Vec<String>) {
        *self.entry.write().await = Some((Instant::now(), tags));
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

pub async fn list_tags(pool: &SqlitePool, cache: &TagCache) -> Result<Vec<String>, RequestError> {
    if let Some(tags) = cache.get().await {
        debug!("tag list served from cache");
        return Ok(tags);
    }
    let mut conn = pool.acquire().await?;
    let tags = list_tag_names(&mut conn).await?;
    cache.set(tags.clone()).await;
    Ok(tags)
}
