//! Favorite toggles and the `favorites_count` they drive.
//!
//! The edge and the counter always change in the same transaction. When two
//! callers race past the existence check, the primary key on
//! `(user_id, article_id)` rejects the second insert and that caller takes
//! the no-op path, so the counter moves exactly once.

use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::data_formats::ArticleResponse;
use crate::db_helpers::{
    adjust_favorites_count, delete_favorites, favorite_exists, find_article_id,
    insert_favorite, repair_favorites_counts,
};
use crate::errors::RequestError;

use super::articles::load_article_view;

pub async fn favorite_article(
    pool: &SqlitePool,
    user_id: i64,
    slug: &str,
) -> Result<ArticleResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let article_id = find_article_id(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;

    if !favorite_exists(&mut conn, user_id, article_id).await? {
        record_favorite(&mut conn, user_id, article_id).await?;
    }

    load_article_view(&mut conn, Some(user_id), slug).await
}

/// Inserts the edge and bumps the counter together. Returns `false` and
/// changes nothing when a concurrent request already stored the edge.
async fn record_favorite(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
) -> Result<bool, RequestError> {
    let mut tx = conn.begin().await?;
    if insert_favorite(&mut tx, user_id, article_id).await? {
        adjust_favorites_count(&mut tx, article_id, 1).await?;
        tx.commit().await?;
        Ok(true)
    } else {
        debug!(user_id, article_id, "favorite recorded by a concurrent request");
        tx.rollback().await?;
        Ok(false)
    }
}

pub async fn unfavorite_article(
    pool: &SqlitePool,
    user_id: i64,
    slug: &str,
) -> Result<ArticleResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let article_id = find_article_id(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;

    let mut tx = conn.begin().await?;
    let removed = delete_favorites(&mut tx, user_id, article_id).await?;
    if removed > 0 {
        adjust_favorites_count(&mut tx, article_id, -(removed as i64)).await?;
    }
    tx.commit().await?;

    load_article_view(&mut conn, Some(user_id), slug).await
}

/// Recomputes drifted counters from the favorites table. This is a repair
/// tool; the read path always trusts the stored count.
pub async fn repair_favorite_counts(pool: &SqlitePool) -> Result<u64, RequestError> {
    let mut tx = pool.begin().await?;
    let repaired = repair_favorites_counts(&mut tx).await?;
    tx.commit().await?;
    if repaired > 0 {
        info!(repaired, "repaired drifted favorites_count values");
    }
    Ok(repaired)
}
