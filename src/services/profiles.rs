use sqlx::SqlitePool;
use tracing::debug;

use crate::data_formats::ProfileResponse;
use crate::db_helpers::{delete_follows, find_profile, find_user_by_username, follow_exists, insert_follow};
use crate::errors::RequestError;

/// Assembles the public projection of a user. `following` must already be
/// resolved relative to the viewer; article and comment views go through
/// here too so the author block is shaped the same everywhere.
pub fn build_profile(
    username: String,
    bio: Option<String>,
    image: Option<String>,
    following: bool,
) -> ProfileResponse {
    ProfileResponse {
        username,
        bio,
        image,
        following,
    }
}

pub async fn get_profile(
    pool: &SqlitePool,
    viewer: Option<i64>,
    username: &str,
) -> Result<ProfileResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let profile = find_profile(&mut conn, viewer, username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    Ok(build_profile(
        profile.username,
        profile.bio,
        profile.image,
        profile.following,
    ))
}

/// Idempotent: following someone twice leaves a single edge.
pub async fn follow_user(
    pool: &SqlitePool,
    follower_id: i64,
    username: &str,
) -> Result<ProfileResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let target = find_user_by_username(&mut conn, username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    if target.id == follower_id {
        return Err(RequestError::ValidationError(
            "Cannot follow yourself".to_string(),
        ));
    }

    if !insert_follow(&mut conn, follower_id, target.id).await? {
        debug!(follower_id, followed_id = target.id, "follow edge already present");
    }

    Ok(build_profile(target.username, target.bio, target.image, true))
}

/// Idempotent: unfollowing someone not followed is a no-op. The returned
/// flag is read back from the store after the delete.
pub async fn unfollow_user(
    pool: &SqlitePool,
    follower_id: i64,
    username: &str,
) -> Result<ProfileResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let target = find_user_by_username(&mut conn, username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    if target.id == follower_id {
        return Err(RequestError::ValidationError(
            "Cannot unfollow yourself".to_string(),
        ));
    }

    let removed = delete_follows(&mut conn, follower_id, target.id).await?;
    debug!(follower_id, followed_id = target.id, removed, "unfollow");
    let following = follow_exists(&mut conn, follower_id, target.id).await?;

    Ok(build_profile(target.username, target.bio, target.image, following))
}
