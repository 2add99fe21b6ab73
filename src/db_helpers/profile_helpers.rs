use sqlx::{Sqlite, SqliteConnection};

use crate::errors::is_unique_violation;
use crate::models::ProfileRow;

/// Looks a user up by username and reports, in the same statement, whether
/// `viewer` follows them. An absent viewer never follows anyone.
pub async fn find_profile(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    username: &str,
) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, ProfileRow>(
        r#"
        SELECT users.username AS "username",
               users.bio      AS "bio",
               users.image    AS "image",
               EXISTS (SELECT 1
                       FROM   follows
                       WHERE  follows.followed_id = users.id
                          AND follows.follower_id = $1) AS "following"
        FROM   users
        WHERE  users.username = $2
        "#,
    )
    .bind(viewer)
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn follow_exists(
    conn: &mut SqliteConnection,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

/// Creates the follow edge if it is absent. Returns `false` when the edge was
/// already there, including when a concurrent writer won the insert.
pub async fn insert_follow(
    conn: &mut SqliteConnection,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO follows (follower_id, followed_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, followed_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(followed_id)
    .execute(&mut *conn)
    .await;
    match result {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn delete_follows(
    conn: &mut SqliteConnection,
    follower_id: i64,
    followed_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
        .bind(follower_id)
        .bind(followed_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
