use sqlx::SqliteConnection;

use crate::errors::is_unique_violation;

pub async fn favorite_exists(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND article_id = $2)",
    )
    .bind(user_id)
    .bind(article_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

/// Inserts the favorite edge. Returns `false` instead of an error when the
/// primary key on `(user_id, article_id)` rejects a duplicate.
pub async fn insert_favorite(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT INTO favorites (user_id, article_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(article_id)
        .execute(&mut *conn)
        .await;
    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn delete_favorites(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND article_id = $2")
        .bind(user_id)
        .bind(article_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn adjust_favorites_count(
    conn: &mut SqliteConnection,
    article_id: i64,
    delta: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE articles SET favorites_count = favorites_count + $1 WHERE id = $2")
        .bind(delta)
        .bind(article_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rewrites `favorites_count` from the favorites table for every article
/// whose stored count has drifted. Returns how many articles were fixed.
pub async fn repair_favorites_counts(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE articles
        SET    favorites_count = (SELECT COUNT(*)
                                  FROM   favorites
                                  WHERE  favorites.article_id = articles.id)
        WHERE  favorites_count <> (SELECT COUNT(*)
                                   FROM   favorites
                                   WHERE  favorites.article_id = articles.id)
        "#,
    )
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
