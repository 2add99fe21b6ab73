use sqlx::{Sqlite, SqliteConnection};

use crate::models::{CommentKey, CommentRow};

use super::now;

const COMMENT_SELECT: &str = r#"
            SELECT comments.id         AS "id",
                   comments.body       AS "body",
                   comments.created_at AS "created_at",
                   comments.updated_at AS "updated_at",
                   users.username      AS "author_username",
                   users.bio           AS "author_bio",
                   users.image         AS "author_image",
                   EXISTS (SELECT 1
                           FROM   follows
                           WHERE  follows.followed_id = comments.author_id
                              AND follows.follower_id = $1) AS "following"
            FROM   comments
                   JOIN users
                     ON users.id = comments.author_id
"#;

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    article_id: i64,
    author_id: i64,
    body: &str,
) -> Result<i64, sqlx::Error> {
    let timestamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (body, article_id, author_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        "#,
    )
    .bind(body)
    .bind(article_id)
    .bind(author_id)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_comment(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    comment_id: i64,
) -> Result<Option<CommentRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, CommentRow>(&format!("{COMMENT_SELECT} WHERE comments.id = $2"))
        .bind(viewer)
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Newest first.
pub async fn comments_for_article(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    article_id: i64,
) -> Result<Vec<CommentRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, CommentRow>(&format!(
        "{COMMENT_SELECT} WHERE comments.article_id = $2 \
         ORDER BY comments.created_at DESC, comments.id DESC"
    ))
    .bind(viewer)
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await
}

/// Only matches a comment that belongs to `article_id`.
pub async fn find_comment_key(
    conn: &mut SqliteConnection,
    article_id: i64,
    comment_id: i64,
) -> Result<Option<CommentKey>, sqlx::Error> {
    sqlx::query_as::<Sqlite, CommentKey>(
        "SELECT id, author_id FROM comments WHERE id = $1 AND article_id = $2",
    )
    .bind(comment_id)
    .bind(article_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn delete_comment_row(
    conn: &mut SqliteConnection,
    comment_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
