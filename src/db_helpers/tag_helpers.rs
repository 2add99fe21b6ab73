use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::models::ArticleTag;

/// Ids bound per lookup, well under SQLite's host parameter limit.
const TAG_LOOKUP_CHUNK: usize = 500;

/// Returns the id of the tag called `name`, creating it on first use.
pub async fn upsert_tag(conn: &mut SqliteConnection, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

pub async fn link_tag(
    conn: &mut SqliteConnection,
    article_id: i64,
    tag_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO article_tags (article_id, tag_id)
        VALUES ($1, $2)
        ON CONFLICT (article_id, tag_id) DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(tag_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_tag_names(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM tags ORDER BY name ASC")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Tag names for a batch of articles, keyed by article id and kept in the
/// order they were attached. Large batches are looked up in chunks.
pub async fn tags_for_articles(
    conn: &mut SqliteConnection,
    article_ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, sqlx::Error> {
    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    for chunk in article_ids.chunks(TAG_LOOKUP_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT article_tags.article_id AS "article_id",
                   tags.name               AS "name"
            FROM   article_tags
                   JOIN tags
                     ON tags.id = article_tags.tag_id
            WHERE  article_tags.article_id IN ("#,
        );
        {
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
        }
        builder.push(") ORDER BY article_tags.rowid");

        let rows = builder
            .build_query_as::<ArticleTag>()
            .fetch_all(&mut *conn)
            .await?;
        for ArticleTag { article_id, name } in rows {
            tags.entry(article_id).or_default().push(name);
        }
    }
    Ok(tags)
}
