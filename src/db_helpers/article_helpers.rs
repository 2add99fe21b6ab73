use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::data_formats::{ArticleFilter, Pagination};
use crate::models::{ArticleKey, ArticleRow};

use super::now;

// The viewer id is bound first so the EXISTS flags are computed alongside
// the rows instead of one lookup per article.
const ARTICLE_SELECT: &str = r#"
            SELECT articles.id              AS "id",
                   articles.slug            AS "slug",
                   articles.title           AS "title",
                   articles.description     AS "description",
                   articles.body            AS "body",
                   articles.favorites_count AS "favorites_count",
                   articles.created_at      AS "created_at",
                   articles.updated_at      AS "updated_at",
                   users.username           AS "author_username",
                   users.bio                AS "author_bio",
                   users.image              AS "author_image",
                   EXISTS (SELECT 1
                           FROM   favorites
                           WHERE  favorites.article_id = articles.id
                              AND favorites.user_id = "#;

const ARTICLE_SELECT_FOLLOWING: &str = r#") AS "favorited",
                   EXISTS (SELECT 1
                           FROM   follows
                           WHERE  follows.followed_id = articles.author_id
                              AND follows.follower_id = "#;

const ARTICLE_FROM: &str = r#") AS "following"
            FROM   articles
                   JOIN users
                     ON users.id = articles.author_id
            WHERE  1 = 1"#;

const ARTICLE_COUNT: &str = r#"
            SELECT COUNT(*)
            FROM   articles
                   JOIN users
                     ON users.id = articles.author_id
            WHERE  1 = 1"#;

/// Which articles a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum ArticleScope<'a> {
    Filtered(&'a ArticleFilter),
    /// Articles whose author is followed by this user; filters do not apply.
    Feed(i64),
}

pub struct NewArticle<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub body: &'a str,
    pub author_id: i64,
}

/// Column changes for an article; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ArticleChanges<'a> {
    pub slug: Option<&'a str>,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub body: Option<&'a str>,
}

fn article_query<'a>(viewer: Option<i64>) -> QueryBuilder<'a, Sqlite> {
    let mut builder = QueryBuilder::<Sqlite>::new(ARTICLE_SELECT);
    builder.push_bind(viewer);
    builder.push(ARTICLE_SELECT_FOLLOWING);
    builder.push_bind(viewer);
    builder.push(ARTICLE_FROM);
    builder
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn push_scope<'a>(builder: &mut QueryBuilder<'a, Sqlite>, scope: ArticleScope<'a>) {
    match scope {
        ArticleScope::Filtered(filter) => {
            if let Some(tag) = non_blank(&filter.tag) {
                builder
                    .push(
                        r#"
                AND EXISTS (SELECT 1
                            FROM   article_tags
                                   JOIN tags
                                     ON tags.id = article_tags.tag_id
                            WHERE  article_tags.article_id = articles.id
                               AND tags.name = "#,
                    )
                    .push_bind(tag)
                    .push(")");
            }
            if let Some(author) = non_blank(&filter.author) {
                builder
                    .push(" AND users.username = ")
                    .push_bind(author);
            }
            if let Some(favorited) = non_blank(&filter.favorited) {
                builder
                    .push(
                        r#"
                AND EXISTS (SELECT 1
                            FROM   favorites
                                   JOIN users AS fans
                                     ON fans.id = favorites.user_id
                            WHERE  favorites.article_id = articles.id
                               AND fans.username = "#,
                    )
                    .push_bind(favorited)
                    .push(")");
            }
        }
        ArticleScope::Feed(follower_id) => {
            builder
                .push(
                    r#"
                AND EXISTS (SELECT 1
                            FROM   follows AS feed
                            WHERE  feed.followed_id = articles.author_id
                               AND feed.follower_id = "#,
                )
                .push_bind(follower_id)
                .push(")");
        }
    }
}

pub async fn fetch_article_page(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    scope: ArticleScope<'_>,
    page: Pagination,
) -> Result<Vec<ArticleRow>, sqlx::Error> {
    let mut builder = article_query(viewer);
    push_scope(&mut builder, scope);
    builder
        .push(" ORDER BY articles.created_at DESC, articles.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);
    let rows = builder
        .build_query_as::<ArticleRow>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

pub async fn count_articles(
    conn: &mut SqliteConnection,
    scope: ArticleScope<'_>,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(ARTICLE_COUNT);
    push_scope(&mut builder, scope);
    let (count,) = builder
        .build_query_as::<(i64,)>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn find_article_by_slug(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    slug: &str,
) -> Result<Option<ArticleRow>, sqlx::Error> {
    let mut builder = article_query(viewer);
    builder.push(" AND articles.slug = ").push_bind(slug);
    let row = builder
        .build_query_as::<ArticleRow>()
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

pub async fn find_article_key(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<ArticleKey>, sqlx::Error> {
    sqlx::query_as::<Sqlite, ArticleKey>(
        "SELECT id, author_id, title FROM articles WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_article_id(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn slug_exists(conn: &mut SqliteConnection, slug: &str) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM articles WHERE slug = $1)")
        .bind(slug)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

pub async fn insert_article(
    conn: &mut SqliteConnection,
    article: &NewArticle<'_>,
) -> Result<i64, sqlx::Error> {
    let timestamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, author_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(article.slug)
    .bind(article.title)
    .bind(article.description)
    .bind(article.body)
    .bind(article.author_id)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_article_row(
    conn: &mut SqliteConnection,
    id: i64,
    changes: &ArticleChanges<'_>,
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE articles SET ");
    {
        let mut separated = builder.separated(", ");
        if let Some(slug) = changes.slug {
            separated.push("slug = ").push_bind_unseparated(slug);
        }
        if let Some(title) = changes.title {
            separated.push("title = ").push_bind_unseparated(title);
        }
        if let Some(description) = changes.description {
            separated
                .push("description = ")
                .push_bind_unseparated(description);
        }
        if let Some(body) = changes.body {
            separated.push("body = ").push_bind_unseparated(body);
        }
        separated.push("updated_at = ").push_bind_unseparated(now());
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Comments, tag links and favorites go with it through `ON DELETE CASCADE`.
pub async fn delete_article_row(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
