use chrono::NaiveDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
    pub bio: Option<String>,
}

/// A user together with whether the current viewer follows them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

/// One article row joined with its author and the viewer-relative flags.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub favorites_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub author_username: String,
    pub author_bio: Option<String>,
    pub author_image: Option<String>,
    pub favorited: bool,
    pub following: bool,
}

/// The columns needed to authorize and re-slug an article.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleKey {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub author_username: String,
    pub author_bio: Option<String>,
    pub author_image: Option<String>,
    pub following: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentKey {
    pub id: i64,
    pub author_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleTag {
    pub article_id: i64,
    pub name: String,
}
