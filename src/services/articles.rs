use std::collections::{HashMap, HashSet};

use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::data_formats::{
    format_timestamp, ArticleFilter, ArticleResponse, CreateArticleRequest,
    MultipleArticlesWrapper, Pagination, UpdateArticleRequest, Validate,
};
use crate::db_helpers::{
    count_articles, delete_article_row, fetch_article_page, find_article_by_slug,
    find_article_key, insert_article, link_tag, tags_for_articles, update_article_row,
    upsert_tag, ArticleChanges, ArticleScope, NewArticle,
};
use crate::errors::{is_unique_violation_on, RequestError};
use crate::models::ArticleRow;

use super::profiles::build_profile;
use super::slugs::generate_unique_slug;

/// Times a write is retried after losing a slug race to a concurrent writer.
const SLUG_WRITE_ATTEMPTS: u32 = 3;
const SLUG_COLUMN: &str = "articles.slug";

pub fn article_view(row: ArticleRow, tag_list: Vec<String>) -> ArticleResponse {
    ArticleResponse {
        slug: row.slug,
        title: row.title,
        description: row.description,
        body: row.body,
        tag_list,
        created_at: format_timestamp(row.created_at),
        updated_at: format_timestamp(row.updated_at),
        favorited: row.favorited,
        favorites_count: row.favorites_count,
        author: build_profile(
            row.author_username,
            row.author_bio,
            row.author_image,
            row.following,
        ),
    }
}

/// Trims every tag, drops blanks and keeps the first occurrence of each
/// exact (case-sensitive) name.
pub fn sanitize_tag_list(tag_list: Option<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    tag_list
        .unwrap_or_default()
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn attach_tags(rows: Vec<ArticleRow>, mut tags: HashMap<i64, Vec<String>>) -> Vec<ArticleResponse> {
    rows.into_iter()
        .map(|row| {
            let tag_list = tags.remove(&row.id).unwrap_or_default();
            article_view(row, tag_list)
        })
        .collect()
}

pub(crate) async fn load_article_view(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    slug: &str,
) -> Result<ArticleResponse, RequestError> {
    let row = find_article_by_slug(conn, viewer, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let mut tags = tags_for_articles(conn, &[row.id]).await?;
    let tag_list = tags.remove(&row.id).unwrap_or_default();
    Ok(article_view(row, tag_list))
}

// Page and count run in one transaction so they describe the same snapshot.
async fn list_scope(
    pool: &SqlitePool,
    viewer: Option<i64>,
    scope: ArticleScope<'_>,
    page: Pagination,
) -> Result<MultipleArticlesWrapper, RequestError> {
    let mut tx = pool.begin().await?;
    let rows = fetch_article_page(&mut tx, viewer, scope, page).await?;
    let articles_count = count_articles(&mut tx, scope).await?;
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let tags = tags_for_articles(&mut tx, &ids).await?;
    tx.commit().await?;

    Ok(MultipleArticlesWrapper::new(
        attach_tags(rows, tags),
        articles_count,
    ))
}

pub async fn list_articles(
    pool: &SqlitePool,
    viewer: Option<i64>,
    filter: &ArticleFilter,
    page: Pagination,
) -> Result<MultipleArticlesWrapper, RequestError> {
    list_scope(pool, viewer, ArticleScope::Filtered(filter), page).await
}

pub async fn list_feed(
    pool: &SqlitePool,
    viewer: i64,
    page: Pagination,
) -> Result<MultipleArticlesWrapper, RequestError> {
    list_scope(pool, Some(viewer), ArticleScope::Feed(viewer), page).await
}

pub async fn get_article(
    pool: &SqlitePool,
    viewer: Option<i64>,
    slug: &str,
) -> Result<ArticleResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    load_article_view(&mut conn, viewer, slug).await
}

pub async fn create_article(
    pool: &SqlitePool,
    author_id: i64,
    request: CreateArticleRequest,
) -> Result<ArticleResponse, RequestError> {
    let CreateArticleRequest {
        title,
        description,
        body,
        tag_list,
    } = request.validate()?;
    let tags = sanitize_tag_list(tag_list);
    let mut conn = pool.acquire().await?;

    for attempt in 1..=SLUG_WRITE_ATTEMPTS {
        let slug = generate_unique_slug(&mut conn, &title).await?;
        let mut tx = conn.begin().await?;
        let inserted = insert_article(
            &mut tx,
            &NewArticle {
                slug: &slug,
                title: &title,
                description: &description,
                body: &body,
                author_id,
            },
        )
        .await;

        match inserted {
            Ok(article_id) => {
                for tag in &tags {
                    let tag_id = upsert_tag(&mut tx, tag).await?;
                    link_tag(&mut tx, article_id, tag_id).await?;
                }
                tx.commit().await?;
                info!(%slug, author_id, "article created");
                return load_article_view(&mut conn, Some(author_id), &slug).await;
            }
            Err(e) if is_unique_violation_on(&e, SLUG_COLUMN) => {
                warn!(%slug, attempt, "slug taken by a concurrent write, regenerating");
                tx.rollback().await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(RequestError::Conflict("Could not allocate a unique slug"))
}

/// Applies only the fields present in `patch`. The slug is regenerated only
/// when the title actually changes.
pub async fn update_article(
    pool: &SqlitePool,
    user_id: i64,
    slug: &str,
    patch: UpdateArticleRequest,
) -> Result<ArticleResponse, RequestError> {
    let patch = patch.validate()?;
    let mut conn = pool.acquire().await?;
    let existing = find_article_key(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    if existing.author_id != user_id {
        return Err(RequestError::Forbidden("Cannot update article"));
    }

    let new_title = patch.title.filter(|title| *title != existing.title);

    for attempt in 1..=SLUG_WRITE_ATTEMPTS {
        let new_slug = match &new_title {
            Some(title) => Some(generate_unique_slug(&mut conn, title).await?),
            None => None,
        };
        let changes = ArticleChanges {
            slug: new_slug.as_deref(),
            title: new_title.as_deref(),
            description: patch.description.as_deref(),
            body: patch.body.as_deref(),
        };

        match update_article_row(&mut conn, existing.id, &changes).await {
            Ok(()) => {
                let current = new_slug.as_deref().unwrap_or(slug);
                return load_article_view(&mut conn, Some(user_id), current).await;
            }
            Err(e) if new_slug.is_some() && is_unique_violation_on(&e, SLUG_COLUMN) => {
                warn!(slug, attempt, "slug taken by a concurrent write, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(RequestError::Conflict("Could not allocate a unique slug"))
}

pub async fn delete_article(
    pool: &SqlitePool,
    user_id: i64,
    slug: &str,
) -> Result<(), RequestError> {
    let mut conn = pool.acquire().await?;
    let existing = find_article_key(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    if existing.author_id != user_id {
        return Err(RequestError::Forbidden("Cannot delete article"));
    }
    delete_article_row(&mut conn, existing.id).await?;
    info!(slug, user_id, "article deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::favorites::favorite_article;
    use crate::services::profiles::follow_user;
    use crate::test_support::{file_pool, seed_user, test_pool};

    fn new_article(title: &str, tags: &[&str]) -> CreateArticleRequest {
        CreateArticleRequest {
            title: title.to_string(),
            description: format!("about {title}"),
            body: "body".to_string(),
            tag_list: Some(tags.iter().map(|t| t.to_string()).collect()),
        }
    }

    fn by_tag(tag: &str) -> ArticleFilter {
        ArticleFilter {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn tag_list_is_trimmed_and_deduplicated() {
        let tags = sanitize_tag_list(Some(vec![
            " rust ".into(),
            "rust".into(),
            "".into(),
            "   ".into(),
            "Rust".into(),
        ]));
        assert_eq!(tags, vec!["rust", "Rust"]);
        assert!(sanitize_tag_list(None).is_empty());
    }

    #[tokio::test]
    async fn same_title_gets_distinct_slugs() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let first = create_article(&pool, author, new_article("A B C", &[])).await.unwrap();
        let second = create_article(&pool, author, new_article("A B C", &[])).await.unwrap();

        assert_eq!(first.slug, "a-b-c");
        let suffix = second.slug.strip_prefix("a-b-c-").expect("suffixed slug");
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[tokio::test]
    async fn created_article_carries_sanitized_tags() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let article = create_article(
            &pool,
            author,
            new_article("Tagged", &["dragons", " dragons ", "", "training"]),
        )
        .await
        .unwrap();
        assert_eq!(article.tag_list, vec!["dragons", "training"]);
        assert_eq!(article.favorites_count, 0);
        assert!(!article.favorited);
        assert_eq!(article.author.username, "author");
    }

    #[tokio::test]
    async fn tag_filter_counts_only_matches() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        create_article(&pool, author, new_article("One", &["x"])).await.unwrap();
        create_article(&pool, author, new_article("Two", &["y"])).await.unwrap();
        create_article(&pool, author, new_article("Three", &["x", "y"])).await.unwrap();
        create_article(&pool, author, new_article("Four", &[])).await.unwrap();
        create_article(&pool, author, new_article("Five", &["z"])).await.unwrap();

        let listed = list_articles(&pool, None, &by_tag("x"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.articles.len(), 2);
        assert_eq!(listed.articles_count, 2);
        assert_eq!(listed.articles[0].title, "Three");
        assert_eq!(listed.articles[0].tag_list, vec!["x", "y"]);
        assert_eq!(listed.articles[1].title, "One");

        let all = list_articles(&pool, None, &ArticleFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.articles_count, 5);
        assert_eq!(all.articles[0].title, "Five");
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let pool = test_pool().await;
        let jake = seed_user(&pool, "jake").await;
        let anna = seed_user(&pool, "anna").await;
        let jakes = create_article(&pool, jake, new_article("Jake Rust", &["rust"])).await.unwrap();
        create_article(&pool, jake, new_article("Jake Go", &["go"])).await.unwrap();
        let annas = create_article(&pool, anna, new_article("Anna Rust", &["rust"])).await.unwrap();
        favorite_article(&pool, anna, &jakes.slug).await.unwrap();
        favorite_article(&pool, anna, &annas.slug).await.unwrap();

        let filter = ArticleFilter {
            tag: Some("rust".into()),
            author: Some("jake".into()),
            favorited: None,
        };
        let listed = list_articles(&pool, None, &filter, Pagination::default()).await.unwrap();
        assert_eq!(listed.articles_count, 1);
        assert_eq!(listed.articles[0].slug, jakes.slug);

        let filter = ArticleFilter {
            favorited: Some("anna".into()),
            ..Default::default()
        };
        let listed = list_articles(&pool, Some(anna), &filter, Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.articles_count, 2);
        assert!(listed.articles.iter().all(|a| a.favorited));

        let filter = ArticleFilter {
            author: Some("nobody".into()),
            ..Default::default()
        };
        let listed = list_articles(&pool, None, &filter, Pagination::default()).await.unwrap();
        assert_eq!(listed.articles_count, 0);
        assert!(listed.articles.is_empty());
    }

    #[tokio::test]
    async fn pages_add_up_to_the_total() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        for i in 0..7 {
            create_article(&pool, author, new_article(&format!("Post {i}"), &["paged"]))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let page = Pagination { limit: 3, offset };
            let listed = list_articles(&pool, None, &by_tag("paged"), page).await.unwrap();
            assert_eq!(listed.articles_count, 7);
            if listed.articles.is_empty() {
                break;
            }
            seen.extend(listed.articles.into_iter().map(|a| a.slug));
            offset += 3;
        }
        assert_eq!(seen.len(), 7);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn feed_only_shows_followed_authors() {
        let pool = test_pool().await;
        let reader = seed_user(&pool, "reader").await;
        let followed = seed_user(&pool, "followed").await;
        let stranger = seed_user(&pool, "stranger").await;
        create_article(&pool, followed, new_article("Followed post", &["t"])).await.unwrap();
        create_article(&pool, stranger, new_article("Stranger post", &["t"])).await.unwrap();

        let empty = list_feed(&pool, reader, Pagination::default()).await.unwrap();
        assert_eq!(empty.articles_count, 0);

        follow_user(&pool, reader, "followed").await.unwrap();
        let feed = list_feed(&pool, reader, Pagination::default()).await.unwrap();
        assert_eq!(feed.articles_count, 1);
        assert_eq!(feed.articles[0].title, "Followed post");
        assert!(feed.articles[0].author.following);
    }

    #[tokio::test]
    async fn viewer_flags_are_relative() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let reader = seed_user(&pool, "reader").await;
        let article = create_article(&pool, author, new_article("Flags", &[])).await.unwrap();
        favorite_article(&pool, reader, &article.slug).await.unwrap();
        follow_user(&pool, reader, "author").await.unwrap();

        let as_reader = get_article(&pool, Some(reader), &article.slug).await.unwrap();
        assert!(as_reader.favorited);
        assert!(as_reader.author.following);

        let as_author = get_article(&pool, Some(author), &article.slug).await.unwrap();
        assert!(!as_author.favorited);
        assert!(!as_author.author.following);

        let anonymous = get_article(&pool, None, &article.slug).await.unwrap();
        assert!(!anonymous.favorited);
        assert_eq!(anonymous.favorites_count, 1);
    }

    #[tokio::test]
    async fn update_is_partial_and_reslugs_on_new_title() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let article = create_article(&pool, author, new_article("Old Title", &["keep"]))
            .await
            .unwrap();

        let same_title = update_article(
            &pool,
            author,
            &article.slug,
            UpdateArticleRequest {
                title: Some("Old Title".into()),
                body: Some("new body".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(same_title.slug, "old-title");
        assert_eq!(same_title.body, "new body");
        assert_eq!(same_title.description, "about Old Title");

        let renamed = update_article(
            &pool,
            author,
            "old-title",
            UpdateArticleRequest {
                title: Some("New Title".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.slug, "new-title");
        assert_eq!(renamed.title, "New Title");
        assert_eq!(renamed.body, "new body");
        assert_eq!(renamed.tag_list, vec!["keep"]);
        assert!(matches!(
            get_article(&pool, None, "old-title").await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn non_authors_cannot_update_or_delete() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let intruder = seed_user(&pool, "intruder").await;
        let article = create_article(&pool, author, new_article("Mine", &[])).await.unwrap();

        assert!(matches!(
            update_article(&pool, intruder, &article.slug, UpdateArticleRequest::default()).await,
            Err(RequestError::Forbidden(_))
        ));
        assert!(matches!(
            delete_article(&pool, intruder, &article.slug).await,
            Err(RequestError::Forbidden(_))
        ));
        assert!(matches!(
            delete_article(&pool, author, "missing").await,
            Err(RequestError::NotFound(_))
        ));

        delete_article(&pool, author, &article.slug).await.unwrap();
        assert!(matches!(
            get_article(&pool, None, &article.slug).await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_without_writing() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let blank = CreateArticleRequest {
            title: String::new(),
            description: " ".into(),
            body: String::new(),
            tag_list: None,
        };
        assert!(matches!(
            create_article(&pool, author, blank).await,
            Err(RequestError::ValidationError(_))
        ));
        let listed = list_articles(&pool, None, &ArticleFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.articles_count, 0);

        let article = create_article(&pool, author, new_article("Kept", &[])).await.unwrap();
        let patch = UpdateArticleRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_article(&pool, author, &article.slug, patch).await,
            Err(RequestError::ValidationError(_))
        ));
        let unchanged = get_article(&pool, None, "kept").await.unwrap();
        assert_eq!(unchanged.title, "Kept");
    }

    #[tokio::test]
    async fn blank_filter_values_match_everything() {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        create_article(&pool, author, new_article("Only", &["x"])).await.unwrap();

        let filter = ArticleFilter {
            tag: Some(String::new()),
            author: Some(" ".into()),
            favorited: Some(String::new()),
        };
        let listed = list_articles(&pool, None, &filter, Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.articles_count, 1);
        assert_eq!(listed.articles.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_title_creates_all_succeed() {
        const CALLERS: usize = 16;
        let (_dir, pool) = file_pool(8).await;
        let author = seed_user(&pool, "author").await;

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    create_article(&pool, author, new_article("A B C", &["race"])).await
                })
            })
            .collect();

        let mut slugs = HashSet::new();
        for handle in handles {
            let article = handle.await.unwrap().unwrap();
            assert!(article.slug == "a-b-c" || article.slug.starts_with("a-b-c-"));
            assert_eq!(article.tag_list, vec!["race"]);
            slugs.insert(article.slug);
        }
        assert_eq!(slugs.len(), CALLERS);
        assert!(slugs.contains("a-b-c"));

        let listed = list_articles(&pool, None, &by_tag("race"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.articles_count, CALLERS as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_renames_to_one_title_get_distinct_slugs() {
        const CALLERS: usize = 8;
        let (_dir, pool) = file_pool(CALLERS as u32).await;
        let author = seed_user(&pool, "author").await;
        let mut originals = Vec::new();
        for n in 0..CALLERS {
            let article = create_article(&pool, author, new_article(&format!("Draft {n}"), &[]))
                .await
                .unwrap();
            originals.push(article.slug);
        }

        let handles: Vec<_> = originals
            .into_iter()
            .map(|slug| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let patch = UpdateArticleRequest {
                        title: Some("Final".into()),
                        ..Default::default()
                    };
                    update_article(&pool, author, &slug, patch).await
                })
            })
            .collect();

        let mut slugs = HashSet::new();
        for handle in handles {
            let article = handle.await.unwrap().unwrap();
            assert_eq!(article.title, "Final");
            slugs.insert(article.slug);
        }
        assert_eq!(slugs.len(), CALLERS);
        assert!(slugs.contains("final"));
    }
}
