use sqlx::SqlitePool;
use tracing::info;

use crate::data_formats::{format_timestamp, CommentRequest, CommentResponse, Validate};
use crate::db_helpers::{
    comments_for_article, delete_comment_row, find_article_id, find_comment, find_comment_key,
    insert_comment,
};
use crate::errors::RequestError;
use crate::models::CommentRow;

use super::profiles::build_profile;

fn comment_view(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        created_at: format_timestamp(row.created_at),
        updated_at: format_timestamp(row.updated_at),
        body: row.body,
        author: build_profile(
            row.author_username,
            row.author_bio,
            row.author_image,
            row.following,
        ),
    }
}

pub async fn list_comments(
    pool: &SqlitePool,
    viewer: Option<i64>,
    slug: &str,
) -> Result<Vec<CommentResponse>, RequestError> {
    let mut conn = pool.acquire().await?;
    let article_id = find_article_id(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let rows = comments_for_article(&mut conn, viewer, article_id).await?;
    Ok(rows.into_iter().map(comment_view).collect())
}

pub async fn add_comment(
    pool: &SqlitePool,
    author_id: i64,
    slug: &str,
    request: CommentRequest,
) -> Result<CommentResponse, RequestError> {
    let CommentRequest { body } = request.validate()?;
    let mut conn = pool.acquire().await?;
    let article_id = find_article_id(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let comment_id = insert_comment(&mut conn, article_id, author_id, &body).await?;
    let row = find_comment(&mut conn, Some(author_id), comment_id)
        .await?
        .ok_or(RequestError::NotFound("Comment not found"))?;
    Ok(comment_view(row))
}

pub async fn delete_comment(
    pool: &SqlitePool,
    user_id: i64,
    slug: &str,
    comment_id: i64,
) -> Result<(), RequestError> {
    let mut conn = pool.acquire().await?;
    let article_id = find_article_id(&mut conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let comment = find_comment_key(&mut conn, article_id, comment_id)
        .await?
        .ok_or(RequestError::NotFound("Comment not found"))?;
    if comment.author_id != user_id {
        return Err(RequestError::Forbidden("Cannot delete comment"));
    }
    delete_comment_row(&mut conn, comment.id).await?;
    info!(comment_id, user_id, "comment deleted");
    Ok(())
}
