use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::{StatusCode, Uri},
    Extension, Json,
};
use tracing::debug;

use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        ArticleQueryParams, ArticleResponse, ArticleWrapper, CommentRequest, CommentResponse,
        CommentWrapper, CreateArticleRequest, FeedQueryParams, LoginRequest,
        MultipleArticlesWrapper, MultipleCommentsWrapper, ProfileWrapper, RegisterRequest,
        TagsWrapper, UpdateArticleRequest, UpdateUserRequest, UserResponse, UserWrapper,
    },
    errors::{RequestError, RequestErrorJsonWrapper},
    services,
    state::AppContext,
    JsonResponse,
};

type UserJson = UserWrapper<UserResponse>;
type ArticleJson = ArticleWrapper<ArticleResponse>;
type CommentJson = CommentWrapper<CommentResponse>;

type JsonResult<T> = Result<Json<T>, RequestError>;
type CreatedResult<T> = Result<JsonResponse<T>, RequestError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RequestError> {
    payload.map(|Json(inner)| inner).map_err(|rejection| {
        debug!(%rejection, "rejected request body");
        RequestError::ValidationError(rejection.body_text())
    })
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, RequestError> {
    params.map(|Query(inner)| inner).map_err(|rejection| {
        debug!(%rejection, "rejected query string");
        RequestError::ValidationError(rejection.body_text())
    })
}

fn path<T>(segments: Result<Path<T>, PathRejection>) -> Result<T, RequestError> {
    segments.map(|Path(inner)| inner).map_err(|rejection| {
        debug!(%rejection, "rejected path segment");
        RequestError::ValidationError(rejection.body_text())
    })
}

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> JsonResponse<RequestErrorJsonWrapper> {
    (
        StatusCode::NOT_FOUND,
        Json(RequestErrorJsonWrapper::new(&format!(
            "URL {} provided was not found",
            uri
        ))),
    )
}

// ----------------- User Handlers -----------------
pub async fn login_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    payload: Result<Json<UserWrapper<LoginRequest>>, JsonRejection>,
) -> JsonResult<UserJson> {
    let UserWrapper { user: request } = body(payload)?;
    let user = services::users::login(&ctx.pool, &ctx.config, request).await?;
    Ok(Json(UserWrapper::from(user)))
}

pub async fn register_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    payload: Result<Json<UserWrapper<RegisterRequest>>, JsonRejection>,
) -> CreatedResult<UserJson> {
    let UserWrapper { user: request } = body(payload)?;
    let user = services::users::register(&ctx.pool, &ctx.config, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserWrapper::from(user)),
    ))
}

pub async fn get_current_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    AuthUser { id }: AuthUser,
) -> JsonResult<UserJson> {
    let user = services::users::current_user(&ctx.pool, &ctx.config, id).await?;
    Ok(Json(UserWrapper::from(user)))
}

pub async fn update_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    AuthUser { id }: AuthUser,
    payload: Result<Json<UserWrapper<UpdateUserRequest>>, JsonRejection>,
) -> JsonResult<UserJson> {
    let UserWrapper { user: changes } = body(payload)?;
    let user = services::users::update_user(&ctx.pool, &ctx.config, id, changes).await?;
    Ok(Json(UserWrapper::from(user)))
}
// ----------------- End User Handlers -----------------

// ----------------- Profile Handlers -----------------
pub async fn get_profile(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    username: Result<Path<String>, PathRejection>,
) -> JsonResult<ProfileWrapper> {
    let username = path(username)?;
    let profile = services::profiles::get_profile(&ctx.pool, maybe_user.get_id(), &username).await?;
    Ok(Json(ProfileWrapper::from(profile)))
}

pub async fn follow_profile(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    username: Result<Path<String>, PathRejection>,
) -> JsonResult<ProfileWrapper> {
    let username = path(username)?;
    let profile = services::profiles::follow_user(&ctx.pool, user.id, &username).await?;
    Ok(Json(ProfileWrapper::from(profile)))
}

pub async fn unfollow_profile(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    username: Result<Path<String>, PathRejection>,
) -> JsonResult<ProfileWrapper> {
    let username = path(username)?;
    let profile = services::profiles::unfollow_user(&ctx.pool, user.id, &username).await?;
    Ok(Json(ProfileWrapper::from(profile)))
}

// ----------------- Article Handlers -----------------
pub async fn list_articles(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    params: Result<Query<ArticleQueryParams>, QueryRejection>,
) -> JsonResult<MultipleArticlesWrapper> {
    let (filter, page) = query(params)?.into_parts()?;
    let articles =
        services::articles::list_articles(&ctx.pool, maybe_user.get_id(), &filter, page).await?;
    Ok(Json(articles))
}

pub async fn feed_articles(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    params: Result<Query<FeedQueryParams>, QueryRejection>,
) -> JsonResult<MultipleArticlesWrapper> {
    let page = query(params)?.pagination()?;
    let articles = services::articles::list_feed(&ctx.pool, user.id, page).await?;
    Ok(Json(articles))
}

pub async fn get_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    slug: Result<Path<String>, PathRejection>,
) -> JsonResult<ArticleJson> {
    let slug = path(slug)?;
    let article = services::articles::get_article(&ctx.pool, maybe_user.get_id(), &slug).await?;
    Ok(Json(ArticleWrapper::from(article)))
}

pub async fn create_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    payload: Result<Json<ArticleWrapper<CreateArticleRequest>>, JsonRejection>,
) -> CreatedResult<ArticleJson> {
    let ArticleWrapper { article: request } = body(payload)?;
    let article = services::articles::create_article(&ctx.pool, user.id, request).await?;
    if !article.tag_list.is_empty() {
        ctx.tag_cache.invalidate().await;
    }
    Ok((StatusCode::CREATED, Json(ArticleWrapper::from(article))))
}

pub async fn update_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    slug: Result<Path<String>, PathRejection>,
    payload: Result<Json<ArticleWrapper<UpdateArticleRequest>>, JsonRejection>,
) -> JsonResult<ArticleJson> {
    let slug = path(slug)?;
    let ArticleWrapper { article: patch } = body(payload)?;
    let article = services::articles::update_article(&ctx.pool, user.id, &slug, patch).await?;
    Ok(Json(ArticleWrapper::from(article)))
}

pub async fn delete_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    slug: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, RequestError> {
    let slug = path(slug)?;
    services::articles::delete_article(&ctx.pool, user.id, &slug).await?;
    Ok(StatusCode::OK)
}

pub async fn favorite_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    slug: Result<Path<String>, PathRejection>,
) -> JsonResult<ArticleJson> {
    let slug = path(slug)?;
    let article = services::favorites::favorite_article(&ctx.pool, user.id, &slug).await?;
    Ok(Json(ArticleWrapper::from(article)))
}

pub async fn unfavorite_article(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    slug: Result<Path<String>, PathRejection>,
) -> JsonResult<ArticleJson> {
    let slug = path(slug)?;
    let article = services::favorites::unfavorite_article(&ctx.pool, user.id, &slug).await?;
    Ok(Json(ArticleWrapper::from(article)))
}

// ----------------- Comment Handlers -----------------
pub async fn list_comments(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    slug: Result<Path<String>, PathRejection>,
) -> JsonResult<MultipleCommentsWrapper> {
    let slug = path(slug)?;
    let comments = services::comments::list_comments(&ctx.pool, maybe_user.get_id(), &slug).await?;
    Ok(Json(MultipleCommentsWrapper::from(comments)))
}

pub async fn add_comment(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    slug: Result<Path<String>, PathRejection>,
    payload: Result<Json<CommentWrapper<CommentRequest>>, JsonRejection>,
) -> CreatedResult<CommentJson> {
    let slug = path(slug)?;
    let CommentWrapper { comment: request } = body(payload)?;
    let comment = services::comments::add_comment(&ctx.pool, user.id, &slug, request).await?;
    Ok((StatusCode::CREATED, Json(CommentWrapper::from(comment))))
}

pub async fn delete_comment(
    Extension(ctx): Extension<Arc<AppContext>>,
    user: AuthUser,
    segments: Result<Path<(String, i64)>, PathRejection>,
) -> Result<StatusCode, RequestError> {
    let (slug, comment_id) = path(segments)?;
    services::comments::delete_comment(&ctx.pool, user.id, &slug, comment_id).await?;
    Ok(StatusCode::OK)
}

// ----------------- Tag Handlers -----------------
pub async fn list_tags(Extension(ctx): Extension<Arc<AppContext>>) -> JsonResult<TagsWrapper> {
    let tags = services::tags::list_tags(&ctx.pool, &ctx.tag_cache).await?;
    Ok(Json(TagsWrapper::from(tags)))
}
