mod authentication;
pub mod config;
mod data_formats;
mod db_helpers;
mod errors;
mod handlers;
mod models;
pub mod services;
pub mod state;

use std::{net::TcpListener, sync::Arc, time::Duration};

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
pub use data_formats::*;
pub use errors::{RequestError, RequestErrorJsonWrapper};
use handlers::*;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::state::AppContext;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Loads everything from `config`, optionally repairs counters, and serves
/// until the process is stopped.
pub async fn run_app(config: Config) -> Result<()> {
    let address = config.socket_addr()?;
    let repair = config.repair_counters_on_start;
    let context = AppContext::new(config).await?;
    if repair {
        let repaired = services::favorites::repair_favorite_counts(&context.pool)
            .await
            .context("Failed to repair favorites counts")?;
        info!(repaired, "Counter repair finished");
    }

    let listener = TcpListener::bind(address).context("Failed to bind address")?;
    info!("Server started on {}", address);
    serve(listener, make_router(context)).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let in_memory = db_url.contains(":memory:");
    if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {db_url}"))?;
    }

    // Every connection to `:memory:` is its own database, so pin the pool
    // to a single connection that is never recycled.
    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
    };
    let pool = options
        .connect(db_url)
        .await
        .with_context(|| format!("Failed to connect to {db_url}"))?;

    info!("Running Migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");
    Ok(pool)
}

/// Binds an OS-assigned port on localhost.
pub fn bind_random_port() -> Result<TcpListener> {
    TcpListener::bind("127.0.0.1:0").context("Could not get a free port")
}

pub fn make_router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/check_health", get(alive))
        .route("/users/login", post(login_user))
        .route("/users", post(register_user))
        .route("/user", get(get_current_user).put(update_user))
        .route("/profiles/:username", get(get_profile))
        .route(
            "/profiles/:username/follow",
            post(follow_profile).delete(unfollow_profile),
        )
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/feed", get(feed_articles))
        .route(
            "/articles/:slug",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/:slug/favorite",
            post(favorite_article).delete(unfavorite_article),
        )
        .route(
            "/articles/:slug/comments",
            get(list_comments).post(add_comment),
        )
        .route("/articles/:slug/comments/:id", delete(delete_comment))
        .route("/tags", get(list_tags))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(context))
}
