use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::models::User;

use super::now;

const USER_COLUMNS: &str = "id, username, email, password, image, bio";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub bio: Option<&'a str>,
    pub image: Option<&'a str>,
}

/// Column changes for a user; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

pub async fn find_user_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<Sqlite, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<Sqlite, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<Sqlite, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    user: &NewUser<'_>,
) -> Result<i64, sqlx::Error> {
    let timestamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, username, password, bio, image, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(user.email)
    .bind(user.username)
    .bind(user.password_hash)
    .bind(user.bio)
    .bind(user.image)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_user_row(
    conn: &mut SqliteConnection,
    id: i64,
    changes: UserChanges,
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
    {
        let mut separated = builder.separated(", ");
        if let Some(email) = changes.email {
            separated.push("email = ").push_bind_unseparated(email);
        }
        if let Some(username) = changes.username {
            separated.push("username = ").push_bind_unseparated(username);
        }
        if let Some(password) = changes.password_hash {
            separated.push("password = ").push_bind_unseparated(password);
        }
        if let Some(bio) = changes.bio {
            separated.push("bio = ").push_bind_unseparated(bio);
        }
        if let Some(image) = changes.image {
            separated.push("image = ").push_bind_unseparated(image);
        }
        separated.push("updated_at = ").push_bind_unseparated(now());
    }
    builder.push(" WHERE id = ").push_bind(id);
    builder.build().execute(&mut *conn).await?;
    Ok(())
}
