use sqlx::SqlitePool;
use tracing::{error, info};

use crate::authentication::{get_jwt_token, hash_password_argon2, verify_password_argon2};
use crate::config::Config;
use crate::data_formats::{
    LoginRequest, RegisterRequest, UpdateUserRequest, UserResponse, Validate,
};
use crate::db_helpers::{
    find_user_by_email, find_user_by_id, find_user_by_username, insert_user, update_user_row,
    NewUser, UserChanges,
};
use crate::errors::{is_unique_violation, is_unique_violation_on, RequestError};
use crate::models::User;

fn user_view(config: &Config, user: User) -> Result<UserResponse, RequestError> {
    let token = get_jwt_token(user.id, &config.jwt_secret, config.token_ttl_days).map_err(|e| {
        error!(error = %e, "could not issue token");
        RequestError::ServerError
    })?;
    Ok(UserResponse {
        email: user.email,
        token,
        username: user.username,
        bio: user.bio,
        image: user.image,
    })
}

fn conflict_from(error: sqlx::Error) -> RequestError {
    if is_unique_violation_on(&error, "users.email") {
        RequestError::Conflict("Email already registered")
    } else if is_unique_violation(&error) {
        RequestError::Conflict("Username already taken")
    } else {
        error.into()
    }
}

pub async fn register(
    pool: &SqlitePool,
    config: &Config,
    request: RegisterRequest,
) -> Result<UserResponse, RequestError> {
    let request = request.validate()?;
    let mut conn = pool.acquire().await?;
    if find_user_by_email(&mut conn, &request.email).await?.is_some() {
        return Err(RequestError::Conflict("Email already registered"));
    }
    if find_user_by_username(&mut conn, &request.username)
        .await?
        .is_some()
    {
        return Err(RequestError::Conflict("Username already taken"));
    }

    let password_hash = hash_password_argon2(request.password)
        .await
        .map_err(|_| RequestError::ServerError)?;
    let id = insert_user(
        &mut conn,
        &NewUser {
            email: &request.email,
            username: &request.username,
            password_hash: &password_hash,
            bio: request.bio.as_deref(),
            image: request.image.as_deref(),
        },
    )
    .await
    .map_err(conflict_from)?;
    info!(id, username = %request.username, "user registered");

    let user = find_user_by_id(&mut conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    user_view(config, user)
}

pub async fn login(
    pool: &SqlitePool,
    config: &Config,
    request: LoginRequest,
) -> Result<UserResponse, RequestError> {
    let request = request.validate()?;
    let mut conn = pool.acquire().await?;
    let user = find_user_by_email(&mut conn, &request.email)
        .await?
        .ok_or(RequestError::NotAuthorized("Invalid credentials"))?;
    drop(conn);

    let is_password_correct = verify_password_argon2(request.password, &user.password)
        .await
        .map_err(|_| RequestError::ServerError)?;
    if !is_password_correct {
        return Err(RequestError::NotAuthorized("Invalid credentials"));
    }
    user_view(config, user)
}

pub async fn current_user(
    pool: &SqlitePool,
    config: &Config,
    id: i64,
) -> Result<UserResponse, RequestError> {
    let mut conn = pool.acquire().await?;
    let user = find_user_by_id(&mut conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    user_view(config, user)
}

pub async fn update_user(
    pool: &SqlitePool,
    config: &Config,
    id: i64,
    changes: UpdateUserRequest,
) -> Result<UserResponse, RequestError> {
    let UpdateUserRequest {
        email,
        bio,
        image,
        username,
        password,
    } = changes.validate()?;
    let mut conn = pool.acquire().await?;
    let current = find_user_by_id(&mut conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;

    let email = email.filter(|email| *email != current.email);
    if let Some(email) = &email {
        if find_user_by_email(&mut conn, email).await?.is_some() {
            return Err(RequestError::Conflict("Email already registered"));
        }
    }
    let username = username.filter(|username| *username != current.username);
    if let Some(username) = &username {
        if find_user_by_username(&mut conn, username).await?.is_some() {
            return Err(RequestError::Conflict("Username already taken"));
        }
    }

    let password_hash = match password {
        Some(password) => Some(
            hash_password_argon2(password)
                .await
                .map_err(|_| RequestError::ServerError)?,
        ),
        None => None,
    };

    update_user_row(
        &mut conn,
        id,
        UserChanges {
            email,
            username,
            password_hash,
            bio,
            image,
        },
    )
    .await
    .map_err(conflict_from)?;

    let user = find_user_by_id(&mut conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    user_view(config, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::verify_jwt_token;
    use crate::test_support::{test_config, test_pool};

    fn registration(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "password123".into(),
            username: username.into(),
            bio: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_valid_tokens() {
        let pool = test_pool().await;
        let config = test_config();
        let registered = register(&pool, &config, registration("jake@jake.jake", "jake"))
            .await
            .unwrap();
        let id = verify_jwt_token(&registered.token, &config.jwt_secret).unwrap();

        let logged_in = login(
            &pool,
            &config,
            LoginRequest {
                email: "jake@jake.jake".into(),
                password: "password123".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.username, "jake");
        assert_eq!(verify_jwt_token(&logged_in.token, &config.jwt_secret).unwrap(), id);
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let pool = test_pool().await;
        let config = test_config();
        register(&pool, &config, registration("a@a.a", "alice")).await.unwrap();
        assert!(matches!(
            register(&pool, &config, registration("a@a.a", "other")).await,
            Err(RequestError::Conflict("Email already registered"))
        ));
        assert!(matches!(
            register(&pool, &config, registration("b@b.b", "alice")).await,
            Err(RequestError::Conflict("Username already taken"))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_not_authorized() {
        let pool = test_pool().await;
        let config = test_config();
        register(&pool, &config, registration("a@a.a", "alice")).await.unwrap();
        let result = login(
            &pool,
            &config,
            LoginRequest {
                email: "a@a.a".into(),
                password: "not-the-password".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(RequestError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let pool = test_pool().await;
        let config = test_config();
        let registered = register(&pool, &config, registration("a@a.a", "alice"))
            .await
            .unwrap();
        let id = verify_jwt_token(&registered.token, &config.jwt_secret).unwrap();

        let updated = update_user(
            &pool,
            &config,
            id,
            UpdateUserRequest {
                bio: Some("I like rust".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("I like rust"));
        assert_eq!(updated.email, "a@a.a");
        assert_eq!(updated.username, "alice");
    }

    #[tokio::test]
    async fn update_to_taken_username_conflicts() {
        let pool = test_pool().await;
        let config = test_config();
        register(&pool, &config, registration("b@b.b", "bob")).await.unwrap();
        let alice = register(&pool, &config, registration("a@a.a", "alice"))
            .await
            .unwrap();
        let id = verify_jwt_token(&alice.token, &config.jwt_secret).unwrap();
        let result = update_user(
            &pool,
            &config,
            id,
            UpdateUserRequest {
                username: Some("bob".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(RequestError::Conflict(_))));
    }

    #[tokio::test]
    async fn malformed_credentials_are_rejected_before_storage() {
        let pool = test_pool().await;
        let config = test_config();
        assert!(matches!(
            register(&pool, &config, registration("not-an-email", "alice")).await,
            Err(RequestError::ValidationError(_))
        ));
        let mut short = registration("a@a.a", "alice");
        short.password = "12345".into();
        assert!(matches!(
            register(&pool, &config, short).await,
            Err(RequestError::ValidationError(_))
        ));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        let alice = register(&pool, &config, registration("a@a.a", "alice"))
            .await
            .unwrap();
        let id = verify_jwt_token(&alice.token, &config.jwt_secret).unwrap();
        let result = update_user(
            &pool,
            &config,
            id,
            UpdateUserRequest {
                password: Some("abc".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(RequestError::ValidationError(_))));
    }
}
