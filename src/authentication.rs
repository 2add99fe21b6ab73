use std::sync::Arc;

use crate::errors::RequestError;
use crate::state::AppContext;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    id: i64,
    exp: i64,
}

/// A viewer whose token has already been verified.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
}

/// The viewer if a token was supplied; anonymous otherwise.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

fn context_from_parts(parts: &Parts) -> Result<Arc<AppContext>, RequestError> {
    parts
        .extensions
        .get::<Arc<AppContext>>()
        .cloned()
        .ok_or(RequestError::ServerError)
}

fn token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = match parts.headers.get("Authorization") {
            Some(header) => header,
            None => return Ok(MaybeUser(None)),
        };
        let header = header.to_str().map_err(|_| {
            debug!("Authorization header is not valid UTF-8");
            RequestError::NotAuthorized("Invalid token")
        })?;
        let token = token_from_header(header).ok_or_else(|| {
            debug!("Authorization header has no Token/Bearer prefix");
            RequestError::NotAuthorized("Invalid token")
        })?;

        let context = context_from_parts(parts)?;
        let id = verify_jwt_token(token, &context.config.jwt_secret)?;

        Ok(MaybeUser(Some(AuthUser { id })))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(user),
            MaybeUser(None) => Err(RequestError::NotAuthorized("Need to be authorized")),
        }
    }
}

pub fn get_jwt_token(id: i64, jwt_secret: &str, ttl_days: i64) -> Result<String> {
    let expiry_date = OffsetDateTime::now_utc() + time::Duration::days(ttl_days);
    let claim = AuthClaim {
        id,
        exp: expiry_date.unix_timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<i64, RequestError> {
    let token_data = jsonwebtoken::decode::<AuthClaim>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        debug!(error = %e, "rejected jwt");
        RequestError::NotAuthorized("Invalid Token")
    })?;
    let claim = token_data.claims;
    if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::NotAuthorized("Token expired"));
    }
    Ok(claim.id)
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to parse password hash"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_verify_to_the_same_id() {
        let token = get_jwt_token(42, SECRET, 1).unwrap();
        assert_eq!(verify_jwt_token(&token, SECRET).unwrap(), 42);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = get_jwt_token(42, "other-secret", 1).unwrap();
        assert!(matches!(
            verify_jwt_token(&token, SECRET),
            Err(RequestError::NotAuthorized(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = get_jwt_token(7, SECRET, -2).unwrap();
        assert!(matches!(
            verify_jwt_token(&token, SECRET),
            Err(RequestError::NotAuthorized(_))
        ));
    }

    #[test]
    fn header_accepts_token_and_bearer_schemes() {
        assert_eq!(token_from_header("Token abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("Basic abc"), None);
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password_argon2("hunter22".to_string()).await.unwrap();
        assert!(verify_password_argon2("hunter22".to_string(), &hash)
            .await
            .unwrap());
        assert!(!verify_password_argon2("wrong".to_string(), &hash)
            .await
            .unwrap());
    }
}
