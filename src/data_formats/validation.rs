use once_cell::sync::Lazy;
use regex::Regex;

use super::request::{
    CommentRequest, CreateArticleRequest, LoginRequest, RegisterRequest, UpdateArticleRequest,
    UpdateUserRequest,
};
use crate::errors::RequestError;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("valid email regex")
});

/// Checks a request payload before it reaches the store.
pub trait Validate: Sized {
    fn validate(self) -> Result<Self, RequestError>;
}

/// Collects every field problem so the client sees them all at once.
#[derive(Debug, Default)]
struct FieldErrors(Vec<String>);

impl FieldErrors {
    fn add(&mut self, field: &str, problem: &str) {
        self.0.push(format!("{field} {problem}"));
    }

    fn not_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "can't be blank");
        }
    }

    fn email(&mut self, value: &str) {
        if !EMAIL_RE.is_match(value) {
            self.add("email", "is invalid");
        }
    }

    fn password(&mut self, value: &str) {
        if value.chars().count() < MIN_PASSWORD_LEN {
            self.add("password", "is too short (minimum is 6 characters)");
        }
    }

    fn finish<T>(self, value: T) -> Result<T, RequestError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(RequestError::ValidationError(self.0.join("; ")))
        }
    }
}

impl Validate for LoginRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        errors.email(&self.email);
        errors.password(&self.password);
        errors.finish(self)
    }
}

impl Validate for RegisterRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        errors.email(&self.email);
        errors.password(&self.password);
        errors.not_blank("username", &self.username);
        errors.finish(self)
    }
}

impl Validate for UpdateUserRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        if let Some(email) = &self.email {
            errors.email(email);
        }
        if let Some(password) = &self.password {
            errors.password(password);
        }
        if let Some(username) = &self.username {
            errors.not_blank("username", username);
        }
        errors.finish(self)
    }
}

impl Validate for CreateArticleRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        errors.not_blank("title", &self.title);
        errors.not_blank("description", &self.description);
        errors.not_blank("body", &self.body);
        errors.finish(self)
    }
}

// Absent fields are left alone; present ones follow the create rules.
impl Validate for UpdateArticleRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        if let Some(title) = &self.title {
            errors.not_blank("title", title);
        }
        if let Some(description) = &self.description {
            errors.not_blank("description", description);
        }
        if let Some(body) = &self.body {
            errors.not_blank("body", body);
        }
        errors.finish(self)
    }
}

impl Validate for CommentRequest {
    fn validate(self) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::default();
        errors.not_blank("body", &self.body);
        errors.finish(self)
    }
}
