//! Slug generation for article titles.
//!
//! The existence check here is advisory: two writers can both see a slug as
//! free. The `UNIQUE` constraint on `articles.slug` is what finally decides,
//! and callers regenerate when an insert trips it.

use rand::Rng;
use sqlx::SqliteConnection;

use crate::db_helpers::slug_exists;
use crate::errors::RequestError;

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SHORT_SUFFIX_LEN: usize = 6;
const LONG_SUFFIX_LEN: usize = 12;
/// Collisions tolerated before switching to the long suffix.
const SHORT_SUFFIX_ATTEMPTS: u32 = 5;
/// Existence checks before giving up with a conflict.
pub const MAX_SLUG_CHECKS: u32 = 16;

pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Lowercase, hyphenated, ASCII-only form of `title`. Falls back to a random
/// token when nothing survives normalization.
pub fn slug_base(title: &str) -> String {
    let base = slug::slugify(title);
    if base.is_empty() {
        random_token(SHORT_SUFFIX_LEN)
    } else {
        base
    }
}

fn suffixed(base: &str, collisions: u32) -> String {
    let len = if collisions > SHORT_SUFFIX_ATTEMPTS {
        LONG_SUFFIX_LEN
    } else {
        SHORT_SUFFIX_LEN
    };
    format!("{base}-{}", random_token(len))
}

pub async fn generate_unique_slug(
    conn: &mut SqliteConnection,
    title: &str,
) -> Result<String, RequestError> {
    find_free_slug(conn, &slug_base(title), suffixed).await
}

async fn find_free_slug(
    conn: &mut SqliteConnection,
    base: &str,
    mut next_candidate: impl FnMut(&str, u32) -> String,
) -> Result<String, RequestError> {
    let mut candidate = base.to_string();
    for collisions in 1..=MAX_SLUG_CHECKS {
        if !slug_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        candidate = next_candidate(base, collisions);
    }
    Err(RequestError::Conflict("Could not allocate a unique slug"))
}
