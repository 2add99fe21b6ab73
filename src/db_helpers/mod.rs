//! Relational store gateway.
//!
//! Every function here takes a `&mut SqliteConnection` so callers decide the
//! transaction boundary: pass a pooled connection for a standalone read, or a
//! `Transaction` when several statements must land together.

use chrono::{NaiveDateTime, Utc};

mod article_helpers;
mod comment_helpers;
mod favorite_helpers;
mod profile_helpers;
mod tag_helpers;
mod user_helpers;

pub use article_helpers::*;
pub use comment_helpers::*;
pub use favorite_helpers::*;
pub use profile_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
