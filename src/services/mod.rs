//! Request-level operations. Each one owns its connection and transaction
//! boundaries and hands back response-shaped values.

pub mod articles;
pub mod comments;
pub mod favorites;
pub mod profiles;
pub mod slugs;
pub mod tags;
pub mod users;
