//! Single-key JSON envelopes the API wraps every payload in, e.g.
//! `{"user": {...}}` or `{"comments": [...]}`.

use serde::{Deserialize, Serialize};

use super::response::{ArticleResponse, CommentResponse, ProfileResponse};

macro_rules! envelope {
    ($(#[$doc:meta])* $name:ident<T> => $key:ident) => {
        $(#[$doc])*
        #[derive(Debug, Deserialize, Serialize)]
        pub struct $name<T> {
            pub $key: T,
        }

        impl<T> From<T> for $name<T> {
            fn from($key: T) -> Self {
                Self { $key }
            }
        }
    };
    ($(#[$doc:meta])* $name:ident($payload:ty) => $key:ident) => {
        $(#[$doc])*
        #[derive(Debug, Deserialize, Serialize)]
        pub struct $name {
            pub $key: $payload,
        }

        impl From<$payload> for $name {
            fn from($key: $payload) -> Self {
                Self { $key }
            }
        }
    };
}

envelope!(
    /// Carries login, registration and update payloads in, and the
    /// authenticated user out.
    UserWrapper<T> => user
);
envelope!(ArticleWrapper<T> => article);
envelope!(CommentWrapper<T> => comment);
envelope!(ProfileWrapper(ProfileResponse) => profile);
envelope!(MultipleCommentsWrapper(Vec<CommentResponse>) => comments);
envelope!(TagsWrapper(Vec<String>) => tags);

/// One page of articles plus the size of the whole filtered set.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleArticlesWrapper {
    pub articles: Vec<ArticleResponse>,
    pub articles_count: i64,
}

impl MultipleArticlesWrapper {
    pub fn new(articles: Vec<ArticleResponse>, articles_count: i64) -> Self {
        Self {
            articles,
            articles_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, to_value};

    use super::*;

    #[test]
    fn payloads_sit_under_their_key() {
        let tags = TagsWrapper::from(vec!["rust".to_string()]);
        assert_eq!(to_value(tags).unwrap(), json!({"tags": ["rust"]}));

        let comments = MultipleCommentsWrapper::from(Vec::new());
        assert_eq!(to_value(comments).unwrap(), json!({"comments": []}));

        let user = UserWrapper::<serde_json::Value>::from(json!({"name": "jake"}));
        assert_eq!(to_value(user).unwrap(), json!({"user": {"name": "jake"}}));
    }

    #[test]
    fn article_pages_report_the_total_in_camel_case() {
        let page = MultipleArticlesWrapper::new(Vec::new(), 42);
        assert_eq!(
            to_value(page).unwrap(),
            json!({"articles": [], "articlesCount": 42})
        );
    }

    #[test]
    fn request_envelopes_unwrap_their_payload() {
        let ArticleWrapper { article } =
            serde_json::from_value::<ArticleWrapper<Vec<u8>>>(json!({"article": [1, 2]})).unwrap();
        assert_eq!(article, vec![1, 2]);
    }
}
