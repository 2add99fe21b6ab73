mod request;
mod response;
mod validation;
mod wrapper;

pub use request::*;
pub use response::*;
pub use validation::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

const DEFAULT_LIMIT: i64 = 20;
/// Larger page requests are served this many articles.
pub const MAX_LIMIT: i64 = 100;

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct ArticleQueryParams {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub favorited: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FeedQueryParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Filters for the public article listing. Present fields are ANDed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, RequestError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(0);
        if limit <= 0 {
            return Err(RequestError::ValidationError(
                "limit must be a positive integer".to_string(),
            ));
        }
        if offset < 0 {
            return Err(RequestError::ValidationError(
                "offset must not be negative".to_string(),
            ));
        }
        Ok(Self {
            limit: limit.min(MAX_LIMIT),
            offset,
        })
    }
}

impl ArticleQueryParams {
    pub fn into_parts(self) -> Result<(ArticleFilter, Pagination), RequestError> {
        let pagination = Pagination::new(self.limit, self.offset)?;
        let filter = ArticleFilter {
            tag: present(self.tag),
            author: present(self.author),
            favorited: present(self.favorited),
        };
        Ok((filter, pagination))
    }
}

// `?tag=` with nothing after it means no tag filter at all.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl FeedQueryParams {
    pub fn pagination(&self) -> Result<Pagination, RequestError> {
        Pagination::new(self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        assert_eq!(
            Pagination::new(None, None).unwrap(),
            Pagination {
                limit: 20,
                offset: 0
            }
        );
    }

    #[test]
    fn oversized_pages_are_clamped() {
        assert_eq!(Pagination::new(Some(1_000_000), None).unwrap().limit, MAX_LIMIT);
        assert_eq!(Pagination::new(Some(MAX_LIMIT), None).unwrap().limit, MAX_LIMIT);
    }

    #[test]
    fn pagination_rejects_non_positive_limit() {
        assert!(matches!(
            Pagination::new(Some(0), None),
            Err(RequestError::ValidationError(_))
        ));
        assert!(matches!(
            Pagination::new(Some(-5), None),
            Err(RequestError::ValidationError(_))
        ));
    }

    #[test]
    fn pagination_rejects_negative_offset() {
        assert!(matches!(
            Pagination::new(Some(10), Some(-1)),
            Err(RequestError::ValidationError(_))
        ));
        assert!(Pagination::new(Some(10), Some(0)).is_ok());
    }

    #[test]
    fn query_params_split_into_filter_and_page() {
        let params = ArticleQueryParams {
            tag: Some("rust".into()),
            favorited: Some("jake".into()),
            limit: Some(5),
            ..Default::default()
        };
        let (filter, page) = params.into_parts().unwrap();
        assert_eq!(filter.tag.as_deref(), Some("rust"));
        assert_eq!(filter.author, None);
        assert_eq!(filter.favorited.as_deref(), Some("jake"));
        assert_eq!(page.limit, 5);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let params = ArticleQueryParams {
            tag: Some(String::new()),
            author: Some("   ".into()),
            favorited: Some("jake".into()),
            ..Default::default()
        };
        let (filter, _) = params.into_parts().unwrap();
        assert_eq!(
            filter,
            ArticleFilter {
                tag: None,
                author: None,
                favorited: Some("jake".into()),
            }
        );
    }
}
