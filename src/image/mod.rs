mod repository;

pub use repository::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_URL_LENGTH: usize = 256;
pub const MAX_DESCRIPTION_LENGTH: usize = 128;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 21;

/// Image as saved on database.
///
/// A null `user_id` marks a community/seed image with no owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub description: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// Image owned by an uploader, accepted by moderation.
    pub fn owned(user_id: Uuid, url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            description: description.into(),
            user_id: Some(user_id),
            created_at: Utc::now(),
        }
    }
}

/// One page of a larger listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    /// Build a page; `page` and `page_size` are clamped to at least 1.
    pub fn new(items: Vec<T>, page: i64, page_size: i64, total_items: i64) -> Self {
        let page_size = page_size.max(1);
        Self {
            items,
            page: page.max(1),
            page_size,
            total_items,
            total_pages: (total_items + page_size - 1) / page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page: Page<i32> = Page::new(vec![1, 2, 3], 1, 21, 43);
        assert_eq!(page.total_pages, 3);

        let exact: Page<i32> = Page::new(vec![], 2, 21, 42);
        assert_eq!(exact.total_pages, 2);

        let empty: Page<i32> = Page::new(vec![], 1, 21, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_page_clamps_inputs() {
        let page: Page<i32> = Page::new(vec![], 0, 0, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 10);
    }
}
