//! Handle database requests for the gallery.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::image::{Image, Page};

#[derive(Clone)]
pub struct ImageRepository {
    pool: PgPool,
}

impl ImageRepository {
    /// Create a new [`ImageRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert [`Image`] into database.
    pub async fn insert(&self, image: &Image) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO images (id, url, description, user_id, created_at)
                VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(image.id)
        .bind(&image.url)
        .bind(&image.description)
        .bind(image.user_id)
        .bind(image.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All images owned by a user, newest first.
    pub async fn owned_by(&self, user_id: Uuid) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(
            r#"SELECT id, url, description, user_id, created_at
                FROM images WHERE user_id = $1
                ORDER BY created_at DESC, id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    /// One page of the community feed: ownerless images plus images
    /// owned by anyone but the viewer. An anonymous viewer sees it all.
    pub async fn community(
        &self,
        viewer: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<Page<Image>> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let total: i64 = sqlx::query(
            r#"SELECT COUNT(*) AS total FROM images
                WHERE $1::uuid IS NULL OR user_id IS NULL OR user_id <> $1"#,
        )
        .bind(viewer)
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let images = sqlx::query_as::<_, Image>(
            r#"SELECT id, url, description, user_id, created_at
                FROM images
                WHERE $1::uuid IS NULL OR user_id IS NULL OR user_id <> $1
                ORDER BY created_at DESC, id
                LIMIT $2 OFFSET $3"#,
        )
        .bind(viewer)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(images, page, page_size, total))
    }
}
