use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::form::FormErrors;
use crate::image::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, Image, Page};

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// What the gallery home renders.
#[derive(Debug, Serialize, Deserialize)]
pub struct View {
    /// All of the viewer's own images.
    pub user_images: Vec<Image>,
    /// Everyone else's, paginated.
    pub community_images: Page<Image>,
    pub errors: FormErrors,
}

/// Gallery home, partitioned by ownership.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    errors: FormErrors,
    Query(pagination): Query<Pagination>,
) -> Result<Json<View>> {
    let viewer = state.sessions.current_user_id(&headers).await?;

    let user_images = match viewer {
        Some(user_id) => state.images.owned_by(user_id).await?,
        None => Vec::new(),
    };
    let community_images = state
        .images
        .community(
            viewer,
            pagination.page.unwrap_or(DEFAULT_PAGE),
            pagination.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    tracing::info!("returning gallery home view");
    Ok(Json(View {
        user_images,
        community_images,
        errors,
    }))
}
