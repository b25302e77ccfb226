//! Gallery HTTP API.
pub mod home;
mod upload;

use axum::routing::post;
use axum::{Router, middleware};

use crate::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `POST /images/upload` goes to `upload`. Session required.
        .route("/upload", post(upload::handler))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::router::require_user,
        ))
}
