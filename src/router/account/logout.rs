use axum::Extension;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect, Response};

use crate::AppState;
use crate::error::Result;
use crate::router::HOME_PATH;
use crate::user::User;

/// Handler to sign the current user out. Session required.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(user): Extension<User>,
) -> Result<Response> {
    tracing::info!(email = %user.email, "signing out user");

    let cookie = state.sessions.clear(&headers).await?;

    let mut response = Redirect::to(HOME_PATH).into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);
    Ok(response)
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::Method;

    use crate::router::LOGIN_PATH;
    use crate::*;

    #[tokio::test]
    async fn test_logout_requires_session() {
        let app = app(router::state());

        let response = make_request(
            app,
            Method::GET,
            "/account/logout",
            String::default(),
        )
        .await;

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], LOGIN_PATH);
    }
}
