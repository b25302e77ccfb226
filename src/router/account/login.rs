use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::form::FormErrors;
use crate::router::HOME_PATH;
use crate::user::SignIn;

const LOCKOUT_MESSAGE: &str =
    "Your account has been blocked due to a high number of failed login attempts.";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Body {
    pub email: String,
    pub password: String,
}

/// What the login form renders back.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct View {
    pub email: String,
    pub errors: FormErrors,
}

fn render(email: String, errors: FormErrors) -> Response {
    Json(View { email, errors }).into_response()
}

/// Exact remaining count only once it is running low.
fn remaining_tries_message(remaining_tries: i32) -> String {
    if remaining_tries > 3 {
        "Wrong password. Please try again.".to_owned()
    } else {
        format!("Wrong password. Remaining tries: {remaining_tries}")
    }
}

/// Render the login form, with any errors carried over a redirect.
pub async fn form(errors: FormErrors) -> Json<View> {
    tracing::info!("returning login view");
    Json(View {
        errors,
        ..Default::default()
    })
}

/// Handler to sign a user in.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut errors: FormErrors,
    Json(body): Json<Body>,
) -> Result<Response> {
    // the two required checks accumulate independently.
    if body.email.trim().is_empty() {
        errors.add_summary_for("email", "The email field is required.");
    }
    if body.password.trim().is_empty() {
        errors.add_summary_for("password", "The password field is required.");
    }
    if !errors.is_empty() {
        tracing::warn!("login input contains errors, returning view");
        return Ok(render(body.email, errors));
    }

    let Some(user) = state.users.repo.find_by_email(&body.email).await? else {
        errors.add_summary_for("email", "No user found with this email.");
        tracing::warn!("login input contains errors, returning view");
        return Ok(render(body.email, errors));
    };

    match state.users.password_sign_in(&user, &body.password).await? {
        SignIn::Success => {
            let cookie = state.sessions.sign_in(&headers, user.id, true).await?;
            tracing::info!(
                email = %user.email,
                "successfully logged in, redirecting to gallery home"
            );

            let mut response = Redirect::to(HOME_PATH).into_response();
            response.headers_mut().append(header::SET_COOKIE, cookie);
            Ok(response)
        },
        SignIn::LockedOut => {
            errors.add_summary_for("password", LOCKOUT_MESSAGE);
            tracing::warn!(email = %user.email, "login attempt on blocked account");
            Ok(render(body.email, errors))
        },
        SignIn::Failed { remaining_tries } => {
            errors.add_summary_for(
                "password",
                &remaining_tries_message(remaining_tries),
            );
            tracing::warn!(
                email = %user.email,
                "login is not succeeded, returning view"
            );
            Ok(render(body.email, errors))
        },
    }
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::form::SUMMARY;
    use crate::*;

    #[test]
    fn test_remaining_tries_message_threshold() {
        // above three remaining: stay vague.
        assert_eq!(
            remaining_tries_message(5),
            "Wrong password. Please try again."
        );
        assert_eq!(
            remaining_tries_message(4),
            "Wrong password. Please try again."
        );
        // at three or below: exact count.
        assert_eq!(
            remaining_tries_message(3),
            "Wrong password. Remaining tries: 3"
        );
        assert_eq!(
            remaining_tries_message(1),
            "Wrong password. Remaining tries: 1"
        );
    }

    #[tokio::test]
    async fn test_login_required_checks_accumulate() {
        let app = app(router::state());
        let response = make_request(
            app,
            Method::POST,
            "/account/login",
            json!({"email": "", "password": ""}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let view: View = serde_json::from_slice(&body).unwrap();

        // both fire together, each mirrored into the summary.
        assert_eq!(view.errors.field("email"), ["The email field is required."]);
        assert_eq!(
            view.errors.field("password"),
            ["The password field is required."]
        );
        assert_eq!(
            view.errors.field(SUMMARY),
            [
                "The email field is required.",
                "The password field is required."
            ]
        );
    }

    #[tokio::test]
    async fn test_login_form_renders_empty() {
        let app = app(router::state());
        let response =
            make_request(app, Method::GET, "/account/login", String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let view: View = serde_json::from_slice(&body).unwrap();
        assert!(view.errors.is_empty());
    }
}
