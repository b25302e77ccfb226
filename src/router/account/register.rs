use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::AppState;
use crate::error::Result;
use crate::form::FormErrors;
use crate::router::redirect_to_local;
use crate::user::{Registration, User};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Please enter a first name."))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Please enter a last name."))]
    pub last_name: String,
    #[validate(
        length(min = 1, message = "Please enter an email address."),
        custom(function = "email_format")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "Please enter a username."))]
    pub username: String,
    #[validate(
        length(min = 1, message = "Please enter a password."),
        custom(function = "password_length")
    )]
    pub password: String,
    #[validate(
        length(min = 1, message = "Please confirm your password."),
        must_match(other = "password", message = "Passwords do not match.")
    )]
    pub confirm_password: String,
}

// required-ness is reported by the length rule alone.
fn email_format(email: &str) -> std::result::Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email")
            .with_message("Invalid email address.".into()))
    }
}

fn password_length(password: &str) -> std::result::Result<(), ValidationError> {
    if password.is_empty() || password.len() >= MIN_PASSWORD_LENGTH {
        Ok(())
    } else {
        Err(ValidationError::new("password").with_message(
            "Password must be at least 8 characters long.".into(),
        ))
    }
}

/// What the registration form renders back.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct View {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub errors: FormErrors,
}

impl View {
    fn render(body: &Body, errors: FormErrors) -> Response {
        Json(View {
            first_name: body.first_name.clone(),
            last_name: body.last_name.clone(),
            email: body.email.clone(),
            username: body.username.clone(),
            errors,
        })
        .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnUrl {
    pub return_url: Option<String>,
}

/// Render the empty registration form.
pub async fn form(errors: FormErrors) -> Json<View> {
    tracing::info!("returning registration view");
    Json(View {
        errors,
        ..Default::default()
    })
}

/// Handler to register a user.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReturnUrl>,
    mut errors: FormErrors,
    Json(body): Json<Body>,
) -> Result<Response> {
    if let Err(violations) = body.validate() {
        errors.merge(violations.into());
    }
    if !errors.is_empty() {
        tracing::warn!("registration input contains errors, returning view");
        return Ok(View::render(&body, errors));
    }

    let mut user = User::local(
        &body.email,
        &body.username,
        &body.first_name,
        &body.last_name,
    );

    match state.users.register(&mut user, &body.password).await? {
        Registration::Created => {
            let cookie = state.sessions.sign_in(&headers, user.id, false).await?;
            tracing::info!(email = %user.email, "successfully registered user");

            let mut response = redirect_to_local(query.return_url.as_deref());
            response.headers_mut().append(header::SET_COOKIE, cookie);
            Ok(response)
        },
        Registration::Rejected(reasons) => {
            for reason in reasons {
                errors.add_summary(reason);
            }
            tracing::warn!(
                email = %body.email,
                "registration rejected by credential store, returning view"
            );
            Ok(View::render(&body, errors))
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

    async fn post_register(body: serde_json::Value) -> View {
        let app = app(router::state());
        let response = make_request(
            app,
            Method::POST,
            "/account/register",
            body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_register_empty_fields_render_required_messages() {
        let view = post_register(json!({
            "first_name": "",
            "last_name": "",
            "email": "",
            "username": "",
            "password": "",
            "confirm_password": "",
        }))
        .await;

        assert_eq!(view.errors.field("first_name"), ["Please enter a first name."]);
        assert_eq!(view.errors.field("last_name"), ["Please enter a last name."]);
        assert_eq!(view.errors.field("email"), ["Please enter an email address."]);
        assert_eq!(view.errors.field("username"), ["Please enter a username."]);
        assert_eq!(view.errors.field("password"), ["Please enter a password."]);
        assert_eq!(
            view.errors.field("confirm_password"),
            ["Please confirm your password."]
        );
        // no summary entry: these are all field-scoped.
        assert!(view.errors.field(SUMMARY).is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email_and_short_password() {
        let view = post_register(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "not-an-email",
            "username": "ada",
            "password": "short",
            "confirm_password": "short",
        }))
        .await;

        assert_eq!(view.errors.field("email"), ["Invalid email address."]);
        assert_eq!(
            view.errors.field("password"),
            ["Password must be at least 8 characters long."]
        );
        assert!(view.errors.field("confirm_password").is_empty());
        // entered values are rendered back.
        assert_eq!(view.email, "not-an-email");
        assert_eq!(view.username, "ada");
    }

    #[tokio::test]
    async fn test_register_rejects_password_mismatch() {
        let view = post_register(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.org",
            "username": "ada",
            "password": "long-enough-password",
            "confirm_password": "another-password",
        }))
        .await;

        assert_eq!(
            view.errors.field("confirm_password"),
            ["Passwords do not match."]
        );
        assert!(view.errors.field("password").is_empty());
    }

    #[tokio::test]
    async fn test_register_form_renders_empty() {
        let app = app(router::state());
        let response = make_request(
            app,
            Method::GET,
            "/account/register",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let view: View = serde_json::from_slice(&body).unwrap();
        assert!(view.errors.is_empty());
        assert!(view.email.is_empty());
    }
}
