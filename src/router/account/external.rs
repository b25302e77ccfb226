use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::form::FormErrors;
use crate::oauth::{ExternalLoginInfo, LoginAttempt};
use crate::router::{LOGIN_PATH, redirect_to_local, redirect_with_errors};
use crate::user::{ExternalLogin, ExternalSignIn, User};

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub provider: Option<String>,
    pub return_url: Option<String>,
}

/// Handler to start an external login challenge.
pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StartQuery>,
) -> Result<Response> {
    let provider = query
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|provider| !provider.is_empty())
        .ok_or(ServerError::MissingProvider)?;

    let (challenge, attempt) = state
        .oauth
        .challenge(provider, query.return_url.as_deref())
        .ok_or(ServerError::UnknownProvider)?;

    tracing::info!(%provider, "executing external login request");

    let attempt =
        serde_json::to_value(&attempt).map_err(|err| ServerError::Internal {
            details: "login attempt is not serializable".into(),
            source: Some(Box::new(err)),
        })?;
    let cookie = state.sessions.set_login_attempt(&headers, &attempt).await?;

    let mut response = Redirect::to(&challenge).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub return_url: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Handler for the provider callback.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let Some(info) = fetch_login_info(&state, &headers, &query).await else {
        tracing::warn!(
            "external login failed for a third-party reason, redirecting to login"
        );
        return Ok(redirect_to_login_forcibly(query.return_url.as_deref()));
    };

    let email = info
        .email
        .clone()
        .unwrap_or_else(|| info.provider_key.clone());

    let user = match state.users.repo.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let user = User::external(
                &email,
                info.first_name.clone(),
                info.last_name.clone(),
            );
            // outcome is intentionally not inspected: the sign-in below
            // decides how the request ends.
            state.users.create_external(&user).await?;
            tracing::info!(
                email = %user.email,
                "successfully registered new user through external login"
            );
            user
        },
    };

    match state
        .users
        .repo
        .add_external_login(&ExternalLogin {
            provider: info.provider.clone(),
            provider_key: info.provider_key.clone(),
            user_id: user.id,
        })
        .await
    {
        Ok(()) => tracing::info!(
            email = %user.email,
            provider = %info.provider,
            "successfully added new login to user"
        ),
        // informational only.
        Err(err) => tracing::warn!(
            email = %user.email,
            error = %err,
            "failed to link external login"
        ),
    }

    match state
        .users
        .external_sign_in(&info.provider, &info.provider_key)
        .await?
    {
        ExternalSignIn::Success(user) => {
            let cookie = state.sessions.sign_in(&headers, user.id, false).await?;
            tracing::info!(
                email = %user.email,
                provider = %info.provider,
                "successfully logged in through external login"
            );

            let mut response = redirect_to_local(query.return_url.as_deref());
            response.headers_mut().append(header::SET_COOKIE, cookie);
            Ok(response)
        },
        _ => {
            tracing::warn!(
                email = %user.email,
                provider = %info.provider,
                "external sign-in is not succeeded, redirecting to login"
            );
            Ok(redirect_to_login_forcibly(query.return_url.as_deref()))
        },
    }
}

/// Resolve the provider identity from the pending attempt.
///
/// A missing attempt, state mismatch, denied/missing code or failed
/// exchange all mean there is no external login info.
async fn fetch_login_info(
    state: &AppState,
    headers: &HeaderMap,
    query: &CallbackQuery,
) -> Option<ExternalLoginInfo> {
    let attempt = match state.sessions.take_login_attempt(headers).await {
        Ok(attempt) => attempt?,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read pending login attempt");
            return None;
        },
    };
    let attempt: LoginAttempt = serde_json::from_value(attempt).ok()?;

    if query.state.as_deref() != Some(attempt.state.as_str()) {
        tracing::warn!(
            provider = %attempt.provider,
            "state mismatch on external login callback"
        );
        return None;
    }

    let code = query.code.as_deref().filter(|code| !code.is_empty())?;

    match state.oauth.exchange(&attempt, code).await {
        Ok(info) => Some(info),
        Err(err) => {
            tracing::warn!(
                error = %err,
                provider = %attempt.provider,
                "code exchange failed"
            );
            None
        },
    }
}

fn redirect_to_login_forcibly(return_url: Option<&str>) -> Response {
    let mut errors = FormErrors::new();
    errors.add_summary("Something went wrong.");

    let target = match return_url.filter(|url| !url.is_empty()) {
        Some(url) => {
            let encoded: String =
                url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            format!("{LOGIN_PATH}?return_url={encoded}")
        },
        None => LOGIN_PATH.to_owned(),
    };

    redirect_with_errors(&target, errors)
}
