//! Carries validation errors across one redirect hop.
//!
//! Per-request error state dies with the request; a redirect would lose
//! it. This middleware bridges exactly one hop: a redirect carrying a
//! non-empty [`FormErrors`] response extension serializes the bag into
//! the session's one-shot flash slot; the next rendered response has the
//! slot's content seeded into its request (where the [`FormErrors`]
//! extractor picks it up) and consumes the slot. It wraps every route,
//! auth or not.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::form::FormErrors;
use crate::session::SessionManager;

/// Flash slot key for the serialized error bag.
pub const FLASH_KEY: &str = "ModelErrorList";

/// Middleware applying the flash-serialize / flash-merge step.
pub async fn carry_errors(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = SessionManager::cookie_token(req.headers());

    let session = match state.sessions.load(req.headers()).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = %err, "session lookup failed, skipping flash");
            None
        },
    };

    let pending: Option<FormErrors> = session
        .as_ref()
        .and_then(|session| session.flash_value(FLASH_KEY))
        .and_then(|value| serde_json::from_value(value.clone()).ok());

    if let Some(errors) = pending.clone() {
        req.extensions_mut().insert(errors);
    }

    let mut response = next.run(req).await;

    if response.status().is_redirection() {
        let errors = response
            .extensions()
            .get::<FormErrors>()
            .filter(|errors| !errors.is_empty())
            .cloned();

        if let Some(errors) = errors {
            // losing carried errors degrades the next page, never the
            // redirect itself.
            match serde_json::to_value(&errors) {
                Ok(value) => match state
                    .sessions
                    .put_flash(token.as_deref(), FLASH_KEY, &value)
                    .await
                {
                    Ok(Some(cookie)) => {
                        response.headers_mut().append(header::SET_COOKIE, cookie);
                    },
                    Ok(None) => {},
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to keep errors across redirect");
                    },
                },
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize error bag");
                },
            }
        }
    } else if pending.is_some() {
        // flash slots are single-read: a rendered page consumes them.
        if let Some(session) = session {
            if let Err(err) =
                state.sessions.take_flash(&session.token_hash, FLASH_KEY).await
            {
                tracing::warn!(error = %err, "failed to consume flash slot");
            }
        }
    }

    response
}
