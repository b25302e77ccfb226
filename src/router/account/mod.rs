//! Account-related HTTP API.
mod external;
mod login;
mod logout;
mod register;

use axum::routing::get;
use axum::{Router, middleware};

use crate::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // `GET /account/logout` goes to `logout`. Session required.
        .route("/logout", get(logout::handler))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::router::require_user,
        ));

    Router::new()
        // `GET/POST /account/register` go to `register`.
        .route("/register", get(register::form).post(register::handler))
        // `GET/POST /account/login` go to `login`.
        .route("/login", get(login::form).post(login::handler))
        // `GET /account/external` starts a provider challenge.
        .route("/external", get(external::start))
        // `GET /account/external/callback` finishes it.
        .route("/external/callback", get(external::callback))
        .merge(protected)
}
