//! Galleria is a small community image gallery with account management.

#![forbid(unsafe_code)]

pub mod crypto;
pub mod database;
pub mod error;
mod flash;
mod form;
pub mod image;
pub mod moderation;
pub mod oauth;
mod router;
pub mod session;
pub mod telemetry;
pub mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header;
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: axum::http::Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub crypto: Arc<crypto::PasswordManager>,
    pub sessions: session::SessionManager,
    pub users: user::UserService,
    pub images: image::ImageRepository,
    pub moderation: moderation::ModerationClient,
    pub oauth: oauth::OAuthProviders,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout; overruns answer with 408.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]));

    Router::new()
        // `GET /` goes to the gallery home.
        .route("/", get(router::images::home::handler))
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /metrics` goes to the Prometheus scrape endpoint.
        .route("/metrics", get(router::status::metrics))
        .nest("/account", router::account::router(state.clone()))
        .nest("/images", router::images::router(state.clone()))
        // Carry validation errors across one redirect hop, on every route.
        .layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            flash::carry_errors,
        ))
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let crypto = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);

    let Some(oauth_config) = &config.oauth else {
        tracing::error!("missing `oauth` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let oauth = oauth::OAuthProviders::new(oauth_config, &config.url)?;

    let Some(moderation_config) = &config.moderation else {
        tracing::error!("missing `moderation` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let moderation = moderation::ModerationClient::new(&moderation_config.address);

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "metrics recorder not installed");
            None
        },
    };

    Ok(AppState {
        sessions: session::SessionManager::new(
            db.postgres.clone(),
            config.session.as_ref(),
        ),
        users: user::UserService::new(
            db.postgres.clone(),
            Arc::clone(&crypto),
            &config.lockout,
        ),
        images: image::ImageRepository::new(db.postgres.clone()),
        moderation,
        oauth,
        metrics,
        crypto,
        config,
        db,
    })
}
