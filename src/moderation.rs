//! Client for the external content moderation service.

use uuid::Uuid;

use crate::error::{Result, ServerError};

/// Remote endpoint deciding whether an uploaded image is acceptable.
#[derive(Clone)]
pub struct ModerationClient {
    http: reqwest::Client,
    address: String,
}

impl ModerationClient {
    /// Create a new [`ModerationClient`] against a base URL.
    pub fn new(address: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            address: address.trim_end_matches('/').to_owned(),
        }
    }

    /// Submit raw image bytes for a user.
    ///
    /// Any non-success status is a rejection carrying the upstream
    /// status; transport failures are terminal for the request.
    pub async fn check(&self, user_id: Uuid, image: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/check/{}", self.address, user_id))
            .body(image)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Moderation { status });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub moderation endpoint: accepts the first request, rejects the
    /// second with 403, and counts everything it sees.
    async fn spawn_stub(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/api/check/{user_id}",
            post(move |Path(_user_id): Path<Uuid>, body: axum::body::Bytes| {
                let hits = Arc::clone(&hits);
                async move {
                    assert!(!body.is_empty());
                    match hits.fetch_add(1, Ordering::SeqCst) {
                        0 => StatusCode::OK,
                        _ => StatusCode::FORBIDDEN,
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        address
    }

    #[tokio::test]
    async fn test_check_accepts_then_rejects_with_upstream_status() {
        let hits = Arc::new(AtomicUsize::new(0));
        let address = spawn_stub(Arc::clone(&hits)).await;
        let client = ModerationClient::new(&address);
        let user_id = Uuid::new_v4();

        client.check(user_id, b"first image".to_vec()).await.unwrap();

        let rejection = client
            .check(user_id, b"second image".to_vec())
            .await
            .unwrap_err();
        match rejection {
            ServerError::Moderation { status } => {
                assert_eq!(status, StatusCode::FORBIDDEN)
            },
            other => panic!("expected moderation rejection, got {other:?}"),
        }

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // nothing listens on this port.
        let client = ModerationClient::new("http://127.0.0.1:1");
        let err = client
            .check(Uuid::new_v4(), b"payload".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Upstream(_)));
    }
}
