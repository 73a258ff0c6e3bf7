//! Status endpoint.
//!
//! Serves `/health` and `/status` so the host can see whether the player is
//! reachable by its CMS.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use xmr_client::XmrClient;

/// Build the status router.
pub fn router(client: Arc<XmrClient>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(client)
}

/// Serve the status router on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(addr: SocketAddr, client: Arc<XmrClient>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Status endpoint listening on http://{}", addr);

    axum::serve(listener, router(client)).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Connection status handler.
async fn status_handler(State(client): State<Arc<XmrClient>>) -> impl IntoResponse {
    match client.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            warn!("Status requested after shutdown: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use xmr_client::ClientConfig;
    use xmr_transport::MemoryConnector;

    fn client() -> (Arc<XmrClient>, MemoryConnector) {
        let connector = MemoryConnector::new();
        let client = XmrClient::spawn(
            "player-7",
            Arc::new(connector.clone()),
            ClientConfig::default(),
        );
        (Arc::new(client), connector)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reflects_connection() {
        let (client, connector) = client();
        client.start("ws://relay.test:9505", "key").await.unwrap();
        client.snapshot().await.unwrap();
        connector.last_peer().unwrap().open();

        let response = status_handler(State(client.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["channel"], "player-7");
        assert_eq!(body["url"], "ws://relay.test:9505");
        assert_eq!(body["connectionWanted"], true);
        assert_eq!(body["connected"], true);
        assert_eq!(body["active"], false);
    }

    #[tokio::test]
    async fn test_status_unavailable_after_shutdown() {
        let (client, _connector) = client();
        client.shutdown().await.unwrap();

        let response = status_handler(State(client)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
