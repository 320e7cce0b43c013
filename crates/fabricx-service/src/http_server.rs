//! HTTP transport for the service façade.
//!
//! - `POST /` - JSON-RPC 2.0 request/response operations
//! - `GET /__health` - liveness probe
//! - `GET /networks/{id}/logs` - server-streaming log follower (SSE)
//!
//! Log streaming is the one genuinely concurrent flow: the lifecycle layer
//! follows the container group's output into a bounded channel, and the
//! SSE body drains that channel until either side closes. Dropping the
//! response (client disconnect) tears the follower down.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::info;

use fabricx_common::api::{JsonRpcRequest, JsonRpcResponse, StreamLogsRequest};
use fabricx_common::error::FabricxError;

use crate::http_router::ServiceRouter;

/// HTTP server over a [`ServiceRouter`].
pub struct HttpServer {
    router: Arc<ServiceRouter>,
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    container: Option<String>,
}

impl HttpServer {
    pub fn new(router: Arc<ServiceRouter>) -> Self {
        Self { router }
    }

    /// Builds the axum application; separated from [`run`](Self::run) so
    /// tests can drive it without binding a socket.
    pub fn app(&self) -> axum::Router {
        axum::Router::new()
            .route("/", post(handle_jsonrpc))
            .route("/__health", get(health_check))
            .route("/networks/:network_id/logs", get(stream_logs))
            .layer(CorsLayer::permissive())
            .with_state(self.router.clone())
    }

    /// Binds and serves until a shutdown signal arrives, then cancels every
    /// in-flight call and best-effort stops all networks.
    pub async fn run(self, addr: SocketAddr) -> Result<(), FabricxError> {
        let app = self.app();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FabricxError::Transport(format!("failed to bind {addr}: {e}")))?;

        let local = listener
            .local_addr()
            .map_err(|e| FabricxError::Transport(format!("failed to read local addr: {e}")))?;
        info!(addr = %local, "FabricX service listening");

        let router = self.router.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received, stopping all networks");
                router.cancellation().cancel();
                router.service().shutdown().await;
            })
            .await
            .map_err(|e| FabricxError::Transport(format!("server error: {e}")))
    }
}

async fn handle_jsonrpc(
    State(router): State<Arc<ServiceRouter>>,
    body: Bytes,
) -> Result<Json<JsonRpcResponse>, (StatusCode, String)> {
    let request: JsonRpcRequest = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid JSON-RPC: {e}")))?;

    Ok(Json(router.handle_request(request).await))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn stream_logs(
    State(router): State<Arc<ServiceRouter>>,
    Path(network_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, String)> {
    let cancel = router.cancellation().child_token();
    let request = StreamLogsRequest {
        network_id,
        container: query.container,
    };

    let receiver = router
        .service()
        .stream_logs(request, cancel)
        .await
        .map_err(|e| match e {
            FabricxError::NetworkNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            other => (StatusCode::BAD_REQUEST, other.to_string()),
        })?;

    let stream = ReceiverStream::new(receiver).map(|entry| Event::default().json_data(&entry));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
