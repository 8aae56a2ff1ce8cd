use super::{DispatchError, ServeError, dispatch};
use crate::registry::Registry;
use crate::rpc::{self, RpcRequest, RpcResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Serves the registry over a single JSON-RPC endpoint at `POST /mcp`,
/// plus a `GET /health` probe.
pub async fn serve_http(registry: Arc<Registry>, addr: SocketAddr) -> Result<(), ServeError> {
    info!(%addr, "Binding HTTP registry server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(registry);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(%addr, "HTTP registry server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServeError::Io)
}

async fn mcp_handler(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<RpcResponse>) {
    let request: RpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RpcResponse::invalid_request(format!(
                    "malformed JSON-RPC request: {err}"
                ))),
            );
        }
    };

    if request.jsonrpc != rpc::JSONRPC_VERSION {
        return (
            StatusCode::BAD_REQUEST,
            Json(RpcResponse::invalid_request("Invalid JSON-RPC version")),
        );
    }

    match dispatch(&registry, &request.method, request.params.as_ref()) {
        Ok(result) => (
            StatusCode::OK,
            Json(RpcResponse::success(request.id, result)),
        ),
        Err(err) => {
            error!(method = %request.method, %err, "Registry request failed");
            let status = match err {
                DispatchError::MethodNotFound(_) | DispatchError::InvalidParams(_) => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(RpcResponse::error(
                    request.id,
                    err.rpc_code(),
                    err.to_string(),
                )),
            )
        }
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": env!("CARGO_PKG_NAME") }))
}
