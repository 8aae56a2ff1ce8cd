use super::{ServeError, dispatch};
use crate::registry::Registry;
use crate::rpc::{self, RpcRequest, RpcResponse};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

/// Serves the registry over line-delimited JSON-RPC on stdin/stdout until
/// stdin closes. One response line per request line.
pub async fn serve_stdio(registry: Arc<Registry>) -> Result<(), ServeError> {
    info!("Serving registry on stdio; awaiting JSON-RPC lines");
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received stdio request line");

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != rpc::JSONRPC_VERSION => {
                RpcResponse::invalid_request("Invalid JSON-RPC version")
            }
            Ok(request) => match dispatch(&registry, &request.method, request.params.as_ref()) {
                Ok(result) => RpcResponse::success(request.id, result),
                Err(err) => {
                    error!(method = %request.method, %err, "Registry request failed");
                    RpcResponse::error(request.id, err.rpc_code(), err.to_string())
                }
            },
            Err(err) => {
                error!(%err, "Failed to parse stdio request line");
                RpcResponse::error(None, rpc::PARSE_ERROR, format!("invalid JSON: {err}"))
            }
        };

        write_response(&mut stdout, &response).await?;
    }

    stdout.flush().await?;
    Ok(())
}

async fn write_response(
    stdout: &mut io::Stdout,
    response: &RpcResponse,
) -> Result<(), ServeError> {
    let mut payload = serde_json::to_vec(response).unwrap_or_else(|_| {
        // Encoding a response only fails if a result value is unserializable;
        // fall back to a generic internal error rather than dropping the line.
        serde_json::to_vec(&RpcResponse::error(
            None,
            rpc::INTERNAL_ERROR,
            "failed to encode response",
        ))
        .expect("static error response encodes")
    });
    payload.push(b'\n');
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}
