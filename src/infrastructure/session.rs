use crate::registry::Arguments;
use crate::rpc::{RpcRequest, RpcResponse, method};
use crate::types::{
    PromptDescriptor, RenderedPrompt, ResourceContents, ResourceDescriptor, ToolDescriptor,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn registry server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("registry channel I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("registry channel closed")]
    Closed,
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response from registry: {0}")]
    Protocol(String),
    #[error("registry error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Client-side channel to a registry-hosting process. Every operation is a
/// single request/response exchange; implementations are strictly
/// sequential, never pipelining two requests on one channel.
#[async_trait]
pub trait RegistrySession: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError>;

    async fn initialize(&self) -> Result<(), SessionError> {
        self.request(
            method::INITIALIZE,
            json!({
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
        .await
        .map(drop)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let result = self.request(method::TOOLS_LIST, json!({})).await?;
        decode_field(result, "tools")
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, SessionError> {
        let result = self.request(method::PROMPTS_LIST, json!({})).await?;
        decode_field(result, "prompts")
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SessionError> {
        let result = self.request(method::RESOURCES_LIST, json!({})).await?;
        decode_field(result, "resources")
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents, SessionError> {
        let result = self
            .request(method::RESOURCES_READ, json!({ "uri": uri }))
            .await?;
        decode(result)
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<RenderedPrompt, SessionError> {
        let result = self
            .request(
                method::PROMPTS_GET,
                json!({ "name": name, "arguments": arguments }),
            )
            .await?;
        decode(result)
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<Value, SessionError> {
        self.request(
            method::TOOLS_CALL,
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }
}

fn decode<T: DeserializeOwned>(result: Value) -> Result<T, SessionError> {
    serde_json::from_value(result)
        .map_err(|err| SessionError::Protocol(format!("unexpected result shape: {err}")))
}

fn decode_field<T: DeserializeOwned>(mut result: Value, field: &str) -> Result<T, SessionError> {
    let value = result
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| SessionError::Protocol(format!("result missing '{field}' field")))?;
    decode(value)
}

fn unpack(response: RpcResponse) -> Result<Value, SessionError> {
    if let Some(error) = response.error {
        return Err(SessionError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| SessionError::Protocol("response carries neither result nor error".into()))
}

/// Session over a child registry process speaking line-delimited JSON-RPC on
/// its stdio pipes. The child is killed when the session is dropped.
pub struct StdioSession {
    channel: Mutex<StdioChannel>,
    next_id: AtomicU64,
}

struct StdioChannel {
    child: Child,
    writer: BufWriter<ChildStdin>,
    reader: Lines<BufReader<ChildStdout>>,
}

impl StdioSession {
    /// Spawns the registry server. An empty target re-launches the current
    /// executable in serve-stdio mode.
    pub fn spawn(target: &str) -> Result<Self, SessionError> {
        let (program, args) = resolve_target(target)?;
        info!(command = %program, "Spawning stdio registry server");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Spawn {
                command: program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Protocol("failed to capture server stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Protocol("failed to capture server stdout".into()))?;

        Ok(Self {
            channel: Mutex::new(StdioChannel {
                child,
                writer: BufWriter::new(stdin),
                reader: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RegistrySession for StdioSession {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        let mut payload = serde_json::to_vec(&request)
            .map_err(|err| SessionError::Protocol(format!("failed to encode request: {err}")))?;
        payload.push(b'\n');

        // One request in flight at a time; the channel lock spans the full
        // write-then-read exchange.
        let mut channel = self.channel.lock().await;
        channel.writer.write_all(&payload).await?;
        channel.writer.flush().await?;
        debug!(method, id, "Sent request to stdio registry server");

        loop {
            let line = channel.reader.next_line().await?.ok_or_else(|| {
                if let Ok(Some(status)) = channel.child.try_wait() {
                    warn!(%status, "Registry server exited");
                }
                SessionError::Closed
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RpcResponse>(trimmed) {
                Ok(response) => return unpack(response),
                Err(_) => {
                    // The child may interleave log lines with protocol output.
                    debug!(line = trimmed, "Skipping non-protocol line from server");
                }
            }
        }
    }
}

fn resolve_target(target: &str) -> Result<(String, Vec<String>), SessionError> {
    let mut parts = target.split_whitespace().map(String::from);
    match parts.next() {
        Some(program) => Ok((program, parts.collect())),
        None => {
            let exe = std::env::current_exe().map_err(|source| SessionError::Spawn {
                command: "<current executable>".to_string(),
                source,
            })?;
            Ok((
                exe.to_string_lossy().into_owned(),
                vec!["--mode".to_string(), "serve-stdio".to_string()],
            ))
        }
    }
}

/// Session over a single-endpoint JSON-RPC HTTP server.
pub struct HttpSession {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpSession {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl RegistrySession for HttpSession {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, url = %self.url, "Sending request to HTTP registry server");
        // Failure statuses still carry a JSON-RPC error body, so the body is
        // decoded before the status is considered.
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await?
            .json()
            .await?;
        unpack(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::INTERNAL_ERROR;

    #[test]
    fn unpack_prefers_error_over_result() {
        let response = RpcResponse::error(None, INTERNAL_ERROR, "boom");
        let error = unpack(response).expect_err("error response");
        assert!(matches!(
            error,
            SessionError::Rpc {
                code: INTERNAL_ERROR,
                ..
            }
        ));
    }

    #[test]
    fn decode_field_reports_missing_key() {
        let error = decode_field::<Vec<ToolDescriptor>>(json!({}), "tools")
            .expect_err("missing field");
        assert!(matches!(error, SessionError::Protocol(_)));
    }

    #[test]
    fn empty_target_resolves_to_current_executable() {
        let (program, args) = resolve_target("").expect("resolve");
        assert!(!program.is_empty());
        assert_eq!(args, vec!["--mode", "serve-stdio"]);
    }

    #[test]
    fn target_splits_into_program_and_args() {
        let (program, args) = resolve_target("python server.py --verbose").expect("resolve");
        assert_eq!(program, "python");
        assert_eq!(args, vec!["server.py", "--verbose"]);
    }
}
