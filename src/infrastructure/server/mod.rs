mod http;
mod stdio;

pub use http::serve_http;
pub use stdio::serve_stdio;

use crate::registry::{Arguments, Registry, RegistryError};
use crate::rpc::{self, method};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub(crate) enum DispatchError {
    #[error("Unknown method: {0}")]
    MethodNotFound(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DispatchError {
    pub(crate) fn rpc_code(&self) -> i64 {
        match self {
            DispatchError::MethodNotFound(_) => rpc::METHOD_NOT_FOUND,
            DispatchError::InvalidParams(_) => rpc::INVALID_PARAMS,
            DispatchError::Registry(_) => rpc::INTERNAL_ERROR,
        }
    }
}

/// Routes one decoded JSON-RPC call to the registry. Both transport servers
/// go through here, so wire behavior cannot diverge between them.
pub(crate) fn dispatch(
    registry: &Registry,
    method: &str,
    params: Option<&Value>,
) -> Result<Value, DispatchError> {
    debug!(method, "Dispatching registry request");
    match method {
        method::INITIALIZE => Ok(json!({
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })),
        method::RESOURCES_LIST => Ok(json!({ "resources": registry.list_resources() })),
        method::RESOURCES_READ => {
            let uri = require_str_param(params, "uri")?;
            let contents = registry.read_resource(uri)?;
            Ok(to_value(contents))
        }
        method::PROMPTS_LIST => Ok(json!({ "prompts": registry.list_prompts() })),
        method::PROMPTS_GET => {
            let name = require_str_param(params, "name")?;
            let arguments = arguments_param(params);
            let rendered = registry.get_prompt(name, &arguments)?;
            Ok(to_value(rendered))
        }
        method::TOOLS_LIST => Ok(json!({ "tools": registry.list_tools() })),
        method::TOOLS_CALL => {
            let name = require_str_param(params, "name")?;
            let arguments = arguments_param(params);
            Ok(registry.call_tool(name, &arguments)?)
        }
        other => Err(DispatchError::MethodNotFound(other.to_string())),
    }
}

fn require_str_param<'a>(
    params: Option<&'a Value>,
    field: &str,
) -> Result<&'a str, DispatchError> {
    params
        .and_then(|params| params.get(field))
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::InvalidParams(format!("Missing {field} parameter")))
}

fn arguments_param(params: Option<&Value>) -> Arguments {
    params
        .and_then(|params| params.get("arguments"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
