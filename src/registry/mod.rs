mod prompts;
mod resources;
mod store;
mod tools;

pub use resources::{CATALOG_URI, READING_STATS_URI};
pub use store::{Book, ReadingData, Store};

use crate::types::{
    PromptDescriptor, RenderedPrompt, ResourceContents, ResourceDescriptor, ToolDescriptor,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub type Arguments = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("failed to read data file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed data file {path:?}: {source}")]
    Data {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A tool: its advertised descriptor plus the function that executes it.
pub(crate) struct ToolHandler {
    pub descriptor: ToolDescriptor,
    pub run: fn(&Store, &Arguments) -> Result<Value, RegistryError>,
}

/// A prompt: its advertised descriptor plus the function that renders it.
pub(crate) struct PromptHandler {
    pub descriptor: PromptDescriptor,
    pub render: fn(&Store, &Arguments) -> Result<RenderedPrompt, RegistryError>,
}

/// Capability registry over the flat-file store. Handlers are registered
/// once at construction; both transport servers and the in-process tests
/// dispatch through the same value. Holds no request state.
pub struct Registry {
    store: Store,
    tools: Vec<ToolHandler>,
    tool_index: HashMap<String, usize>,
    prompts: Vec<PromptHandler>,
    prompt_index: HashMap<String, usize>,
}

impl Registry {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let tools = tools::handlers();
        let tool_index = tools
            .iter()
            .enumerate()
            .map(|(idx, handler)| (handler.descriptor.name.clone(), idx))
            .collect();
        let prompts = prompts::handlers();
        let prompt_index = prompts
            .iter()
            .enumerate()
            .map(|(idx, handler)| (handler.descriptor.name.clone(), idx))
            .collect();
        Self {
            store: Store::new(data_dir.as_ref()),
            tools,
            tool_index,
            prompts,
            prompt_index,
        }
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        resources::descriptors()
    }

    pub fn read_resource(&self, uri: &str) -> Result<ResourceContents, RegistryError> {
        debug!(uri, "Reading resource");
        resources::read(&self.store, uri)
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts
            .iter()
            .map(|handler| handler.descriptor.clone())
            .collect()
    }

    pub fn get_prompt(
        &self,
        name: &str,
        arguments: &Arguments,
    ) -> Result<RenderedPrompt, RegistryError> {
        let handler = self
            .prompt_index
            .get(name)
            .map(|idx| &self.prompts[*idx])
            .ok_or_else(|| RegistryError::NotFound(format!("Unknown prompt: {name}")))?;

        for argument in &handler.descriptor.arguments {
            if argument.required && !arguments.contains_key(&argument.name) {
                warn!(prompt = name, argument = %argument.name, "Missing required prompt argument");
                return Err(RegistryError::InvalidArgument(format!(
                    "{arg} argument is required for {name} prompt",
                    arg = argument.name
                )));
            }
        }

        debug!(prompt = name, "Rendering prompt");
        (handler.render)(&self.store, arguments)
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|handler| handler.descriptor.clone())
            .collect()
    }

    pub fn call_tool(&self, name: &str, arguments: &Arguments) -> Result<Value, RegistryError> {
        let handler = self
            .tool_index
            .get(name)
            .map(|idx| &self.tools[*idx])
            .ok_or_else(|| RegistryError::NotFound(format!("Unknown tool: {name}")))?;

        // Required fields come from the tool's own input schema, so the
        // advertised contract and the enforced one cannot drift apart.
        if let Some(required) = handler
            .descriptor
            .input_schema
            .get("required")
            .and_then(Value::as_array)
        {
            for field in required.iter().filter_map(Value::as_str) {
                if !arguments.contains_key(field) {
                    warn!(tool = name, field, "Missing required tool argument");
                    return Err(RegistryError::InvalidArgument(format!(
                        "tool '{name}' is missing required field '{field}'"
                    )));
                }
            }
        }

        debug!(tool = name, "Executing tool");
        (handler.run)(&self.store, arguments)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn seeded_registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().expect("tempdir");
        store::fixtures::seed(dir.path());
        let registry = Registry::new(dir.path());
        (dir, registry)
    }
}
