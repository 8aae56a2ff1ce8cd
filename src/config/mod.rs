use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/host.toml";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_ITERATIONS: usize = 50;
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_backend: ModelBackendConfig,
    pub transport: TransportConfig,
    pub agent: AgentConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone)]
pub struct ModelBackendConfig {
    pub endpoint: String,
    pub model_id: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Command line for a stdio registry server, URL for an HTTP one.
    /// Empty for stdio means "spawn our own binary in serve-stdio mode".
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    model_backend: RawModelBackend,
    #[serde(default)]
    transport: RawTransport,
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    registry: RawRegistry,
}

#[derive(Debug, Deserialize, Default)]
struct RawModelBackend {
    endpoint: Option<String>,
    model_id: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTransport {
    kind: Option<TransportKind>,
    target: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgent {
    max_iterations: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRegistry {
    data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Loads from the given path, or the default path when `None`.
    /// A missing file at the default path falls back to documented defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        RawConfig::default().resolve()
    }
}

impl RawConfig {
    fn resolve(self) -> AppConfig {
        AppConfig {
            model_backend: ModelBackendConfig {
                endpoint: self
                    .model_backend
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                model_id: self
                    .model_backend
                    .model_id
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout_secs: self
                    .model_backend
                    .timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
                temperature: self.model_backend.temperature,
            },
            transport: TransportConfig {
                kind: self.transport.kind.unwrap_or(TransportKind::Stdio),
                target: self.transport.target.unwrap_or_default(),
            },
            agent: AgentConfig {
                max_iterations: self.agent.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            },
            registry: RegistryConfig {
                data_dir: self
                    .registry
                    .data_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            },
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading host configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed.resolve())
}
