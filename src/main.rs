mod application;
mod config;
mod domain;
mod infrastructure;
mod registry;

pub use domain::types;
pub use infrastructure::{model, rpc, server, session};

use application::host;
use clap::{Parser, ValueEnum};
use config::AppConfig;
use registry::Registry;
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "libris",
    version,
    about = "Library assistant: capability registry plus model-driven host"
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Chat)]
    mode: RunMode,
    /// Listen address for serve-http mode.
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: SocketAddr,
    /// Override the model backend endpoint from the config file.
    #[arg(long)]
    endpoint: Option<String>,
    /// Question for ask mode; ignored elsewhere.
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    /// Interactive conversation with the model.
    Chat,
    /// Answer a single question and exit.
    Ask,
    /// Serve the registry over line-delimited JSON-RPC on stdio.
    ServeStdio,
    /// Serve the registry over JSON-RPC on HTTP.
    ServeHttp,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    if let Some(endpoint) = cli.endpoint.clone() {
        config.model_backend.endpoint = endpoint;
    }
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    }

    match cli.mode {
        RunMode::Chat => {
            info!(transport = ?config.transport.kind, "Starting interactive chat");
            host::run_chat(&config).await?;
        }
        RunMode::Ask => {
            let prompt = cli.prompt.join(" ");
            if prompt.trim().is_empty() {
                return Err("ask mode needs a prompt, e.g. `libris --mode ask find me sci-fi`".into());
            }
            host::run_ask(&config, prompt.trim()).await?;
        }
        RunMode::ServeStdio => {
            let registry = Arc::new(Registry::new(&config.registry.data_dir));
            info!("Serving registry on stdio");
            server::serve_stdio(registry).await?;
        }
        RunMode::ServeHttp => {
            let registry = Arc::new(Registry::new(&config.registry.data_dir));
            info!(addr = %cli.http_addr, "Serving registry over HTTP");
            server::serve_http(registry, cli.http_addr).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // Logs go to stderr; stdout belongs to the REPL and to the stdio
        // protocol channel.
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
