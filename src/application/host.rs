use crate::application::agent::AgentSession;
use crate::config::{AppConfig, TransportConfig, TransportKind};
use crate::infrastructure::session::{HttpSession, RegistrySession, SessionError, StdioSession};
use crate::model::OllamaClient;
use serde_json::json;
use std::io::{self, Write as _};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::info;

/// Interactive chat loop on the terminal. Returns when the user quits or
/// stdin closes.
pub async fn run_chat(config: &AppConfig) -> Result<(), SessionError> {
    let mut agent = start_agent(config).await?;

    println!("Library assistant ready.");
    println!(
        "Model: {} via {}",
        config.model_backend.model_id, config.model_backend.endpoint
    );
    println!("Type 'exit' to quit, 'reset' to clear the conversation.\n");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_ascii_lowercase().as_str() {
            "exit" | "quit" | "bye" | "stop" => break,
            "reset" | "clear" => {
                agent.reset();
                println!("Conversation cleared.\n");
                continue;
            }
            _ => {}
        }
        let reply = agent.chat(input).await;
        println!("\n{reply}\n");
    }

    println!("Goodbye!");
    Ok(())
}

/// One-shot mode: ask a single question and print the reply as JSON.
pub async fn run_ask(config: &AppConfig, prompt: &str) -> Result<(), SessionError> {
    let mut agent = start_agent(config).await?;
    let reply = agent.chat(prompt).await;
    let output = json!({
        "session_id": agent.session_id().to_string(),
        "content": reply,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
    );
    Ok(())
}

async fn start_agent(config: &AppConfig) -> Result<AgentSession<OllamaClient>, SessionError> {
    let registry = connect(&config.transport)?;
    registry.initialize().await?;
    info!("Registry session initialized");

    Ok(AgentSession::new(
        OllamaClient::new(&config.model_backend),
        registry,
        &config.model_backend,
        &config.agent,
    ))
}

fn connect(transport: &TransportConfig) -> Result<Arc<dyn RegistrySession>, SessionError> {
    Ok(match transport.kind {
        TransportKind::Stdio => Arc::new(StdioSession::spawn(&transport.target)?),
        TransportKind::Http => Arc::new(HttpSession::new(&transport.target)),
    })
}
