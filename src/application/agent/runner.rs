use crate::application::agent::context::{CapabilityListings, compose_system_context};
use crate::application::agent::parser::{ActionRequest, parse_action};
use crate::config::{AgentConfig, ModelBackendConfig};
use crate::infrastructure::session::{RegistrySession, SessionError};
use crate::model::{ModelProvider, ModelRequest};
use crate::types::{ChatMessage, MessageRole};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_ITERATIONS_MESSAGE: &str =
    "Reached maximum iterations. Please try rephrasing your request.";

/// One conversation between a user and the model, mediated by a registry.
///
/// Each call to [`chat`](AgentSession::chat) runs the model in a loop: the
/// model either answers in prose or requests a capability, in which case the
/// outcome is fed back as a user-role observation and the model is asked
/// again. Only the user's message and the eventual reply land in the
/// persisted history; intermediate action traffic is scratch state.
pub struct AgentSession<P: ModelProvider> {
    provider: P,
    registry: Arc<dyn RegistrySession>,
    model_id: String,
    temperature: Option<f32>,
    max_iterations: usize,
    history: Vec<ChatMessage>,
    session_id: Uuid,
}

impl<P: ModelProvider> AgentSession<P> {
    pub fn new(
        provider: P,
        registry: Arc<dyn RegistrySession>,
        backend: &ModelBackendConfig,
        agent: &AgentConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            model_id: backend.model_id.clone(),
            temperature: backend.temperature,
            max_iterations: agent.max_iterations,
            history: Vec::new(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Clears the conversation so the next turn starts fresh.
    pub fn reset(&mut self) {
        self.history.clear();
        info!(session = %self.session_id, "Conversation history cleared");
    }

    /// Runs one user turn to completion and returns the reply shown to the
    /// user. Never fails: backend and registry problems surface as the
    /// reply text. The history always grows by this turn's user message,
    /// plus the assistant reply when the model produced one.
    pub async fn chat(&mut self, user_message: &str) -> String {
        self.history
            .push(ChatMessage::new(MessageRole::User, user_message));

        let listings = match self.fetch_listings().await {
            Ok(listings) => listings,
            Err(err) => {
                error!(session = %self.session_id, %err, "Failed to list registry capabilities");
                return format!("Error: {err}");
            }
        };

        let mut working = Vec::with_capacity(self.history.len() + 1);
        working.push(ChatMessage::new(
            MessageRole::System,
            compose_system_context(&listings),
        ));
        working.extend(self.history.iter().cloned());

        let mut iteration = 0;
        while iteration < self.max_iterations {
            iteration += 1;
            let request = ModelRequest {
                model: self.model_id.clone(),
                messages: working.clone(),
                temperature: self.temperature,
            };
            let reply = match self.provider.chat(request).await {
                Ok(response) => response.message.content,
                Err(err) => {
                    error!(session = %self.session_id, %err, "Model backend call failed");
                    return err.user_message();
                }
            };

            match parse_action(&reply) {
                ActionRequest::Tool { name, arguments } => {
                    info!(session = %self.session_id, tool = %name, iteration, "Model requested tool");
                    let observation = match self.registry.call_tool(&name, arguments).await {
                        Ok(result) => format!("Tool result: {}", render(&result)),
                        Err(err) => {
                            warn!(session = %self.session_id, tool = %name, %err, "Tool call failed");
                            format!("Tool result: Error executing tool: {err}")
                        }
                    };
                    working.push(ChatMessage::new(MessageRole::Assistant, reply));
                    working.push(ChatMessage::new(MessageRole::User, observation));
                }
                ActionRequest::Prompt { name, arguments } => {
                    info!(session = %self.session_id, prompt = %name, iteration, "Model requested prompt");
                    let observation = match self.registry.get_prompt(&name, arguments).await {
                        Ok(rendered) => format!("Prompt template: {}", rendered.prompt_text),
                        Err(err) => {
                            warn!(session = %self.session_id, prompt = %name, %err, "Prompt render failed");
                            format!("Prompt template: Error executing prompt: {err}")
                        }
                    };
                    working.push(ChatMessage::new(MessageRole::Assistant, reply));
                    working.push(ChatMessage::new(MessageRole::User, observation));
                }
                ActionRequest::None => {
                    self.history
                        .push(ChatMessage::new(MessageRole::Assistant, reply.clone()));
                    return reply;
                }
            }
        }

        warn!(
            session = %self.session_id,
            max_iterations = self.max_iterations,
            "Turn abandoned at iteration ceiling"
        );
        MAX_ITERATIONS_MESSAGE.to_string()
    }

    async fn fetch_listings(&self) -> Result<CapabilityListings, SessionError> {
        Ok(CapabilityListings {
            tools: self.registry.list_tools().await?,
            prompts: self.registry.list_prompts().await?,
            resources: self.registry.list_resources().await?,
        })
    }
}

fn render(result: &Value) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
}
