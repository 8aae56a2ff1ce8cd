use super::parser::{ActionRequest, parse_action};
use super::runner::AgentSession;
use crate::config::{AgentConfig, ModelBackendConfig};
use crate::infrastructure::session::{RegistrySession, SessionError};
use crate::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use crate::types::{ChatMessage, MessageRole};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;

/// Replays canned replies in order and records every request it received.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    fn new<const N: usize>(replies: [&str; N]) -> Self {
        let mut replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for Arc<ScriptedProvider> {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("scripted provider ran out of replies");
        Ok(ModelResponse {
            message: ChatMessage::new(MessageRole::Assistant, reply),
        })
    }
}

struct FailingProvider;

#[async_trait]
impl ModelProvider for FailingProvider {
    async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        Err(ModelError::InvalidResponse("missing message field".into()))
    }
}

/// In-process stand-in for a registry server: fixed listings, one tool that
/// succeeds, one prompt that renders. Records all traffic.
struct FakeRegistry {
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeRegistry {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrySession for FakeRegistry {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
        match method {
            "tools/list" => Ok(json!({
                "tools": [{
                    "name": "search_books",
                    "description": "Search the catalog",
                    "inputSchema": {"type": "object", "required": ["query"]},
                }],
            })),
            "prompts/list" => Ok(json!({
                "prompts": [{
                    "name": "recommend_books",
                    "description": "Personalized recommendations",
                    "arguments": [],
                }],
            })),
            "resources/list" => Ok(json!({"resources": []})),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                if name == "search_books" {
                    Ok(json!({
                        "success": true,
                        "count": 1,
                        "results": [{"id": "dune", "title": "Dune", "author": "Frank Herbert"}],
                    }))
                } else {
                    Err(SessionError::Rpc {
                        code: -32603,
                        message: format!("Unknown tool: {name}"),
                    })
                }
            }
            "prompts/get" => Ok(json!({
                "name": "recommend_books",
                "description": "Personalized recommendations",
                "prompt_text": "Recommend books the reader will enjoy.",
            })),
            other => Err(SessionError::Protocol(format!("unexpected method {other}"))),
        }
    }
}

fn session(
    provider: Arc<ScriptedProvider>,
    registry: Arc<FakeRegistry>,
    max_iterations: usize,
) -> AgentSession<Arc<ScriptedProvider>> {
    let backend = ModelBackendConfig {
        endpoint: "http://127.0.0.1:11434".into(),
        model_id: "llama3".into(),
        timeout_secs: 120,
        temperature: None,
    };
    AgentSession::new(provider, registry, &backend, &AgentConfig { max_iterations })
}

#[tokio::test]
async fn prose_reply_ends_the_turn_after_one_model_call() {
    let provider = Arc::new(ScriptedProvider::new(["Dune is a great place to start."]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 50);

    let reply = agent.chat("What should I read?").await;

    assert_eq!(reply, "Dune is a great place to start.");
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    // System context first, then the user's message; listings are embedded.
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
    assert!(requests[0].messages[0].content.contains("search_books"));
    assert_eq!(requests[0].messages[1].content, "What should I read?");
    assert_eq!(agent.history().len(), 2);
}

#[tokio::test]
async fn tool_round_trip_feeds_result_back_and_keeps_history_clean() {
    let provider = Arc::new(ScriptedProvider::new([
        r#"{"action":"tool","tool_name":"search_books","arguments":{"query":"dune"}}"#,
        "I recommend Dune by Frank Herbert.",
    ]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry.clone(), 50);

    let reply = agent.chat("Find me something by Herbert").await;

    assert_eq!(reply, "I recommend Dune by Frank Herbert.");
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);

    // Second model call sees the action envelope and its observation.
    let second = &requests[1].messages;
    let observation = &second[second.len() - 1];
    assert_eq!(observation.role, MessageRole::User);
    assert!(observation.content.starts_with("Tool result: "));
    assert!(observation.content.contains("Frank Herbert"));

    // The tool was actually invoked with the model's arguments.
    let tool_calls: Vec<_> = registry
        .calls()
        .into_iter()
        .filter(|(method, _)| method == "tools/call")
        .collect();
    assert_eq!(tool_calls.len(), 1);
    assert_eq!(tool_calls[0].1["arguments"]["query"], json!("dune"));

    // Intermediate traffic never reaches the persisted history.
    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.history()[0].content, "Find me something by Herbert");
    assert_eq!(
        agent.history()[1].content,
        "I recommend Dune by Frank Herbert."
    );
}

#[tokio::test]
async fn prompt_round_trip_feeds_template_back() {
    let provider = Arc::new(ScriptedProvider::new([
        r#"{"action":"prompt","prompt_name":"recommend_books","arguments":{}}"#,
        "Here are some picks for you.",
    ]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 50);

    let reply = agent.chat("recommend something").await;

    assert_eq!(reply, "Here are some picks for you.");
    let second = provider.requests()[1].messages.clone();
    let observation = &second[second.len() - 1];
    assert!(
        observation
            .content
            .starts_with("Prompt template: Recommend books")
    );
}

#[tokio::test]
async fn failed_tool_call_becomes_an_observation_not_a_crash() {
    let provider = Arc::new(ScriptedProvider::new([
        r#"{"action":"tool","tool_name":"no_such_tool","arguments":{}}"#,
        "I could not find that tool, sorry.",
    ]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 50);

    let reply = agent.chat("do the thing").await;

    assert_eq!(reply, "I could not find that tool, sorry.");
    let second = provider.requests()[1].messages.clone();
    let observation = &second[second.len() - 1];
    assert!(
        observation
            .content
            .starts_with("Tool result: Error executing tool:")
    );
    assert!(observation.content.contains("Unknown tool: no_such_tool"));
}

#[tokio::test]
async fn iteration_ceiling_abandons_the_turn() {
    let provider = Arc::new(ScriptedProvider::new([
        r#"{"action":"tool","tool_name":"search_books","arguments":{"query":"a"}}"#,
    ]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 1);

    let reply = agent.chat("loop forever").await;

    assert_eq!(
        reply,
        "Reached maximum iterations. Please try rephrasing your request."
    );
    assert_eq!(provider.requests().len(), 1);
    // Only the user message persists; the ceiling notice is not an
    // assistant reply.
    assert_eq!(agent.history().len(), 1);
    assert_eq!(agent.history()[0].role, MessageRole::User);
}

#[tokio::test]
async fn backend_failure_surfaces_as_reply_text() {
    let registry = FakeRegistry::new();
    let backend = ModelBackendConfig {
        endpoint: "http://127.0.0.1:11434".into(),
        model_id: "llama3".into(),
        timeout_secs: 120,
        temperature: None,
    };
    let mut agent = AgentSession::new(
        FailingProvider,
        registry,
        &backend,
        &AgentConfig { max_iterations: 50 },
    );

    let reply = agent.chat("hello").await;

    assert!(reply.starts_with("Error:"));
    assert!(reply.contains("unusable response"));
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn unrelated_json_in_prose_is_returned_verbatim() {
    let text = r#"Fun fact: {"unrelated":true} is not a request. Try Dune."#;
    assert_eq!(parse_action(text), ActionRequest::None);

    let provider = Arc::new(ScriptedProvider::new([text]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 50);

    let reply = agent.chat("tell me something").await;

    assert_eq!(reply, text);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn reset_clears_history_between_turns() {
    let provider = Arc::new(ScriptedProvider::new(["First answer.", "Second answer."]));
    let registry = FakeRegistry::new();
    let mut agent = session(provider.clone(), registry, 50);

    agent.chat("first question").await;
    assert_eq!(agent.history().len(), 2);

    agent.reset();
    assert!(agent.history().is_empty());

    agent.chat("second question").await;
    assert_eq!(agent.history().len(), 2);
    // A fresh turn after reset carries no trace of the first one.
    let last = provider.requests().last().unwrap().messages.clone();
    assert!(!last.iter().any(|m| m.content == "first question"));
}
