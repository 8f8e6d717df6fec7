//! Chat model client.
//!
//! Speaks two wire formats:
//! - Ollama native chat (`/api/chat`)
//! - OpenAI-compatible chat completions (`/chat/completions`)

use crate::config::{ModelConfig, ProviderKind};
use crate::error::LlmError;
use crate::llm::retry::retry_with_backoff;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id (OpenAI only; Ollama does not number calls).
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Speaker name for user messages relayed from another agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(tool_call_id: Option<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id,
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Tool definition in the function-calling format shared by both backends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// One round-trip to the model.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    /// Ask the backend to constrain the answer to a JSON object.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the assistant's reply.
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, LlmError>;

    fn model_name(&self) -> &str;
}

/// Settings for [`HttpChatModel`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub retries: u32,
}

impl LlmConfig {
    /// Build from the model section, reading the API key from the environment.
    pub fn from_model_config(model: &ModelConfig) -> Self {
        Self {
            provider: model.provider,
            base_url: model.base_url.trim_end_matches('/').to_string(),
            model_name: model.name.clone(),
            api_key: std::env::var(&model.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
            api_key_env: model.api_key_env.clone(),
            temperature: model.temperature,
            timeout_seconds: model.timeout_seconds,
            retries: model.retries,
        }
    }
}

/// HTTP chat model for Ollama and OpenAI-compatible servers.
pub struct HttpChatModel {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl HttpChatModel {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        info!(
            "Initializing {:?} chat model {} at {}",
            config.provider, config.model_name, config.base_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatMessage, LlmError> {
        let (url, body) = match self.config.provider {
            ProviderKind::Ollama => (
                format!("{}/api/chat", self.config.base_url),
                ollama_body(&self.config, request),
            ),
            ProviderKind::Openai => (
                format!("{}/chat/completions", self.config.base_url),
                openai_body(&self.config, request),
            ),
        };

        let mut builder = self.http_client.post(&url).json(&body);
        if self.config.provider == ProviderKind::Openai {
            let key = self
                .config
                .api_key
                .as_deref()
                .ok_or_else(|| LlmError::MissingApiKey(self.config.api_key_env.clone()))?;
            builder = builder.bearer_auth(key);
        }

        debug!(
            "Sending chat request with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    seconds: self.config.timeout_seconds,
                }
            } else if e.is_connect() {
                LlmError::Connect {
                    url: self.config.base_url.clone(),
                }
            } else {
                LlmError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        match self.config.provider {
            ProviderKind::Ollama => parse_ollama_response(payload),
            ProviderKind::Openai => parse_openai_response(payload),
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, LlmError> {
        retry_with_backoff(self.config.retries, Duration::from_secs(1), || {
            self.send_once(&request)
        })
        .await
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Request body for Ollama's `/api/chat`.
fn ollama_body(config: &LlmConfig, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": role_str(m.role),
                "content": m.content,
            });
            if !m.tool_calls.is_empty() {
                msg["tool_calls"] = m
                    .tool_calls
                    .iter()
                    .map(|c| json!({"function": {"name": c.name, "arguments": c.arguments}}))
                    .collect();
            }
            msg
        })
        .collect();

    let mut body = json!({
        "model": config.model_name,
        "messages": messages,
        "stream": false,
        "options": {"temperature": config.temperature},
    });
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    if request.json_mode {
        body["format"] = json!("json");
    }
    body
}

/// Request body for OpenAI-compatible `/chat/completions`.
fn openai_body(config: &LlmConfig, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let mut msg = json!({"role": role_str(m.role)});
            if m.tool_calls.is_empty() {
                msg["content"] = json!(m.content);
            } else {
                msg["content"] = if m.content.is_empty() {
                    Value::Null
                } else {
                    json!(m.content)
                };
                msg["tool_calls"] = m
                    .tool_calls
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        json!({
                            "id": c.id.clone().unwrap_or_else(|| format!("call_{}", i)),
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments.to_string()},
                        })
                    })
                    .collect();
            }
            if let Some(ref id) = m.tool_call_id {
                msg["tool_call_id"] = json!(id);
            }
            if let Some(ref name) = m.name {
                msg["name"] = json!(name);
            }
            msg
        })
        .collect();

    let mut body = json!({
        "model": config.model_name,
        "messages": messages,
        "temperature": config.temperature,
    });
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    if request.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn parse_ollama_response(payload: Value) -> Result<ChatMessage, LlmError> {
    let response: OllamaChatResponse =
        serde_json::from_value(payload).map_err(|e| LlmError::Parse(e.to_string()))?;

    let tool_calls = response
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall {
            id: None,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();

    Ok(ChatMessage::assistant(response.message.content).with_tool_calls(tool_calls))
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_openai_response(payload: Value) -> Result<ChatMessage, LlmError> {
    let response: OpenAiChatResponse =
        serde_json::from_value(payload).map_err(|e| LlmError::Parse(e.to_string()))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))?
        .message;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| {
            // Arguments arrive as a JSON string; keep the raw text if it is not valid JSON.
            let arguments = if c.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&c.function.arguments)
                    .unwrap_or(Value::String(c.function.arguments))
            };
            ToolCall {
                id: Some(c.id),
                name: c.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ChatMessage::assistant(message.content.unwrap_or_default()).with_tool_calls(tool_calls))
}

/// Find the first JSON object embedded in a model reply.
///
/// Handles replies wrapped in prose or fenced code blocks.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(open) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        if let Ok(value) = serde_json::from_str::<Value>(&text[open..=i]) {
                            if value.is_object() {
                                return Some(value);
                            }
                        }
                        break;
                    }
                }
                _ => {}
            }
        }

        start = open + 1;
    }

    None
}
