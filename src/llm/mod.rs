//! Chat model access shared by the supervisor, the member agents and the
//! newsletter pipeline.

pub mod client;
pub mod retry;

pub use client::{
    extract_json_object, ChatMessage, ChatModel, ChatRequest, HttpChatModel, LlmConfig, ToolCall,
    ToolDefinition,
};
