//! Tool-calling loop for a single team member.
//!
//! The member sends the conversation and its tools to the model, executes
//! every requested tool call, feeds the results back and stops once the
//! model answers in plain text.

use crate::agent::prompts::member_prompt;
use crate::agent::tools::{tool_definitions, ToolExecutor};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::{EventSink, Language, Member, WorkflowEvent};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Configuration for a member turn.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub language: Language,
    /// Tool-calling rounds before the turn is cut off.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            max_iterations: 10,
        }
    }
}

pub struct MemberAgent {
    member: Member,
    config: AgentConfig,
}

impl MemberAgent {
    pub fn new(member: Member, config: AgentConfig) -> Self {
        Self { member, config }
    }

    /// Run one turn and return the member's answer.
    pub async fn run(
        &self,
        model: &dyn ChatModel,
        executor: &mut ToolExecutor,
        conversation: &[ChatMessage],
        current_date: &str,
        events: &dyn EventSink,
    ) -> Result<String> {
        info!("{} started with {} messages", self.member, conversation.len());

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(member_prompt(
            self.member,
            current_date,
            self.config.language,
        )));
        messages.extend(conversation.iter().cloned());

        let tools = tool_definitions(self.member);
        let mut last_text = String::new();

        for iteration in 0..self.config.max_iterations {
            debug!("{} iteration {}", self.member, iteration + 1);

            let request = ChatRequest::new(messages.clone()).with_tools(tools.clone());
            let reply = model
                .chat(request)
                .await
                .with_context(|| format!("{} request failed", self.member))?;

            if reply.tool_calls.is_empty() {
                info!("{} finished after {} iterations", self.member, iteration + 1);
                return Ok(reply.content);
            }

            if !reply.content.trim().is_empty() {
                last_text = reply.content.clone();
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in &calls {
                let result = executor.execute(self.member, call).await;
                if !result.success {
                    warn!(
                        "Tool {} failed: {}",
                        call.name,
                        result.error.as_deref().unwrap_or_default()
                    );
                }
                events.emit(&WorkflowEvent::ToolExecuted {
                    member: self.member,
                    tool: call.name.clone(),
                    success: result.success,
                });
                messages.push(ChatMessage::tool_result(call.id.clone(), result.to_message()));
                info!("Tool {} executed", call.name);
            }
        }

        warn!(
            "{} reached the iteration limit ({}) without a final answer",
            self.member, self.config.max_iterations
        );

        if last_text.is_empty() {
            Ok(format!(
                "{} stopped after {} tool rounds without a final answer.",
                self.member.display_name(),
                self.config.max_iterations
            ))
        } else {
            Ok(last_text)
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted chat model for agent and workflow tests.

    use crate::error::LlmError;
    use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolCall};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies and records every request.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ChatMessage, LlmError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, content: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Ok(ChatMessage::assistant(content)));
            self
        }

        pub fn tool_call(self, name: &str, arguments: Value) -> Self {
            let message = ChatMessage::assistant("").with_tool_calls(vec![ToolCall {
                id: Some(format!("call_{}", name)),
                name: name.to_string(),
                arguments,
            }]);
            self.replies.lock().unwrap().push_back(Ok(message));
            self
        }

        pub fn failure(self, error: LlmError) -> Self {
            self.replies.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn recorded(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Parse("script exhausted".to_string())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use crate::agent::tools::ToolSettings;
    use crate::error::LlmError;
    use crate::llm::client::Role;
    use crate::market::search::testing::StaticSearch;
    use crate::market::testing::{sample_bars, StaticMarketData};
    use crate::models::testing::RecordingSink;
    use serde_json::json;
    use std::sync::Arc;

    fn make_executor() -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(StaticMarketData::default().with_bars("AAPL", sample_bars(5))),
            Arc::new(StaticSearch::default()),
            ToolSettings {
                search_max_results: 5,
                price_days: 5,
                chart_days: 30,
                financial_periods: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = ScriptedModel::new()
            .tool_call("create_stock_chart", json!({"ticker": "AAPL", "days": 7}))
            .reply("Here is the AAPL chart.");
        let mut executor = make_executor();
        let sink = RecordingSink::default();
        let agent = MemberAgent::new(Member::ChartGenerator, AgentConfig::default());

        let answer = agent
            .run(
                &model,
                &mut executor,
                &[ChatMessage::user("Chart AAPL")],
                "2024-06-01",
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Here is the AAPL chart.");
        assert_eq!(executor.charts().len(), 1);
        assert_eq!(
            sink.snapshot(),
            vec![WorkflowEvent::ToolExecuted {
                member: Member::ChartGenerator,
                tool: "create_stock_chart".to_string(),
                success: true,
            }]
        );

        let requests = model.recorded();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].tools[0].function.name, "create_stock_chart");
        // second round carries the assistant call and the tool result
        let second = &requests[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[3].role, Role::Tool);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_create_stock_chart"));
        assert!(second[3].content.starts_with("![Chart]"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let model = ScriptedModel::new()
            .tool_call("web_search", json!({"query": "AAPL"}))
            .tool_call("web_search", json!({"query": "AAPL"}));
        let mut executor = make_executor();
        let agent = MemberAgent::new(
            Member::Researcher,
            AgentConfig {
                max_iterations: 2,
                ..AgentConfig::default()
            },
        );

        let answer = agent
            .run(
                &model,
                &mut executor,
                &[ChatMessage::user("News on AAPL")],
                "2024-06-01",
                &crate::models::testing::NullSink,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Researcher stopped after 2 tool rounds without a final answer.");
        // failed searches are fed back instead of aborting
        let last = model.recorded().pop().unwrap();
        assert!(last.messages.last().unwrap().content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = ScriptedModel::new().failure(LlmError::Api {
            status: 401,
            body: "unauthorized".to_string(),
        });
        let mut executor = make_executor();
        let agent = MemberAgent::new(Member::StockAnalyzer, AgentConfig::default());

        let err = agent
            .run(
                &model,
                &mut executor,
                &[ChatMessage::user("AAPL?")],
                "2024-06-01",
                &crate::models::testing::NullSink,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Stock Analyzer request failed"));
    }
}
