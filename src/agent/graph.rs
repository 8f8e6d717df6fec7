//! The supervisor workflow.
//!
//! START -> supervisor -> member -> supervisor -> ... -> FINISH

use crate::agent::react::{AgentConfig, MemberAgent};
use crate::agent::supervisor::{Supervisor, TrialState};
use crate::agent::tools::{ToolExecutor, ToolSettings};
use crate::llm::{ChatMessage, ChatModel};
use crate::market::{MarketData, SearchProvider};
use crate::models::{AgentOutput, AnalysisOutcome, EventSink, Language, Route, WorkflowEvent};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Settings for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub language: Language,
    pub max_trials: usize,
    pub max_steps: usize,
    pub max_iterations: usize,
    pub tools: ToolSettings,
}

impl WorkflowConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            language: config.general.language,
            max_trials: config.supervisor.max_trials,
            max_steps: config.supervisor.max_steps,
            max_iterations: config.model.max_iterations,
            tools: ToolSettings::from(&config.data),
        }
    }
}

/// A stock analysis team bound to its model and data providers.
pub struct Workflow {
    model: Arc<dyn ChatModel>,
    market: Arc<dyn MarketData>,
    search: Arc<dyn SearchProvider>,
    config: WorkflowConfig,
}

impl Workflow {
    pub fn new(
        model: Arc<dyn ChatModel>,
        market: Arc<dyn MarketData>,
        search: Arc<dyn SearchProvider>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            model,
            market,
            search,
            config,
        }
    }

    pub fn language(&self) -> Language {
        self.config.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.config.language = language;
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `question`, reporting progress to `events`.
    pub async fn run(&self, question: &str, events: &dyn EventSink) -> Result<AnalysisOutcome> {
        let current_date = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.run_on(question, &current_date, events).await
    }

    async fn run_on(
        &self,
        question: &str,
        current_date: &str,
        events: &dyn EventSink,
    ) -> Result<AnalysisOutcome> {
        info!("Starting analysis: {}", question);

        let supervisor = Supervisor::new(self.config.max_trials, self.config.language);
        let agent_config = AgentConfig {
            language: self.config.language,
            max_iterations: self.config.max_iterations,
        };
        let mut executor = ToolExecutor::new(
            Arc::clone(&self.market),
            Arc::clone(&self.search),
            self.config.tools.clone(),
        );

        let mut conversation = vec![ChatMessage::user(question)];
        let mut state = TrialState::default();
        let mut outcome = AnalysisOutcome::default();

        loop {
            if outcome.steps >= self.config.max_steps {
                bail!(
                    "step limit reached after {} supervisor decisions",
                    outcome.steps
                );
            }

            let last_message = conversation
                .last()
                .cloned()
                .unwrap_or_else(|| ChatMessage::user(question));
            let route = supervisor
                .decide(self.model.as_ref(), &last_message, &state, current_date)
                .await?;
            outcome.steps += 1;

            info!("Supervisor routed to {}", route);
            events.emit(&WorkflowEvent::Routed { next: route });

            let member = match route {
                Route::Finish => break,
                Route::Member(member) => member,
            };

            let trial = state.enter(member);
            events.emit(&WorkflowEvent::AgentStarted {
                member,
                trial,
                max_trials: self.config.max_trials,
            });

            let content = MemberAgent::new(member, agent_config.clone())
                .run(
                    self.model.as_ref(),
                    &mut executor,
                    &conversation,
                    current_date,
                    events,
                )
                .await?;

            events.emit(&WorkflowEvent::AgentCompleted {
                member,
                trial,
                max_trials: self.config.max_trials,
                content: content.clone(),
            });

            conversation.push(ChatMessage::user(content.clone()).with_name(member.wire_name()));
            outcome.outputs.push(AgentOutput {
                member,
                trial,
                content,
            });
        }

        outcome.charts = executor.take_charts();
        events.emit(&WorkflowEvent::Finished);
        info!(
            "Analysis finished after {} steps with {} charts",
            outcome.steps,
            outcome.charts.len()
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::react::testing::ScriptedModel;
    use crate::llm::client::Role;
    use crate::market::search::testing::{hit, StaticSearch};
    use crate::market::testing::{sample_bars, sample_financials, StaticMarketData};
    use crate::models::testing::RecordingSink;
    use crate::models::Member;
    use serde_json::json;

    fn make_config(max_trials: usize, max_steps: usize) -> WorkflowConfig {
        WorkflowConfig {
            language: Language::English,
            max_trials,
            max_steps,
            max_iterations: 3,
            tools: ToolSettings {
                search_max_results: 5,
                price_days: 5,
                chart_days: 30,
                financial_periods: 4,
            },
        }
    }

    fn make_workflow(model: Arc<ScriptedModel>, config: WorkflowConfig) -> Workflow {
        let market = StaticMarketData::default()
            .with_bars("AAPL", sample_bars(10))
            .with_financials("AAPL", sample_financials());
        let search = StaticSearch::default().with_hits("Apple AAPL news", vec![hit("Apple beats")]);
        Workflow::new(model, Arc::new(market), Arc::new(search), config)
    }

    #[tokio::test]
    async fn test_full_run_visits_members_in_order() {
        let model = Arc::new(
            ScriptedModel::new()
                // Researcher (the first route needs no supervisor call)
                .tool_call("web_search", json!({"query": "Apple AAPL news"}))
                .reply("Apple beat estimates.")
                // supervisor tries to finish early
                .reply(r#"{"next": "FINISH"}"#)
                // Stock Analyzer
                .tool_call("analyze_stock_ticker", json!({"ticker": "AAPL"}))
                .reply("Revenue is growing.")
                // supervisor
                .reply(r#"{"next": "Chart_Generator"}"#)
                // Chart Generator
                .tool_call("create_stock_chart", json!({"ticker": "AAPL"}))
                .reply("Chart attached.")
                // supervisor
                .reply(r#"{"next": "FINISH"}"#),
        );
        let workflow = make_workflow(Arc::clone(&model), make_config(1, 25));
        let sink = RecordingSink::default();

        let outcome = workflow
            .run_on("Should I buy Apple? Please analyze AAPL.", "2024-06-01", &sink)
            .await
            .unwrap();

        let members: Vec<Member> = outcome.outputs.iter().map(|o| o.member).collect();
        assert_eq!(members, Member::ALL.to_vec());
        assert_eq!(outcome.outputs[1].content, "Revenue is growing.");
        assert_eq!(outcome.steps, 4);
        assert_eq!(outcome.charts.len(), 1);
        assert_eq!(outcome.charts[0].ticker, "AAPL");

        let events = sink.snapshot();
        assert_eq!(
            events.first(),
            Some(&WorkflowEvent::Routed {
                next: Route::Member(Member::Researcher)
            })
        );
        assert_eq!(events.last(), Some(&WorkflowEvent::Finished));
        assert!(events.contains(&WorkflowEvent::AgentStarted {
            member: Member::StockAnalyzer,
            trial: 1,
            max_trials: 1,
        }));

        // the supervisor sees the last member output in JSON mode
        let requests = model.recorded();
        let supervisor_request = &requests[2];
        assert!(supervisor_request.json_mode);
        assert_eq!(supervisor_request.messages[1].content, "Apple beat estimates.");

        // later members see earlier outputs tagged with the member name
        let analyzer_request = &requests[3];
        let relayed = &analyzer_request.messages[2];
        assert_eq!(relayed.role, Role::User);
        assert_eq!(relayed.name.as_deref(), Some("Researcher"));
    }

    #[tokio::test]
    async fn test_repeated_member_is_skipped() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("research done")
                // asks for the researcher again; max_trials 1 moves on
                .reply(r#"{"next": "Researcher"}"#)
                .reply("analysis done")
                .reply("not json at all")
                .reply("chart done")
                // the last member is exhausted, so the run finishes
                .reply(r#"{"next": "Chart_Generator"}"#),
        );
        let workflow = make_workflow(model, make_config(1, 25));

        let outcome = workflow
            .run_on("AAPL?", "2024-06-01", &crate::models::testing::NullSink)
            .await
            .unwrap();

        let contents: Vec<&str> = outcome.outputs.iter().map(|o| o.content.as_str()).collect();
        assert_eq!(contents, vec!["research done", "analysis done", "chart done"]);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("research done")
                .reply(r#"{"next": "Researcher"}"#)
                .reply("research again"),
        );
        let workflow = make_workflow(model, make_config(5, 2));

        let err = workflow
            .run_on("AAPL?", "2024-06-01", &crate::models::testing::NullSink)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("step limit reached"));
    }

    #[tokio::test]
    async fn test_llm_failure_aborts_run() {
        let model = Arc::new(ScriptedModel::new().failure(crate::error::LlmError::MissingApiKey(
            "OPENAI_API_KEY".to_string(),
        )));
        let workflow = make_workflow(model, make_config(1, 25));

        let err = workflow
            .run_on("AAPL?", "2024-06-01", &crate::models::testing::NullSink)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("OPENAI_API_KEY"));
    }
}
