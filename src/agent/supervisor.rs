//! Supervisor routing.
//!
//! The LLM proposes the next member; deterministic rules then keep the team
//! moving forward so every member runs once and the run always terminates.

use crate::agent::prompts::supervisor_prompt;
use crate::llm::{extract_json_object, ChatMessage, ChatModel, ChatRequest};
use crate::models::{Language, Member, Route};
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// What the model asked for, before the routing rules are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    Member(Member),
    Supervisor,
    Finish,
}

impl Proposal {
    pub fn parse(name: &str) -> Option<Proposal> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("finish") {
            Some(Proposal::Finish)
        } else if trimmed.eq_ignore_ascii_case("supervisor") {
            Some(Proposal::Supervisor)
        } else {
            Member::parse(trimmed).map(Proposal::Member)
        }
    }
}

/// Read `{"next": ...}` from a supervisor reply.
pub fn parse_decision(reply: &str) -> Option<Proposal> {
    let value = extract_json_object(reply)?;
    Proposal::parse(value.get("next")?.as_str()?)
}

/// Which member is active and how often each member has been entered.
#[derive(Debug, Clone, Default)]
pub struct TrialState {
    current: Option<Member>,
    trials: HashMap<Member, usize>,
}

impl TrialState {
    pub fn current(&self) -> Option<Member> {
        self.current
    }

    pub fn trials(&self, member: Member) -> usize {
        self.trials.get(&member).copied().unwrap_or(0)
    }

    /// Record that `member` starts a turn and return its trial number.
    ///
    /// Switching members restarts the counter at 1; re-entering the current
    /// member increments it.
    pub fn enter(&mut self, member: Member) -> usize {
        let trial = if self.current == Some(member) {
            self.trials(member) + 1
        } else {
            1
        };
        self.trials.insert(member, trial);
        self.current = Some(member);
        trial
    }
}

fn after(member: Member) -> Route {
    member.next().map(Route::Member).unwrap_or(Route::Finish)
}

/// Apply the routing rules to a proposal.
///
/// `None` means the reply could not be understood.
pub fn enforce(proposal: Option<Proposal>, state: &TrialState, max_trials: usize) -> Route {
    let first = Route::Member(Member::ALL[0]);

    let Some(current) = state.current() else {
        return first;
    };

    let mut route = match proposal {
        None => return after(current),
        Some(Proposal::Supervisor) => return first,
        Some(Proposal::Finish) => Route::Finish,
        Some(Proposal::Member(member)) => Route::Member(member),
    };

    if let Route::Member(member) = route {
        let trials = state.trials(member);
        if trials >= max_trials {
            route = after(member);
            info!(
                "{} reached max trials ({}/{}), moving to {}",
                member, trials, max_trials, route
            );
        }
    }

    if route == Route::Finish && !current.is_last() {
        route = after(current);
        debug!("FINISH before the last member, continuing with {}", route);
    }

    route
}

/// Chooses the next member with the LLM and the routing rules.
pub struct Supervisor {
    max_trials: usize,
    language: Language,
}

impl Supervisor {
    pub fn new(max_trials: usize, language: Language) -> Self {
        Self {
            max_trials,
            language,
        }
    }

    pub async fn decide(
        &self,
        model: &dyn ChatModel,
        last_message: &ChatMessage,
        state: &TrialState,
        current_date: &str,
    ) -> Result<Route> {
        // Nothing to ask before the first member has run
        if state.current().is_none() {
            return Ok(enforce(None, state, self.max_trials));
        }

        let request = ChatRequest::new(vec![
            ChatMessage::system(supervisor_prompt(current_date, self.language)),
            ChatMessage::user(last_message.content.clone()),
        ])
        .json();

        let reply = model
            .chat(request)
            .await
            .context("Supervisor request failed")?;

        let proposal = parse_decision(&reply.content);
        debug!("Supervisor proposed {:?} from: {}", proposal, reply.content);

        Ok(enforce(proposal, state, self.max_trials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_after(members: &[Member]) -> TrialState {
        let mut state = TrialState::default();
        for member in members {
            state.enter(*member);
        }
        state
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(
            parse_decision(r#"{"next": "Stock_Analyzer"}"#),
            Some(Proposal::Member(Member::StockAnalyzer))
        );
        assert_eq!(parse_decision("```json\n{\"next\": \"FINISH\"}\n```"), Some(Proposal::Finish));
        assert_eq!(parse_decision(r#"{"next": "supervisor"}"#), Some(Proposal::Supervisor));
        assert_eq!(parse_decision(r#"{"next": "Trader"}"#), None);
        assert_eq!(parse_decision("Chart_Generator"), None);
    }

    #[test]
    fn test_trial_counters() {
        let mut state = TrialState::default();
        assert_eq!(state.enter(Member::Researcher), 1);
        assert_eq!(state.enter(Member::Researcher), 2);
        assert_eq!(state.enter(Member::StockAnalyzer), 1);
        // coming back restarts the count
        assert_eq!(state.enter(Member::Researcher), 1);
        assert_eq!(state.trials(Member::StockAnalyzer), 1);
        assert_eq!(state.trials(Member::ChartGenerator), 0);
    }

    #[test]
    fn test_first_decision_is_first_member() {
        let state = TrialState::default();
        for proposal in [
            None,
            Some(Proposal::Finish),
            Some(Proposal::Member(Member::ChartGenerator)),
        ] {
            assert_eq!(enforce(proposal, &state, 1), Route::Member(Member::Researcher));
        }
    }

    #[test]
    fn test_supervisor_proposal_restarts() {
        let state = state_after(&[Member::Researcher, Member::StockAnalyzer]);
        assert_eq!(
            enforce(Some(Proposal::Supervisor), &state, 1),
            Route::Member(Member::Researcher)
        );
    }

    #[test]
    fn test_exhausted_member_moves_on() {
        let state = state_after(&[Member::Researcher]);
        assert_eq!(
            enforce(Some(Proposal::Member(Member::Researcher)), &state, 1),
            Route::Member(Member::StockAnalyzer)
        );

        // a second trial is allowed when max_trials is 2
        assert_eq!(
            enforce(Some(Proposal::Member(Member::Researcher)), &state, 2),
            Route::Member(Member::Researcher)
        );
    }

    #[test]
    fn test_exhausted_last_member_finishes() {
        let state = state_after(&[Member::Researcher, Member::StockAnalyzer, Member::ChartGenerator]);
        assert_eq!(
            enforce(Some(Proposal::Member(Member::ChartGenerator)), &state, 1),
            Route::Finish
        );
        assert_eq!(enforce(Some(Proposal::Finish), &state, 1), Route::Finish);
    }

    #[test]
    fn test_early_finish_is_overridden() {
        let state = state_after(&[Member::Researcher]);
        assert_eq!(
            enforce(Some(Proposal::Finish), &state, 1),
            Route::Member(Member::StockAnalyzer)
        );

        // last member exhausted while the stock analyzer is current
        let state = state_after(&[
            Member::Researcher,
            Member::StockAnalyzer,
            Member::ChartGenerator,
            Member::StockAnalyzer,
        ]);
        assert_eq!(
            enforce(Some(Proposal::Member(Member::ChartGenerator)), &state, 1),
            Route::Member(Member::ChartGenerator)
        );
    }

    #[test]
    fn test_unparsable_reply_continues() {
        let state = state_after(&[Member::StockAnalyzer]);
        assert_eq!(enforce(None, &state, 1), Route::Member(Member::ChartGenerator));

        let state = state_after(&[Member::ChartGenerator]);
        assert_eq!(enforce(None, &state, 1), Route::Finish);
    }

    #[test]
    fn test_unvisited_member_is_allowed() {
        let state = state_after(&[Member::Researcher]);
        assert_eq!(
            enforce(Some(Proposal::Member(Member::ChartGenerator)), &state, 1),
            Route::Member(Member::ChartGenerator)
        );
    }
}
