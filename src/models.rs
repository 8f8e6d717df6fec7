//! Core data models for the stock analysis workflow.
//!
//! This module contains the team members, routing decisions, run events
//! and the artifacts produced while answering a question.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output language for prompts, agent answers and the UI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Language {
    #[default]
    #[value(alias = "en")]
    English,
    #[serde(alias = "한글")]
    #[value(alias = "ko")]
    Korean,
}

impl Language {
    /// Name used inside prompts ("Please respond in ...").
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "Korean",
        }
    }

    /// Label shown in the language selector.
    pub fn label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "한글",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "ko" | "kr" | "korean" | "한글" => Ok(Language::Korean),
            other => Err(format!("Unknown language: {}", other)),
        }
    }
}

/// A member of the analysis team. Order matters: the supervisor walks the
/// team in this sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Member {
    #[serde(rename = "Researcher")]
    Researcher,
    #[serde(rename = "Stock_Analyzer")]
    StockAnalyzer,
    #[serde(rename = "Chart_Generator")]
    ChartGenerator,
}

impl Member {
    pub const ALL: [Member; 3] = [
        Member::Researcher,
        Member::StockAnalyzer,
        Member::ChartGenerator,
    ];

    /// Identifier used in prompts and routing decisions.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Member::Researcher => "Researcher",
            Member::StockAnalyzer => "Stock_Analyzer",
            Member::ChartGenerator => "Chart_Generator",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Member::Researcher => "Researcher",
            Member::StockAnalyzer => "Stock Analyzer",
            Member::ChartGenerator => "Chart Generator",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Member::Researcher => 0,
            Member::StockAnalyzer => 1,
            Member::ChartGenerator => 2,
        }
    }

    /// The member after this one, or `None` for the last member.
    pub fn next(&self) -> Option<Member> {
        Member::ALL.get(self.index() + 1).copied()
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }

    /// Parse a wire or display name, tolerating case and separators.
    pub fn parse(name: &str) -> Option<Member> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "researcher" => Some(Member::Researcher),
            "stockanalyzer" => Some(Member::StockAnalyzer),
            "chartgenerator" => Some(Member::ChartGenerator),
            _ => None,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Where the supervisor sends the conversation next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Member(Member),
    Finish,
}

impl Route {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Route::Member(member) => member.wire_name(),
            Route::Finish => "FINISH",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Member(member) => write!(f, "{}", member),
            Route::Finish => write!(f, "FINISH"),
        }
    }
}

/// A chart produced by the chart tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub ticker: String,
    pub days: u32,
    /// Plotly figure JSON.
    pub figure: serde_json::Value,
}

/// The final answer of one member turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub member: Member,
    pub trial: usize,
    pub content: String,
}

/// Everything a completed workflow run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub outputs: Vec<AgentOutput>,
    pub charts: Vec<ChartArtifact>,
    /// Number of supervisor decisions taken.
    pub steps: usize,
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub question: String,
    pub language: Language,
    pub model_used: String,
    pub analysis_date: chrono::DateTime<chrono::Utc>,
    pub duration_seconds: f64,
    pub steps: usize,
}

/// The latest answer of one member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub member: Member,
    pub trials: usize,
    pub content: String,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub sections: Vec<AgentSection>,
    pub charts: Vec<ChartArtifact>,
    /// Chart pages written next to the report.
    #[serde(default)]
    pub chart_files: Vec<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Progress notifications emitted while the workflow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Routed {
        next: Route,
    },
    AgentStarted {
        member: Member,
        trial: usize,
        max_trials: usize,
    },
    ToolExecuted {
        member: Member,
        tool: String,
        success: bool,
    },
    AgentCompleted {
        member: Member,
        trial: usize,
        max_trials: usize,
        content: String,
    },
    Finished,
}

/// Receives workflow events (console renderer, test recorders).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}
