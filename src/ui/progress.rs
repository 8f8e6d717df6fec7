//! Terminal rendering of workflow and newsletter progress.

use super::text::UiText;
use crate::models::{EventSink, Language, Member, Route, WorkflowEvent};
use crate::newsletter::{NewsletterEvent, NewsletterSink, TOTAL_STEPS};
use crate::report::chart::{split_chart_blocks, ChartSummary, ContentBlock};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tracing::debug;

/// Progress positions of the analysis graph nodes.
const ANALYSIS_STEPS: u64 = 4;

/// Bar position for a node: the supervisor is 0, members follow in order.
pub fn step_position(node: Option<Member>) -> u64 {
    match node {
        None => 0,
        Some(member) => member.index() as u64 + 1,
    }
}

/// Renders events as a progress bar plus printed status lines, and keeps
/// a detailed log for the report.
pub struct ConsoleRenderer {
    text: &'static UiText,
    failed_label: &'static str,
    bar: ProgressBar,
    logs: Mutex<Vec<String>>,
}

impl ConsoleRenderer {
    fn new(language: Language, length: u64, hidden: bool, newsletter: bool) -> Self {
        let text = UiText::for_language(language);
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(length);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            pb
        };

        Self {
            text,
            failed_label: if newsletter {
                text.newsletter_failed
            } else {
                text.analysis_failed
            },
            bar,
            logs: Mutex::new(Vec::new()),
        }
    }

    /// Renderer for one analysis run.
    pub fn analysis(language: Language, hidden: bool) -> Self {
        Self::new(language, ANALYSIS_STEPS, hidden, false)
    }

    /// Renderer for one newsletter run.
    pub fn newsletter(language: Language, hidden: bool) -> Self {
        Self::new(language, TOTAL_STEPS as u64, hidden, true)
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn log(&self, entry: String) {
        debug!("{}", entry);
        let stamped = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), entry);
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(stamped);
        }
    }

    /// Print above the bar. Runs even when the bar is hidden.
    fn print(&self, text: &str) {
        self.bar.suspend(|| println!("{}", text));
    }

    /// Stop the bar after a failed run.
    pub fn fail(&self, message: &str) {
        self.log(format!("failed: {}", message));
        self.bar
            .abandon_with_message(format!("{}: {}", self.failed_label, message));
    }

    pub fn finish(&self, message: &str) {
        self.bar.set_position(self.bar.length().unwrap_or(0));
        self.bar.finish_with_message(message.to_string());
    }
}

/// Terminal rendition of one agent output: markdown as-is, charts
/// summarized, malformed chart blocks reported with their raw text.
pub fn render_content(content: &str) -> String {
    let mut out = Vec::new();

    for block in split_chart_blocks(content) {
        match block {
            ContentBlock::Markdown(text) => out.push(text.trim().to_string()),
            ContentBlock::Chart(figure) => match ChartSummary::from_figure(&figure) {
                Some(summary) => out.push(summary.to_text()),
                None => out.push("📈 Chart (no price data)".to_string()),
            },
            ContentBlock::BrokenChart { raw, error } => {
                out.push(format!("⚠️  Chart could not be rendered: {}", error));
                out.push(raw);
            }
        }
    }

    out.retain(|s| !s.is_empty());
    out.join("\n\n")
}

impl EventSink for ConsoleRenderer {
    fn emit(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Routed { next } => {
                self.bar.set_position(step_position(None));
                self.bar
                    .set_message(format!("{}: supervisor", self.text.current_step));
                self.log(format!("supervisor -> {}", next.wire_name()));
            }
            WorkflowEvent::AgentStarted {
                member,
                trial,
                max_trials,
            } => {
                self.bar.set_position(step_position(Some(*member)));
                self.bar
                    .set_message(format!("{}: {}", self.text.current_step, member));
                let status = self.text.working(member.display_name(), *trial, *max_trials);
                self.print(&format!("🔄 {}", status));
                self.log(status);
            }
            WorkflowEvent::ToolExecuted {
                member,
                tool,
                success,
            } => {
                let outcome = if *success { "ok" } else { "error" };
                self.log(format!("{} called {} ({})", member, tool, outcome));
            }
            WorkflowEvent::AgentCompleted {
                member,
                trial,
                max_trials,
                content,
            } => {
                let status = self.text.completed(member.display_name(), *trial, *max_trials);
                self.print(&format!("✅ {}\n\n{}\n", status, render_content(content)));
                self.log(status);
            }
            WorkflowEvent::Finished => {
                self.log(format!("{}", Route::Finish));
                self.finish(self.text.analysis_completed);
            }
        }
    }
}

impl NewsletterSink for ConsoleRenderer {
    fn emit(&self, event: &NewsletterEvent) {
        match event {
            NewsletterEvent::StepCompleted { step, completed } => {
                self.bar.set_position(*completed as u64);
                self.bar.set_message(format!(
                    "{}: {}",
                    self.text.newsletter_generating, step
                ));
                self.log(format!("{} done ({}/{})", step, completed, TOTAL_STEPS));
            }
            NewsletterEvent::SubThemeSearched { sub_theme, titles } => {
                if titles.is_empty() {
                    self.log(format!("no articles for '{}'", sub_theme));
                } else {
                    self.log(format!("'{}': {}", sub_theme, titles.join(" | ")));
                }
            }
            NewsletterEvent::DraftReady { draft } => {
                self.log(format!("draft ready ({} chars)", draft.chars().count()));
            }
        }
    }
}
