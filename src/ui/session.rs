//! The analysis page: interactive session and one-shot runs.

use super::progress::ConsoleRenderer;
use super::text::UiText;
use crate::agent::{Workflow, WorkflowConfig};
use crate::analysis::build_sections;
use crate::config::Config;
use crate::llm::ChatModel;
use crate::market::{MarketData, SearchProvider};
use crate::models::{
    AnalysisOutcome, AnalysisReport, ChartArtifact, Language, ReportMetadata,
};
use crate::newsletter::{NewsletterOutcome, NewsletterPipeline};
use crate::report::chart::{extract_charts, write_chart_html};
use crate::report::{file_stamp, save_newsletter, save_report};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// A line typed at the session prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Question(String),
    New,
    Logs,
    Quit,
    /// `:lang` with an unknown or missing code carries `None`.
    Language(Option<Language>),
    Newsletter(String),
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Input {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix(':') else {
            return Input::Question(line.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name.to_lowercase().as_str() {
            "new" => Input::New,
            "logs" => Input::Logs,
            "q" | "quit" | "exit" => Input::Quit,
            "lang" | "language" => Input::Language(rest.parse().ok()),
            "newsletter" | "news" => Input::Newsletter(rest.to_string()),
            _ => Input::Unknown(line.to_string()),
        }
    }
}

/// Chart artifacts of a run plus any chart pasted into member output that
/// the tools did not record.
pub fn collect_charts(outcome: &AnalysisOutcome) -> Vec<ChartArtifact> {
    let mut charts = outcome.charts.clone();

    for output in &outcome.outputs {
        for figure in extract_charts(&output.content) {
            if charts.iter().any(|c| c.figure == figure) {
                continue;
            }
            let trace = figure.pointer("/data/0");
            let ticker = trace
                .and_then(|t| t.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("chart")
                .to_string();
            let days = trace
                .and_then(|t| t.get("x"))
                .and_then(Value::as_array)
                .map(|x| x.len() as u32)
                .unwrap_or(0);
            charts.push(ChartArtifact {
                ticker,
                days,
                figure,
            });
        }
    }

    charts
}

pub fn build_report(
    question: &str,
    language: Language,
    model_used: &str,
    started: DateTime<Utc>,
    duration_seconds: f64,
    outcome: &AnalysisOutcome,
    logs: Vec<String>,
) -> AnalysisReport {
    AnalysisReport {
        metadata: ReportMetadata {
            question: question.to_string(),
            language,
            model_used: model_used.to_string(),
            analysis_date: started,
            duration_seconds,
            steps: outcome.steps,
        },
        sections: build_sections(&outcome.outputs),
        charts: collect_charts(outcome),
        chart_files: Vec::new(),
        logs,
    }
}

/// One user session: the workflow, the newsletter page and the latest
/// results.
pub struct Session {
    config: Config,
    workflow: Workflow,
    model: Arc<dyn ChatModel>,
    search: Arc<dyn SearchProvider>,
    hide_progress: bool,
    last_report: Option<AnalysisReport>,
}

impl Session {
    pub fn new(
        config: Config,
        model: Arc<dyn ChatModel>,
        market: Arc<dyn MarketData>,
        search: Arc<dyn SearchProvider>,
        hide_progress: bool,
    ) -> Self {
        let workflow = Workflow::new(
            Arc::clone(&model),
            market,
            Arc::clone(&search),
            WorkflowConfig::from_config(&config),
        );

        Self {
            config,
            workflow,
            model,
            search,
            hide_progress,
            last_report: None,
        }
    }

    pub fn language(&self) -> Language {
        self.workflow.language()
    }

    pub fn set_language(&mut self, language: Language) {
        self.workflow.set_language(language);
        self.config.general.language = language;
    }

    fn text(&self) -> &'static UiText {
        UiText::for_language(self.language())
    }

    pub fn last_report(&self) -> Option<&AnalysisReport> {
        self.last_report.as_ref()
    }

    /// Forget the previous results.
    pub fn clear(&mut self) {
        self.last_report = None;
    }

    /// Run the workflow for `question`, render it and save the report.
    pub async fn analyze(&mut self, question: &str) -> Result<AnalysisReport> {
        let language = self.language();
        let renderer = ConsoleRenderer::analysis(language, self.hide_progress);
        let started = Utc::now();
        let timer = Instant::now();

        let outcome = match self.workflow.run(question, &renderer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                renderer.fail(&format!("{:#}", e));
                return Err(e);
            }
        };

        let logs = if self.config.report.include_logs {
            renderer.logs()
        } else {
            Vec::new()
        };
        let mut report = build_report(
            question,
            language,
            self.workflow.model_name(),
            started,
            timer.elapsed().as_secs_f64(),
            &outcome,
            logs,
        );

        if self.config.general.save_reports {
            if let Err(e) = self.save(&mut report) {
                warn!("Could not save report: {:#}", e);
                eprintln!("⚠️  {}: {:#}", self.text().save_failed, e);
            }
        }

        self.last_report = Some(report.clone());
        Ok(report)
    }

    fn save(&self, report: &mut AnalysisReport) -> Result<()> {
        let text = self.text();
        let dir = &self.config.general.output_dir;
        let stamp = file_stamp(report.metadata.analysis_date);

        for (i, chart) in report.charts.iter().enumerate() {
            let chart_stamp = if i == 0 {
                stamp.clone()
            } else {
                format!("{}-{}", stamp, i + 1)
            };
            match write_chart_html(dir, chart, &chart_stamp) {
                Ok(path) => {
                    println!("📊 {}: {}", text.chart_saved, path.display());
                    if let Some(name) = path.file_name() {
                        report.chart_files.push(name.to_string_lossy().into_owned());
                    }
                }
                Err(e) => warn!("Could not write chart for {}: {:#}", chart.ticker, e),
            }
        }

        let path = save_report(dir, report, self.config.report.format)?;
        println!("📝 {}: {}", text.report_saved, path.display());
        info!("Report saved to {}", path.display());

        Ok(())
    }

    /// Run the newsletter page for `keyword`.
    pub async fn newsletter(&self, keyword: &str) -> Result<NewsletterOutcome> {
        let text = self.text();
        let language = self.language();
        println!("\n{}\n", text.newsletter_title);

        let pipeline =
            NewsletterPipeline::new(Arc::clone(&self.model), Arc::clone(&self.search), language);
        let renderer = ConsoleRenderer::newsletter(language, self.hide_progress);

        let outcome = match pipeline.run(keyword, &renderer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                renderer.fail(&format!("{:#}", e));
                return Err(e);
            }
        };
        renderer.finish(text.newsletter_completed);

        println!("\n{}\n", outcome.newsletter.trim());

        if self.config.general.save_reports {
            let path = save_newsletter(&self.config.general.output_dir, &outcome, Utc::now())?;
            println!("📝 {}: {}", text.report_saved, path.display());
        }

        Ok(outcome)
    }

    fn print_failure(&self, failed: &str, e: &anyhow::Error) {
        let text = self.text();
        error!("{}: {:#}", failed, e);
        eprintln!("\n❌ {}. {}: {:#}\n", failed, text.error_occurred, e);
    }

    fn print_header(&self) {
        let text = self.text();
        println!("\n{}\n", text.title);
        println!("{}", text.commands_help);
        println!("{} ({})\n", text.input_label, text.placeholder);
    }

    /// The interactive page on stdin.
    pub async fn run_interactive(&mut self) -> Result<()> {
        self.run_interactive_from(BufReader::new(tokio::io::stdin()))
            .await
    }

    /// The interactive page. Returns when the user quits or `reader` ends.
    pub async fn run_interactive_from<R>(&mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();

        println!("Select language / 언어 선택: [1] English  [2] 한글  (Enter: {})", self.language());
        prompt();
        let choice = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Ignoring language choice: {}", e);
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        match choice.trim() {
            "1" => self.set_language(Language::English),
            "2" => self.set_language(Language::Korean),
            "" => {}
            other => {
                if let Ok(language) = other.parse() {
                    self.set_language(language);
                }
            }
        }

        self.print_header();

        loop {
            prompt();
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Skipping unreadable input line: {}", e);
                    println!("⚠️  {}", self.text().unreadable_input);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match Input::parse(&line) {
                Input::Empty => println!("⚠️  {}", self.text().warning),
                Input::Quit => break,
                Input::New => {
                    self.clear();
                    println!("{}", self.text().session_cleared);
                    self.print_header();
                }
                Input::Logs => match self.last_report() {
                    Some(report) if !report.logs.is_empty() => {
                        println!("\n{}\n{}\n", self.text().detailed_logs, report.logs.join("\n"));
                    }
                    _ => println!("-"),
                },
                Input::Language(Some(language)) => {
                    self.set_language(language);
                    self.print_header();
                }
                Input::Language(None) => println!("{}", self.text().commands_help),
                Input::Newsletter(keyword) if keyword.is_empty() => {
                    println!("⚠️  {}", self.text().newsletter_warning)
                }
                Input::Newsletter(keyword) => {
                    if let Err(e) = self.newsletter(&keyword).await {
                        self.print_failure(self.text().newsletter_failed, &e);
                    }
                }
                Input::Unknown(command) => {
                    println!("? {}\n{}", command, self.text().commands_help)
                }
                Input::Question(question) => {
                    if let Err(e) = self.analyze(&question).await {
                        self.print_failure(self.text().analysis_failed, &e);
                    }
                }
            }
        }

        Ok(())
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
