//! Markdown and JSON report generation.
//!
//! Analysis runs and newsletters are written to the output directory
//! as `<slug>-<timestamp>` files.

use crate::config::ReportFormat;
use crate::models::{AgentSection, AnalysisReport, ReportMetadata};
use crate::newsletter::NewsletterOutcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const MAX_SLUG_CHARS: usize = 48;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Stock Analysis Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_question_section(&report.metadata.question));

    for section in &report.sections {
        output.push_str(&generate_member_section(section));
    }

    output.push_str(&generate_charts_section(report));

    if !report.logs.is_empty() {
        output.push_str(&generate_logs_section(&report.logs));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Language:** {}\n", metadata.language));
    section.push_str(&format!("- **Supervisor Steps:** {}\n", metadata.steps));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn anchor(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

fn generate_table_of_contents(report: &AnalysisReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Question](#question)\n");

    for section in &report.sections {
        let title = section.member.display_name();
        toc.push_str(&format!("- [{}](#{})\n", title, anchor(title)));
    }

    if !report.charts.is_empty() {
        toc.push_str("- [Charts](#charts)\n");
    }
    if !report.logs.is_empty() {
        toc.push_str("- [Detailed Logs](#detailed-logs)\n");
    }

    toc.push('\n');

    toc
}

fn generate_question_section(question: &str) -> String {
    format!("## Question\n\n> {}\n\n", question.trim())
}

/// One member's latest answer. Chart blocks stay inline as fenced JSON.
fn generate_member_section(section: &AgentSection) -> String {
    let mut block = String::new();

    block.push_str(&format!("## {}\n\n", section.member.display_name()));
    if section.trials > 1 {
        block.push_str(&format!("*Trials: {}*\n\n", section.trials));
    }
    block.push_str(section.content.trim());
    block.push_str("\n\n");

    block
}

fn generate_charts_section(report: &AnalysisReport) -> String {
    if report.charts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Charts\n\n");

    for (i, chart) in report.charts.iter().enumerate() {
        match report.chart_files.get(i) {
            Some(file) => section.push_str(&format!(
                "- {} ({} days): [{}]({})\n",
                chart.ticker, chart.days, file, file
            )),
            None => section.push_str(&format!("- {} ({} days)\n", chart.ticker, chart.days)),
        }
    }
    section.push('\n');

    section
}

fn generate_logs_section(logs: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Detailed Logs\n\n");
    section.push_str("<details>\n<summary>Show logs</summary>\n\n```\n");
    for line in logs {
        section.push_str(line);
        section.push('\n');
    }
    section.push_str("```\n</details>\n\n");

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by stock-analyst v{}. Not financial advice.*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Markdown for a finished newsletter, with the unedited draft folded away.
pub fn generate_newsletter_markdown(outcome: &NewsletterOutcome) -> String {
    let mut output = String::new();

    output.push_str(outcome.newsletter.trim());
    output.push_str("\n\n---\n\n");
    output.push_str(&format!(
        "*Keyword: {} | Language: {} | Sources: {}*\n\n",
        outcome.keyword,
        outcome.language,
        outcome.article_titles.len()
    ));
    output.push_str("<details>\n<summary>Draft before editing</summary>\n\n");
    output.push_str(outcome.draft.trim());
    output.push_str("\n\n</details>\n");

    output
}

/// File-name friendly form of `text`: lowercase alphanumerics joined by `-`.
///
/// Non-ASCII letters are kept so Korean questions still produce a name.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.chars().count() >= MAX_SLUG_CHARS {
            break;
        }
    }

    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

/// Timestamp used in report and chart file names.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

pub fn report_file_name(title: &str, at: DateTime<Utc>, format: ReportFormat) -> String {
    format!("{}-{}.{}", slugify(title), file_stamp(at), format.extension())
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(path)
}

/// Write an analysis report in `format` and return its path.
pub fn save_report(dir: &Path, report: &AnalysisReport, format: ReportFormat) -> Result<PathBuf> {
    let content = match format {
        ReportFormat::Json => generate_json_report(report)?,
        ReportFormat::Markdown => generate_markdown_report(report),
    };
    let name = report_file_name(
        &report.metadata.question,
        report.metadata.analysis_date,
        format,
    );

    write_file(dir, &name, &content)
}

/// Write a newsletter as markdown and return its path.
pub fn save_newsletter(dir: &Path, outcome: &NewsletterOutcome, at: DateTime<Utc>) -> Result<PathBuf> {
    let name = report_file_name(
        &format!("newsletter {}", outcome.keyword),
        at,
        ReportFormat::Markdown,
    );

    write_file(dir, &name, &generate_newsletter_markdown(outcome))
}
