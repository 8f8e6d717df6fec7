//! Plotly candlestick charts.
//!
//! Charts travel through the conversation as fenced JSON blocks after a
//! `![Chart]` marker and are rendered as standalone HTML pages.

use crate::market::PriceBar;
use crate::models::ChartArtifact;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const CHART_MARKER: &str = "![Chart]";
const JSON_FENCE: &str = "```json\n";
const FENCE: &str = "```";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Build a Plotly candlestick figure for `bars`.
pub fn candlestick_figure(ticker: &str, bars: &[PriceBar]) -> Value {
    let dates: Vec<String> = bars
        .iter()
        .map(|b| b.date.format("%Y-%m-%d").to_string())
        .collect();

    json!({
        "data": [{
            "type": "candlestick",
            "name": ticker,
            "x": dates,
            "open": bars.iter().map(|b| b.open).collect::<Vec<_>>(),
            "high": bars.iter().map(|b| b.high).collect::<Vec<_>>(),
            "low": bars.iter().map(|b| b.low).collect::<Vec<_>>(),
            "close": bars.iter().map(|b| b.close).collect::<Vec<_>>(),
        }],
        "layout": {
            "title": {"text": format!("{} Stock Price", ticker)},
            "yaxis": {"title": {"text": "Stock Price (USD)"}},
            "xaxis": {"title": {"text": "Date"}, "rangeslider": {"visible": false}},
        }
    })
}

/// Wrap a figure the way the chart tool returns it.
pub fn chart_markdown(figure: &Value) -> String {
    format!("{}\n{}{}\n{}", CHART_MARKER, JSON_FENCE, figure, FENCE)
}

/// A piece of agent output: plain markdown or a chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Markdown(String),
    Chart(Value),
    /// A chart block whose JSON could not be parsed.
    BrokenChart { raw: String, error: String },
}

/// Split agent output into markdown and chart blocks.
pub fn split_chart_blocks(content: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut rest = content;

    while let Some(marker) = rest.find(CHART_MARKER) {
        let after_marker = &rest[marker + CHART_MARKER.len()..];
        let Some(open) = after_marker.find(JSON_FENCE) else {
            break;
        };
        let body = &after_marker[open + JSON_FENCE.len()..];
        let Some(close) = body.find(FENCE) else {
            break;
        };

        push_markdown(&mut blocks, &rest[..marker]);

        let raw = body[..close].trim();
        match serde_json::from_str::<Value>(raw) {
            Ok(figure) => blocks.push(ContentBlock::Chart(figure)),
            Err(e) => blocks.push(ContentBlock::BrokenChart {
                raw: raw.to_string(),
                error: e.to_string(),
            }),
        }

        rest = &body[close + FENCE.len()..];
    }

    push_markdown(&mut blocks, rest);
    blocks
}

fn push_markdown(blocks: &mut Vec<ContentBlock>, text: &str) {
    if !text.trim().is_empty() {
        blocks.push(ContentBlock::Markdown(text.trim().to_string()));
    }
}

/// Figures in `content`, skipping malformed blocks.
pub fn extract_charts(content: &str) -> Vec<Value> {
    split_chart_blocks(content)
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Chart(figure) => Some(figure),
            _ => None,
        })
        .collect()
}

/// Price statistics shown next to a chart in the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub title: String,
    pub first_date: String,
    pub last_date: String,
    pub first_close: f64,
    pub last_close: f64,
    pub change_percent: f64,
    pub low: f64,
    pub high: f64,
    pub sessions: usize,
}

impl ChartSummary {
    /// Summarize the first candlestick trace of a figure.
    pub fn from_figure(figure: &Value) -> Option<Self> {
        let trace = figure.get("data")?.as_array()?.first()?;
        let numbers = |key: &str| -> Option<Vec<f64>> {
            trace.get(key)?.as_array()?.iter().map(Value::as_f64).collect()
        };

        let dates: Vec<String> = trace
            .get("x")?
            .as_array()?
            .iter()
            .map(|d| d.as_str().map(String::from).unwrap_or_else(|| d.to_string()))
            .collect();
        let close = numbers("close")?;
        let low = numbers("low")?;
        let high = numbers("high")?;

        let first_close = *close.first()?;
        let last_close = *close.last()?;
        let change_percent = if first_close != 0.0 {
            (last_close - first_close) / first_close * 100.0
        } else {
            0.0
        };

        Some(Self {
            title: figure
                .pointer("/layout/title/text")
                .or_else(|| figure.pointer("/layout/title"))
                .and_then(Value::as_str)
                .unwrap_or("Chart")
                .to_string(),
            first_date: dates.first()?.clone(),
            last_date: dates.last()?.clone(),
            first_close,
            last_close,
            change_percent,
            low: low.iter().copied().fold(f64::INFINITY, f64::min),
            high: high.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            sessions: close.len(),
        })
    }

    pub fn to_text(&self) -> String {
        format!(
            "📈 {} ({} → {}, {} sessions)\n   Close: {:.2} → {:.2} ({:+.2}%)   Range: {:.2} - {:.2}",
            self.title,
            self.first_date,
            self.last_date,
            self.sessions,
            self.first_close,
            self.last_close,
            self.change_percent,
            self.low,
            self.high
        )
    }
}

/// Standalone HTML page rendering `figure` with Plotly.
pub fn chart_html(figure: &Value) -> String {
    let title = figure
        .pointer("/layout/title/text")
        .and_then(Value::as_str)
        .unwrap_or("Chart");
    let data = figure.get("data").cloned().unwrap_or_else(|| json!([]));
    let layout = figure.get("layout").cloned().unwrap_or_else(|| json!({}));

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
Plotly.newPlot("chart", {data}, {layout}, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = title,
        cdn = PLOTLY_CDN,
        data = data,
        layout = layout
    )
}

/// Write a chart page into `dir` as `<ticker>-<days>d-<stamp>.html`.
pub fn write_chart_html(dir: &Path, chart: &ChartArtifact, stamp: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let file_name = format!(
        "{}-{}d-{}.html",
        chart.ticker.to_lowercase().replace(['/', '\\', ' ', '.'], "-"),
        chart.days,
        stamp
    );
    let path = dir.join(file_name);

    std::fs::write(&path, chart_html(&chart.figure))
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::sample_bars;
    use tempfile::TempDir;

    #[test]
    fn test_candlestick_figure_layout() {
        let figure = candlestick_figure("AAPL", &sample_bars(3));

        assert_eq!(figure["data"][0]["type"], "candlestick");
        assert_eq!(figure["data"][0]["x"][0], "2024-06-01");
        assert_eq!(figure["data"][0]["close"][2], 102.0);
        assert_eq!(figure["layout"]["title"]["text"], "AAPL Stock Price");
        assert_eq!(figure["layout"]["yaxis"]["title"]["text"], "Stock Price (USD)");
        assert_eq!(figure["layout"]["xaxis"]["title"]["text"], "Date");
    }

    #[test]
    fn test_split_chart_blocks() {
        let figure = candlestick_figure("MSFT", &sample_bars(2));
        let content = format!(
            "Here is the chart:\n{}\nThe trend is up.",
            chart_markdown(&figure)
        );

        let blocks = split_chart_blocks(&content);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], ContentBlock::Markdown("Here is the chart:".to_string()));
        assert_eq!(blocks[1], ContentBlock::Chart(figure));
        assert_eq!(blocks[2], ContentBlock::Markdown("The trend is up.".to_string()));
    }

    #[test]
    fn test_broken_chart_block() {
        let content = "![Chart]\n```json\n{\"data\": [\n```";
        let blocks = split_chart_blocks(content);
        assert!(matches!(blocks[0], ContentBlock::BrokenChart { .. }));
        assert!(extract_charts(content).is_empty());
    }

    #[test]
    fn test_plain_markdown_passes_through() {
        let blocks = split_chart_blocks("## Analysis\nNo chart here.");
        assert_eq!(
            blocks,
            vec![ContentBlock::Markdown("## Analysis\nNo chart here.".to_string())]
        );
    }

    #[test]
    fn test_chart_summary() {
        let figure = candlestick_figure("AAPL", &sample_bars(5));
        let summary = ChartSummary::from_figure(&figure).unwrap();

        assert_eq!(summary.title, "AAPL Stock Price");
        assert_eq!(summary.first_date, "2024-06-01");
        assert_eq!(summary.last_date, "2024-06-05");
        assert_eq!(summary.first_close, 100.0);
        assert_eq!(summary.last_close, 104.0);
        assert!((summary.change_percent - 4.0).abs() < 1e-9);
        assert_eq!(summary.low, 99.0);
        assert_eq!(summary.high, 105.0);
        assert!(summary.to_text().contains("+4.00%"));

        assert!(ChartSummary::from_figure(&json!({"data": []})).is_none());
    }

    #[test]
    fn test_write_chart_html() {
        let temp_dir = TempDir::new().unwrap();
        let chart = ChartArtifact {
            ticker: "AAPL".to_string(),
            days: 30,
            figure: candlestick_figure("AAPL", &sample_bars(2)),
        };

        let path = write_chart_html(temp_dir.path(), &chart, "20240601-120000").unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "aapl-30d-20240601-120000.html"
        );

        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("<title>AAPL Stock Price</title>"));
        assert!(html.contains("Plotly.newPlot(\"chart\""));
        assert!(html.contains(PLOTLY_CDN));
    }
}
