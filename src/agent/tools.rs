//! Tool definitions for the member agents.
//!
//! This module defines the tools that the LLM can call and executes them
//! against the market data and search providers.

use crate::llm::{ToolCall, ToolDefinition};
use crate::market::{normalize_ticker, FinancialPeriod, MarketData, SearchProvider, SearchRequest};
use crate::models::{ChartArtifact, Member};
use crate::report::chart::{candlestick_figure, chart_markdown};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const WEB_SEARCH: &str = "web_search";
pub const ANALYZE_STOCK_TICKER: &str = "analyze_stock_ticker";
pub const CREATE_STOCK_CHART: &str = "create_stock_chart";

/// Longest chart window accepted from the model.
const MAX_CHART_DAYS: u64 = 3650;

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    /// Text sent back to the model as the tool message.
    pub fn to_message(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or_default())
        }
    }
}

/// Tool tuning taken from the `[data]` config section.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub search_max_results: usize,
    pub price_days: usize,
    pub chart_days: u32,
    pub financial_periods: usize,
}

impl From<&crate::config::DataConfig> for ToolSettings {
    fn from(data: &crate::config::DataConfig) -> Self {
        Self {
            search_max_results: data.search_max_results,
            price_days: data.price_days,
            chart_days: data.chart_days,
            financial_periods: data.financial_periods,
        }
    }
}

/// Executes tool calls and collects the charts they produce.
pub struct ToolExecutor {
    market: Arc<dyn MarketData>,
    search: Arc<dyn SearchProvider>,
    settings: ToolSettings,
    charts: Vec<ChartArtifact>,
}

impl ToolExecutor {
    pub fn new(
        market: Arc<dyn MarketData>,
        search: Arc<dyn SearchProvider>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            market,
            search,
            settings,
            charts: Vec::new(),
        }
    }

    /// Charts created so far.
    #[cfg(test)]
    pub fn charts(&self) -> &[ChartArtifact] {
        &self.charts
    }

    pub fn take_charts(&mut self) -> Vec<ChartArtifact> {
        std::mem::take(&mut self.charts)
    }

    /// Execute a tool call on behalf of `member`.
    ///
    /// Members may only call their own tools.
    pub async fn execute(&mut self, member: Member, call: &ToolCall) -> ToolResult {
        debug!("{} executing tool {} with args: {}", member, call.name, call.arguments);

        if !tool_names(member).contains(&call.name.as_str()) {
            return ToolResult::error(format!("Unknown tool: {}", call.name));
        }

        let args = &call.arguments;
        match call.name.as_str() {
            WEB_SEARCH => self.web_search(args).await,
            ANALYZE_STOCK_TICKER => self.analyze_stock_ticker(args).await,
            CREATE_STOCK_CHART => self.create_stock_chart(args).await,
            _ => ToolResult::error(format!("Unknown tool: {}", call.name)),
        }
    }

    async fn web_search(&self, args: &Value) -> ToolResult {
        let query = match required_str(args, "query") {
            Ok(q) => q,
            Err(e) => return e,
        };

        let request = SearchRequest::general(query, self.settings.search_max_results);
        match self.search.search(&request).await {
            Ok(hits) if hits.is_empty() => ToolResult::success(format!("No results for: {}", query)),
            Ok(hits) => {
                let blocks: Vec<String> = hits
                    .iter()
                    .take(self.settings.search_max_results)
                    .enumerate()
                    .map(|(i, hit)| {
                        format!("{}. {}\nURL: {}\n{}", i + 1, hit.title, hit.url, hit.content)
                    })
                    .collect();
                ToolResult::success(blocks.join("\n\n"))
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn analyze_stock_ticker(&self, args: &Value) -> ToolResult {
        let ticker = match required_str(args, "ticker").map(normalize_ticker) {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => return ToolResult::error(e.to_string()),
            Err(e) => return e,
        };

        // Enough calendar days to cover weekends and holidays
        let window = (self.settings.price_days * 2 + 7) as u32;
        let bars = match self.market.daily_bars(&ticker, window).await {
            Ok(bars) => bars,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let mut recent_closes = Map::new();
        let skip = bars.len().saturating_sub(self.settings.price_days);
        for bar in bars.iter().skip(skip) {
            recent_closes.insert(
                bar.date.format("%Y-%m-%d").to_string(),
                json!((bar.close * 100.0).round() / 100.0),
            );
        }

        let (annual, quarterly) = match self.market.financials(&ticker).await {
            Ok(financials) => (
                financial_summary(&financials.annual, self.settings.financial_periods),
                financial_summary(&financials.quarterly, self.settings.financial_periods),
            ),
            Err(e) => {
                let reason = json!({ "unavailable": e.to_string() });
                (reason.clone(), reason)
            }
        };

        let summary = json!({
            "ticker": ticker,
            "recent_closes": recent_closes,
            "annual_financials": annual,
            "quarterly_financials": quarterly,
        });

        match serde_json::to_string_pretty(&summary) {
            Ok(text) => ToolResult::success(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn create_stock_chart(&mut self, args: &Value) -> ToolResult {
        let ticker = match required_str(args, "ticker").map(normalize_ticker) {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => return ToolResult::error(e.to_string()),
            Err(e) => return e,
        };

        let days = match args.get("days") {
            None | Some(Value::Null) => self.settings.chart_days,
            Some(value) => match value_as_u64(value) {
                Some(d) if (1..=MAX_CHART_DAYS).contains(&d) => d as u32,
                _ => {
                    return ToolResult::error(format!(
                        "days must be a whole number between 1 and {}",
                        MAX_CHART_DAYS
                    ))
                }
            },
        };

        let bars = match self.market.daily_bars(&ticker, days).await {
            Ok(bars) => bars,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let figure = candlestick_figure(&ticker, &bars);
        let output = chart_markdown(&figure);
        self.charts.push(ChartArtifact {
            ticker,
            days,
            figure,
        });

        ToolResult::success(output)
    }
}

fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolResult> {
    match args.get(name).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim()),
        _ => Err(ToolResult::error(format!(
            "Missing required parameter: {}",
            name
        ))),
    }
}

/// Models sometimes send numbers as strings.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn financial_summary(periods: &[FinancialPeriod], limit: usize) -> Value {
    let mut summary = Map::new();
    for period in periods.iter().take(limit) {
        summary.insert(
            period.fiscal_date_ending.format("%Y-%m-%d").to_string(),
            json!({
                "total_revenue": format_number(period.total_revenue),
                "operating_income": format_number(period.operating_income),
                "net_income": format_number(period.net_income),
                "ebitda": format_number(period.ebitda),
                "diluted_eps": format_eps(period.diluted_eps),
            }),
        );
    }
    Value::Object(summary)
}

/// Whole number with thousands separators, or `N/A`.
pub fn format_number(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return "N/A".to_string();
    };

    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Earnings per share as `$x.xx`, or `N/A`.
pub fn format_eps(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(eps) if eps < 0.0 => format!("-${:.2}", eps.abs()),
        Some(eps) => format!("${:.2}", eps),
        None => "N/A".to_string(),
    }
}

fn tool_names(member: Member) -> &'static [&'static str] {
    match member {
        Member::Researcher => &[WEB_SEARCH],
        Member::StockAnalyzer => &[ANALYZE_STOCK_TICKER],
        Member::ChartGenerator => &[CREATE_STOCK_CHART],
    }
}

/// Tool definitions offered to `member`.
pub fn tool_definitions(member: Member) -> Vec<ToolDefinition> {
    match member {
        Member::Researcher => vec![ToolDefinition::function(
            WEB_SEARCH,
            "Search the web for recent news and information. Returns titles, URLs and snippets.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query, e.g. 'Apple AAPL latest earnings news'"
                    }
                },
                "required": ["query"]
            }),
        )],
        Member::StockAnalyzer => vec![ToolDefinition::function(
            ANALYZE_STOCK_TICKER,
            "Analyze a stock ticker: recent closing prices plus annual and quarterly income statement summaries.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "Stock ticker symbol, e.g. 'AAPL'"
                    }
                },
                "required": ["ticker"]
            }),
        )],
        Member::ChartGenerator => vec![ToolDefinition::function(
            CREATE_STOCK_CHART,
            "Create a candlestick chart of daily prices for a stock.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "Stock ticker symbol, e.g. 'AAPL'"
                    },
                    "days": {
                        "type": "integer",
                        "description": "Number of days to show (default 30)"
                    }
                },
                "required": ["ticker"]
            }),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::search::testing::{hit, StaticSearch};
    use crate::market::testing::{sample_bars, sample_financials, StaticMarketData};

    fn make_executor(market: StaticMarketData, search: StaticSearch) -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(market),
            Arc::new(search),
            ToolSettings {
                search_max_results: 2,
                price_days: 5,
                chart_days: 30,
                financial_periods: 4,
            },
        )
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: None,
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(Some(383_285_000_000.0)), "383,285,000,000");
        assert_eq!(format_number(Some(999.6)), "1,000");
        assert_eq!(format_number(Some(12.0)), "12");
        assert_eq!(format_number(Some(-1_234_567.0)), "-1,234,567");
        assert_eq!(format_number(None), "N/A");
        assert_eq!(format_number(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn test_format_eps() {
        assert_eq!(format_eps(Some(6.13)), "$6.13");
        assert_eq!(format_eps(Some(1.0)), "$1.00");
        assert_eq!(format_eps(Some(-0.5)), "-$0.50");
        assert_eq!(format_eps(None), "N/A");
    }

    #[test]
    fn test_tool_definitions_per_member() {
        for member in Member::ALL {
            let defs = tool_definitions(member);
            assert_eq!(defs.len(), 1);
            assert_eq!(defs[0].tool_type, "function");
            assert!(tool_names(member).contains(&defs[0].function.name.as_str()));
        }
    }

    #[tokio::test]
    async fn test_analyze_stock_ticker() {
        let market = StaticMarketData::default()
            .with_bars("AAPL", sample_bars(8))
            .with_financials("AAPL", sample_financials());
        let mut executor = make_executor(market, StaticSearch::default());

        let result = executor
            .execute(
                Member::StockAnalyzer,
                &call(ANALYZE_STOCK_TICKER, json!({"ticker": "aapl"})),
            )
            .await;
        assert!(result.success, "{:?}", result.error);

        let summary: Value = serde_json::from_str(&result.output).unwrap();
        let closes = summary["recent_closes"].as_object().unwrap();
        assert_eq!(closes.len(), 5);
        assert_eq!(closes["2024-06-08"], 107.0);
        assert!(!closes.contains_key("2024-06-03"));

        let annual = &summary["annual_financials"]["2023-09-30"];
        assert_eq!(annual["total_revenue"], "383,285,000,000");
        assert_eq!(annual["diluted_eps"], "$6.13");
        let quarter = &summary["quarterly_financials"]["2024-03-31"];
        assert_eq!(quarter["operating_income"], "N/A");
        assert_eq!(quarter["diluted_eps"], "N/A");
    }

    #[tokio::test]
    async fn test_analyze_without_financials_reports_reason() {
        let market = StaticMarketData::default().with_bars("MSFT", sample_bars(3));
        let mut executor = make_executor(market, StaticSearch::default());

        let result = executor
            .execute(
                Member::StockAnalyzer,
                &call(ANALYZE_STOCK_TICKER, json!({"ticker": "MSFT"})),
            )
            .await;
        assert!(result.success);

        let summary: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(summary["recent_closes"].as_object().unwrap().len(), 3);
        assert!(summary["annual_financials"]["unavailable"]
            .as_str()
            .unwrap()
            .contains("no statements"));
    }

    #[tokio::test]
    async fn test_create_stock_chart_records_artifact() {
        let market = StaticMarketData::default().with_bars("TSLA", sample_bars(10));
        let mut executor = make_executor(market, StaticSearch::default());

        let result = executor
            .execute(
                Member::ChartGenerator,
                &call(CREATE_STOCK_CHART, json!({"ticker": "tsla", "days": "60"})),
            )
            .await;
        assert!(result.success);
        assert!(result.output.starts_with("![Chart]\n```json\n"));
        assert!(result.output.ends_with("\n```"));

        let charts = executor.charts();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].ticker, "TSLA");
        assert_eq!(charts[0].days, 60);
        assert_eq!(charts[0].figure["layout"]["title"]["text"], "TSLA Stock Price");
    }

    #[tokio::test]
    async fn test_create_stock_chart_defaults_and_validation() {
        let market = StaticMarketData::default().with_bars("TSLA", sample_bars(10));
        let mut executor = make_executor(market, StaticSearch::default());

        let result = executor
            .execute(Member::ChartGenerator, &call(CREATE_STOCK_CHART, json!({"ticker": "TSLA"})))
            .await;
        assert!(result.success);
        assert_eq!(executor.charts()[0].days, 30);

        let result = executor
            .execute(
                Member::ChartGenerator,
                &call(CREATE_STOCK_CHART, json!({"ticker": "TSLA", "days": 0})),
            )
            .await;
        assert!(!result.success);
        assert_eq!(executor.take_charts().len(), 1);
    }

    #[tokio::test]
    async fn test_web_search_formats_hits() {
        let search = StaticSearch::default().with_hits(
            "AAPL news",
            vec![hit("Apple beats"), hit("iPhone demand"), hit("Third story")],
        );
        let mut executor = make_executor(StaticMarketData::default(), search);

        let result = executor
            .execute(Member::Researcher, &call(WEB_SEARCH, json!({"query": "AAPL news"})))
            .await;
        assert!(result.success);
        assert!(result.output.starts_with("1. Apple beats\nURL: https://news.example.com/apple-beats"));
        assert!(result.output.contains("2. iPhone demand"));
        assert!(!result.output.contains("Third story"));
    }

    #[tokio::test]
    async fn test_tool_errors() {
        let mut executor = make_executor(StaticMarketData::default(), StaticSearch::default());

        let missing = executor
            .execute(Member::StockAnalyzer, &call(ANALYZE_STOCK_TICKER, json!({})))
            .await;
        assert_eq!(
            missing.to_message(),
            "Error: Missing required parameter: ticker"
        );

        // researchers cannot draw charts
        let foreign = executor
            .execute(Member::Researcher, &call(CREATE_STOCK_CHART, json!({"ticker": "AAPL"})))
            .await;
        assert_eq!(foreign.to_message(), "Error: Unknown tool: create_stock_chart");

        let unknown = executor
            .execute(Member::Researcher, &call("python_repl", json!({})))
            .await;
        assert!(!unknown.success);
    }
}
