//! Market data and web search providers backing the agents' tools.
//!
//! Prices come from Yahoo Finance, income statements from Alpha Vantage and
//! news from Tavily. Every provider sits behind a trait so workflows can be
//! exercised without network access.

pub mod cache;
pub mod fundamentals;
pub mod search;
pub mod yahoo;

use crate::config::DataConfig;
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use cache::{CacheKey, MarketCache};
use chrono::NaiveDate;
use fundamentals::AlphaVantageClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use yahoo::YahooPrices;

pub use search::{SearchProvider, SearchRequest, TavilySearch};

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Income statement figures for one fiscal period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub fiscal_date_ending: NaiveDate,
    pub total_revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub ebitda: Option<f64>,
    pub diluted_eps: Option<f64>,
}

/// Annual and quarterly statements, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub annual: Vec<FinancialPeriod>,
    pub quarterly: Vec<FinancialPeriod>,
}

/// Source of prices and financial statements.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Daily bars covering the last `days` calendar days, oldest first.
    async fn daily_bars(&self, ticker: &str, days: u32) -> MarketResult<Vec<PriceBar>>;

    /// Annual and quarterly income statements.
    async fn financials(&self, ticker: &str) -> MarketResult<Financials>;
}

/// Trim and upper-case a ticker symbol.
pub fn normalize_ticker(ticker: &str) -> MarketResult<String> {
    let ticker = ticker.trim();
    if ticker.is_empty() || ticker.chars().any(char::is_whitespace) {
        return Err(MarketError::InvalidSymbol(ticker.to_string()));
    }
    Ok(ticker.to_uppercase())
}

/// Live providers with a shared response cache.
pub struct LiveMarketData {
    prices: YahooPrices,
    fundamentals: Option<AlphaVantageClient>,
    fundamentals_key_env: String,
    cache: MarketCache,
}

impl LiveMarketData {
    pub fn from_config(config: &DataConfig) -> Self {
        let fundamentals = std::env::var(&config.alpha_vantage_api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| AlphaVantageClient::new(key, config.alpha_vantage_rate_limit));

        if fundamentals.is_none() {
            warn!(
                "{} is not set; financial statements will be unavailable",
                config.alpha_vantage_api_key_env
            );
        }

        Self {
            prices: YahooPrices::new(),
            fundamentals,
            fundamentals_key_env: config.alpha_vantage_api_key_env.clone(),
            cache: MarketCache::new(Duration::from_secs(config.cache_ttl_seconds)),
        }
    }
}

#[async_trait]
impl MarketData for LiveMarketData {
    async fn daily_bars(&self, ticker: &str, days: u32) -> MarketResult<Vec<PriceBar>> {
        let symbol = normalize_ticker(ticker)?;
        let key = CacheKey::new(&symbol, "daily_bars", days);

        let value = self
            .cache
            .get_or_fetch(key, || async {
                let bars = self.prices.daily_bars(&symbol, days).await?;
                Ok::<_, MarketError>(serde_json::to_value(bars)?)
            })
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    async fn financials(&self, ticker: &str) -> MarketResult<Financials> {
        let symbol = normalize_ticker(ticker)?;
        let client = self.fundamentals.as_ref().ok_or_else(|| MarketError::DataUnavailable {
            symbol: symbol.clone(),
            reason: format!("{} is not set", self.fundamentals_key_env),
        })?;

        let key = CacheKey::new(&symbol, "financials", ());
        let value = self
            .cache
            .get_or_fetch(key, || async {
                let financials = client.financials(&symbol).await?;
                debug!(
                    "Fetched {} annual and {} quarterly periods for {}",
                    financials.annual.len(),
                    financials.quarterly.len(),
                    symbol
                );
                Ok::<_, MarketError>(serde_json::to_value(financials)?)
            })
            .await?;

        Ok(serde_json::from_value(value)?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_ticker("brk.b").unwrap(), "BRK.B");
        assert!(matches!(
            normalize_ticker("   "),
            Err(MarketError::InvalidSymbol(_))
        ));
        assert!(matches!(
            normalize_ticker("AAPL MSFT"),
            Err(MarketError::InvalidSymbol(_))
        ));
    }

    #[tokio::test]
    async fn test_financials_without_key_is_unavailable() {
        let config = DataConfig {
            alpha_vantage_api_key_env: "STOCK_ANALYST_TEST_UNSET_KEY".to_string(),
            ..DataConfig::default()
        };
        let market = LiveMarketData::from_config(&config);

        let err = market.financials("aapl").await.unwrap_err();
        match err {
            MarketError::DataUnavailable { symbol, reason } => {
                assert_eq!(symbol, "AAPL");
                assert!(reason.contains("STOCK_ANALYST_TEST_UNSET_KEY"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    #[ignore] // requires network access
    async fn test_live_daily_bars() {
        let market = LiveMarketData::from_config(&DataConfig::default());
        let bars = market.daily_bars("AAPL", 10).await.unwrap();
        assert!(!bars.is_empty());
    }
}
