//! Daily prices from Yahoo Finance.

use super::PriceBar;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

const PROVIDER: &str = "Yahoo Finance";

pub struct YahooPrices {}

impl YahooPrices {
    pub fn new() -> Self {
        Self {}
    }

    /// Bars for the `days` calendar days ending now, oldest first.
    pub async fn daily_bars(&self, symbol: &str, days: u32) -> MarketResult<Vec<PriceBar>> {
        let connector = yahoo::YahooConnector::new().map_err(provider_error)?;

        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(i64::from(days.max(1)));

        let response = connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(provider_error)?;

        let quotes = response.quotes().map_err(provider_error)?;
        if quotes.is_empty() {
            return Err(MarketError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no quotes in the last {} days", days),
            });
        }

        let mut bars: Vec<PriceBar> = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::<Utc>::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(PriceBar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();
        bars.sort_by_key(|bar| bar.date);

        Ok(bars)
    }
}

fn provider_error(e: yahoo::YahooError) -> MarketError {
    MarketError::Provider {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires network access
    async fn test_fetch_recent_bars() {
        let bars = YahooPrices::new().daily_bars("MSFT", 14).await.unwrap();
        assert!(!bars.is_empty());
        assert!(bars.windows(2).all(|w| w[0].date <= w[1].date));
    }
}
