//! Income statements from Alpha Vantage.
//!
//! `INCOME_STATEMENT` supplies revenue, operating income, net income and
//! EBITDA. Diluted EPS is not part of that report, so the reported EPS from
//! `EARNINGS` is joined in by fiscal date.

use super::{FinancialPeriod, Financials};
use crate::error::{MarketError, MarketResult};
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// `rate_limit` is requests per minute (5 on the free tier).
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        let per_minute = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN);

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    pub async fn financials(&self, symbol: &str) -> MarketResult<Financials> {
        let income = self.query("INCOME_STATEMENT", symbol).await?;
        let earnings = self.query("EARNINGS", symbol).await?;
        parse_financials(symbol, &income, &earnings)
    }

    async fn query(&self, function: &str, symbol: &str) -> MarketResult<Value> {
        self.rate_limiter.until_ready().await;
        debug!("Alpha Vantage {} {}", function, symbol);

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketError::Provider {
                provider: PROVIDER.to_string(),
                message: format!("HTTP error: {}", response.status()),
            });
        }

        let data: Value = response.json().await?;
        check_payload(&data)?;
        Ok(data)
    }
}

/// Map Alpha Vantage's in-band error payloads to errors.
fn check_payload(data: &Value) -> MarketResult<()> {
    if let Some(message) = data.get("Error Message").and_then(Value::as_str) {
        return Err(MarketError::Provider {
            provider: PROVIDER.to_string(),
            message: message.to_string(),
        });
    }
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(MarketError::RateLimited {
            provider: PROVIDER.to_string(),
        });
    }
    Ok(())
}

/// Numeric field; Alpha Vantage sends numbers as strings and `"None"` for gaps.
fn number(report: &Value, field: &str) -> Option<f64> {
    match report.get(field)? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn fiscal_date(report: &Value) -> Option<NaiveDate> {
    let raw = report.get("fiscalDateEnding")?.as_str()?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn eps_by_date(earnings: &Value, key: &str) -> HashMap<NaiveDate, f64> {
    earnings
        .get(key)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| Some((fiscal_date(row)?, number(row, "reportedEPS")?)))
                .collect()
        })
        .unwrap_or_default()
}

fn periods(income: &Value, key: &str, eps: &HashMap<NaiveDate, f64>) -> Vec<FinancialPeriod> {
    let mut periods: Vec<FinancialPeriod> = income
        .get(key)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let date = fiscal_date(row)?;
                    Some(FinancialPeriod {
                        fiscal_date_ending: date,
                        total_revenue: number(row, "totalRevenue"),
                        operating_income: number(row, "operatingIncome"),
                        net_income: number(row, "netIncome"),
                        ebitda: number(row, "ebitda"),
                        diluted_eps: eps.get(&date).copied(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    periods.sort_by(|a, b| b.fiscal_date_ending.cmp(&a.fiscal_date_ending));
    periods
}

/// Combine the two reports into [`Financials`].
pub fn parse_financials(symbol: &str, income: &Value, earnings: &Value) -> MarketResult<Financials> {
    check_payload(income)?;
    check_payload(earnings)?;

    let financials = Financials {
        annual: periods(income, "annualReports", &eps_by_date(earnings, "annualEarnings")),
        quarterly: periods(
            income,
            "quarterlyReports",
            &eps_by_date(earnings, "quarterlyEarnings"),
        ),
    };

    if financials.annual.is_empty() && financials.quarterly.is_empty() {
        return Err(MarketError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no income statements reported".to_string(),
        });
    }

    Ok(financials)
}
