//! Web and news search through the Tavily API.

use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    /// `general` or `news`.
    pub topic: String,
    /// Look-back window for news searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    pub include_images: bool,
    pub include_raw_content: bool,
}

impl SearchRequest {
    pub fn general(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            topic: "general".to_string(),
            days: None,
            include_images: false,
            include_raw_content: false,
        }
    }

    pub fn news(query: impl Into<String>, max_results: usize, days: u32) -> Self {
        Self {
            topic: "news".to_string(),
            days: Some(days),
            ..Self::general(query, max_results)
        }
    }

    pub fn with_images_and_raw_content(mut self) -> Self {
        self.include_images = true;
        self.include_raw_content = true;
        self
    }
}

/// One search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    pub raw_content: Option<String>,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> MarketResult<Vec<SearchHit>>;
}

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    api_key_env: String,
}

impl TavilySearch {
    /// Read the key from `api_key_env`; a missing key fails at search time.
    pub fn from_env(api_key_env: &str) -> MarketResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: std::env::var(api_key_env).ok().filter(|k| !k.is_empty()),
            api_key_env: api_key_env.to_string(),
        })
    }
}

#[derive(Serialize)]
struct TavilyBody<'a> {
    api_key: &'a str,
    #[serde(flatten)]
    request: &'a SearchRequest,
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, request: &SearchRequest) -> MarketResult<Vec<SearchHit>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MarketError::MissingApiKey(self.api_key_env.clone()))?;

        debug!("Tavily search ({}): {}", request.topic, request.query);

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&TavilyBody { api_key, request })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(MarketError::RateLimited {
                provider: "Tavily".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Provider {
                provider: "Tavily".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let payload: Value = response.json().await?;
        Ok(parse_response(&payload))
    }
}

/// Convert a Tavily response, pairing image `i` with result `i`.
pub fn parse_response(payload: &Value) -> Vec<SearchHit> {
    let images: Vec<String> = payload
        .get("images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter_map(|image| match image {
                    Value::String(url) => Some(url.clone()),
                    Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(String::from),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let text = |result: &Value, field: &str| -> String {
        result
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    payload
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .enumerate()
                .map(|(i, result)| SearchHit {
                    title: text(result, "title"),
                    url: text(result, "url"),
                    content: text(result, "content"),
                    raw_content: result
                        .get("raw_content")
                        .and_then(Value::as_str)
                        .map(String::from),
                    image_url: images.get(i).cloned(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns canned hits keyed by query; unknown queries fail.
    #[derive(Default)]
    pub struct StaticSearch {
        pub hits: HashMap<String, Vec<SearchHit>>,
        pub requests: Mutex<Vec<SearchRequest>>,
    }

    impl StaticSearch {
        pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            self.hits.insert(query.to_string(), hits);
            self
        }

        pub fn recorded(&self) -> Vec<SearchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(&self, request: &SearchRequest) -> MarketResult<Vec<SearchHit>> {
            self.requests.lock().unwrap().push(request.clone());
            self.hits
                .get(&request.query)
                .cloned()
                .ok_or_else(|| MarketError::Provider {
                    provider: "static".to_string(),
                    message: format!("no results for {}", request.query),
                })
        }
    }

    pub fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: format!("https://news.example.com/{}", title.to_lowercase().replace(' ', "-")),
            content: format!("{} summary", title),
            raw_content: Some(format!("{} full text", title)),
            image_url: None,
        }
    }
}
