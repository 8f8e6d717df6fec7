//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.stock-analyst.toml` files.

use crate::models::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".stock-analyst.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Market data and search settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Supervisor routing settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Language for prompts, answers and the UI.
    #[serde(default)]
    pub language: Language,

    /// Directory for reports and chart files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write a report after each run.
    #[serde(default = "default_true")]
    pub save_reports: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            output_dir: default_output_dir(),
            save_reports: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_true() -> bool {
    true
}

/// Which wire format the chat backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions`
    #[default]
    Openai,
    /// Ollama native `/api/chat`
    Ollama,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend wire format.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key (OpenAI provider only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Maximum tool-calling rounds for one member turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            name: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    3
}

fn default_max_iterations() -> usize {
    10
}

/// Market data and web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Environment variable holding the Tavily search key.
    #[serde(default = "default_search_key_env")]
    pub search_api_key_env: String,

    /// Environment variable holding the Alpha Vantage key.
    #[serde(default = "default_alpha_vantage_key_env")]
    pub alpha_vantage_api_key_env: String,

    /// Alpha Vantage requests per minute.
    #[serde(default = "default_alpha_vantage_rate_limit")]
    pub alpha_vantage_rate_limit: u32,

    /// Lifetime of cached market data.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Results returned by the research search tool.
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    /// Number of recent closes in the ticker summary.
    #[serde(default = "default_price_days")]
    pub price_days: usize,

    /// Default chart window in days.
    #[serde(default = "default_chart_days")]
    pub chart_days: u32,

    /// Annual and quarterly periods kept in the ticker summary.
    #[serde(default = "default_financial_periods")]
    pub financial_periods: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            search_api_key_env: default_search_key_env(),
            alpha_vantage_api_key_env: default_alpha_vantage_key_env(),
            alpha_vantage_rate_limit: default_alpha_vantage_rate_limit(),
            cache_ttl_seconds: default_cache_ttl(),
            search_max_results: default_search_max_results(),
            price_days: default_price_days(),
            chart_days: default_chart_days(),
            financial_periods: default_financial_periods(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_alpha_vantage_key_env() -> String {
    "ALPHA_VANTAGE_API_KEY".to_string()
}

fn default_alpha_vantage_rate_limit() -> u32 {
    5 // free tier
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_search_max_results() -> usize {
    5
}

fn default_price_days() -> usize {
    5
}

fn default_chart_days() -> u32 {
    30
}

fn default_financial_periods() -> usize {
    4
}

/// Supervisor routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Turns a member may take before the supervisor moves on.
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,

    /// Upper bound on supervisor decisions per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_trials() -> usize {
    1
}

fn default_max_steps() -> usize {
    25
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the detailed step log.
    #[serde(default = "default_true")]
    pub include_logs: bool,

    /// Output format for analysis reports.
    #[serde(default)]
    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_logs: true,
            format: ReportFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(provider) = args.provider {
            self.model.provider = provider;
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = base_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(language) = args.language {
            self.general.language = language;
        }
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.no_save {
            self.general.save_reports = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.provider, ProviderKind::Openai);
        assert_eq!(config.supervisor.max_trials, 1);
        assert_eq!(config.data.chart_days, 30);
        assert_eq!(config.general.language, Language::English);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
language = "Korean"
output_dir = "out"

[model]
provider = "ollama"
name = "llama3.2:latest"
base_url = "http://localhost:11434"
temperature = 0.2

[supervisor]
max_trials = 2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.language, Language::Korean);
        assert_eq!(config.general.output_dir, PathBuf::from("out"));
        assert_eq!(config.model.provider, ProviderKind::Ollama);
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.supervisor.max_trials, 2);
        // untouched sections keep their defaults
        assert_eq!(config.supervisor.max_steps, 25);
        assert_eq!(config.data.search_max_results, 5);
    }

    #[test]
    fn test_korean_label_alias() {
        let config: Config = toml::from_str("[general]\nlanguage = \"한글\"\n").unwrap();
        assert_eq!(config.general.language, Language::Korean);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[supervisor]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.model.name, "gpt-4o-mini");
        assert!(!toml_str.contains("verbose"));
    }

    #[test]
    fn test_old_verbose_key_is_ignored() {
        let config: Config =
            toml::from_str("[general]
save_reports = false
verbose = true
").unwrap();
        assert!(!config.general.save_reports);
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[model]\nname = \"gpt-4o\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.model.name, "gpt-4o");
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[model\nname = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
