//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{ProviderKind, ReportFormat};
use crate::models::Language;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stock Analyst - a team of LLM agents that research, analyze and chart stocks
///
/// A supervisor routes your question through a researcher (web search),
/// a stock analyzer (prices and financial statements) and a chart
/// generator (candlestick charts), then renders the answer in the terminal.
///
/// Examples:
///   stock-analyst run
///   stock-analyst run --language ko
///   stock-analyst analyze "Should I buy Apple stock? Please analyze AAPL."
///   stock-analyst newsletter "semiconductors" --language en
///   stock-analyst --provider ollama --base-url http://localhost:11434 --model llama3.2 run
///   stock-analyst init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Model to use for every agent
    ///
    /// Can also be set via STOCK_ANALYST_MODEL or .stock-analyst.toml.
    #[arg(short, long, global = true, env = "STOCK_ANALYST_MODEL")]
    pub model: Option<String>,

    /// Chat backend wire format (openai, ollama)
    #[arg(long, global = true, value_name = "PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// Chat backend base URL
    #[arg(long, global = true, value_name = "URL", env = "STOCK_ANALYST_BASE_URL")]
    pub base_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Language for answers and the UI (english/en, korean/ko)
    #[arg(short, long, global = true, value_name = "LANG")]
    pub language: Option<Language>,

    /// Directory for reports and chart files
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Do not write reports or chart files
    #[arg(long, global = true)]
    pub no_save: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .stock-analyst.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the interactive analysis session
    Run,

    /// Answer a single stock question and exit
    Analyze {
        /// Question about a stock, e.g. "Please analyze AAPL"
        question: String,
    },

    /// Generate a newsletter for a keyword and exit
    Newsletter {
        /// Keyword to research, e.g. "AI chips"
        keyword: String,
    },

    /// Generate a default .stock-analyst.toml configuration file
    InitConfig,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.command == Command::InitConfig {
            return Ok(());
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Analyze { question } if question.trim().is_empty() => {
                Err("Question must not be empty".to_string())
            }
            Command::Newsletter { keyword } if keyword.trim().is_empty() => {
                Err("Keyword must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command,
            model: None,
            provider: None,
            base_url: None,
            temperature: None,
            timeout: None,
            language: None,
            output_dir: None,
            format: None,
            no_save: false,
            config: None,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from(["stock-analyst", "analyze", "Please analyze AAPL"]).unwrap();
        assert_eq!(
            args.command,
            Command::Analyze {
                question: "Please analyze AAPL".to_string()
            }
        );

        let args = Args::try_parse_from(["stock-analyst", "run", "--language", "ko"]).unwrap();
        assert_eq!(args.command, Command::Run);
        assert_eq!(args.language, Some(Language::Korean));

        let args =
            Args::try_parse_from(["stock-analyst", "--provider", "ollama", "newsletter", "AI"]).unwrap();
        assert_eq!(args.provider, Some(ProviderKind::Ollama));
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args(Command::Run);
        args.base_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_empty_question() {
        let args = make_args(Command::Analyze {
            question: "   ".to_string(),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::Run);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature() {
        let mut args = make_args(Command::Run);
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());
        args.temperature = Some(0.3);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Run);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
