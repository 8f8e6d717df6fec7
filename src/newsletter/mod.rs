//! Keyword to newsletter pipeline.
//!
//! search_news -> generate_themes -> search_sub_theme_articles
//! -> write_section_i (concurrent) -> aggregate -> edit_newsletter

pub mod pipeline;
pub mod prompts;

use crate::models::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use pipeline::NewsletterPipeline;

/// Progress units reported for a full run.
pub const TOTAL_STEPS: usize = 10;

/// Sub-themes kept from the theme generator.
pub const MAX_SUB_THEMES: usize = 5;

/// Main theme and the sub-themes researched under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterTheme {
    pub theme: String,
    pub sub_themes: Vec<String>,
}

/// Reference material for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub image_url: Option<String>,
    pub content: String,
}

/// Articles found for a sub-theme. Empty when the search failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubThemeArticles {
    pub sub_theme: String,
    pub articles: Vec<Article>,
}

/// A written section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterSection {
    pub sub_theme: String,
    pub content: String,
}

/// Everything a newsletter run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterOutcome {
    pub keyword: String,
    pub language: Language,
    pub article_titles: Vec<String>,
    pub theme: NewsletterTheme,
    pub sections: Vec<NewsletterSection>,
    pub draft: String,
    pub newsletter: String,
}

/// A pipeline node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsletterStep {
    SearchNews,
    GenerateThemes,
    SearchSubThemeArticles,
    WriteSection(usize),
    Aggregate,
    EditNewsletter,
}

impl NewsletterStep {
    /// Node name, e.g. `write_section_2`.
    pub fn key(&self) -> String {
        match self {
            NewsletterStep::SearchNews => "search_news".to_string(),
            NewsletterStep::GenerateThemes => "generate_themes".to_string(),
            NewsletterStep::SearchSubThemeArticles => "search_sub_theme_articles".to_string(),
            NewsletterStep::WriteSection(i) => format!("write_section_{}", i),
            NewsletterStep::Aggregate => "aggregate".to_string(),
            NewsletterStep::EditNewsletter => "edit_newsletter".to_string(),
        }
    }
}

impl fmt::Display for NewsletterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Progress notifications from the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum NewsletterEvent {
    StepCompleted {
        step: NewsletterStep,
        /// Completed units out of [`TOTAL_STEPS`].
        completed: usize,
    },
    SubThemeSearched {
        sub_theme: String,
        titles: Vec<String>,
    },
    DraftReady {
        draft: String,
    },
}

pub trait NewsletterSink: Send + Sync {
    fn emit(&self, event: &NewsletterEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_keys() {
        assert_eq!(NewsletterStep::SearchNews.key(), "search_news");
        assert_eq!(NewsletterStep::WriteSection(3).key(), "write_section_3");
        assert_eq!(NewsletterStep::EditNewsletter.to_string(), "edit_newsletter");
    }

    #[test]
    fn test_theme_deserialize() {
        let theme: NewsletterTheme = serde_json::from_str(
            r#"{"theme": "Are AI chips the new oil?", "sub_themes": ["HBM supply", "Export controls"]}"#,
        )
        .unwrap();
        assert_eq!(theme.sub_themes.len(), 2);
    }
}
