//! Newsletter pipeline steps.

use super::prompts::{
    article_titles_message, edit_newsletter_prompt, generate_themes_prompt, write_section_prompt,
};
use super::{
    Article, NewsletterEvent, NewsletterOutcome, NewsletterSection, NewsletterSink,
    NewsletterStep, NewsletterTheme, SubThemeArticles, MAX_SUB_THEMES,
};
use crate::llm::{extract_json_object, ChatMessage, ChatModel, ChatRequest};
use crate::market::{SearchProvider, SearchRequest};
use crate::models::Language;
use anyhow::{anyhow, bail, Context, Result};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{info, warn};

pub struct NewsletterPipeline {
    model: Arc<dyn ChatModel>,
    search: Arc<dyn SearchProvider>,
    language: Language,
}

impl NewsletterPipeline {
    pub fn new(model: Arc<dyn ChatModel>, search: Arc<dyn SearchProvider>, language: Language) -> Self {
        Self {
            model,
            search,
            language,
        }
    }

    /// Titles of recent news for `keyword` (5 results from the last 5 days).
    pub async fn search_news(&self, keyword: &str) -> Result<Vec<String>> {
        let hits = self
            .search
            .search(&SearchRequest::news(keyword, 5, 5))
            .await
            .with_context(|| format!("News search failed for '{}'", keyword))?;

        Ok(hits.into_iter().map(|hit| hit.title).collect())
    }

    /// Ask the model for a theme and at most five sub-themes.
    pub async fn generate_themes(&self, titles: &[String]) -> Result<NewsletterTheme> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(generate_themes_prompt(self.language)),
            ChatMessage::user(article_titles_message(titles)),
        ])
        .json();

        let reply = self
            .model
            .chat(request)
            .await
            .context("Theme generation failed")?;

        let value = extract_json_object(&reply.content)
            .ok_or_else(|| anyhow!("Theme generator did not return JSON: {}", reply.content))?;
        let mut theme: NewsletterTheme =
            serde_json::from_value(value).context("Theme generator returned an unexpected shape")?;

        theme.sub_themes.retain(|s| !s.trim().is_empty());
        theme.sub_themes.truncate(MAX_SUB_THEMES);
        if theme.theme.trim().is_empty() || theme.sub_themes.is_empty() {
            bail!("Theme generator returned no theme or sub-themes");
        }

        Ok(theme)
    }

    async fn search_sub_theme(&self, sub_theme: &str, events: &dyn NewsletterSink) -> SubThemeArticles {
        let request = SearchRequest::news(sub_theme, 3, 7).with_images_and_raw_content();

        let articles: Vec<Article> = match self.search.search(&request).await {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| Article {
                    title: hit.title,
                    image_url: hit.image_url.filter(|url| !url.is_empty()),
                    content: hit.raw_content.unwrap_or(hit.content),
                })
                .collect(),
            Err(e) => {
                warn!("Search for sub-theme '{}' failed: {}", sub_theme, e);
                Vec::new()
            }
        };

        events.emit(&NewsletterEvent::SubThemeSearched {
            sub_theme: sub_theme.to_string(),
            titles: articles.iter().map(|a| a.title.clone()).collect(),
        });

        SubThemeArticles {
            sub_theme: sub_theme.to_string(),
            articles,
        }
    }

    /// Search every sub-theme concurrently.
    ///
    /// Failed searches yield no articles; the step only fails when nothing
    /// was found at all.
    pub async fn search_sub_theme_articles(
        &self,
        theme: &NewsletterTheme,
        events: &dyn NewsletterSink,
    ) -> Result<Vec<SubThemeArticles>> {
        let results = join_all(
            theme
                .sub_themes
                .iter()
                .map(|sub_theme| self.search_sub_theme(sub_theme, events)),
        )
        .await;

        if results.iter().all(|r| r.articles.is_empty()) {
            bail!("No articles found for any sub-theme. Please try a different keyword.");
        }

        Ok(results)
    }

    pub async fn write_section(&self, sub_theme: &str, articles: &[Article]) -> Result<String> {
        let request = ChatRequest::new(vec![ChatMessage::user(write_section_prompt(
            sub_theme,
            articles,
            self.language,
        ))]);

        let reply = self
            .model
            .chat(request)
            .await
            .with_context(|| format!("Writing section '{}' failed", sub_theme))?;

        Ok(reply.content)
    }

    /// Combine the sections under the main theme, in sub-theme order.
    pub fn aggregate(theme: &NewsletterTheme, sections: &[NewsletterSection]) -> String {
        let mut combined = format!("# {}\n\n", theme.theme);
        for section in sections {
            combined.push_str(&format!("## {}\n{}\n\n", section.sub_theme, section.content));
        }
        combined
    }

    pub async fn edit_newsletter(&self, theme: &NewsletterTheme, draft: &str) -> Result<String> {
        let request = ChatRequest::new(vec![ChatMessage::user(edit_newsletter_prompt(
            &theme.theme,
            draft,
            self.language,
        ))]);

        let reply = self
            .model
            .chat(request)
            .await
            .context("Editing the newsletter failed")?;

        Ok(reply.content)
    }

    /// Run every step for `keyword`.
    pub async fn run(&self, keyword: &str, events: &dyn NewsletterSink) -> Result<NewsletterOutcome> {
        info!("Generating newsletter for '{}' in {}", keyword, self.language.prompt_name());

        let mut completed = 0;
        let mut step_done = |step: NewsletterStep| {
            completed += 1;
            events.emit(&NewsletterEvent::StepCompleted { step, completed });
        };

        let article_titles = self.search_news(keyword).await?;
        if article_titles.is_empty() {
            bail!("No recent news found for '{}'. Please try a different keyword.", keyword);
        }
        step_done(NewsletterStep::SearchNews);

        let theme = self.generate_themes(&article_titles).await?;
        info!("Theme: {} ({} sub-themes)", theme.theme, theme.sub_themes.len());
        step_done(NewsletterStep::GenerateThemes);

        let sub_theme_articles = self.search_sub_theme_articles(&theme, events).await?;
        step_done(NewsletterStep::SearchSubThemeArticles);

        let contents = try_join_all(
            sub_theme_articles
                .iter()
                .map(|entry| self.write_section(&entry.sub_theme, &entry.articles)),
        )
        .await?;

        let sections: Vec<NewsletterSection> = sub_theme_articles
            .iter()
            .zip(contents)
            .map(|(entry, content)| NewsletterSection {
                sub_theme: entry.sub_theme.clone(),
                content,
            })
            .collect();
        for i in 0..sections.len() {
            step_done(NewsletterStep::WriteSection(i));
        }

        let draft = Self::aggregate(&theme, &sections);
        step_done(NewsletterStep::Aggregate);
        events.emit(&NewsletterEvent::DraftReady {
            draft: draft.clone(),
        });

        let newsletter = self.edit_newsletter(&theme, &draft).await?;
        step_done(NewsletterStep::EditNewsletter);

        Ok(NewsletterOutcome {
            keyword: keyword.to_string(),
            language: self.language,
            article_titles,
            theme,
            sections,
            draft,
            newsletter,
        })
    }
}
