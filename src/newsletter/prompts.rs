//! Prompts for the newsletter pipeline.

use super::Article;
use crate::models::Language;

/// Longest article body passed to the section writer, in characters.
const MAX_ARTICLE_CHARS: usize = 3000;

pub fn generate_themes_prompt(language: Language) -> String {
    format!(
        r#"You are an expert helping to create a newsletter. From the list of article titles provided, choose one specific newsletter theme, phrased as a clear and detailed question that grabs the reader's attention.

Then list {count} sub-themes under the main theme. Each sub-theme must be a specific, researchable news item or insight that reflects the latest trends in the field. Avoid broad or generic topics.

Respond only with a JSON object of the form:
{{"theme": "<main theme as a question>", "sub_themes": ["<sub-theme>", ...]}}

Write the theme and sub-themes in {language}."#,
        count = super::MAX_SUB_THEMES,
        language = language.prompt_name()
    )
}

pub fn article_titles_message(titles: &[String]) -> String {
    format!("Article titles:\n\n{}", titles.join("\n"))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reference block for the section writer.
pub fn article_references(articles: &[Article]) -> String {
    articles
        .iter()
        .map(|article| {
            let mut reference = format!("Title: {}\n", article.title);
            if let Some(ref url) = article.image_url {
                reference.push_str(&format!("![Article Image]({})\n", url));
            }
            reference.push_str(&format!(
                "Content: {}...",
                truncate_chars(&article.content, MAX_ARTICLE_CHARS)
            ));
            reference
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_section_prompt(sub_theme: &str, articles: &[Article], language: Language) -> String {
    format!(
        r#"Write a newsletter section for the sub-theme: "{sub_theme}".

Use the following articles as reference, drawing on their titles, images and content:
<article>
{references}
</article>

When referencing images, use markdown image syntax: ![Image Description](image_url)

Summarize the key points and trends for this sub-theme and include images where they add value. Keep the tone engaging and informative for newsletter readers. Write in {language}."#,
        sub_theme = sub_theme,
        references = article_references(articles),
        language = language.prompt_name()
    )
}

pub fn edit_newsletter_prompt(theme: &str, draft: &str, language: Language) -> String {
    format!(
        r#"As an expert editor, review and refine the following newsletter on the theme: {theme}

{draft}

Make sure that:
0. The title is a question. Subtitles may be questions or statements.
1. Tone and style are consistent throughout.
2. Sections flow smoothly into each other.
3. Formatting and structure are clean.
4. The language is clear and engaging.
5. There are no grammatical or spelling errors.

Return the edited newsletter in {language}."#,
        theme = theme,
        draft = draft,
        language = language.prompt_name()
    )
}
