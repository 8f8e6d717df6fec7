//! System prompts for the supervisor and the team members.

use crate::models::{Language, Member};

fn member_list() -> String {
    Member::ALL
        .iter()
        .map(|m| m.wire_name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn supervisor_prompt(current_date: &str, language: Language) -> String {
    format!(
        r#"Today is {date}.
You are a supervisor of a stock analysis team. Your team members are: {members}.
Given the user's request and the latest message from the team, decide which member should act next.
Each member performs a task and reports back with their results.

- Researcher: searches the web for recent news and market sentiment about the stock.
- Stock_Analyzer: analyzes recent prices and annual / quarterly financial statements.
- Chart_Generator: creates a candlestick chart of the stock price.

Work through the members in order. When every member has finished, respond with FINISH.
Respond only with a JSON object of the form {{"next": "<member or FINISH>"}}, choosing one of: {members}, FINISH.
Please respond in {language}."#,
        date = current_date,
        members = member_list(),
        language = language.prompt_name()
    )
}

pub fn member_prompt(member: Member, current_date: &str, language: Language) -> String {
    let body = match member {
        Member::Researcher => {
            r#"You are a researcher who specializes in gathering and analyzing information about stocks.
Use the web_search tool to find the latest news, analyst opinions and events that affect the stock in question.
Summarize the key findings with their sources and point out anything that could move the price."#
        }
        Member::StockAnalyzer => {
            r#"You are a stock market analyst who specializes in technical and fundamental analysis.
Use the analyze_stock_ticker tool to get recent closing prices and the annual and quarterly financial statement summaries.
Explain the recent price movement, revenue and earnings trends, profitability and valuation, and give a balanced investment view."#
        }
        Member::ChartGenerator => {
            r#"You are a data visualization expert who specializes in creating stock charts.
Use the create_stock_chart tool to generate a candlestick chart for the stock.
The tool takes two parameters:
- ticker: The stock ticker symbol (e.g., 'AAPL')
- days: Number of days to show (default is 30)

Include the chart block returned by the tool unchanged in your answer, followed by a short description of what it shows."#
        }
    };

    format!(
        "Today is {}.\n{}\n\nPlease respond in {}.",
        current_date,
        body,
        language.prompt_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_prompt_lists_members() {
        let prompt = supervisor_prompt("2024-06-01", Language::Korean);
        assert!(prompt.starts_with("Today is 2024-06-01."));
        assert!(prompt.contains("Researcher, Stock_Analyzer, Chart_Generator"));
        assert!(prompt.contains(r#"{"next": "<member or FINISH>"}"#));
        assert!(prompt.ends_with("Please respond in Korean."));
    }

    #[test]
    fn test_member_prompts_name_their_tool() {
        let date = "2024-06-01";
        assert!(member_prompt(Member::Researcher, date, Language::English).contains("web_search"));
        assert!(member_prompt(Member::StockAnalyzer, date, Language::English)
            .contains("analyze_stock_ticker"));
        assert!(member_prompt(Member::ChartGenerator, date, Language::English)
            .contains("create_stock_chart"));
    }
}
