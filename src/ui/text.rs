//! Localized interface strings.

use crate::models::Language;

/// Every string the terminal UI shows, for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiText {
    pub title: &'static str,
    pub input_label: &'static str,
    pub placeholder: &'static str,
    pub warning: &'static str,
    pub current_step: &'static str,
    pub analysis_completed: &'static str,
    pub analysis_failed: &'static str,
    pub error_occurred: &'static str,
    pub detailed_logs: &'static str,
    pub report_saved: &'static str,
    pub chart_saved: &'static str,
    pub save_failed: &'static str,
    pub unreadable_input: &'static str,
    pub session_cleared: &'static str,
    pub commands_help: &'static str,
    working_template: &'static str,
    completed_template: &'static str,

    pub newsletter_title: &'static str,
    pub newsletter_warning: &'static str,
    pub newsletter_generating: &'static str,
    pub newsletter_completed: &'static str,
    pub newsletter_failed: &'static str,
}

const ENGLISH: UiText = UiText {
    title: "Stock Analysis Assistant 📈",
    input_label: "Enter your question about stocks",
    placeholder: "e.g. Should I buy Apple stock? Please analyze AAPL.",
    warning: "Please enter a question.",
    current_step: "Current Step",
    analysis_completed: "Analysis completed!",
    analysis_failed: "Analysis failed",
    error_occurred: "An error occurred",
    detailed_logs: "Detailed Logs",
    report_saved: "Report saved to",
    chart_saved: "Chart saved to",
    save_failed: "Could not save the report",
    unreadable_input: "Could not read that line. Please type it again.",
    session_cleared: "Session cleared.",
    commands_help: "Commands: :new  :lang <en|ko>  :newsletter <keyword>  :logs  :quit",
    working_template: "is working... (trial: {}/{})",
    completed_template: "completed! (trial: {}/{})",

    newsletter_title: "Newsletter Agent 📰",
    newsletter_warning: "Please enter a keyword.",
    newsletter_generating: "Generating newsletter",
    newsletter_completed: "Newsletter completed!",
    newsletter_failed: "Newsletter generation failed",
};

const KOREAN: UiText = UiText {
    title: "주식 분석 어시스턴트 📈",
    input_label: "주식에 대해 질문해주세요",
    placeholder: "예: 애플 주식을 사도 될까요? AAPL을 분석해주세요.",
    warning: "질문을 입력해주세요.",
    current_step: "현재 단계",
    analysis_completed: "분석 완료!",
    analysis_failed: "분석 실패",
    error_occurred: "오류가 발생했습니다",
    detailed_logs: "상세 로그",
    report_saved: "보고서 저장 위치",
    chart_saved: "차트 저장 위치",
    save_failed: "보고서를 저장하지 못했습니다",
    unreadable_input: "입력을 읽을 수 없습니다. 다시 입력해주세요.",
    session_cleared: "세션이 초기화되었습니다.",
    commands_help: "명령어: :new  :lang <en|ko>  :newsletter <키워드>  :logs  :quit",
    working_template: "작업 중... (시도: {}/{})",
    completed_template: "완료! (시도: {}/{})",

    newsletter_title: "뉴스레터 에이전트 📰",
    newsletter_warning: "키워드를 입력해주세요.",
    newsletter_generating: "뉴스레터 생성 중",
    newsletter_completed: "뉴스레터 완성!",
    newsletter_failed: "뉴스레터 생성 실패",
};

/// Replace the `{}` placeholders of `template` in order.
fn fill(template: &str, values: &[usize]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut values = values.iter();
    let mut parts = template.split("{}").peekable();

    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            if let Some(value) = values.next() {
                out.push_str(&value.to_string());
            }
        }
    }

    out
}

impl UiText {
    pub fn for_language(language: Language) -> &'static UiText {
        match language {
            Language::English => &ENGLISH,
            Language::Korean => &KOREAN,
        }
    }

    /// e.g. `Researcher is working... (trial: 1/2)`
    pub fn working(&self, name: &str, trial: usize, max_trials: usize) -> String {
        format!("{} {}", name, fill(self.working_template, &[trial, max_trials]))
    }

    pub fn completed(&self, name: &str, trial: usize, max_trials: usize) -> String {
        format!("{} {}", name, fill(self.completed_template, &[trial, max_trials]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_templates() {
        let en = UiText::for_language(Language::English);
        assert_eq!(
            en.working("Researcher", 1, 2),
            "Researcher is working... (trial: 1/2)"
        );
        assert_eq!(
            en.completed("Stock Analyzer", 2, 2),
            "Stock Analyzer completed! (trial: 2/2)"
        );

        let ko = UiText::for_language(Language::Korean);
        assert_eq!(ko.working("Researcher", 1, 1), "Researcher 작업 중... (시도: 1/1)");
        assert_eq!(ko.completed("Researcher", 1, 1), "Researcher 완료! (시도: 1/1)");
    }

    #[test]
    fn test_localized_strings() {
        assert_eq!(UiText::for_language(Language::Korean).warning, "질문을 입력해주세요.");
        assert_eq!(UiText::for_language(Language::English).current_step, "Current Step");
        assert_eq!(
            UiText::for_language(Language::Korean).save_failed,
            "보고서를 저장하지 못했습니다"
        );
    }
}
