//! News-based analysis under a latency budget

pub mod orchestrator;
pub mod prompt;
pub mod race;

pub use orchestrator::AnalysisOrchestrator;
pub use race::{RaceOutcome, race_or_detach};

use bot_llm::LLMError;
use thiserror::Error;

/// Shown when the summary is still being computed
pub const PLACEHOLDER: &str = "뉴스 분석 중입니다. 잠시 후 주가와 함께 다시 확인해주세요.";

/// Analysis text and how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    /// Summarized just now
    Fresh(String),
    /// Served from the analysis cache
    Cached(String),
    /// Explains why no summary is available
    Degraded(String),
    /// Budget ran out before the summary was ready
    Pending,
}

impl AnalysisResult {
    pub fn text(&self) -> &str {
        match self {
            Self::Fresh(text) | Self::Cached(text) | Self::Degraded(text) => text,
            Self::Pending => PLACEHOLDER,
        }
    }
}

/// Reasons the enrichment pipeline produced no headlines
///
/// Cloneable so one pipeline run can be shared by concurrent requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("no recent news")]
    NoNews,

    #[error("news feed timed out")]
    FeedTimeout,

    #[error("news feed rate limited")]
    RateLimited,

    #[error("news feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EnrichmentError {
    /// Text shown in place of the analysis
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoNews => "분석할 최신 뉴스가 없습니다.",
            Self::RateLimited => "요청이 많아 뉴스 분석을 잠시 건너뜁니다. 잠시 후 다시 확인해주세요.",
            Self::FeedTimeout | Self::FeedUnavailable(_) | Self::Internal(_) => {
                "현재 뉴스 분석 데이터를 가져올 수 없습니다."
            }
        }
    }
}

/// Lead-in used when the summarizer fails but headlines are available
pub fn summary_notice(err: &LLMError) -> &'static str {
    if err.is_throttled() {
        "AI 분석 사용량이 초과되어 뉴스 제목을 우선 전달합니다."
    } else {
        "현재 AI 분석 서비스 연결이 원활하지 않아 뉴스 제목을 우선 전달합니다."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_text() {
        assert_eq!(AnalysisResult::Pending.text(), PLACEHOLDER);
        assert_eq!(AnalysisResult::Cached("a".into()).text(), "a");
    }

    #[test]
    fn test_messages_are_distinct() {
        let no_news = EnrichmentError::NoNews.user_message();
        let generic = EnrichmentError::FeedTimeout.user_message();
        let throttled = summary_notice(&LLMError::QuotaExceeded("daily".into()));
        let unavailable = summary_notice(&LLMError::AuthenticationFailed);

        assert_ne!(no_news, generic);
        assert_ne!(throttled, unavailable);
        assert_ne!(unavailable, generic);
        assert_eq!(
            throttled,
            summary_notice(&LLMError::RateLimitExceeded("rpm".into()))
        );
    }
}
