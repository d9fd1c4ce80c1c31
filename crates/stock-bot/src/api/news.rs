//! Google News RSS client
//!
//! The feed is consumed as raw text. Headlines and links are pulled out with
//! tag regexes rather than a validating XML parser, and the resolver scans the
//! same text for parenthesized six-digit codes such as `삼성전자(005930)`.

use crate::error::{Result, StockError};
use crate::types::NewsItem;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";

static TITLE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").ok());
static LINK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<link>([^<]+)</link>").ok());
static CODE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\((\d{6})\)").ok());

/// Source of raw news feed text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Raw feed text for stock news about `subject`
    async fn fetch_feed(&self, subject: &str) -> Result<String>;
}

/// Google News RSS client with a per-minute request quota
pub struct GoogleNewsClient {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl GoogleNewsClient {
    /// Create a client allowing `requests_per_minute` feed fetches
    pub fn new(requests_per_minute: u32, timeout: Duration) -> Result<Self> {
        let per_minute = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            StockError::ConfigError("feed rate limit must be greater than 0".to_string())
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; StockBot/0.1)")
            .build()?;

        Ok(Self {
            client,
            base_url: GOOGLE_NEWS_RSS.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// Search URL for stock news about `subject`, Korean edition
    fn search_url(&self, subject: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", format!("{subject} 주식").as_str()),
                ("hl", "ko"),
                ("gl", "KR"),
                ("ceid", "KR:ko"),
            ],
        )
        .map_err(|e| StockError::ConfigError(format!("invalid news feed URL: {e}")))
    }
}

#[async_trait]
impl NewsFeed for GoogleNewsClient {
    #[instrument(skip(self))]
    async fn fetch_feed(&self, subject: &str) -> Result<String> {
        // Waiting for a slot would blow the reply budget
        if self.rate_limiter.check().is_err() {
            return Err(StockError::RateLimitExceeded {
                provider: "google-news".to_string(),
            });
        }

        let url = self.search_url(subject)?;
        debug!("Fetching news feed: {url}");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StockError::ApiError(format!(
                "news feed returned {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

/// Headlines in feed order, skipping the first `skip` entries
///
/// Titles and links are paired positionally; a title without a matching link
/// gets an empty link.
pub fn extract_headlines(feed: &str, skip: usize, count: usize) -> Vec<NewsItem> {
    let (Some(title_re), Some(link_re)) = (TITLE_RE.as_ref(), LINK_RE.as_ref()) else {
        return Vec::new();
    };

    let mut links = link_re
        .captures_iter(feed)
        .skip(skip)
        .map(|c| unescape_html(&c[1]));

    title_re
        .captures_iter(feed)
        .skip(skip)
        .take(count)
        .map(|c| NewsItem {
            title: unescape_html(&c[1]),
            link: links.next().unwrap_or_default(),
        })
        .collect()
}

/// First parenthesized six-digit code in the feed
pub fn extract_code(feed: &str) -> Option<String> {
    CODE_RE.as_ref()?.captures(feed).map(|c| c[1].to_string())
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel>
<generator>NFE/5.0</generator><title>"삼성전자 주식" - Google 뉴스</title><link>https://news.google.com/search?q=x</link>
<language>ko</language><image><title>Google 뉴스</title><link>https://news.google.com/</link></image>
<item><title>삼성전자(005930), HBM 공급 확대 - 한국경제</title><link>https://news.example/a</link></item>
<item><title>외국인 순매수 &amp; 반도체 강세 - 매일경제</title><link>https://news.example/b</link></item>
<item><title>&quot;메모리 업황&quot; 회복 전망 - 연합뉴스</title><link>https://news.example/c</link></item>
</channel></rss>"#;

    #[test]
    fn test_extract_headlines_skips_boilerplate() {
        let items = extract_headlines(FEED, 2, 4);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "삼성전자(005930), HBM 공급 확대 - 한국경제");
        assert_eq!(items[0].link, "https://news.example/a");
        assert_eq!(items[1].title, "외국인 순매수 & 반도체 강세 - 매일경제");
        assert_eq!(items[2].title, "\"메모리 업황\" 회복 전망 - 연합뉴스");
    }

    #[test]
    fn test_extract_headlines_limits_count() {
        let items = extract_headlines(FEED, 2, 1);
        assert_eq!(items.len(), 1);
        assert!(extract_headlines("<rss></rss>", 2, 4).is_empty());
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code(FEED).as_deref(), Some("005930"));
        assert_eq!(extract_code("no codes (12345) here (1234567)"), None);
    }

    #[test]
    fn test_search_url() {
        let client = GoogleNewsClient::new(60, Duration::from_secs(3)).unwrap();
        let url = client.search_url("삼성전자").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".to_string(), "삼성전자 주식".to_string())));
        assert!(pairs.contains(&("ceid".to_string(), "KR:ko".to_string())));
    }

    #[tokio::test]
    async fn test_rate_limit_fails_fast() {
        let client = GoogleNewsClient::new(1, Duration::from_secs(3)).unwrap();
        // Burn the only slot without touching the network
        assert!(client.rate_limiter.check().is_ok());
        assert!(matches!(
            client.fetch_feed("카카오").await,
            Err(StockError::RateLimitExceeded { .. })
        ));
    }
}
