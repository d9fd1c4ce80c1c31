//! Free text to ticker resolution
//!
//! Strategies in order:
//! 1. six-digit domestic code, no network
//! 2. already-qualified ticker (`005930.KS`, `brk.b`), case-normalized
//! 3. static alias table, exact and case-insensitive
//! 4. code scraped from the news feed for the subject, time-bounded
//! 5. fuzzy symbol search, first candidate taken verbatim
//!
//! Hits from the two network strategies are memoized for a while.

use crate::api::{NewsFeed, SymbolSearch, extract_code};
use crate::chain::{Chain, Strategy, first_success};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::types::Ticker;
use async_trait::async_trait;
use cached::{Cached, TimedSizedCache};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Common names, abbreviations and frequent misspellings, keyed in lower case
static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("삼성전자", "005930.KS"),
        ("삼전", "005930.KS"),
        ("samsung", "005930.KS"),
        ("sk하이닉스", "000660.KS"),
        ("하이닉스", "000660.KS"),
        ("hynix", "000660.KS"),
        ("네이버", "035420.KS"),
        ("naver", "035420.KS"),
        ("카카오", "035720.KS"),
        ("kakao", "035720.KS"),
        ("현대차", "005380.KS"),
        ("현대자동차", "005380.KS"),
        ("기아", "000270.KS"),
        ("삼성sdi", "006400.KS"),
        ("lg에너지솔루션", "373220.KS"),
        ("셀트리온", "068270.KS"),
        ("에코프로", "086520.KQ"),
        ("에코프로비엠", "247540.KQ"),
        ("애플", "AAPL"),
        ("apple", "AAPL"),
        ("테슬라", "TSLA"),
        ("tesla", "TSLA"),
        ("엔비디아", "NVDA"),
        ("엔디비아", "NVDA"),
        ("nvidia", "NVDA"),
        ("마이크로소프트", "MSFT"),
        ("구글", "GOOGL"),
        ("아마존", "AMZN"),
    ])
});

/// `^\d{6}$`
struct ExactCode;

#[async_trait]
impl Strategy<str, Ticker> for ExactCode {
    fn name(&self) -> &str {
        "exact-code"
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        let is_code = input.len() == 6 && input.bytes().all(|b| b.is_ascii_digit());
        Ok(is_code.then(|| Ticker::domestic(input)))
    }
}

/// Input that already names an upstream symbol with a market suffix
struct QualifiedTicker;

#[async_trait]
impl Strategy<str, Ticker> for QualifiedTicker {
    fn name(&self) -> &str {
        "qualified-ticker"
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        let upper = input.to_ascii_uppercase();
        let qualified =
            upper.contains('.') && upper.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');
        Ok(qualified.then(|| Ticker::parse(&upper)))
    }
}

struct AliasTable;

#[async_trait]
impl Strategy<str, Ticker> for AliasTable {
    fn name(&self) -> &str {
        "alias"
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        Ok(ALIASES.get(input.to_lowercase().as_str()).map(|symbol| Ticker::parse(symbol)))
    }
}

/// Scan the subject's news feed for a parenthesized domestic code
struct NewsCodeExtraction {
    feed: Arc<dyn NewsFeed>,
    timeout: Duration,
}

#[async_trait]
impl Strategy<str, Ticker> for NewsCodeExtraction {
    fn name(&self) -> &str {
        "news-code"
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        let feed = tokio::time::timeout(self.timeout, self.feed.fetch_feed(input))
            .await
            .map_err(|_| StockError::timeout("news code extraction", self.timeout))??;

        Ok(extract_code(&feed).map(|code| {
            debug!("Found code {code} in news for {input}");
            Ticker::domestic(code)
        }))
    }
}

struct FuzzySearch {
    search: Arc<dyn SymbolSearch>,
}

#[async_trait]
impl Strategy<str, Ticker> for FuzzySearch {
    fn name(&self) -> &str {
        "fuzzy-search"
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        let candidates = self.search.search(input).await?;
        Ok(candidates.first().map(|symbol| Ticker::parse(symbol)))
    }
}

/// Remembers hits of a wrapped strategy; misses and failures are retried
struct Memoized<S> {
    inner: S,
    memo: Mutex<TimedSizedCache<String, Ticker>>,
}

impl<S> Memoized<S> {
    fn new(inner: S, size: usize, ttl: Duration) -> Self {
        Self {
            inner,
            memo: Mutex::new(TimedSizedCache::with_size_and_lifespan(size, ttl)),
        }
    }
}

#[async_trait]
impl<S: Strategy<str, Ticker>> Strategy<str, Ticker> for Memoized<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn attempt(&self, input: &str) -> Result<Option<Ticker>> {
        let key = input.to_lowercase();
        let remembered = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cache_get(&key)
            .cloned();
        if remembered.is_some() {
            debug!("Memoized {} hit for {input}", self.inner.name());
            return Ok(remembered);
        }

        let found = self.inner.attempt(input).await?;
        if let Some(ticker) = &found {
            self.memo
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .cache_set(key, ticker.clone());
        }
        Ok(found)
    }
}

/// Maps a subject name to a ticker
pub struct SymbolResolver {
    chain: Chain<str, Ticker>,
}

impl SymbolResolver {
    /// Standard five-step chain
    pub fn new(
        feed: Arc<dyn NewsFeed>,
        search: Arc<dyn SymbolSearch>,
        config: &StockConfig,
    ) -> Self {
        let size = config.resolution_cache_size;
        let ttl = config.resolution_cache_ttl;

        Self::with_chain(vec![
            Arc::new(ExactCode),
            Arc::new(QualifiedTicker),
            Arc::new(AliasTable),
            Arc::new(Memoized::new(
                NewsCodeExtraction {
                    feed,
                    timeout: config.resolver_news_timeout,
                },
                size,
                ttl,
            )),
            Arc::new(Memoized::new(FuzzySearch { search }, size, ttl)),
        ])
    }

    /// Resolver over a custom chain
    pub fn with_chain(chain: Chain<str, Ticker>) -> Self {
        Self { chain }
    }

    /// Resolve `input`, or `NotFound` when every strategy comes up empty
    #[instrument(skip(self))]
    pub async fn resolve(&self, input: &str) -> Result<Ticker> {
        let subject = input.trim();
        let not_found = || StockError::NotFound {
            subject: subject.to_string(),
        };
        if subject.is_empty() {
            return Err(not_found());
        }

        let ticker = first_success(&self.chain, subject).await.ok_or_else(not_found)?;
        info!("Resolved {subject:?} to {ticker}");
        Ok(ticker)
    }
}
