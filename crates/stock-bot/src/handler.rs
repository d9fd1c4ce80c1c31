//! Utterance to reply text
//!
//! The handler never fails: every outcome, including panics in collaborators
//! and overrunning the reply deadline, maps to one reply text.

use crate::analysis::AnalysisOrchestrator;
use crate::error::StockError;
use crate::quote::QuoteFetcher;
use crate::resolver::SymbolResolver;
use crate::types::QuoteSnapshot;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

/// Reply when the utterance names nothing
pub const EMPTY_SUBJECT_REPLY: &str = "종목명을 입력해주세요.";

/// Reply for anything unexpected
pub const TRANSIENT_ERROR_REPLY: &str = "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Held back from the reply deadline for formatting and transport
const REPLY_MARGIN: Duration = Duration::from_millis(150);

/// Trailing punctuation and conversational filler, stripped repeatedly
const TRAILING_FILLER: &[&str] = &[
    "?", "？", "!", "！", ".", "주가", "시세", "어때", "알려줘", "얼마야", "얼마",
];

pub fn not_found_reply(subject: &str) -> String {
    format!("'{subject}' 종목을 찾을 수 없습니다. (예: 005930 또는 삼성전자)")
}

pub fn quote_unavailable_reply(symbol: &str) -> String {
    format!("'{symbol}' 정보를 가져오지 못했습니다. 잠시 후 다시 조회를 부탁드립니다.")
}

/// Subject name from a raw utterance such as `주식: 삼성전자 주가 알려줘?`
pub fn extract_subject(utterance: &str) -> String {
    let utterance = utterance.trim();
    let mut subject = match utterance.strip_prefix("주식") {
        Some(rest) => {
            let rest = rest.trim_start();
            rest.strip_prefix([':', '：']).unwrap_or(rest).trim().to_string()
        }
        None => utterance.to_string(),
    };

    loop {
        let before = subject.len();
        for filler in TRAILING_FILLER {
            if let Some(stripped) = subject.strip_suffix(filler) {
                subject = stripped.trim_end().to_string();
            }
        }
        if subject.len() == before {
            return subject;
        }
    }
}

/// Quote header: name, symbol, price and signed change
pub fn format_quote(snapshot: &QuoteSnapshot) -> String {
    let arrow = if snapshot.change > 0.0 {
        "▲"
    } else if snapshot.change < 0.0 {
        "▼"
    } else {
        "-"
    };

    format!(
        "📈 {} ({})\n현재가: {} {}\n변동: {} {} ({:.2}%)",
        snapshot.display_name,
        snapshot.symbol,
        format_amount(snapshot.price),
        snapshot.currency,
        arrow,
        format_amount(snapshot.change.abs()),
        snapshot.change_percent,
    )
}

/// Thousands separators and at most two decimals, e.g. `1,234,567.5`
fn format_amount(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded != "0.00" { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

/// Resolves, quotes and analyzes one request
pub struct RequestHandler {
    resolver: Arc<SymbolResolver>,
    quotes: Arc<QuoteFetcher>,
    analysis: AnalysisOrchestrator,
    reply_deadline: Duration,
}

impl RequestHandler {
    pub fn new(
        resolver: Arc<SymbolResolver>,
        quotes: Arc<QuoteFetcher>,
        analysis: AnalysisOrchestrator,
        reply_deadline: Duration,
    ) -> Self {
        Self {
            resolver,
            quotes,
            analysis,
            reply_deadline,
        }
    }

    /// Reply text for `utterance`
    #[instrument(skip(self))]
    pub async fn handle(&self, utterance: &str) -> String {
        let deadline = Instant::now() + self.reply_deadline;
        let work = AssertUnwindSafe(self.respond(utterance, deadline)).catch_unwind();
        match tokio::time::timeout_at(deadline, work).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_panic)) => {
                error!("Request handling panicked");
                TRANSIENT_ERROR_REPLY.to_string()
            }
            Err(_) => {
                error!("Reply deadline of {:?} exceeded", self.reply_deadline);
                TRANSIENT_ERROR_REPLY.to_string()
            }
        }
    }

    async fn respond(&self, utterance: &str, deadline: Instant) -> String {
        let subject = extract_subject(utterance);
        if subject.is_empty() {
            return EMPTY_SUBJECT_REPLY.to_string();
        }
        info!("Subject: {subject}");

        let ticker = match self.resolver.resolve(&subject).await {
            Ok(ticker) => ticker,
            Err(StockError::NotFound { .. }) => return not_found_reply(&subject),
            Err(e) => {
                error!("Resolution failed unexpectedly: {e}");
                return TRANSIENT_ERROR_REPLY.to_string();
            }
        };

        // Quote and analysis share what resolution left of the deadline
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .saturating_sub(REPLY_MARGIN);
        debug!("Resolved {subject} to {ticker}, {budget:?} left");

        let (quote, analysis) = tokio::join!(
            self.quotes.fetch_quote_within(&ticker, budget),
            self.analysis.analyze_within(&subject, budget)
        );

        match quote {
            Ok(snapshot) => format!("{}\n\n{}", format_quote(&snapshot), analysis.text()),
            Err(StockError::SourceExhausted { symbol }) => quote_unavailable_reply(&symbol),
            Err(e) => {
                error!("Quote failed unexpectedly: {e}");
                TRANSIENT_ERROR_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PLACEHOLDER;
    use crate::api::news::MockNewsFeed;
    use crate::api::yahoo::{MockChartApi, MockQuoteApi, MockSymbolSearch, StructuredQuote};
    use crate::api::{ChartApi, ChartMeta, NewsFeed, QuoteApi, SymbolSearch};
    use crate::cache::{AnalysisCache, FakeClock};
    use crate::config::StockConfig;
    use async_trait::async_trait;
    use bot_llm::{
        CompletionRequest, CompletionResponse, LLMProvider, StopReason, TokenUsage,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FEED: &str = "<title>a</title><link>l0</link><title>b</title><link>l1</link>\
        <title>반도체 호황</title><link>https://n.example/1</link>";

    struct CountingLlm {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl LLMProvider for CountingLlm {
        async fn complete(&self, _request: CompletionRequest) -> bot_llm::Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(CompletionResponse {
                text: "📢 긍정: 호황".to_string(),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting_llm() -> Arc<CountingLlm> {
        slow_llm(Duration::ZERO)
    }

    fn slow_llm(delay: Duration) -> Arc<CountingLlm> {
        Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    struct Fixture {
        resolver_feed: Arc<dyn NewsFeed>,
        search: Arc<dyn SymbolSearch>,
        quote: Arc<dyn QuoteApi>,
        library: Arc<dyn ChartApi>,
        raw: Arc<dyn ChartApi>,
        analysis_feed: Arc<dyn NewsFeed>,
    }

    impl Fixture {
        /// Inputs that resolve without touching the feed or search
        fn offline_resolution() -> Self {
            let mut resolver_feed = MockNewsFeed::new();
            resolver_feed.expect_fetch_feed().times(0);
            let mut search = MockSymbolSearch::new();
            search.expect_search().times(0);
            let mut analysis_feed = MockNewsFeed::new();
            analysis_feed
                .expect_fetch_feed()
                .returning(|_| Ok(FEED.to_string()));

            Self {
                resolver_feed: Arc::new(resolver_feed),
                search: Arc::new(search),
                quote: Arc::new(MockQuoteApi::new()),
                library: Arc::new(MockChartApi::new()),
                raw: Arc::new(MockChartApi::new()),
                analysis_feed: Arc::new(analysis_feed),
            }
        }

        fn build(self, llm: Arc<CountingLlm>) -> RequestHandler {
            let config = StockConfig::default();
            let resolver = SymbolResolver::new(self.resolver_feed, self.search, &config);
            let quotes = QuoteFetcher::new(self.quote, self.library, self.raw);
            let cache = Arc::new(AnalysisCache::new(config.analysis_cache_ttl, FakeClock::new()));
            let analysis =
                AnalysisOrchestrator::new(self.analysis_feed, llm, cache, config.clone()).unwrap();

            RequestHandler::new(
                Arc::new(resolver),
                Arc::new(quotes),
                analysis,
                config.reply_deadline,
            )
        }
    }

    fn structured_quote(symbol: &str, name: &str) -> Option<StructuredQuote> {
        Some(StructuredQuote {
            symbol: symbol.to_string(),
            short_name: Some(name.into()),
            currency: Some("KRW".into()),
            regular_market_price: Some(71_000.0),
            regular_market_change: Some(1_500.0),
            regular_market_change_percent: Some(2.158),
            ..StructuredQuote::default()
        })
    }

    fn samsung_quote(symbol: &str) -> Option<StructuredQuote> {
        structured_quote(symbol, "삼성전자")
    }

    fn failing_chart() -> MockChartApi {
        let mut chart = MockChartApi::new();
        chart
            .expect_chart()
            .returning(|_| Err(StockError::ApiError("blocked".into())));
        chart
    }

    struct PanickingQuote;

    #[async_trait]
    impl QuoteApi for PanickingQuote {
        async fn quote(&self, _symbol: &str) -> crate::error::Result<Option<StructuredQuote>> {
            panic!("upstream client bug")
        }
    }

    struct EmptyQuote;

    #[async_trait]
    impl QuoteApi for EmptyQuote {
        async fn quote(&self, _symbol: &str) -> crate::error::Result<Option<StructuredQuote>> {
            Ok(None)
        }
    }

    struct DelayedQuote(Duration);

    #[async_trait]
    impl QuoteApi for DelayedQuote {
        async fn quote(&self, symbol: &str) -> crate::error::Result<Option<StructuredQuote>> {
            tokio::time::sleep(self.0).await;
            Ok(samsung_quote(symbol))
        }
    }

    struct StalledChart(Duration);

    #[async_trait]
    impl ChartApi for StalledChart {
        async fn chart(&self, _symbol: &str) -> crate::error::Result<ChartMeta> {
            tokio::time::sleep(self.0).await;
            Err(StockError::ApiError("upstream timeout".into()))
        }
    }

    struct DelayedFeed {
        delay: Duration,
        body: &'static str,
    }

    #[async_trait]
    impl NewsFeed for DelayedFeed {
        async fn fetch_feed(&self, _subject: &str) -> crate::error::Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok(self.body.to_string())
        }
    }

    struct HangingSearch;

    #[async_trait]
    impl SymbolSearch for HangingSearch {
        async fn search(&self, _query: &str) -> crate::error::Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_extract_subject() {
        assert_eq!(extract_subject("주식 삼성전자"), "삼성전자");
        assert_eq!(extract_subject("주식: 005930"), "005930");
        assert_eq!(extract_subject("주식：카카오 주가 알려줘?"), "카카오");
        assert_eq!(extract_subject("  테슬라 시세 어때？ "), "테슬라");
        assert_eq!(extract_subject("애플 얼마야!"), "애플");
        assert_eq!(extract_subject("brk.b"), "brk.b");
        assert_eq!(extract_subject("주식"), "");
        assert_eq!(extract_subject("주식: ?"), "");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(71_000.0), "71,000");
        assert_eq!(format_amount(1_234_567.5), "1,234,567.5");
        assert_eq!(format_amount(189.456), "189.46");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn test_format_quote() {
        let snapshot = QuoteSnapshot {
            display_name: "Apple Inc.".into(),
            symbol: "AAPL".into(),
            price: 1_189.5,
            change: -2.25,
            change_percent: -0.1888,
            currency: "USD".into(),
        };
        assert_eq!(
            format_quote(&snapshot),
            "📈 Apple Inc. (AAPL)\n현재가: 1,189.5 USD\n변동: ▼ 2.25 (-0.19%)"
        );

        let flat = QuoteSnapshot {
            change: 0.0,
            change_percent: 0.0,
            ..snapshot
        };
        assert!(format_quote(&flat).ends_with("변동: - 0 (0.00%)"));
    }

    #[tokio::test]
    async fn test_empty_subject() {
        let handler = Fixture::offline_resolution().build(counting_llm());
        assert_eq!(handler.handle("주식 :").await, EMPTY_SUBJECT_REPLY);
    }

    #[tokio::test]
    async fn test_numeric_code_end_to_end() {
        let mut quote = MockQuoteApi::new();
        quote
            .expect_quote()
            .withf(|symbol| symbol == "005930.KS")
            .times(1)
            .returning(|symbol| Ok(samsung_quote(symbol)));
        let fixture = Fixture {
            quote: Arc::new(quote),
            ..Fixture::offline_resolution()
        };

        let llm = counting_llm();
        let reply = fixture.build(llm.clone()).handle("주식 005930").await;

        assert!(reply.starts_with(
            "📈 삼성전자 (005930.KS)\n현재가: 71,000 KRW\n변동: ▲ 1,500 (2.16%)\n\n"
        ));
        assert!(reply.contains("📢 긍정: 호황"));
        assert!(reply.contains("https://n.example/1"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alias_end_to_end() {
        let mut quote = MockQuoteApi::new();
        quote
            .expect_quote()
            .withf(|symbol| symbol == "005930.KS")
            .times(1)
            .returning(|symbol| Ok(samsung_quote(symbol)));
        let fixture = Fixture {
            quote: Arc::new(quote),
            ..Fixture::offline_resolution()
        };

        let reply = fixture
            .build(counting_llm())
            .handle("삼성전자 주가 알려줘")
            .await;
        assert!(reply.contains("(005930.KS)"));
    }

    #[tokio::test]
    async fn test_unknown_name_end_to_end() {
        let mut resolver_feed = MockNewsFeed::new();
        resolver_feed
            .expect_fetch_feed()
            .times(1)
            .returning(|_| Ok("<title>nothing</title>".to_string()));
        let mut search = MockSymbolSearch::new();
        search.expect_search().times(1).returning(|_| Ok(Vec::new()));
        let mut quote = MockQuoteApi::new();
        quote.expect_quote().times(0);
        let mut library = MockChartApi::new();
        library.expect_chart().times(0);
        let mut raw = MockChartApi::new();
        raw.expect_chart().times(0);
        let mut analysis_feed = MockNewsFeed::new();
        analysis_feed.expect_fetch_feed().times(0);

        let llm = counting_llm();
        let handler = Fixture {
            resolver_feed: Arc::new(resolver_feed),
            search: Arc::new(search),
            quote: Arc::new(quote),
            library: Arc::new(library),
            raw: Arc::new(raw),
            analysis_feed: Arc::new(analysis_feed),
        }
        .build(llm.clone());

        let reply = handler.handle("주식 아무개전자").await;
        assert_eq!(reply, not_found_reply("아무개전자"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quote_exhaustion_discards_analysis() {
        let mut quote = MockQuoteApi::new();
        quote.expect_quote().times(2).returning(|_| Ok(None));
        let mut library = MockChartApi::new();
        library
            .expect_chart()
            .times(2)
            .returning(|_| Err(StockError::ApiError("blocked".into())));
        let mut raw = MockChartApi::new();
        raw.expect_chart()
            .times(2)
            .returning(|_| Err(StockError::ApiError("blocked".into())));
        let fixture = Fixture {
            quote: Arc::new(quote),
            library: Arc::new(library),
            raw: Arc::new(raw),
            ..Fixture::offline_resolution()
        };

        let llm = counting_llm();
        let reply = fixture.build(llm.clone()).handle("005930").await;

        assert_eq!(reply, quote_unavailable_reply("005930.KS"));
        // Analysis ran concurrently but its text is not part of the reply
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_quote_source_still_reports_unavailable() {
        let fixture = Fixture {
            quote: Arc::new(EmptyQuote),
            library: Arc::new(StalledChart(Duration::from_secs(4))),
            raw: Arc::new(failing_chart()),
            ..Fixture::offline_resolution()
        };

        let start = Instant::now();
        let reply = fixture.build(counting_llm()).handle("005930").await;

        assert_eq!(reply, quote_unavailable_reply("005930.KS"));
        assert!(start.elapsed() < StockConfig::default().reply_deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolution_shrinks_analysis_budget() {
        let mut quote = MockQuoteApi::new();
        quote
            .expect_quote()
            .withf(|symbol| symbol == "042700.KS")
            .times(1)
            .returning(|symbol| Ok(structured_quote(symbol, "한미반도체")));
        let fixture = Fixture {
            resolver_feed: Arc::new(DelayedFeed {
                delay: Duration::from_millis(1_500),
                body: "<title>한미반도체(042700) 급등</title>",
            }),
            quote: Arc::new(quote),
            ..Fixture::offline_resolution()
        };

        let start = Instant::now();
        let reply = fixture
            .build(slow_llm(Duration::from_secs(10)))
            .handle("주식 한미반도체")
            .await;

        assert!(reply.starts_with("📈 한미반도체 (042700.KS)\n"), "{reply}");
        assert!(reply.ends_with(PLACEHOLDER));
        assert!(start.elapsed() < StockConfig::default().reply_deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_and_analysis_run_concurrently() {
        let fixture = Fixture {
            quote: Arc::new(DelayedQuote(Duration::from_secs(2))),
            ..Fixture::offline_resolution()
        };

        let start = Instant::now();
        let reply = fixture
            .build(slow_llm(Duration::from_secs(2)))
            .handle("005930")
            .await;
        let elapsed = start.elapsed();

        assert!(reply.contains("📢 긍정: 호황"), "{reply}");
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_panic_becomes_transient_error() {
        let fixture = Fixture {
            quote: Arc::new(PanickingQuote),
            library: Arc::new(StalledChart(Duration::from_secs(30))),
            raw: Arc::new(StalledChart(Duration::from_secs(30))),
            ..Fixture::offline_resolution()
        };
        assert_eq!(fixture.build(counting_llm()).handle("005930").await, TRANSIENT_ERROR_REPLY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_deadline() {
        let mut resolver_feed = MockNewsFeed::new();
        resolver_feed
            .expect_fetch_feed()
            .returning(|_| Ok("<title>nothing</title>".to_string()));
        let fixture = Fixture {
            resolver_feed: Arc::new(resolver_feed),
            search: Arc::new(HangingSearch),
            ..Fixture::offline_resolution()
        };

        let start = Instant::now();
        let reply = fixture.build(counting_llm()).handle("주식 아무개전자").await;

        assert_eq!(reply, TRANSIENT_ERROR_REPLY);
        assert!(start.elapsed() <= StockConfig::default().reply_deadline);
    }
}
