//! Stock quote bot for KakaoTalk
//!
//! Answers utterances such as `주식 삼성전자` with a live quote and a short
//! news summary, always within the platform's five second reply window.
//!
//! - [`resolver`]: free text to [`Ticker`] through an ordered strategy chain
//! - [`quote`]: quote sources with fallback and a secondary-board retry
//! - [`analysis`]: news summary raced against a budget, cached per subject
//! - [`handler`]: utterance to reply text, never failing
//! - [`platforms::kakao`]: the axum skill server
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_bot::{RequestHandler, StockConfig};
//!
//! let config = StockConfig::from_env()?;
//! let handler = stock_bot::build_handler(&config, llm)?;
//! let reply = handler.handle("주식 005930").await;
//! ```

pub mod analysis;
pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod handler;
pub mod platforms;
pub mod quote;
pub mod resolver;
pub mod types;

pub use analysis::{AnalysisOrchestrator, AnalysisResult};
pub use cache::{AnalysisCache, Clock, SystemClock};
pub use config::StockConfig;
pub use error::{Result, StockError};
pub use handler::RequestHandler;
pub use quote::QuoteFetcher;
pub use resolver::SymbolResolver;
pub use types::{Board, NewsItem, QuoteSnapshot, Ticker};

use api::{GoogleNewsClient, RawChartClient, YahooLibraryClient, YahooQuoteClient};
use bot_llm::LLMProvider;
use std::sync::Arc;

/// Wire the production clients into a request handler
pub fn build_handler(config: &StockConfig, llm: Arc<dyn LLMProvider>) -> Result<RequestHandler> {
    let news = Arc::new(GoogleNewsClient::new(
        config.feed_requests_per_minute,
        config.resolver_news_timeout,
    )?);
    let library = Arc::new(YahooLibraryClient::new()?);

    let resolver = SymbolResolver::new(news.clone(), library.clone(), config);
    let quotes = QuoteFetcher::new(
        Arc::new(YahooQuoteClient::new(config.quote_timeout)?),
        library,
        Arc::new(RawChartClient::new(config.quote_timeout)?),
    );
    let cache = Arc::new(AnalysisCache::new(
        config.analysis_cache_ttl,
        Arc::new(SystemClock),
    ));
    let analysis = AnalysisOrchestrator::new(news, llm, cache, config.clone())?;

    Ok(RequestHandler::new(
        Arc::new(resolver),
        Arc::new(quotes),
        analysis,
        config.reply_deadline,
    ))
}
