//! Configuration for the quote bot
//!
//! All budgets are expressed as [`Duration`]s. The platform drops any reply
//! slower than [`PLATFORM_DEADLINE`], so validation keeps the reply deadline
//! below it and the analysis budget below the reply deadline.

use crate::error::{Result, StockError};
use bot_utils::{EnvLookup, ProcessEnv, parse_env};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard response deadline imposed by the chat platform
pub const PLATFORM_DEADLINE: Duration = Duration::from_secs(5);

/// Configuration for resolution, quoting and analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Wall-clock budget for the analysis race
    pub analysis_budget: Duration,

    /// Timeout for the news fetch inside the enrichment pipeline
    pub news_timeout: Duration,

    /// Timeout for the news-based code extraction during resolution
    pub resolver_news_timeout: Duration,

    /// Per-request timeout for quote HTTP calls
    pub quote_timeout: Duration,

    /// Deadline for the whole request, after which a retry-later reply is sent
    pub reply_deadline: Duration,

    /// TTL of cached analysis texts
    pub analysis_cache_ttl: Duration,

    /// TTL of memoized network-backed resolutions
    pub resolution_cache_ttl: Duration,

    /// Maximum number of memoized resolutions
    pub resolution_cache_size: usize,

    /// Leading feed entries to skip (feed title and boilerplate)
    pub headline_skip: usize,

    /// Headlines passed to the summarizer
    pub headline_count: usize,

    /// Headlines listed with links under the summary
    pub link_count: usize,

    /// Model name handed to the completion provider
    pub model: String,

    /// Output budget for the summary
    pub summary_max_tokens: usize,

    /// Sampling temperature for the summary
    pub summary_temperature: f32,

    /// News feed requests allowed per minute
    pub feed_requests_per_minute: u32,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            analysis_budget: Duration::from_millis(3500),
            news_timeout: Duration::from_millis(2500),
            resolver_news_timeout: Duration::from_secs(3),
            quote_timeout: Duration::from_secs(4),
            reply_deadline: Duration::from_millis(4800),
            analysis_cache_ttl: Duration::from_secs(600),     // 10 minutes
            resolution_cache_ttl: Duration::from_secs(3600),  // 1 hour
            resolution_cache_size: 1000,
            headline_skip: 2,
            headline_count: 4,
            link_count: 2,
            model: "gemini-1.5-flash".to_string(),
            summary_max_tokens: 300,
            summary_temperature: 0.4,
            feed_requests_per_minute: 120,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Defaults overridden by `STOCK_BOT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Defaults overridden by values from `env`
    ///
    /// Durations are given in milliseconds.
    pub fn from_lookup<E: EnvLookup + ?Sized>(env: &E) -> Result<Self> {
        let ms = |key: &str| -> Result<Option<Duration>> {
            Ok(parse_env::<u64, _>(env, key)?.map(Duration::from_millis))
        };

        let mut builder = Self::builder();
        if let Some(d) = ms("STOCK_BOT_ANALYSIS_BUDGET_MS")? {
            builder = builder.analysis_budget(d);
        }
        if let Some(d) = ms("STOCK_BOT_NEWS_TIMEOUT_MS")? {
            builder = builder.news_timeout(d);
        }
        if let Some(d) = ms("STOCK_BOT_QUOTE_TIMEOUT_MS")? {
            builder = builder.quote_timeout(d);
        }
        if let Some(d) = ms("STOCK_BOT_REPLY_DEADLINE_MS")? {
            builder = builder.reply_deadline(d);
        }
        if let Some(secs) = parse_env::<u64, _>(env, "STOCK_BOT_CACHE_TTL_SECS")? {
            builder = builder.analysis_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(model) = env.get("STOCK_BOT_MODEL") {
            builder = builder.model(model);
        }
        if let Some(tokens) = parse_env(env, "STOCK_BOT_SUMMARY_MAX_TOKENS")? {
            builder = builder.summary_max_tokens(tokens);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.reply_deadline >= PLATFORM_DEADLINE {
            return Err(StockError::ConfigError(format!(
                "reply_deadline ({:?}) must be below the platform deadline ({:?})",
                self.reply_deadline, PLATFORM_DEADLINE
            )));
        }

        if self.analysis_budget >= self.reply_deadline {
            return Err(StockError::ConfigError(format!(
                "analysis_budget ({:?}) must be below reply_deadline ({:?})",
                self.analysis_budget, self.reply_deadline
            )));
        }

        if self.headline_count == 0 {
            return Err(StockError::ConfigError(
                "headline_count must be greater than 0".to_string(),
            ));
        }

        if self.feed_requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "feed_requests_per_minute must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    analysis_budget: Option<Duration>,
    news_timeout: Option<Duration>,
    resolver_news_timeout: Option<Duration>,
    quote_timeout: Option<Duration>,
    reply_deadline: Option<Duration>,
    analysis_cache_ttl: Option<Duration>,
    resolution_cache_ttl: Option<Duration>,
    headline_count: Option<usize>,
    model: Option<String>,
    summary_max_tokens: Option<usize>,
    feed_requests_per_minute: Option<u32>,
}

impl StockConfigBuilder {
    /// Set the analysis race budget
    pub fn analysis_budget(mut self, duration: Duration) -> Self {
        self.analysis_budget = Some(duration);
        self
    }

    /// Set the enrichment news fetch timeout
    pub fn news_timeout(mut self, duration: Duration) -> Self {
        self.news_timeout = Some(duration);
        self
    }

    /// Set the resolver news extraction timeout
    pub fn resolver_news_timeout(mut self, duration: Duration) -> Self {
        self.resolver_news_timeout = Some(duration);
        self
    }

    /// Set the per-request quote timeout
    pub fn quote_timeout(mut self, duration: Duration) -> Self {
        self.quote_timeout = Some(duration);
        self
    }

    /// Set the whole-request deadline
    pub fn reply_deadline(mut self, duration: Duration) -> Self {
        self.reply_deadline = Some(duration);
        self
    }

    /// Set the analysis cache TTL
    pub fn analysis_cache_ttl(mut self, duration: Duration) -> Self {
        self.analysis_cache_ttl = Some(duration);
        self
    }

    /// Set the resolution memo TTL
    pub fn resolution_cache_ttl(mut self, duration: Duration) -> Self {
        self.resolution_cache_ttl = Some(duration);
        self
    }

    /// Set how many headlines go into the summary prompt
    pub fn headline_count(mut self, count: usize) -> Self {
        self.headline_count = Some(count);
        self
    }

    /// Set the completion model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the summary output budget
    pub fn summary_max_tokens(mut self, tokens: usize) -> Self {
        self.summary_max_tokens = Some(tokens);
        self
    }

    /// Set the news feed rate limit
    pub fn feed_requests_per_minute(mut self, requests: u32) -> Self {
        self.feed_requests_per_minute = Some(requests);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            analysis_budget: self.analysis_budget.unwrap_or(defaults.analysis_budget),
            news_timeout: self.news_timeout.unwrap_or(defaults.news_timeout),
            resolver_news_timeout: self
                .resolver_news_timeout
                .unwrap_or(defaults.resolver_news_timeout),
            quote_timeout: self.quote_timeout.unwrap_or(defaults.quote_timeout),
            reply_deadline: self.reply_deadline.unwrap_or(defaults.reply_deadline),
            analysis_cache_ttl: self.analysis_cache_ttl.unwrap_or(defaults.analysis_cache_ttl),
            resolution_cache_ttl: self
                .resolution_cache_ttl
                .unwrap_or(defaults.resolution_cache_ttl),
            headline_count: self.headline_count.unwrap_or(defaults.headline_count),
            model: self.model.unwrap_or(defaults.model),
            summary_max_tokens: self.summary_max_tokens.unwrap_or(defaults.summary_max_tokens),
            feed_requests_per_minute: self
                .feed_requests_per_minute
                .unwrap_or(defaults.feed_requests_per_minute),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}
