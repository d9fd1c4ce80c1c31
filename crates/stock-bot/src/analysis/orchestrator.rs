//! News summary pipeline with a latency budget
//!
//! A fresh cached summary is served immediately. Otherwise the enrichment
//! pipeline (feed fetch, headline extraction, summarization) is raced against
//! the analysis budget. When the budget wins the caller gets a placeholder and
//! the pipeline keeps running to warm the cache. Concurrent requests for the
//! same subject share one pipeline run.

use super::prompt::{SUMMARY_SYSTEM, SummaryPrompt};
use super::race::{RaceOutcome, race_or_detach};
use super::{AnalysisResult, EnrichmentError, summary_notice};
use crate::api::{NewsFeed, extract_headlines};
use crate::cache::AnalysisCache;
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::types::NewsItem;
use bot_llm::{CompletionRequest, LLMProvider, Message};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type EnrichmentOutcome = std::result::Result<AnalysisResult, EnrichmentError>;
type SharedEnrichment = Shared<BoxFuture<'static, EnrichmentOutcome>>;

struct Pipeline {
    feed: Arc<dyn NewsFeed>,
    llm: Arc<dyn LLMProvider>,
    cache: Arc<AnalysisCache>,
    prompt: SummaryPrompt,
    config: StockConfig,
    in_flight: Mutex<HashMap<String, SharedEnrichment>>,
}

/// Produces the analysis text for a subject within the configured budget
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    pipeline: Arc<Pipeline>,
}

impl AnalysisOrchestrator {
    pub fn new(
        feed: Arc<dyn NewsFeed>,
        llm: Arc<dyn LLMProvider>,
        cache: Arc<AnalysisCache>,
        config: StockConfig,
    ) -> Result<Self> {
        Ok(Self {
            pipeline: Arc::new(Pipeline {
                feed,
                llm,
                cache,
                prompt: SummaryPrompt::new()?,
                config,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Analysis for `name`; never fails and never exceeds the budget by more
    /// than scheduling noise
    pub async fn analyze(&self, name: &str) -> AnalysisResult {
        self.analyze_within(name, self.pipeline.config.analysis_budget).await
    }

    /// [`analyze`](Self::analyze) with the budget capped at `limit`, for
    /// callers that have already spent part of their own deadline
    #[instrument(skip(self))]
    pub async fn analyze_within(&self, name: &str, limit: Duration) -> AnalysisResult {
        if let Some(text) = self.pipeline.cache.get(name) {
            return AnalysisResult::Cached(text);
        }

        let budget = limit.min(self.pipeline.config.analysis_budget);
        match race_or_detach(self.enrichment_for(name), budget).await {
            RaceOutcome::Finished(Ok(result)) => result,
            RaceOutcome::Finished(Err(e)) => {
                warn!("Enrichment for {name} failed: {e}");
                AnalysisResult::Degraded(e.user_message().to_string())
            }
            RaceOutcome::Failed(reason) => {
                warn!("Enrichment task for {name} died: {reason}");
                AnalysisResult::Degraded(EnrichmentError::Internal(reason).user_message().to_string())
            }
            RaceOutcome::Detached => {
                info!("Enrichment for {name} exceeded {budget:?}, continuing in background");
                AnalysisResult::Pending
            }
        }
    }

    /// Number of pipeline runs still executing
    pub fn in_flight(&self) -> usize {
        self.pipeline
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Join the running pipeline for `name`, or start one
    fn enrichment_for(&self, name: &str) -> SharedEnrichment {
        let mut in_flight = self
            .pipeline
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(running) = in_flight.get(name) {
            debug!("Joining in-flight enrichment for {name}");
            return running.clone();
        }

        let pipeline = Arc::clone(&self.pipeline);
        let key = name.to_string();
        let run = async move {
            let outcome = AssertUnwindSafe(pipeline.enrich(&key))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(EnrichmentError::Internal("pipeline panicked".into())));

            if let Ok(AnalysisResult::Fresh(text)) = &outcome {
                pipeline.cache.put(key.clone(), text.clone());
            }
            pipeline
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            outcome
        }
        .boxed()
        .shared();

        in_flight.insert(name.to_string(), run.clone());
        run
    }
}

impl Pipeline {
    async fn enrich(&self, name: &str) -> EnrichmentOutcome {
        let timeout = self.config.news_timeout;
        let feed = match tokio::time::timeout(timeout, self.feed.fetch_feed(name)).await {
            Err(_) => return Err(EnrichmentError::FeedTimeout),
            Ok(Err(StockError::RateLimitExceeded { .. })) => {
                return Err(EnrichmentError::RateLimited);
            }
            Ok(Err(e)) => return Err(EnrichmentError::FeedUnavailable(e.to_string())),
            Ok(Ok(feed)) => feed,
        };

        let headlines =
            extract_headlines(&feed, self.config.headline_skip, self.config.headline_count);
        if headlines.is_empty() {
            return Err(EnrichmentError::NoNews);
        }
        debug!("Summarizing {} headlines for {name}", headlines.len());

        let links = links_section(&headlines[..self.config.link_count.min(headlines.len())]);
        let prompt = self
            .prompt
            .render(name, &headlines)
            .map_err(|e| EnrichmentError::Internal(e.to_string()))?;

        let request = CompletionRequest::builder(&self.config.model)
            .system(SUMMARY_SYSTEM)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.summary_max_tokens)
            .temperature(self.config.summary_temperature)
            .build();

        match self.llm.complete(request).await {
            Ok(response) => {
                debug!(tokens = response.usage.total(), "Summary for {name} ready");
                Ok(AnalysisResult::Fresh(format!("{}{links}", response.text)))
            }
            Err(e) => {
                warn!(provider = self.llm.name(), "Summarization failed: {e}");
                Ok(AnalysisResult::Degraded(format!("{}{links}", summary_notice(&e))))
            }
        }
    }
}

fn links_section(items: &[NewsItem]) -> String {
    let mut section = String::from("\n\n🔗 관련 링크:\n");
    for item in items {
        section.push_str(&format!("- {}\n  {}\n", item.title, item.link));
    }
    section
}
